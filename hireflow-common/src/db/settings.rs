//! Key/value settings table access

use crate::{Error, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tracing::info;

/// Setting holding the token signing secret when none is configured
pub const TOKEN_SECRET_KEY: &str = "token_signing_secret";

/// Setting updated by the SLA sweeper after each pass
pub const SLA_LAST_SWEEP_KEY: &str = "sla_last_sweep_at";

const GENERATED_SECRET_LENGTH: usize = 48;

/// Generic setting getter
///
/// Returns None if the key doesn't exist or holds NULL.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await?;

    match value.flatten() {
        Some(s) => s.parse::<T>().map(Some).map_err(|_| {
            Error::Config(format!("Failed to parse setting '{}' value: {}", key, s))
        }),
        None => Ok(None),
    }
}

/// Generic setting setter (insert or update)
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

/// Load the token signing secret, generating and persisting one on first use
///
/// A configured secret always wins and is never written to the database.
pub async fn load_or_create_token_secret(
    db: &Pool<Sqlite>,
    configured: Option<&str>,
) -> Result<String> {
    if let Some(secret) = configured {
        info!("Using token signing secret from configuration");
        return Ok(secret.to_string());
    }

    if let Some(secret) = get_setting::<String>(db, TOKEN_SECRET_KEY).await? {
        if !secret.is_empty() {
            return Ok(secret);
        }
    }

    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SECRET_LENGTH)
        .map(char::from)
        .collect();

    // INSERT OR IGNORE keeps the first writer's secret if two processes race
    sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(TOKEN_SECRET_KEY)
        .bind(&secret)
        .execute(db)
        .await?;
    sqlx::query("UPDATE settings SET value = ? WHERE key = ? AND (value IS NULL OR value = '')")
        .bind(&secret)
        .bind(TOKEN_SECRET_KEY)
        .execute(db)
        .await?;

    let stored = get_setting::<String>(db, TOKEN_SECRET_KEY)
        .await?
        .ok_or_else(|| Error::Internal("token secret was not persisted".to_string()))?;
    info!("Generated new token signing secret");
    Ok(stored)
}
