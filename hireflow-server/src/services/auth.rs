//! Registration, login and token authentication

use super::{normalize_email, required};
use crate::db;
use crate::models::{Actor, Company, User};
use crate::AppState;
use hireflow_common::auth::{
    hash_password, issue_token, validate_password_strength, verify_password, verify_token, Claims,
    Role,
};
use hireflow_common::{time, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Token signing parameters
#[derive(Clone)]
pub struct TokenSettings {
    pub secret: std::sync::Arc<str>,
    pub ttl_secs: i64,
}

impl TokenSettings {
    pub fn new(secret: impl Into<std::sync::Arc<str>>, ttl_hours: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl_secs: ttl_hours * 3600,
        }
    }

    pub fn issue(&self, user: &User) -> String {
        let claims = Claims::new(
            user.id,
            user.company_id,
            user.role,
            time::now().timestamp(),
            self.ttl_secs,
        );
        issue_token(&claims, &self.secret)
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub company_name: String,
    #[serde(default)]
    pub company_domain: Option<String>,
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: User,
    pub company: Company,
}

/// Create a company and its first admin in one transaction
pub async fn register(state: &AppState, req: RegisterRequest) -> Result<RegisterResponse> {
    let company_name = required(&req.company_name, "company_name")?;
    let full_name = required(&req.full_name, "full_name")?;
    let email = normalize_email(&req.email)?;
    validate_password_strength(&req.password)?;

    let now = time::now();
    let company = Company {
        id: Uuid::new_v4(),
        name: company_name,
        domain: super::clean(req.company_domain),
        created_at: now,
    };
    let user = User {
        id: Uuid::new_v4(),
        company_id: company.id,
        email,
        full_name,
        role: Role::Admin,
        is_active: true,
        created_at: now,
        last_login_at: None,
    };
    let password = hash_password(&req.password);

    let mut tx = state.db.begin().await?;
    if db::users::email_exists(&mut *tx, &user.email).await? {
        return Err(Error::Conflict(format!("email '{}' is already registered", user.email)));
    }
    db::companies::insert(&mut *tx, &company).await?;
    db::users::insert(&mut *tx, &user, &password.hash, &password.salt)
        .await
        .map_err(|e| super::users::email_taken(e, &user.email))?;
    tx.commit().await?;

    info!(company_id = %company.id, user_id = %user.id, "Company registered");

    Ok(RegisterResponse {
        token: state.tokens.issue(&user),
        expires_in: state.tokens.ttl_secs,
        user,
        company,
    })
}

/// Exchange credentials for a token
///
/// Unknown email, wrong password and deactivated user all produce the same
/// error.
pub async fn login(state: &AppState, req: LoginRequest) -> Result<AuthResponse> {
    let invalid = || Error::Unauthorized("invalid email or password".to_string());
    let email = req.email.trim().to_lowercase();

    let mut conn = state.db.acquire().await?;
    let creds = db::users::get_credentials_by_email(&mut conn, &email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&req.password, &creds.password_hash, &creds.password_salt) {
        return Err(invalid());
    }
    if !creds.user.is_active {
        return Err(invalid());
    }

    let now = time::now();
    db::users::record_login(&mut conn, creds.user.id, now).await?;
    let mut user = creds.user;
    user.last_login_at = Some(now);

    info!(user_id = %user.id, "User logged in");

    Ok(AuthResponse {
        token: state.tokens.issue(&user),
        expires_in: state.tokens.ttl_secs,
        user,
    })
}

/// Verify a bearer token and reload its user
///
/// Deactivated users and users whose role changed since the token was
/// issued are rejected.
pub async fn authenticate(state: &AppState, token: &str) -> Result<Actor> {
    let claims = verify_token(token, &state.tokens.secret, time::now().timestamp())?;

    let mut conn = state.db.acquire().await?;
    let user = db::users::get_any(&mut conn, claims.sub)
        .await?
        .ok_or_else(|| Error::Unauthorized("user no longer exists".to_string()))?;

    if !user.is_active {
        return Err(Error::Unauthorized("user is deactivated".to_string()));
    }
    if user.role != claims.role || user.company_id != claims.company_id {
        return Err(Error::Unauthorized(
            "token is stale, please sign in again".to_string(),
        ));
    }

    Ok(Actor {
        user_id: user.id,
        company_id: user.company_id,
        role: user.role,
    })
}

/// The caller's own user record
pub async fn me(state: &AppState, actor: &Actor) -> Result<User> {
    let mut conn = state.db.acquire().await?;
    db::users::get(&mut conn, actor.company_id, actor.user_id)
        .await?
        .ok_or_else(|| Error::not_found("user", actor.user_id))
}
