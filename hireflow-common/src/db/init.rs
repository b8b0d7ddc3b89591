//! Database initialization
//!
//! Creates the database file on first run, applies connection PRAGMAs,
//! creates every table, runs versioned migrations and seeds default settings.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Busy timeout applied to every pooled connection
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Connection options apply to every connection the pool opens, so
    // foreign keys and the busy timeout hold on all of them.
    let db_url = format!("sqlite://{}", db_path.display());
    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_tables(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create every table (idempotent)
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;

    // Tenancy
    create_companies_table(pool).await?;
    create_users_table(pool).await?;

    // Jobs and pipelines
    create_jobs_table(pool).await?;
    create_pipeline_stages_table(pool).await?;

    // Candidates and applications
    create_candidates_table(pool).await?;
    create_job_candidates_table(pool).await?;
    create_candidate_activities_table(pool).await?;
    create_stage_history_table(pool).await?;

    // Interviews
    create_interviews_table(pool).await?;
    create_interview_panel_members_table(pool).await?;
    create_interview_feedback_table(pool).await?;

    create_vendor_job_assignments_table(pool).await?;
    create_notifications_table(pool).await?;

    // SLA
    create_sla_configs_table(pool).await?;
    create_sla_alerts_table(pool).await?;

    // Calendar integration
    create_calendar_connections_table(pool).await?;
    create_calendar_oauth_states_table(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime key-value settings.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_companies_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS companies (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            domain TEXT,
            created_at TEXT NOT NULL,
            CHECK (length(trim(name)) > 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
            email TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            role TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            password_salt TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            CHECK (role IN ('admin', 'hiring_manager', 'recruiter', 'vendor'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_company ON users(company_id, role)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_jobs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            department TEXT,
            location TEXT,
            employment_type TEXT NOT NULL DEFAULT 'full_time',
            description TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            hiring_manager_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            recruiter_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            openings INTEGER NOT NULL DEFAULT 1,
            created_by TEXT REFERENCES users(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            closed_at TEXT,
            CHECK (status IN ('draft', 'open', 'on_hold', 'closed')),
            CHECK (openings >= 1)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_company ON jobs(company_id, status)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_pipeline_stages_table(pool: &SqlitePool) -> Result<()> {
    // No unique index on (job_id, parent_id, position): reordering rewrites
    // positions row by row and would collide mid-transaction.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_stages (
            id TEXT PRIMARY KEY,
            job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            parent_id TEXT REFERENCES pipeline_stages(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            position INTEGER NOT NULL,
            is_default INTEGER NOT NULL DEFAULT 0,
            is_mandatory INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            CHECK (position >= 0),
            CHECK (length(trim(name)) > 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pipeline_stages_job ON pipeline_stages(job_id, parent_id, position)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_candidates_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidates (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT,
            location TEXT,
            current_title TEXT,
            current_company TEXT,
            skills TEXT NOT NULL DEFAULT '[]',
            source TEXT,
            linkedin_url TEXT,
            summary TEXT,
            resume_url TEXT,
            resume_file_name TEXT,
            resume_text TEXT,
            created_by TEXT REFERENCES users(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Emails are stored lowercased, so a plain unique index is case-insensitive
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_candidates_company_email ON candidates(company_id, email)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_job_candidates_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_candidates (
            id TEXT PRIMARY KEY,
            job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            candidate_id TEXT NOT NULL REFERENCES candidates(id) ON DELETE CASCADE,
            current_stage_id TEXT NOT NULL REFERENCES pipeline_stages(id),
            status TEXT NOT NULL DEFAULT 'active',
            score INTEGER,
            submitted_by_vendor_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            applied_at TEXT NOT NULL,
            stage_entered_at TEXT NOT NULL,
            hired_at TEXT,
            rejected_at TEXT,
            UNIQUE (job_id, candidate_id),
            CHECK (status IN ('active', 'hired', 'rejected', 'withdrawn')),
            CHECK (score IS NULL OR (score >= 0 AND score <= 100))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_job_candidates_stage ON job_candidates(current_stage_id, status)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_job_candidates_candidate ON job_candidates(candidate_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_candidate_activities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidate_activities (
            id TEXT PRIMARY KEY,
            job_candidate_id TEXT NOT NULL REFERENCES job_candidates(id) ON DELETE CASCADE,
            activity_type TEXT NOT NULL,
            actor_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            description TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_candidate_activities_jc ON candidate_activities(job_candidate_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_stage_history_table(pool: &SqlitePool) -> Result<()> {
    // Stage ids are not foreign keys: history outlives deleted stages.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stage_history (
            id TEXT PRIMARY KEY,
            job_candidate_id TEXT NOT NULL REFERENCES job_candidates(id) ON DELETE CASCADE,
            from_stage_id TEXT,
            to_stage_id TEXT NOT NULL,
            moved_by TEXT REFERENCES users(id) ON DELETE SET NULL,
            moved_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_stage_history_jc ON stage_history(job_candidate_id, moved_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_stage_history_to ON stage_history(to_stage_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_interviews_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interviews (
            id TEXT PRIMARY KEY,
            job_candidate_id TEXT NOT NULL REFERENCES job_candidates(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            interview_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'scheduled',
            starts_at TEXT NOT NULL,
            ends_at TEXT NOT NULL,
            location TEXT,
            meeting_url TEXT,
            notes TEXT,
            created_by TEXT REFERENCES users(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (interview_type IN ('phone', 'video', 'onsite', 'technical', 'panel')),
            CHECK (status IN ('scheduled', 'completed', 'cancelled')),
            CHECK (ends_at > starts_at)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_interviews_jc ON interviews(job_candidate_id, starts_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_interviews_window ON interviews(status, starts_at, ends_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_interview_panel_members_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interview_panel_members (
            interview_id TEXT NOT NULL REFERENCES interviews(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            calendar_provider TEXT,
            calendar_event_id TEXT,
            PRIMARY KEY (interview_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_panel_members_user ON interview_panel_members(user_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_interview_feedback_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interview_feedback (
            id TEXT PRIMARY KEY,
            interview_id TEXT NOT NULL REFERENCES interviews(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            rating INTEGER NOT NULL,
            recommendation TEXT NOT NULL,
            notes TEXT,
            submitted_at TEXT NOT NULL,
            UNIQUE (interview_id, user_id),
            CHECK (rating >= 1 AND rating <= 5),
            CHECK (recommendation IN ('strong_yes', 'yes', 'no', 'strong_no'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_vendor_job_assignments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vendor_job_assignments (
            vendor_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            assigned_by TEXT REFERENCES users(id) ON DELETE SET NULL,
            assigned_at TEXT NOT NULL,
            PRIMARY KEY (vendor_id, job_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_vendor_assignments_job ON vendor_job_assignments(job_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_notifications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            link TEXT,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            read_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sla_configs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sla_configs (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
            stage_name TEXT NOT NULL,
            max_days INTEGER NOT NULL,
            warning_days INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (max_days >= 1),
            CHECK (warning_days IS NULL OR (warning_days >= 0 AND warning_days < max_days))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_sla_configs_stage ON sla_configs(company_id, lower(stage_name))",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sla_alerts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sla_alerts (
            job_candidate_id TEXT NOT NULL REFERENCES job_candidates(id) ON DELETE CASCADE,
            stage_id TEXT NOT NULL,
            stage_entered_at TEXT NOT NULL,
            alerted_at TEXT NOT NULL,
            PRIMARY KEY (job_candidate_id, stage_id, stage_entered_at)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_calendar_connections_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS calendar_connections (
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            provider TEXT NOT NULL,
            access_token TEXT NOT NULL,
            refresh_token TEXT,
            expires_at TEXT,
            external_email TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (user_id, provider),
            CHECK (provider IN ('google', 'microsoft'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_calendar_oauth_states_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS calendar_oauth_states (
            state TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            provider TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize default settings
///
/// Ensures every required setting exists; NULL values are reset.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Written by the SLA sweeper after each pass
    ensure_setting(pool, "sla_last_sweep_at", "").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// A missing setting is created; a NULL value is reset to the default.
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match value {
        None => {
            // INSERT OR IGNORE: concurrent initializers may race past the lookup
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;
            info!("Initialized setting '{}' with default value: {:?}", key, default_value);
        }
        Some(None) => {
            sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
                .bind(default_value)
                .bind(key)
                .execute(pool)
                .await?;
            warn!("Setting '{}' was NULL, reset to default: {:?}", key, default_value);
        }
        Some(Some(_)) => {}
    }

    Ok(())
}
