//! Company profile and user administration

use super::{clean, normalize_email, required};
use crate::db;
use crate::models::{Actor, Company, User};
use crate::AppState;
use hireflow_common::auth::{hash_password, validate_password_strength, Permission, Role};
use hireflow_common::{time, Error, Result};
use serde::Deserialize;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct CompanyUpdate {
    pub name: Option<String>,
    pub domain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

pub async fn get_company(state: &AppState, actor: &Actor) -> Result<Company> {
    let mut conn = state.db.acquire().await?;
    db::companies::get(&mut conn, actor.company_id)
        .await?
        .ok_or_else(|| Error::not_found("company", actor.company_id))
}

pub async fn update_company(state: &AppState, actor: &Actor, update: CompanyUpdate) -> Result<Company> {
    actor.require(Permission::ManageCompany)?;

    let mut conn = state.db.acquire().await?;
    let mut company = db::companies::get(&mut conn, actor.company_id)
        .await?
        .ok_or_else(|| Error::not_found("company", actor.company_id))?;

    if let Some(name) = update.name {
        company.name = required(&name, "name")?;
    }
    if update.domain.is_some() {
        company.domain = clean(update.domain);
    }

    db::companies::update(&mut conn, company.id, &company.name, company.domain.as_deref()).await?;
    Ok(company)
}

/// Users of the caller's company, optionally filtered by role
pub async fn list_users(state: &AppState, actor: &Actor, role: Option<Role>) -> Result<Vec<User>> {
    actor.role.require_min(Role::Recruiter)?;
    let mut conn = state.db.acquire().await?;
    db::users::list(&mut conn, actor.company_id, role).await
}

/// Map a unique-index hit on `users.email` to `Conflict`
pub(crate) fn email_taken(err: Error, email: &str) -> Error {
    if db::is_unique_violation(&err) {
        Error::Conflict(format!("email '{}' is already registered", email))
    } else {
        err
    }
}

pub async fn create_user(state: &AppState, actor: &Actor, new: NewUser) -> Result<User> {
    actor.require(Permission::ManageUsers)?;

    let email = normalize_email(&new.email)?;
    let full_name = required(&new.full_name, "full_name")?;
    validate_password_strength(&new.password)?;

    let user = User {
        id: Uuid::new_v4(),
        company_id: actor.company_id,
        email,
        full_name,
        role: new.role,
        is_active: true,
        created_at: time::now(),
        last_login_at: None,
    };
    let password = hash_password(&new.password);

    let mut conn = state.db.acquire().await?;
    if db::users::email_exists(&mut conn, &user.email).await? {
        return Err(Error::Conflict(format!("email '{}' is already registered", user.email)));
    }
    db::users::insert(&mut conn, &user, &password.hash, &password.salt)
        .await
        .map_err(|e| email_taken(e, &user.email))?;

    info!(user_id = %user.id, role = %user.role.as_str(), "User created");
    Ok(user)
}

pub async fn update_user(state: &AppState, actor: &Actor, user_id: Uuid, update: UserUpdate) -> Result<User> {
    actor.require(Permission::ManageUsers)?;

    let mut tx = state.db.begin().await?;
    let mut user = db::users::get(&mut *tx, actor.company_id, user_id)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    if let Some(full_name) = update.full_name {
        user.full_name = required(&full_name, "full_name")?;
    }
    let was_active_admin = user.role == Role::Admin && user.is_active;
    if let Some(role) = update.role {
        user.role = role;
    }
    if let Some(is_active) = update.is_active {
        user.is_active = is_active;
    }

    if was_active_admin && !(user.role == Role::Admin && user.is_active) {
        ensure_not_last_admin(&mut *tx, actor.company_id).await?;
    }

    db::users::update(&mut *tx, &user).await?;
    tx.commit().await?;

    info!(user_id = %user.id, role = %user.role.as_str(), active = user.is_active, "User updated");
    Ok(user)
}

pub async fn deactivate_user(state: &AppState, actor: &Actor, user_id: Uuid) -> Result<User> {
    update_user(
        state,
        actor,
        user_id,
        UserUpdate {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await
}

async fn ensure_not_last_admin(conn: &mut SqliteConnection, company_id: Uuid) -> Result<()> {
    if db::users::count_active_admins(conn, company_id).await? <= 1 {
        return Err(Error::Conflict(
            "the company must keep at least one active admin".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_unique_violation_becomes_conflict() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE t (email TEXT NOT NULL UNIQUE)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO t (email) VALUES ('a@b.io')")
            .execute(&pool)
            .await
            .unwrap();
        let err: Error = sqlx::query("INSERT INTO t (email) VALUES ('a@b.io')")
            .execute(&pool)
            .await
            .unwrap_err()
            .into();

        assert!(matches!(email_taken(err, "a@b.io"), Error::Conflict(_)));
        assert!(matches!(
            email_taken(Error::Internal("boom".to_string()), "a@b.io"),
            Error::Internal(_)
        ));
    }
}
