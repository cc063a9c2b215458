//! User accounts and study access grants.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::data::models::{Study, StudyUser, User};

const USER_SELECT: &str = "SELECT id, realname, email, is_admin, has_phi, is_active, \
            github_name, gitlab_name, created_at \
     FROM users";

pub async fn get(pool: &PgPool, user_id: i32) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!("{USER_SELECT} WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(anyhow::Error::from)
}

pub async fn list(pool: &PgPool) -> Result<Vec<User>> {
    sqlx::query_as::<_, User>(&format!("{USER_SELECT} ORDER BY realname"))
        .fetch_all(pool)
        .await
        .map_err(anyhow::Error::from)
}

/// Look up a user by OAuth provider account name.
pub async fn get_by_provider_name(
    pool: &PgPool,
    provider: &str,
    username: &str,
) -> Result<Option<User>> {
    let column = match provider {
        "github" => "github_name",
        "gitlab" => "gitlab_name",
        _ => return Ok(None),
    };
    sqlx::query_as::<_, User>(&format!("{USER_SELECT} WHERE {column} = $1"))
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(anyhow::Error::from)
}

/// Grant dashboard admin to the configured seed user. Idempotent; returns
/// `None` when the id matches no user.
pub async fn ensure_seed_admin(pool: &PgPool, user_id: i32) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET is_admin = TRUE WHERE id = $1 \
         RETURNING id, realname, email, is_admin, has_phi, is_active, \
                   github_name, gitlab_name, created_at",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to ensure seed admin")
}

/// Update the mutable profile fields submitted from the user form.
pub async fn update_profile(
    pool: &PgPool,
    user_id: i32,
    realname: &str,
    email: Option<&str>,
    is_admin: bool,
    has_phi: bool,
) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET realname = $2, email = $3, is_admin = $4, has_phi = $5 \
         WHERE id = $1 \
         RETURNING id, realname, email, is_admin, has_phi, is_active, \
                   github_name, gitlab_name, created_at",
    )
    .bind(user_id)
    .bind(realname)
    .bind(email)
    .bind(is_admin)
    .bind(has_phi)
    .fetch_optional(pool)
    .await
    .map_err(anyhow::Error::from)
}

/// Studies the user can see: all of them for dashboard admins, granted ones
/// otherwise.
pub async fn get_studies(pool: &PgPool, user: &User) -> Result<Vec<Study>> {
    let rows = if user.is_admin {
        sqlx::query_as::<_, Study>(
            "SELECT id, nickname, name, description FROM studies ORDER BY nickname",
        )
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, Study>(
            "SELECT s.id, s.nickname, s.name, s.description \
             FROM studies s \
             JOIN study_users su ON su.study_id = s.id \
             WHERE su.user_id = $1 \
             ORDER BY s.nickname",
        )
        .bind(user.id)
        .fetch_all(pool)
        .await?
    };
    Ok(rows)
}

/// Access grants for a single user.
pub async fn list_grants(pool: &PgPool, user_id: i32) -> Result<Vec<StudyUser>> {
    sqlx::query_as::<_, StudyUser>(
        "SELECT study_id, user_id, is_admin FROM study_users WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(anyhow::Error::from)
}

pub async fn has_study_access(pool: &PgPool, user: &User, study_id: i32) -> Result<bool> {
    if user.is_admin {
        return Ok(true);
    }
    let granted: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM study_users WHERE study_id = $1 AND user_id = $2",
    )
    .bind(study_id)
    .bind(user.id)
    .fetch_optional(pool)
    .await?;
    Ok(granted.is_some())
}

/// Study admins may run destructive operations within the study; dashboard
/// admins may everywhere.
pub async fn is_study_admin(pool: &PgPool, user: &User, study_id: i32) -> Result<bool> {
    if user.is_admin {
        return Ok(true);
    }
    let granted: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM study_users WHERE study_id = $1 AND user_id = $2 AND is_admin",
    )
    .bind(study_id)
    .bind(user.id)
    .fetch_optional(pool)
    .await?;
    Ok(granted.is_some())
}

/// Grant access to a study. A repeat grant is a no-op.
pub async fn grant_access(pool: &PgPool, study_id: i32, user_id: i32) -> Result<()> {
    sqlx::query(
        "INSERT INTO study_users (study_id, user_id) VALUES ($1, $2) \
         ON CONFLICT (study_id, user_id) DO NOTHING",
    )
    .bind(study_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Revoke access to a single study. Returns whether a grant was removed.
pub async fn revoke_access(pool: &PgPool, study_id: i32, user_id: i32) -> Result<bool> {
    let result = sqlx::query("DELETE FROM study_users WHERE study_id = $1 AND user_id = $2")
        .bind(study_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Revoke every study grant the user holds.
pub async fn revoke_all_access(pool: &PgPool, user_id: i32) -> Result<u64> {
    let result = sqlx::query("DELETE FROM study_users WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Disable a user account; active sessions are rejected on next request.
pub async fn set_active(pool: &PgPool, user_id: i32, is_active: bool) -> Result<()> {
    sqlx::query("UPDATE users SET is_active = $2 WHERE id = $1")
        .bind(user_id)
        .bind(is_active)
        .execute(pool)
        .await?;
    Ok(())
}
