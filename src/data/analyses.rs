//! Analysis registry queries.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::data::models::Analysis;

pub async fn list(pool: &PgPool) -> Result<Vec<Analysis>> {
    sqlx::query_as::<_, Analysis>(
        "SELECT id, name, description, software FROM analyses ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .map_err(anyhow::Error::from)
}

pub async fn get(pool: &PgPool, analysis_id: i32) -> Result<Option<Analysis>> {
    sqlx::query_as::<_, Analysis>(
        "SELECT id, name, description, software FROM analyses WHERE id = $1",
    )
    .bind(analysis_id)
    .fetch_optional(pool)
    .await
    .map_err(anyhow::Error::from)
}

pub async fn create(
    pool: &PgPool,
    name: &str,
    description: &str,
    software: Option<&str>,
) -> Result<Analysis> {
    sqlx::query_as::<_, Analysis>(
        "INSERT INTO analyses (name, description, software) VALUES ($1, $2, $3) \
         RETURNING id, name, description, software",
    )
    .bind(name)
    .bind(description)
    .bind(software)
    .fetch_one(pool)
    .await
    .context("failed to create analysis")
}

/// Real names of users who commented under an analysis, for display.
pub async fn user_names(pool: &PgPool, analysis_id: i32) -> Result<Vec<String>> {
    sqlx::query_scalar(
        "SELECT DISTINCT u.realname FROM users u \
         JOIN scan_comments sc ON sc.user_id = u.id \
         WHERE sc.analysis_id = $1 ORDER BY u.realname",
    )
    .bind(analysis_id)
    .fetch_all(pool)
    .await
    .map_err(anyhow::Error::from)
}
