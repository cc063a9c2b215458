//! Scan queries, blacklisting, and analysis comments.

use anyhow::{bail, Context, Result};
use sqlx::PgPool;

use crate::data::models::{Scan, ScanComment};

const SCAN_COLUMNS: &str = "id, session_id, scantype_id, name, description, bl_comment";

pub async fn get(pool: &PgPool, scan_id: i32) -> Result<Option<Scan>> {
    sqlx::query_as::<_, Scan>(&format!("SELECT {SCAN_COLUMNS} FROM scans WHERE id = $1"))
        .bind(scan_id)
        .fetch_optional(pool)
        .await
        .map_err(anyhow::Error::from)
}

pub async fn list_for_session(pool: &PgPool, session_id: i32) -> Result<Vec<Scan>> {
    sqlx::query_as::<_, Scan>(&format!(
        "SELECT {SCAN_COLUMNS} FROM scans WHERE session_id = $1 ORDER BY name"
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await
    .map_err(anyhow::Error::from)
}

/// Set or clear the blacklist comment. `None` removes the scan from the
/// blacklist.
pub async fn set_blacklist(pool: &PgPool, scan_id: i32, bl_comment: Option<&str>) -> Result<()> {
    let result = sqlx::query("UPDATE scans SET bl_comment = $2 WHERE id = $1")
        .bind(scan_id)
        .bind(bl_comment)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        bail!("scan {scan_id} not found");
    }
    Ok(())
}

pub async fn add_comment(
    pool: &PgPool,
    scan_id: i32,
    user_id: i32,
    analysis_id: Option<i32>,
    excluded: bool,
    comment: &str,
) -> Result<ScanComment> {
    sqlx::query_as::<_, ScanComment>(
        "INSERT INTO scan_comments (scan_id, user_id, analysis_id, excluded, comment) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, scan_id, user_id, analysis_id, excluded, comment, created_at",
    )
    .bind(scan_id)
    .bind(user_id)
    .bind(analysis_id)
    .bind(excluded)
    .bind(comment)
    .fetch_one(pool)
    .await
    .context("failed to add scan comment")
}

pub async fn list_comments(pool: &PgPool, scan_id: i32) -> Result<Vec<ScanComment>> {
    sqlx::query_as::<_, ScanComment>(
        "SELECT id, scan_id, user_id, analysis_id, excluded, comment, created_at \
         FROM scan_comments WHERE scan_id = $1 ORDER BY created_at",
    )
    .bind(scan_id)
    .fetch_all(pool)
    .await
    .map_err(anyhow::Error::from)
}

/// Resolve the study a scan ultimately belongs to, for access checks.
pub async fn study_id_for_scan(pool: &PgPool, scan_id: i32) -> Result<Option<i32>> {
    sqlx::query_scalar(
        "SELECT t.study_id FROM scans sc \
         JOIN sessions se ON se.id = sc.session_id \
         JOIN timepoints t ON t.id = se.timepoint_id \
         WHERE sc.id = $1",
    )
    .bind(scan_id)
    .fetch_optional(pool)
    .await
    .map_err(anyhow::Error::from)
}

/// Resolve the study a session belongs to, for access checks.
pub async fn study_id_for_session(pool: &PgPool, session_id: i32) -> Result<Option<i32>> {
    sqlx::query_scalar(
        "SELECT t.study_id FROM sessions se \
         JOIN timepoints t ON t.id = se.timepoint_id \
         WHERE se.id = $1",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
    .map_err(anyhow::Error::from)
}
