//! Timepoint queries and mutations.
//!
//! A timepoint is a subject visit grouping one or more imaging sessions.
//! Fetches are by composite (study, id) key so a timepoint can never be
//! addressed through a study the caller was not authorized against.

use anyhow::{bail, Context, Result};
use sqlx::PgPool;

use crate::data::models::{IncidentalFinding, Timepoint, TimepointComment};

/// Fetch a timepoint, enforcing that it belongs to the given study.
pub async fn get(pool: &PgPool, study_id: i32, timepoint_id: &str) -> Result<Option<Timepoint>> {
    sqlx::query_as::<_, Timepoint>(
        "SELECT id, study_id, site_id FROM timepoints WHERE study_id = $1 AND id = $2",
    )
    .bind(study_id)
    .bind(timepoint_id)
    .fetch_optional(pool)
    .await
    .map_err(anyhow::Error::from)
}

/// Delete a timepoint and all dependent rows (sessions, scans, comments,
/// findings cascade at the schema level).
pub async fn delete(pool: &PgPool, timepoint_id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM timepoints WHERE id = $1")
        .bind(timepoint_id)
        .execute(pool)
        .await
        .context("failed to delete timepoint")?;
    if result.rows_affected() == 0 {
        bail!("timepoint {timepoint_id} not found");
    }
    Ok(())
}

pub async fn list_comments(pool: &PgPool, timepoint_id: &str) -> Result<Vec<TimepointComment>> {
    sqlx::query_as::<_, TimepointComment>(
        "SELECT id, timepoint_id, user_id, comment, created_at, updated_at \
         FROM timepoint_comments WHERE timepoint_id = $1 ORDER BY created_at",
    )
    .bind(timepoint_id)
    .fetch_all(pool)
    .await
    .map_err(anyhow::Error::from)
}

pub async fn add_comment(
    pool: &PgPool,
    timepoint_id: &str,
    user_id: i32,
    comment: &str,
) -> Result<TimepointComment> {
    sqlx::query_as::<_, TimepointComment>(
        "INSERT INTO timepoint_comments (timepoint_id, user_id, comment) \
         VALUES ($1, $2, $3) \
         RETURNING id, timepoint_id, user_id, comment, created_at, updated_at",
    )
    .bind(timepoint_id)
    .bind(user_id)
    .bind(comment)
    .fetch_one(pool)
    .await
    .context("failed to add comment")
}

/// Update a comment. Only the comment's author may edit it, and the comment
/// must belong to the given timepoint.
pub async fn update_comment(
    pool: &PgPool,
    timepoint_id: &str,
    comment_id: i32,
    user_id: i32,
    comment: &str,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE timepoint_comments SET comment = $4, updated_at = now() \
         WHERE id = $1 AND timepoint_id = $2 AND user_id = $3",
    )
    .bind(comment_id)
    .bind(timepoint_id)
    .bind(user_id)
    .bind(comment)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        bail!("comment {comment_id} not found or not editable");
    }
    Ok(())
}

pub async fn delete_comment(pool: &PgPool, timepoint_id: &str, comment_id: i32) -> Result<()> {
    let result =
        sqlx::query("DELETE FROM timepoint_comments WHERE id = $1 AND timepoint_id = $2")
            .bind(comment_id)
            .bind(timepoint_id)
            .execute(pool)
            .await?;
    if result.rows_affected() == 0 {
        bail!("comment {comment_id} not found");
    }
    Ok(())
}

pub async fn report_incidental_finding(
    pool: &PgPool,
    timepoint_id: &str,
    user_id: i32,
    description: &str,
) -> Result<IncidentalFinding> {
    sqlx::query_as::<_, IncidentalFinding>(
        "INSERT INTO incidental_findings (timepoint_id, user_id, description) \
         VALUES ($1, $2, $3) \
         RETURNING id, timepoint_id, user_id, description, created_at",
    )
    .bind(timepoint_id)
    .bind(user_id)
    .bind(description)
    .fetch_one(pool)
    .await
    .context("failed to record incidental finding")
}

pub async fn list_incidental_findings(
    pool: &PgPool,
    timepoint_id: &str,
) -> Result<Vec<IncidentalFinding>> {
    sqlx::query_as::<_, IncidentalFinding>(
        "SELECT id, timepoint_id, user_id, description, created_at \
         FROM incidental_findings WHERE timepoint_id = $1 ORDER BY created_at",
    )
    .bind(timepoint_id)
    .fetch_all(pool)
    .await
    .map_err(anyhow::Error::from)
}

/// Clear a session's "missing survey record" error flag.
pub async fn dismiss_redcap_error(pool: &PgPool, timepoint_id: &str, session_num: i32) -> Result<()> {
    let result = sqlx::query(
        "UPDATE sessions SET redcap_dismissed = TRUE \
         WHERE timepoint_id = $1 AND num = $2",
    )
    .bind(timepoint_id)
    .bind(session_num)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        bail!("session {session_num} not found for timepoint {timepoint_id}");
    }
    Ok(())
}

/// Record that a session's "missing scans" error was reviewed and dismissed.
pub async fn ignore_missing_scans(
    pool: &PgPool,
    timepoint_id: &str,
    session_num: i32,
    user_id: i32,
    comment: &str,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE sessions SET missing_scans_ignored_by = $3, \
                missing_scans_comment = $4, missing_scans_ignored_at = now() \
         WHERE timepoint_id = $1 AND num = $2",
    )
    .bind(timepoint_id)
    .bind(session_num)
    .bind(user_id)
    .bind(comment)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        bail!("session {session_num} not found for timepoint {timepoint_id}");
    }
    Ok(())
}
