//! Imaging session queries and mutations.

use anyhow::{bail, Context, Result};
use sqlx::PgPool;

use crate::data::models::Session;

const SESSION_COLUMNS: &str = "id, timepoint_id, num, name, signed_off_by, signed_off_at, gh_issue, \
     redcap_record, redcap_url, redcap_version, redcap_projectid, redcap_eventid, \
     redcap_instrument, redcap_comment, redcap_dismissed, \
     missing_scans_ignored_by, missing_scans_comment, missing_scans_ignored_at";

pub async fn get(pool: &PgPool, session_id: i32) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
    ))
    .bind(session_id)
    .fetch_optional(pool)
    .await
    .map_err(anyhow::Error::from)
}

pub async fn get_by_num(
    pool: &PgPool,
    timepoint_id: &str,
    session_num: i32,
) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE timepoint_id = $1 AND num = $2"
    ))
    .bind(timepoint_id)
    .bind(session_num)
    .fetch_optional(pool)
    .await
    .map_err(anyhow::Error::from)
}

pub async fn get_by_name(pool: &PgPool, name: &str) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE name = $1"
    ))
    .bind(name)
    .fetch_optional(pool)
    .await
    .map_err(anyhow::Error::from)
}

pub async fn list_for_timepoint(pool: &PgPool, timepoint_id: &str) -> Result<Vec<Session>> {
    sqlx::query_as::<_, Session>(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE timepoint_id = $1 ORDER BY num"
    ))
    .bind(timepoint_id)
    .fetch_all(pool)
    .await
    .map_err(anyhow::Error::from)
}

/// Mark the session's QC review complete. Signing off twice overwrites the
/// reviewer, matching a repeated button press.
pub async fn sign_off(pool: &PgPool, session_id: i32, user_id: i32) -> Result<()> {
    sqlx::query("UPDATE sessions SET signed_off_by = $2, signed_off_at = now() WHERE id = $1")
        .bind(session_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("failed to sign off session")?;
    Ok(())
}

pub async fn delete(pool: &PgPool, session_id: i32) -> Result<()> {
    let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        bail!("session {session_id} not found");
    }
    Ok(())
}

/// Store the tracker issue number created for this session.
pub async fn set_issue_number(pool: &PgPool, session_id: i32, issue_number: i32) -> Result<()> {
    sqlx::query("UPDATE sessions SET gh_issue = $2 WHERE id = $1")
        .bind(session_id)
        .bind(issue_number)
        .execute(pool)
        .await?;
    Ok(())
}

/// Survey record fields delivered by the data entry trigger callback.
#[derive(Debug, Clone)]
pub struct RedcapAttachment<'a> {
    pub record: &'a str,
    pub url: &'a str,
    pub version: &'a str,
    pub project_id: &'a str,
    pub instrument: &'a str,
    pub event_id: Option<&'a str>,
    pub comment: Option<&'a str>,
}

/// Attach a completed survey record to the session named `session_name`.
pub async fn attach_redcap_record(
    pool: &PgPool,
    session_name: &str,
    attachment: &RedcapAttachment<'_>,
) -> Result<Session> {
    sqlx::query_as::<_, Session>(&format!(
        "UPDATE sessions SET redcap_record = $2, redcap_url = $3, redcap_version = $4, \
                redcap_projectid = $5, redcap_instrument = $6, redcap_eventid = $7, \
                redcap_comment = $8, redcap_dismissed = FALSE \
         WHERE name = $1 \
         RETURNING {SESSION_COLUMNS}"
    ))
    .bind(session_name)
    .bind(attachment.record)
    .bind(attachment.url)
    .bind(attachment.version)
    .bind(attachment.project_id)
    .bind(attachment.instrument)
    .bind(attachment.event_id)
    .bind(attachment.comment)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no session named {session_name}"))
}
