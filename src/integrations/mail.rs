//! Staff notification relay.
//!
//! Notifications post to a configured webhook that handles actual mail
//! delivery. Unconfigured deployments just log the notification.

use anyhow::{Context, Result};
use serde_json::json;

use crate::data::models::User;
use crate::state::AppState;

/// Notify site staff that an incidental finding was reported.
pub async fn incidental_finding_notification(
    state: &AppState,
    reporter: &User,
    timepoint_id: &str,
    description: &str,
) -> Result<()> {
    let subject = format!("IMPORTANT: Incidental finding flagged for {timepoint_id}");
    let message = format!(
        "{} has reported an incidental finding for {}. Description: {}",
        reporter.realname, timepoint_id, description
    );

    let Some(webhook) = state.config.notify_webhook.as_deref() else {
        tracing::info!(timepoint_id, subject = %subject, "No notification webhook configured, logging only");
        return Ok(());
    };

    state
        .http
        .post(webhook)
        .json(&json!({
            "subject": subject,
            "message": message,
            "reporter": reporter.realname,
            "timepoint": timepoint_id,
        }))
        .send()
        .await
        .context("notification request failed")?
        .error_for_status()
        .context("notification webhook returned an error status")?;

    tracing::info!(timepoint_id, "Incidental finding notification sent");
    Ok(())
}
