//! Issue tracker client for session QC issues.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;

#[derive(Deserialize)]
struct IssueResponse {
    number: i32,
}

/// Create an issue in the configured repository and return its number.
pub async fn create_issue(state: &AppState, title: &str, body: &str) -> Result<i32> {
    let Some(repo) = state.config.issue_repo.as_deref() else {
        bail!("no issue repository configured");
    };
    let Some(token) = state.config.github_client_secret.as_deref() else {
        bail!("no issue tracker credentials configured");
    };

    let response = state
        .http
        .post(format!("https://api.github.com/repos/{repo}/issues"))
        .bearer_auth(token)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .json(&json!({ "title": title, "body": body }))
        .send()
        .await
        .context("issue creation request failed")?
        .error_for_status()
        .context("issue endpoint returned an error status")?;

    let issue: IssueResponse = response
        .json()
        .await
        .context("failed to parse issue response")?;

    tracing::info!(repo = %repo, issue = issue.number, "Created tracker issue");
    Ok(issue.number)
}
