//! Scan page, blacklist, and comment handlers.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::Form;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::data::models::Scan;
use crate::state::AppState;
use crate::web::auth::extractors::AuthUser;
use crate::web::flash::{clear_flash_cookie, flash_redirect, pop_flash};
use crate::web::guards::require_study_access;

/// Fetch a scan and check access through its owning study.
async fn get_accessible_scan(
    state: &AppState,
    user: &crate::data::models::User,
    scan_id: i32,
    headers: &HeaderMap,
) -> Result<Scan, Response> {
    let scan = match crate::data::scans::get(&state.db_pool, scan_id).await {
        Ok(Some(scan)) => scan,
        Ok(None) => return Err(flash_redirect("Invalid scan", "/")),
        Err(e) => {
            error!(error = %e, scan_id, "Failed to load scan");
            return Err(flash_redirect("Failed to load scan, please try again", "/"));
        }
    };

    let study_id = match crate::data::scans::study_id_for_scan(&state.db_pool, scan_id).await {
        Ok(Some(study_id)) => study_id,
        Ok(None) => return Err(flash_redirect("Invalid scan", "/")),
        Err(e) => {
            error!(error = %e, scan_id, "Failed to resolve scan study");
            return Err(flash_redirect("Failed to load scan, please try again", "/"));
        }
    };

    require_study_access(state, user, study_id, headers).await?;
    Ok(scan)
}

/// `GET /scan` — a scan id is required; bounce to the index without one.
pub async fn scan_index(AuthUser(_user): AuthUser) -> Response {
    flash_redirect("Invalid scan", "/")
}

/// `GET /scan/{scan_id}` — scan page model with blacklist state and
/// comments.
pub async fn view_scan(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(scan_id): Path<i32>,
    headers: HeaderMap,
) -> Response {
    let scan = match get_accessible_scan(&state, &user, scan_id, &headers).await {
        Ok(scan) => scan,
        Err(response) => return response,
    };

    let comments = crate::data::scans::list_comments(&state.db_pool, scan.id)
        .await
        .unwrap_or_default();
    let analyses = crate::data::analyses::list(&state.db_pool)
        .await
        .unwrap_or_default();

    let flash = pop_flash(&headers);
    let mut response = Json(json!({
        "scan": scan,
        "comments": comments,
        "analyses": analyses,
        "blacklisted": scan.bl_comment.is_some(),
        "flash": flash,
    }))
    .into_response();
    clear_flash_cookie(&mut response);
    response
}

#[derive(Debug, Deserialize)]
pub struct BlacklistForm {
    #[serde(default)]
    pub bl_comment: String,
    /// Set to remove the scan from the blacklist instead of updating it.
    #[serde(default)]
    pub delete: bool,
}

/// `POST /scan/{scan_id}` — update the scan's blacklist entry.
pub async fn update_scan(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(scan_id): Path<i32>,
    headers: HeaderMap,
    Form(form): Form<BlacklistForm>,
) -> Response {
    let scan = match get_accessible_scan(&state, &user, scan_id, &headers).await {
        Ok(scan) => scan,
        Err(response) => return response,
    };
    let dest = format!("/session/{}", scan.session_id);

    let bl_comment = if form.delete {
        None
    } else {
        let trimmed = form.bl_comment.trim();
        if trimmed.is_empty() {
            return flash_redirect("A blacklist comment is required", &dest);
        }
        Some(trimmed)
    };

    match crate::data::scans::set_blacklist(&state.db_pool, scan.id, bl_comment).await {
        Ok(()) => flash_redirect("Blacklist updated", &dest),
        Err(e) => {
            error!(error = %e, scan_id = scan.id, "Scan blacklist update failed");
            flash_redirect("Update failed, admins have been notified, please try again", &dest)
        }
    }
}

/// `POST /scan_blacklist/{scan_id}` — blacklist a scan.
pub async fn scan_blacklist(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(scan_id): Path<i32>,
    headers: HeaderMap,
    Form(form): Form<BlacklistForm>,
) -> Response {
    let scan = match get_accessible_scan(&state, &user, scan_id, &headers).await {
        Ok(scan) => scan,
        Err(response) => return response,
    };
    let dest = format!("/session/{}", scan.session_id);

    let trimmed = form.bl_comment.trim();
    if trimmed.is_empty() {
        return flash_redirect("A blacklist comment is required", &dest);
    }

    match crate::data::scans::set_blacklist(&state.db_pool, scan.id, Some(trimmed)).await {
        Ok(()) => flash_redirect("Scan blacklisted", &dest),
        Err(e) => {
            error!(error = %e, scan_id = scan.id, "Scan blacklist failed");
            flash_redirect("Failed blacklisting scan", &dest)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScanCommentForm {
    pub comment: String,
    #[serde(default)]
    pub analysis_id: Option<i32>,
    #[serde(default)]
    pub excluded: bool,
}

/// `POST /scan_comment/{scan_id}` — attach an analysis comment to the scan.
pub async fn scan_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(scan_id): Path<i32>,
    headers: HeaderMap,
    Form(form): Form<ScanCommentForm>,
) -> Response {
    let scan = match get_accessible_scan(&state, &user, scan_id, &headers).await {
        Ok(scan) => scan,
        Err(response) => return response,
    };
    let dest = format!("/session/{}", scan.session_id);

    let comment = form.comment.trim();
    if comment.is_empty() {
        return flash_redirect("Comment may not be blank", &dest);
    }

    match crate::data::scans::add_comment(
        &state.db_pool,
        scan.id,
        user.id,
        form.analysis_id,
        form.excluded,
        comment,
    )
    .await
    {
        Ok(_) => flash_redirect("Scan comment added", &dest),
        Err(e) => {
            error!(error = %e, scan_id = scan.id, "Failed to add scan comment");
            flash_redirect("Failed adding comment", &dest)
        }
    }
}
