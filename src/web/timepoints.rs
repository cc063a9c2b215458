//! Timepoint page and mutation handlers.
//!
//! The timepoint page is the QC workhorse: every other route here handles
//! one button press from it and redirects straight back.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::Form;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use crate::data::models::{Session, Timepoint};
use crate::state::AppState;
use crate::web::auth::extractors::AuthUser;
use crate::web::flash::{clear_flash_cookie, flash_redirect, pop_flash};
use crate::web::guards::{require_study_access, require_study_admin};

#[derive(Debug, Deserialize)]
pub struct TimepointPath {
    pub study_id: i32,
    pub timepoint_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionPath {
    pub study_id: i32,
    pub timepoint_id: String,
    pub session_num: i32,
}

#[derive(Debug, Deserialize)]
pub struct CommentPath {
    pub study_id: i32,
    pub timepoint_id: String,
    pub comment_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    pub comment: String,
}

impl CommentForm {
    fn validate(&self) -> Result<&str, &'static str> {
        let trimmed = self.comment.trim();
        if trimmed.is_empty() {
            Err("Comment may not be blank")
        } else {
            Ok(trimmed)
        }
    }
}

fn timepoint_url(study_id: i32, timepoint_id: &str) -> String {
    format!("/study/{study_id}/timepoint/{timepoint_id}")
}

/// Fetch the timepoint by composite (study, id) key, re-checking study
/// access. Missing rows flash and redirect to the index.
async fn get_timepoint(
    state: &AppState,
    user: &crate::data::models::User,
    study_id: i32,
    timepoint_id: &str,
    headers: &HeaderMap,
) -> Result<Timepoint, Response> {
    require_study_access(state, user, study_id, headers).await?;
    match crate::data::timepoints::get(&state.db_pool, study_id, timepoint_id).await {
        Ok(Some(timepoint)) => Ok(timepoint),
        Ok(None) => Err(flash_redirect("Timepoint not found", "/")),
        Err(e) => {
            error!(error = %e, timepoint_id, "Failed to load timepoint");
            Err(flash_redirect("Failed to load timepoint, please try again", "/"))
        }
    }
}

/// Fetch a session by number within the timepoint; missing sessions flash
/// and redirect back to the timepoint page.
async fn get_session(
    state: &AppState,
    timepoint: &Timepoint,
    session_num: i32,
    dest: &str,
) -> Result<Session, Response> {
    match crate::data::sessions::get_by_num(&state.db_pool, &timepoint.id, session_num).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(flash_redirect("Session not found", dest)),
        Err(e) => {
            error!(error = %e, timepoint_id = %timepoint.id, session_num, "Failed to load session");
            Err(flash_redirect("Failed to load session, please try again", dest))
        }
    }
}

/// `GET /study/{study_id}/timepoint/{timepoint_id}` — timepoint page model.
pub async fn view_timepoint(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(path): Path<TimepointPath>,
    headers: HeaderMap,
) -> Response {
    let timepoint = match get_timepoint(&state, &user, path.study_id, &path.timepoint_id, &headers).await {
        Ok(timepoint) => timepoint,
        Err(response) => return response,
    };

    let sessions = crate::data::sessions::list_for_timepoint(&state.db_pool, &timepoint.id)
        .await
        .unwrap_or_default();
    let comments = crate::data::timepoints::list_comments(&state.db_pool, &timepoint.id)
        .await
        .unwrap_or_default();
    let findings = crate::data::timepoints::list_incidental_findings(&state.db_pool, &timepoint.id)
        .await
        .unwrap_or_default();

    let flash = pop_flash(&headers);
    let mut response = Json(json!({
        "timepoint": timepoint,
        "sessions": sessions,
        "comments": comments,
        "incidental_findings": findings,
        "flash": flash,
    }))
    .into_response();
    clear_flash_cookie(&mut response);
    response
}

/// `GET|POST .../sign_off/{session_num}`
pub async fn sign_off(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
    headers: HeaderMap,
) -> Response {
    let timepoint = match get_timepoint(&state, &user, path.study_id, &path.timepoint_id, &headers).await {
        Ok(timepoint) => timepoint,
        Err(response) => return response,
    };
    let dest = timepoint_url(path.study_id, &path.timepoint_id);
    let session = match get_session(&state, &timepoint, path.session_num, &dest).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    if let Err(e) = crate::data::sessions::sign_off(&state.db_pool, session.id, user.id).await {
        error!(error = %e, session_id = session.id, "Sign off failed");
        return flash_redirect("Sign off failed, please try again", &dest);
    }
    flash_redirect(&format!("{} review completed.", session.name), &dest)
}

/// `POST .../add_comment[/{comment_id}]` — create or update a comment.
pub async fn add_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(path): Path<TimepointPath>,
    headers: HeaderMap,
    Form(form): Form<CommentForm>,
) -> Response {
    upsert_comment(user, state, path, None, headers, form).await
}

/// `POST|GET .../add_comment/{comment_id}`
pub async fn update_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(path): Path<CommentPath>,
    headers: HeaderMap,
    Form(form): Form<CommentForm>,
) -> Response {
    let comment_id = path.comment_id;
    let path = TimepointPath {
        study_id: path.study_id,
        timepoint_id: path.timepoint_id,
    };
    upsert_comment(user, state, path, Some(comment_id), headers, form).await
}

async fn upsert_comment(
    user: crate::data::models::User,
    state: AppState,
    path: TimepointPath,
    comment_id: Option<i32>,
    headers: HeaderMap,
    form: CommentForm,
) -> Response {
    let timepoint = match get_timepoint(&state, &user, path.study_id, &path.timepoint_id, &headers).await {
        Ok(timepoint) => timepoint,
        Err(response) => return response,
    };
    let dest = timepoint_url(path.study_id, &path.timepoint_id);

    let comment = match form.validate() {
        Ok(comment) => comment,
        Err(message) => return flash_redirect(message, &dest),
    };

    match comment_id {
        Some(comment_id) => {
            match crate::data::timepoints::update_comment(
                &state.db_pool,
                &timepoint.id,
                comment_id,
                user.id,
                comment,
            )
            .await
            {
                Ok(()) => flash_redirect("Updated comment.", &dest),
                Err(e) => flash_redirect(&format!("Failed to update comment. Reason: {e}"), &dest),
            }
        }
        None => {
            match crate::data::timepoints::add_comment(&state.db_pool, &timepoint.id, user.id, comment)
                .await
            {
                Ok(_) => crate::web::flash::redirect(&dest),
                Err(e) => {
                    error!(error = %e, timepoint_id = %timepoint.id, "Failed to add comment");
                    flash_redirect("Failed to add comment, please try again", &dest)
                }
            }
        }
    }
}

/// `GET .../delete_comment/{comment_id}` — study admins only.
pub async fn delete_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(path): Path<CommentPath>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_study_admin(&state, &user, path.study_id, &headers).await {
        return response;
    }
    let timepoint = match get_timepoint(&state, &user, path.study_id, &path.timepoint_id, &headers).await {
        Ok(timepoint) => timepoint,
        Err(response) => return response,
    };
    let dest = timepoint_url(path.study_id, &path.timepoint_id);

    match crate::data::timepoints::delete_comment(&state.db_pool, &timepoint.id, path.comment_id).await
    {
        Ok(()) => crate::web::flash::redirect(&dest),
        Err(e) => flash_redirect(&format!("Failed to delete comment. {e}"), &dest),
    }
}

/// `POST .../flag_finding` — record an incidental finding and notify staff.
pub async fn flag_finding(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(path): Path<TimepointPath>,
    headers: HeaderMap,
    Form(form): Form<CommentForm>,
) -> Response {
    let timepoint = match get_timepoint(&state, &user, path.study_id, &path.timepoint_id, &headers).await {
        Ok(timepoint) => timepoint,
        Err(response) => return response,
    };
    let dest = timepoint_url(path.study_id, &path.timepoint_id);

    let description = match form.validate() {
        Ok(description) => description,
        Err(message) => return flash_redirect(message, &dest),
    };

    if let Err(e) = crate::data::timepoints::report_incidental_finding(
        &state.db_pool,
        &timepoint.id,
        user.id,
        description,
    )
    .await
    {
        error!(error = %e, timepoint_id = %timepoint.id, "Failed to record incidental finding");
        return flash_redirect("Failed to submit report, please try again", &dest);
    }

    // Best effort: the finding is recorded even when notification fails.
    if let Err(e) = crate::integrations::mail::incidental_finding_notification(
        &state,
        &user,
        &timepoint.id,
        description,
    )
    .await
    {
        warn!(error = %e, timepoint_id = %timepoint.id, "Incidental finding notification failed");
    }

    flash_redirect("Report submitted.", &dest)
}

/// `GET .../delete` — study admins only. Removes the timepoint and all of
/// its sessions, scans, and annotations.
pub async fn delete_timepoint(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(path): Path<TimepointPath>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_study_admin(&state, &user, path.study_id, &headers).await {
        return response;
    }
    let timepoint = match get_timepoint(&state, &user, path.study_id, &path.timepoint_id, &headers).await {
        Ok(timepoint) => timepoint,
        Err(response) => return response,
    };

    let dest = format!("/study/{}", path.study_id);
    if let Err(e) = crate::data::timepoints::delete(&state.db_pool, &timepoint.id).await {
        error!(error = %e, timepoint_id = %timepoint.id, "Failed to delete timepoint");
        return flash_redirect("Failed to delete timepoint, please try again", &dest);
    }
    flash_redirect(&format!("{} has been deleted.", timepoint.id), &dest)
}

/// `GET .../delete_session/{session_num}` — study admins only.
pub async fn delete_session(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_study_admin(&state, &user, path.study_id, &headers).await {
        return response;
    }
    let timepoint = match get_timepoint(&state, &user, path.study_id, &path.timepoint_id, &headers).await {
        Ok(timepoint) => timepoint,
        Err(response) => return response,
    };
    let dest = timepoint_url(path.study_id, &path.timepoint_id);
    let session = match get_session(&state, &timepoint, path.session_num, &dest).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    if let Err(e) = crate::data::sessions::delete(&state.db_pool, session.id).await {
        error!(error = %e, session_id = session.id, "Failed to delete session");
        return flash_redirect("Failed to delete session, please try again", &dest);
    }
    flash_redirect(&format!("{} has been deleted.", session.name), &dest)
}

/// `GET|POST .../dismiss_redcap/{session_num}` — clear the missing survey
/// record error. Study admins only.
pub async fn dismiss_redcap(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_study_admin(&state, &user, path.study_id, &headers).await {
        return response;
    }
    let timepoint = match get_timepoint(&state, &user, path.study_id, &path.timepoint_id, &headers).await {
        Ok(timepoint) => timepoint,
        Err(response) => return response,
    };
    let dest = timepoint_url(path.study_id, &path.timepoint_id);
    if let Err(response) = get_session(&state, &timepoint, path.session_num, &dest).await {
        return response;
    }

    if let Err(e) =
        crate::data::timepoints::dismiss_redcap_error(&state.db_pool, &timepoint.id, path.session_num)
            .await
    {
        error!(error = %e, timepoint_id = %timepoint.id, "Failed to dismiss survey error");
        return flash_redirect("Update failed, please try again", &dest);
    }
    flash_redirect("Successfully updated.", &dest)
}

/// `POST .../dismiss_missing/{session_num}` — record that the missing scans
/// error was reviewed. Study admins only.
pub async fn dismiss_missing(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
    headers: HeaderMap,
    Form(form): Form<CommentForm>,
) -> Response {
    if let Err(response) = require_study_admin(&state, &user, path.study_id, &headers).await {
        return response;
    }
    let timepoint = match get_timepoint(&state, &user, path.study_id, &path.timepoint_id, &headers).await {
        Ok(timepoint) => timepoint,
        Err(response) => return response,
    };
    let dest = timepoint_url(path.study_id, &path.timepoint_id);
    if let Err(response) = get_session(&state, &timepoint, path.session_num, &dest).await {
        return response;
    }

    let comment = match form.validate() {
        Ok(comment) => comment,
        Err(message) => return flash_redirect(message, &dest),
    };

    if let Err(e) = crate::data::timepoints::ignore_missing_scans(
        &state.db_pool,
        &timepoint.id,
        path.session_num,
        user.id,
        comment,
    )
    .await
    {
        error!(error = %e, timepoint_id = %timepoint.id, "Failed to dismiss missing scans error");
        return flash_redirect("Update failed, please try again", &dest);
    }
    flash_redirect("Successfully updated.", &dest)
}
