//! Session page, name lookup, issue creation, and survey redirect handlers.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::Form;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use crate::data::models::Session;
use crate::state::AppState;
use crate::web::auth::extractors::AuthUser;
use crate::web::flash::{clear_flash_cookie, flash_redirect, pop_flash, redirect};
use crate::web::guards::require_study_access;

/// Fetch a session and check access through its owning study.
async fn get_accessible_session(
    state: &AppState,
    user: &crate::data::models::User,
    session_id: i32,
    headers: &HeaderMap,
) -> Result<Session, Response> {
    let session = match crate::data::sessions::get(&state.db_pool, session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return Err(flash_redirect("Session not found", "/")),
        Err(e) => {
            error!(error = %e, session_id, "Failed to load session");
            return Err(flash_redirect("Failed to load session, please try again", "/"));
        }
    };

    let study_id = match crate::data::scans::study_id_for_session(&state.db_pool, session_id).await
    {
        Ok(Some(study_id)) => study_id,
        Ok(None) => return Err(flash_redirect("Session not found", "/")),
        Err(e) => {
            error!(error = %e, session_id, "Failed to resolve session study");
            return Err(flash_redirect("Failed to load session, please try again", "/"));
        }
    };

    require_study_access(state, user, study_id, headers).await?;
    Ok(session)
}

/// `GET /session/{session_id}` — session page model.
pub async fn view_session(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<i32>,
    headers: HeaderMap,
) -> Response {
    let session = match get_accessible_session(&state, &user, session_id, &headers).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    let scans = crate::data::scans::list_for_session(&state.db_pool, session.id)
        .await
        .unwrap_or_default();

    let flash = pop_flash(&headers);
    let mut response = Json(json!({
        "session": session,
        "scans": scans,
        "flash": flash,
    }))
    .into_response();
    clear_flash_cookie(&mut response);
    response
}

/// `GET /session_by_name/{name}` — resolve a session name to its page.
///
/// Accepts names as they appear in QC filenames: an optional `qc_` prefix
/// and file extension are stripped before lookup.
pub async fn session_by_name(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let name = name.trim_start_matches("qc_");
    let name = name.rsplit_once('.').map_or(name, |(stem, _)| stem);

    let session = match crate::data::sessions::get_by_name(&state.db_pool, name).await {
        Ok(Some(session)) => session,
        Ok(None) => return flash_redirect("Session not found", "/"),
        Err(e) => {
            error!(error = %e, name, "Session lookup failed");
            return flash_redirect("Session lookup failed, please try again", "/");
        }
    };

    let study_id = match crate::data::scans::study_id_for_session(&state.db_pool, session.id).await
    {
        Ok(Some(study_id)) => study_id,
        _ => return flash_redirect("Session not found", "/"),
    };
    if let Err(response) = require_study_access(&state, &user, study_id, &headers).await {
        return response;
    }

    redirect(&format!("/session/{}", session.id))
}

#[derive(Debug, Deserialize)]
pub struct IssueForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// `POST /create_issue/{session_id}` — open a tracker issue for the session
/// and remember its number.
pub async fn create_issue(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<i32>,
    headers: HeaderMap,
    Form(form): Form<IssueForm>,
) -> Response {
    let session = match get_accessible_session(&state, &user, session_id, &headers).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    let dest = format!("/session/{}", session.id);

    let title = form.title.trim();
    let body = form.body.trim();
    if title.is_empty() || body.is_empty() {
        return flash_redirect("Please enter both an issue title and description.", &dest);
    }

    match crate::integrations::github::create_issue(&state, title, body).await {
        Ok(issue_number) => {
            if let Err(e) =
                crate::data::sessions::set_issue_number(&state.db_pool, session.id, issue_number)
                    .await
            {
                warn!(error = %e, session_id = session.id, issue_number, "Failed to store issue number");
            }
            flash_redirect(&format!("Issue '{title}' created!"), &dest)
        }
        Err(e) => {
            warn!(error = %e, session_id = session.id, "Issue creation failed");
            flash_redirect(
                &format!("Issue '{title}' was not created successfully."),
                &dest,
            )
        }
    }
}

/// `GET /redcap_redirect/{session_id}` — jump to the survey data entry page
/// for the session's attached record.
pub async fn redcap_redirect(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<i32>,
    headers: HeaderMap,
) -> Response {
    let session = match get_accessible_session(&state, &user, session_id, &headers).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    let (Some(url), Some(version), Some(project), Some(record), Some(instrument)) = (
        session.redcap_url.as_deref(),
        session.redcap_version.as_deref(),
        session.redcap_projectid.as_deref(),
        session.redcap_record.as_deref(),
        session.redcap_instrument.as_deref(),
    ) else {
        return flash_redirect(
            "No survey record is attached to this session.",
            &format!("/session/{}", session.id),
        );
    };

    let redcap_url = match session.redcap_eventid.as_deref() {
        Some(event_id) => format!(
            "{url}redcap_v{version}/DataEntry/index.php?pid={project}&id={record}&event_id={event_id}&page={instrument}"
        ),
        None => format!(
            "{url}redcap_v{version}/DataEntry/index.php?pid={project}&id={record}&page={instrument}"
        ),
    };
    redirect(&redcap_url)
}
