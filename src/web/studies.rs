//! Study page and README editing handlers.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::Form;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::data::models::Study;
use crate::state::AppState;
use crate::web::auth::extractors::AuthUser;
use crate::web::flash::{clear_flash_cookie, flash_redirect, pop_flash};
use crate::web::guards::require_study_access;

/// `GET /study/{study_id}[/{tab}]` — study page model.
pub async fn view_study(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(params): Path<StudyPathParams>,
    headers: HeaderMap,
) -> Response {
    let study = match fetch_study(&state, params.study_id).await {
        Ok(study) => study,
        Err(response) => return response,
    };
    if let Err(response) = require_study_access(&state, &user, study.id, &headers).await {
        return response;
    }

    let readme = std::fs::read_to_string(readme_path(&state, &study)).unwrap_or_default();

    let sites = crate::data::studies::sites(&state.db_pool, study.id)
        .await
        .unwrap_or_default();
    let metric_names = state
        .metric_name_cache
        .read()
        .await
        .names_for_study(&study.nickname);

    let flash = pop_flash(&headers);
    let mut response = Json(json!({
        "study": study,
        "sites": sites,
        "metric_names": metric_names,
        "readme": readme,
        "active_tab": params.tab,
        "flash": flash,
    }))
    .into_response();
    clear_flash_cookie(&mut response);
    response
}

#[derive(Debug, Deserialize)]
pub struct StudyPathParams {
    pub study_id: i32,
    pub tab: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StudyOverviewForm {
    pub readme_txt: String,
}

/// `POST /study/{study_id}[/{tab}]` — update the study README.
///
/// A changed README is backed up beside itself with a timestamp suffix
/// before being overwritten. Single-writer assumption; concurrent edits
/// last-write-win.
pub async fn update_study(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(params): Path<StudyPathParams>,
    headers: HeaderMap,
    Form(form): Form<StudyOverviewForm>,
) -> Response {
    let study = match fetch_study(&state, params.study_id).await {
        Ok(study) => study,
        Err(response) => return response,
    };
    if let Err(response) = require_study_access(&state, &user, study.id, &headers).await {
        return response;
    }

    let dest = format!("/study/{}", study.id);
    let path = readme_path(&state, &study);

    // Browsers submit textareas with \r\n line endings.
    let submitted = form.readme_txt.replace('\r', "");
    let current = std::fs::read_to_string(&path).unwrap_or_default();

    // Leading/trailing blank lines are stripped on submission, so compare
    // trimmed before treating this as a change.
    if submitted.trim() == current.trim() {
        return crate::web::flash::redirect(&dest);
    }

    if path.exists() {
        let timestamp = chrono::Utc::now().format("%Y%m%d%H%M");
        let backup = path.with_file_name(format!("README_{timestamp}.md"));
        if let Err(e) = std::fs::copy(&path, &backup) {
            error!(error = %e, study = %study.nickname, "Failed to back up README");
            return flash_redirect("Failed to update README, please try again", &dest);
        }
    }

    if let Err(e) = std::fs::write(&path, &submitted) {
        error!(error = %e, study = %study.nickname, "Failed to write README");
        return flash_redirect("Failed to update README, please try again", &dest);
    }

    flash_redirect("Updated README", &dest)
}

async fn fetch_study(state: &AppState, study_id: i32) -> Result<Study, Response> {
    match crate::data::studies::get(&state.db_pool, study_id).await {
        Ok(Some(study)) => Ok(study),
        Ok(None) => Err(flash_redirect("Study not found", "/")),
        Err(e) => {
            error!(error = %e, study_id, "Failed to load study");
            Err(flash_redirect("Failed to load study, please try again", "/"))
        }
    }
}

fn readme_path(state: &AppState, study: &Study) -> std::path::PathBuf {
    state
        .config
        .archive_root
        .join(&study.nickname)
        .join("README.md")
}
