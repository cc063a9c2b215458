//! Analysis registry handlers.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::Form;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::state::AppState;
use crate::web::auth::extractors::AuthUser;
use crate::web::flash::{clear_flash_cookie, flash_redirect, pop_flash};

/// `GET /analysis[/{analysis_id}]` — one or all analyses, with the names of
/// users who commented under each.
pub async fn view_analyses(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    analysis_id: Option<Path<i32>>,
    headers: HeaderMap,
) -> Response {
    let analyses = match analysis_id {
        Some(Path(id)) => match crate::data::analyses::get(&state.db_pool, id).await {
            Ok(Some(analysis)) => vec![analysis],
            Ok(None) => return flash_redirect("Analysis not found", "/analysis"),
            Err(e) => {
                error!(error = %e, analysis_id = id, "Failed to load analysis");
                return flash_redirect("Failed to load analysis, please try again", "/");
            }
        },
        None => match crate::data::analyses::list(&state.db_pool).await {
            Ok(analyses) => analyses,
            Err(e) => {
                error!(error = %e, "Failed to list analyses");
                return flash_redirect("Failed to load analyses, please try again", "/");
            }
        },
    };

    let mut entries = Vec::with_capacity(analyses.len());
    for analysis in analyses {
        let user_names = crate::data::analyses::user_names(&state.db_pool, analysis.id)
            .await
            .unwrap_or_default();
        entries.push(json!({
            "analysis": analysis,
            "user_names": user_names.join(" "),
        }));
    }

    let flash = pop_flash(&headers);
    let mut response = Json(json!({"analyses": entries, "flash": flash})).into_response();
    clear_flash_cookie(&mut response);
    response
}

#[derive(Debug, Deserialize)]
pub struct AnalysisForm {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub software: Option<String>,
}

/// `POST /analysis` — register a new analysis.
pub async fn create_analysis(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Form(form): Form<AnalysisForm>,
) -> Response {
    let name = form.name.trim();
    let description = form.description.trim();
    if name.is_empty() || description.is_empty() {
        return flash_redirect("An analysis needs both a name and a description", "/analysis");
    }

    match crate::data::analyses::create(&state.db_pool, name, description, form.software.as_deref())
        .await
    {
        Ok(_) => flash_redirect("Analysis added", "/analysis"),
        Err(e) => {
            error!(error = %e, "Failed to create analysis");
            flash_redirect("Failed adding analysis", "/analysis")
        }
    }
}
