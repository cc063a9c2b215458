//! Landing page handler.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::state::AppState;
use crate::web::auth::extractors::AuthUser;
use crate::web::error::db_error;
use crate::web::flash::{clear_flash_cookie, pop_flash};

/// `GET /` and `GET /index` — studies visible to the user plus dashboard
/// counts.
pub async fn index(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, crate::web::error::ApiError> {
    let studies = crate::data::users::get_studies(&state.db_pool, &user)
        .await
        .map_err(|e| db_error("List studies", e))?;
    let counts = crate::data::studies::index_counts(&state.db_pool)
        .await
        .map_err(|e| db_error("Dashboard counts", e))?;

    let flash = pop_flash(&headers);
    let mut response = Json(json!({
        "user": user,
        "studies": studies,
        "study_count": counts.studies,
        "site_count": counts.sites,
        "timepoint_count": counts.timepoints,
        "flash": flash,
    }))
    .into_response();
    clear_flash_cookie(&mut response);
    Ok(response)
}
