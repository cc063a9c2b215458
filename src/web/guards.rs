//! Study-scoped authorization guards.
//!
//! Guards are called explicitly at the top of each handler. Failures never
//! raise: they flash a message and redirect back to the referring page
//! (index when the referrer is absent or unsafe).

use axum::http::HeaderMap;
use axum::response::Response;

use crate::data::models::User;
use crate::state::AppState;
use crate::web::flash::{flash_redirect, prev_url};

/// Require any access grant for the study.
pub async fn require_study_access(
    state: &AppState,
    user: &User,
    study_id: i32,
    headers: &HeaderMap,
) -> Result<(), Response> {
    match crate::data::users::has_study_access(&state.db_pool, user, study_id).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(flash_redirect(
            "Not authorised",
            &prev_url(headers, &state.config.public_origin),
        )),
        Err(e) => {
            tracing::error!(error = %e, study_id, "Access check failed");
            Err(flash_redirect(
                "Not authorised",
                &prev_url(headers, &state.config.public_origin),
            ))
        }
    }
}

/// Require a study-admin grant (or dashboard admin) for destructive
/// operations.
pub async fn require_study_admin(
    state: &AppState,
    user: &User,
    study_id: i32,
    headers: &HeaderMap,
) -> Result<(), Response> {
    match crate::data::users::is_study_admin(&state.db_pool, user, study_id).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(flash_redirect(
            "Not authorized.",
            &prev_url(headers, &state.config.public_origin),
        )),
        Err(e) => {
            tracing::error!(error = %e, study_id, "Admin check failed");
            Err(flash_redirect(
                "Not authorized.",
                &prev_url(headers, &state.config.public_origin),
            ))
        }
    }
}
