//! Health check handler.

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};
use tracing::trace;

use crate::state::AppState;
use crate::web::error::{db_error, ApiError};

/// `GET /health`
pub(super) async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    trace!("health check requested");
    crate::data::health::ping(&state.db_pool)
        .await
        .map_err(|e| db_error("Health check", e))?;
    Ok(Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "commit": env!("GIT_COMMIT_HASH"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
