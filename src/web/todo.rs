//! QC todo list handler.
//!
//! Shells out to the external QC-todo binary and relays its JSON output.
//! Failures are reported inside the payload (`{"error": ...}`) rather than
//! as HTTP errors, matching what the page script expects.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{Json, Response};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;

use crate::state::AppState;
use crate::web::auth::extractors::AuthUser;
use crate::web::guards::require_study_access;

/// `GET /todo[/{study_id}]`
pub async fn todo(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    study_id: Option<Path<i32>>,
    headers: HeaderMap,
) -> Result<Json<Value>, Response> {
    let study_nickname = match study_id {
        Some(Path(study_id)) => {
            require_study_access(&state, &user, study_id, &headers).await?;
            match crate::data::studies::get(&state.db_pool, study_id).await {
                Ok(Some(study)) => Some(study.nickname),
                Ok(None) => {
                    return Err(crate::web::flash::flash_redirect("Study not found", "/"))
                }
                Err(e) => {
                    warn!(error = %e, study_id, "Failed to load study for todo list");
                    return Ok(Json(json!({"error": "other"})));
                }
            }
        }
        None => None,
    };

    let Some(binary) = state.config.todo_binary.clone() else {
        return Ok(Json(json!({"error": "todo binary not configured"})));
    };

    let mut command = tokio::process::Command::new(&binary);
    if let Some(nickname) = &study_nickname {
        command.arg(nickname);
    }
    command.kill_on_drop(true);

    let timeout = Duration::from_secs(state.config.todo_timeout);
    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            warn!(error = %e, binary = %binary.display(), "Todo binary failed to run");
            return Ok(Json(json!({"error": format!("runtime:{e}")})));
        }
        Err(_) => {
            warn!(binary = %binary.display(), timeout_s = state.config.todo_timeout, "Todo binary timed out");
            return Ok(Json(json!({"error": "timeout"})));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(status = ?output.status.code(), stderr = %stderr, "Todo binary exited non-zero");
        return Ok(Json(json!({"error": format!("runtime:{}", stderr.trim())})));
    }

    match serde_json::from_slice::<Value>(&output.stdout) {
        Ok(todo_list) => Ok(Json(todo_list)),
        Err(e) => {
            warn!(error = %e, "Todo binary produced unparseable output");
            Ok(Json(json!({"error": "other"})))
        }
    }
}
