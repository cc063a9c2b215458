//! Inbound survey (REDCap) data entry trigger callback.
//!
//! The survey server POSTs a form whenever an instrument is saved. The
//! payload names its completion field after the instrument, so the form is
//! read as a raw map instead of a typed struct. Errors surface as the JSON
//! `{"message": ...}` envelope with a 400 status; this route is the one
//! external, unauthenticated API surface.

use axum::extract::State;
use axum::response::Json;
use axum_extra::extract::Form;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{error, info};

use crate::data::sessions::RedcapAttachment;
use crate::state::AppState;
use crate::web::error::ApiError;

const REQUIRED_KEYS: [&str; 5] = [
    "record",
    "project_id",
    "redcap_url",
    "instrument",
    "project_url",
];

/// Pull the server version out of a `.../redcap_vX.Y.Z/index...` URL.
fn parse_version(project_url: &str) -> Option<&str> {
    let start = project_url.find("redcap_v")? + "redcap_v".len();
    let rest = &project_url[start..];
    let end = rest.find("/index")?;
    Some(&rest[..end])
}

/// `POST /redcap`
pub async fn redcap_callback(
    State(state): State<AppState>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    info!("Received a survey data entry trigger");

    for key in REQUIRED_KEYS {
        if !form.contains_key(key) {
            let found: Vec<&String> = form.keys().collect();
            error!(missing = key, "Survey trigger request missing a required key");
            return Err(ApiError::bad_request(format!(
                "Data entry trigger request missing required key '{key}'"
            ))
            .with_payload(json!({ "found_keys": found })));
        }
    }

    let record = &form["record"];
    let project_id = &form["project_id"];
    let redcap_url = &form["redcap_url"];
    let instrument = &form["instrument"];
    let project_url = &form["project_url"];

    let version = parse_version(project_url).ok_or_else(|| {
        ApiError::bad_request(format!(
            "Could not parse server version from project_url '{project_url}'"
        ))
    })?;

    let complete_key = format!("{instrument}_complete");
    let completed = form
        .get(&complete_key)
        .and_then(|v| v.parse::<i32>().ok())
        .ok_or_else(|| {
            ApiError::bad_request(format!(
                "Data entry trigger request missing required key '{complete_key}'"
            ))
        })?;

    // Instrument status 2 means "complete"; anything else is a save we
    // don't care about yet.
    if completed != 2 {
        info!(record = %record, "Instrument not complete, ignoring");
        return Ok(Json(json!({"status": "ignored"})));
    }

    let attachment = RedcapAttachment {
        record,
        url: redcap_url,
        version,
        project_id,
        instrument,
        event_id: form.get("event_id").map(String::as_str),
        comment: form.get("cmts").map(String::as_str),
    };

    // Record ids carry the session name the site entered into the survey.
    let session = crate::data::sessions::attach_redcap_record(&state.db_pool, record, &attachment)
        .await
        .map_err(|e| {
            error!(error = %e, record = %record, "Failed to attach survey record");
            ApiError::bad_request(format!("Failed to attach record '{record}': {e}"))
        })?;

    info!(session_id = session.id, record = %record, "Survey record attached");
    Ok(Json(json!({"status": "ok", "session_id": session.id})))
}

/// `GET /redcap` — the trigger must POST.
pub async fn redcap_get() -> ApiError {
    ApiError::bad_request("Expected a POST request")
}

#[cfg(test)]
mod tests {
    use super::parse_version;

    #[test]
    fn version_is_extracted_from_project_url() {
        assert_eq!(
            parse_version("https://redcap.example.org/redcap_v9.5.1/index.php?pid=12"),
            Some("9.5.1")
        );
    }

    #[test]
    fn unparseable_project_urls_are_rejected() {
        assert_eq!(parse_version("https://redcap.example.org/surveys/"), None);
        assert_eq!(parse_version("redcap_v9.5.1"), None);
    }
}
