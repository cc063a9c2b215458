//! Web router construction.

use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;

use crate::state::AppState;
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::{
    analyses, auth, health, index, metric_export, redcap, scans, sessions, studies, timepoints,
    todo, users,
};
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer};

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let auth_router = Router::new()
        .route("/login", get(auth::login))
        .route("/authorize/{provider}", get(auth::oauth_authorize))
        .route("/callback/{provider}", get(auth::oauth_callback))
        .route("/logout", get(auth::logout));

    let timepoint_router = Router::new()
        .route(
            "/study/{study_id}/timepoint/{timepoint_id}",
            get(timepoints::view_timepoint).post(timepoints::view_timepoint),
        )
        .route(
            "/study/{study_id}/timepoint/{timepoint_id}/sign_off/{session_num}",
            get(timepoints::sign_off).post(timepoints::sign_off),
        )
        .route(
            "/study/{study_id}/timepoint/{timepoint_id}/add_comment",
            post(timepoints::add_comment),
        )
        .route(
            "/study/{study_id}/timepoint/{timepoint_id}/add_comment/{comment_id}",
            get(timepoints::update_comment).post(timepoints::update_comment),
        )
        .route(
            "/study/{study_id}/timepoint/{timepoint_id}/delete_comment/{comment_id}",
            get(timepoints::delete_comment),
        )
        .route(
            "/study/{study_id}/timepoint/{timepoint_id}/flag_finding",
            post(timepoints::flag_finding),
        )
        .route(
            "/study/{study_id}/timepoint/{timepoint_id}/delete",
            get(timepoints::delete_timepoint),
        )
        .route(
            "/study/{study_id}/timepoint/{timepoint_id}/delete_session/{session_num}",
            get(timepoints::delete_session),
        )
        .route(
            "/study/{study_id}/timepoint/{timepoint_id}/dismiss_redcap/{session_num}",
            get(timepoints::dismiss_redcap).post(timepoints::dismiss_redcap),
        )
        .route(
            "/study/{study_id}/timepoint/{timepoint_id}/dismiss_missing/{session_num}",
            post(timepoints::dismiss_missing),
        );

    let router = Router::new()
        .route("/", get(index::index))
        .route("/index", get(index::index))
        .route("/health", get(health::health))
        .route("/users", get(users::list_users))
        .route("/user", get(users::view_user).post(users::update_user))
        .route(
            "/user/{user_id}",
            get(users::view_user).post(users::update_user),
        )
        .route(
            "/study/{study_id}",
            get(studies::view_study).post(studies::update_study),
        )
        .route(
            "/study/{study_id}/{tab}",
            get(studies::view_study).post(studies::update_study),
        )
        .route("/session/{session_id}", get(sessions::view_session))
        .route("/session_by_name/{name}", get(sessions::session_by_name))
        .route(
            "/create_issue/{session_id}",
            get(sessions::create_issue).post(sessions::create_issue),
        )
        .route(
            "/redcap_redirect/{session_id}",
            get(sessions::redcap_redirect),
        )
        .route("/scan", get(scans::scan_index))
        .route(
            "/scan/{scan_id}",
            get(scans::view_scan).post(scans::update_scan),
        )
        .route("/scan_comment", get(scans::scan_index))
        .route(
            "/scan_comment/{scan_id}",
            get(scans::view_scan).post(scans::scan_comment),
        )
        .route("/scan_blacklist", get(scans::scan_index))
        .route(
            "/scan_blacklist/{scan_id}",
            get(scans::view_scan).post(scans::scan_blacklist),
        )
        .route(
            "/analysis",
            get(analyses::view_analyses).post(analyses::create_analysis),
        )
        .route("/analysis/{analysis_id}", get(analyses::view_analyses))
        .route(
            "/metricData",
            get(metric_export::metric_data_page).post(metric_export::metric_data_submit),
        )
        .route(
            "/metricDataAsJson",
            get(metric_export::metric_data_json_get).post(metric_export::metric_data_json_post),
        )
        .route("/DownloadCSV", get(metric_export::download_csv))
        .route("/todo", get(todo::todo))
        .route("/todo/{study_id}", get(todo::todo))
        .route(
            "/redcap",
            get(redcap::redcap_get).post(redcap::redcap_callback),
        )
        .merge(timepoint_router)
        .merge(auth_router)
        .fallback(not_found)
        .with_state(app_state);

    router.layer((
        // Outermost: per-request ID span + severity-proportional response logging.
        RequestIdLayer,
        CompressionLayer::new()
            .zstd(true)
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
        TimeoutLayer::new(Duration::from_secs(60)),
    ))
}

/// Global 404 handler.
async fn not_found() -> crate::web::error::ApiError {
    use crate::web::error::{ApiError, ApiErrorCode};
    ApiError::new(ApiErrorCode::NotFound, "Not found")
}
