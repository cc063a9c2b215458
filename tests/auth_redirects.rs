//! End-to-end router tests for the authorization redirects: protected
//! routes bounce to login, and study-scoped mutations without admin rights
//! flash and change nothing.

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use helpers::{grant_access, seed_site, seed_study, seed_timepoint, seed_user};
use scanboard::config::Config;
use scanboard::state::AppState;
use scanboard::web::create_router;
use sqlx::PgPool;
use tower::util::ServiceExt;

fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        port: 0,
        log_level: "warn".to_string(),
        public_origin: "http://localhost:8080".to_string(),
        archive_root: std::env::temp_dir(),
        todo_binary: None,
        todo_timeout: 5,
        github_client_id: None,
        github_client_secret: None,
        gitlab_client_id: None,
        gitlab_client_secret: None,
        issue_repo: None,
        notify_webhook: None,
        seed_admin_id: None,
    }
}

fn get(uri: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = session {
        builder = builder.header(header::COOKIE, format!("session={token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[sqlx::test]
async fn protected_routes_redirect_to_login(pool: PgPool) {
    let app = create_router(AppState::new(pool, test_config()));

    for uri in ["/", "/index", "/users", "/metricData", "/todo", "/scan"] {
        let response = app.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::SEE_OTHER,
            "{uri} should redirect anonymous requests"
        );
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(
            location.starts_with("/login"),
            "{uri} should redirect to login, got {location}"
        );
    }
}

#[sqlx::test]
async fn login_redirect_preserves_the_original_url(pool: PgPool) {
    let app = create_router(AppState::new(pool, test_config()));

    let response = app.oneshot(get("/study/1", None)).await.unwrap();
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert_eq!(location, "/login?next=%2Fstudy%2F1");
}

#[sqlx::test]
async fn stale_session_tokens_redirect_to_login(pool: PgPool) {
    let app = create_router(AppState::new(pool, test_config()));

    let response = app.oneshot(get("/index", Some("expired-token"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(location.starts_with("/login"));
}

#[sqlx::test]
async fn destructive_routes_require_study_admin(pool: PgPool) {
    let study_id = seed_study(&pool, "ABC", "Alphabet Study").await;
    let site_id = seed_site(&pool, "CMH").await;
    seed_timepoint(&pool, "ABC_CMH_0001_01", study_id, site_id).await;

    // Granted access, but not study admin.
    let user_id = seed_user(&pool, "Jane Doe").await;
    grant_access(&pool, study_id, user_id, false).await;

    let state = AppState::new(pool.clone(), test_config());
    let token = state.session_cache.create(user_id).await.unwrap();
    let app = create_router(state);

    let uri = format!("/study/{study_id}/timepoint/ABC_CMH_0001_01/delete");
    let response = app.oneshot(get(&uri, Some(&token))).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let flash = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(
        flash.contains("Not%20authorized"),
        "expected an unauthorized flash, got {flash}"
    );

    // And the timepoint is still there.
    let timepoint = scanboard::data::timepoints::get(&pool, study_id, "ABC_CMH_0001_01")
        .await
        .unwrap();
    assert!(timepoint.is_some(), "unauthorized delete must not remove data");
}

#[sqlx::test]
async fn study_admins_may_delete_timepoints(pool: PgPool) {
    let study_id = seed_study(&pool, "ABC", "Alphabet Study").await;
    let site_id = seed_site(&pool, "CMH").await;
    seed_timepoint(&pool, "ABC_CMH_0001_01", study_id, site_id).await;

    let user_id = seed_user(&pool, "QC Lead").await;
    grant_access(&pool, study_id, user_id, true).await;

    let state = AppState::new(pool.clone(), test_config());
    let token = state.session_cache.create(user_id).await.unwrap();
    let app = create_router(state);

    let uri = format!("/study/{study_id}/timepoint/ABC_CMH_0001_01/delete");
    let response = app.oneshot(get(&uri, Some(&token))).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert_eq!(location, format!("/study/{study_id}"));

    let timepoint = scanboard::data::timepoints::get(&pool, study_id, "ABC_CMH_0001_01")
        .await
        .unwrap();
    assert!(timepoint.is_none());
}

#[sqlx::test]
async fn unauthenticated_survey_callbacks_are_still_validated(pool: PgPool) {
    let app = create_router(AppState::new(pool, test_config()));

    // GET is API misuse: 400 with the JSON envelope, not a login redirect.
    let response = app.oneshot(get("/redcap", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
