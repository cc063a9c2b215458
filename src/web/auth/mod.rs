//! Login, logout, and OAuth round-trip handlers.

pub mod extractors;
pub mod providers;
pub mod session;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Json, Response};
use cookie::Cookie;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::state::AppState;
use crate::web::auth::extractors::{session_token, SESSION_COOKIE};
use crate::web::auth::providers::Provider;
use crate::web::flash::{clear_flash_cookie, flash_redirect, is_safe_url, pop_flash, redirect};

/// `GET /login` — login page model with the enabled providers.
pub async fn login(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let flash = pop_flash(&headers);
    let providers = Provider::enabled(&state.config);
    let mut response = Json(json!({
        "providers": providers,
        "flash": flash,
    }))
    .into_response();
    clear_flash_cookie(&mut response);
    response
}

#[derive(Deserialize)]
pub struct AuthorizeParams {
    pub next: Option<String>,
}

/// `GET /authorize/{provider}` — start the OAuth round trip.
pub async fn oauth_authorize(
    State(state): State<AppState>,
    Path(provider_name): Path<String>,
    Query(params): Query<AuthorizeParams>,
    headers: HeaderMap,
) -> Response {
    // Already signed in: nothing to authorize.
    if let Some(token) = session_token(&headers) {
        if matches!(state.session_cache.resolve(&token).await, Ok(Some(_))) {
            return redirect("/");
        }
    }

    let Some(provider) = Provider::from_config(&state.config, &provider_name) else {
        return flash_redirect("Unknown login provider.", "/login");
    };

    // Only keep a same-origin next target; anything else falls back to the index.
    let next = params
        .next
        .filter(|target| is_safe_url(&state.config.public_origin, target));

    let oauth_state = state.oauth_state_store.issue(provider.name, next);
    let redirect_uri = callback_uri(&state, provider.name);
    redirect(&provider.authorize_redirect(&oauth_state, &redirect_uri))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// `GET /callback/{provider}` — finish the OAuth round trip and establish a
/// login session.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider_name): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let (Some(code), Some(state_token)) = (params.code, params.state) else {
        return flash_redirect("Authentication failed.", "/login");
    };

    let Some(pending) = state.oauth_state_store.take(&state_token) else {
        warn!(provider = %provider_name, "OAuth callback with unknown or expired state token");
        return flash_redirect("Authentication failed.", "/login");
    };
    if pending.provider != provider_name {
        warn!(
            expected = %pending.provider,
            got = %provider_name,
            "OAuth callback provider mismatch"
        );
        return flash_redirect("Authentication failed.", "/login");
    }

    let Some(provider) = Provider::from_config(&state.config, &provider_name) else {
        return flash_redirect("Unknown login provider.", "/login");
    };

    let redirect_uri = callback_uri(&state, provider.name);
    let username = match provider.exchange_code(&state.http, &code, &redirect_uri).await {
        Ok(token) => match provider.fetch_username(&state.http, &token).await {
            Ok(username) => username,
            Err(e) => {
                warn!(error = %e, provider = %provider_name, "Failed to fetch account name");
                return flash_redirect("Authentication failed.", "/login");
            }
        },
        Err(e) => {
            warn!(error = %e, provider = %provider_name, "Token exchange failed");
            return flash_redirect("Authentication failed.", "/login");
        }
    };

    let user = match crate::data::users::get_by_provider_name(
        &state.db_pool,
        &provider_name,
        &username,
    )
    .await
    {
        Ok(Some(user)) if user.is_active => user,
        Ok(Some(_)) => {
            return flash_redirect(
                "Your account is disabled. Please contact an administrator.",
                "/login",
            );
        }
        Ok(None) => {
            info!(provider = %provider_name, username = %username, "Login attempt for unknown account");
            return flash_redirect("No dashboard account is linked to that login.", "/login");
        }
        Err(e) => {
            tracing::error!(error = %e, "User lookup failed during login");
            return flash_redirect("Authentication failed.", "/login");
        }
    };

    let token = match state.session_cache.create(user.id).await {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create login session");
            return flash_redirect("Authentication failed.", "/login");
        }
    };

    info!(user_id = user.id, provider = %provider_name, "User logged in");

    let destination = pending.next.unwrap_or_else(|| "/".to_string());
    let mut response = redirect(&destination);
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(cookie::SameSite::Lax)
        .max_age(cookie::time::Duration::days(14))
        .build();
    if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

/// `GET /logout`
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        if let Err(e) = state.session_cache.destroy(&token).await {
            warn!(error = %e, "Failed to destroy session on logout");
        }
    }

    let mut response = flash_redirect("You have been logged out.", "/login");
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(cookie::time::Duration::ZERO)
        .build();
    if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

fn callback_uri(state: &AppState, provider: &str) -> String {
    format!(
        "{}/callback/{provider}",
        state.config.public_origin.trim_end_matches('/')
    )
}
