//! Request extractors for the authenticated user.

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use axum::response::Response;

use crate::data::models::User;
use crate::state::AppState;
use crate::web::flash::flash_redirect;

pub const SESSION_COOKIE: &str = "session";

/// Pull the login session token out of the request cookies.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    for pair in cookie::Cookie::split_parse(cookies) {
        let Ok(cookie) = pair else { continue };
        if cookie.name() == SESSION_COOKIE {
            return Some(cookie.value().to_string());
        }
    }
    None
}

/// The authenticated user. Requests without a valid session are redirected
/// to the login page with the original URL preserved in `next`.
pub struct AuthUser(pub User);

fn login_redirect(parts: &Parts) -> Response {
    let next = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    crate::web::flash::redirect(&format!("/login?next={}", urlencoding::encode(next)))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers) else {
            return Err(login_redirect(parts));
        };

        match state.session_cache.resolve(&token).await {
            Ok(Some(user)) if user.is_active => Ok(AuthUser(user)),
            Ok(Some(user)) => {
                // Disabled accounts are logged out on their next request.
                if let Err(e) = state.session_cache.destroy(&token).await {
                    tracing::warn!(error = %e, user_id = user.id, "Failed to destroy session for disabled account");
                }
                Err(flash_redirect(
                    "Your account is disabled. Please contact an administrator.",
                    "/login",
                ))
            }
            Ok(None) => Err(login_redirect(parts)),
            Err(e) => {
                tracing::error!(error = %e, "Session lookup failed");
                Err(login_redirect(parts))
            }
        }
    }
}
