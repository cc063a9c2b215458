//! Flash messages and redirect safety.
//!
//! Flash messages ride a short-lived cookie: mutation handlers set it and
//! redirect, the next page render pops it into the page model and clears the
//! cookie. No ambient per-request globals.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use cookie::Cookie;
use url::Url;

const FLASH_COOKIE: &str = "scanboard_flash";

/// Redirect to `to`, carrying a flash message for the destination page.
pub fn flash_redirect(message: &str, to: &str) -> Response {
    let cookie = Cookie::build((FLASH_COOKIE, urlencoding::encode(message).into_owned()))
        .path("/")
        .http_only(true)
        .build();

    let mut response = redirect(to);
    if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

/// Plain 303 redirect. POST-handling routes redirect with See Other so the
/// browser re-requests the destination with GET.
pub fn redirect(to: &str) -> Response {
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, to.to_string())],
    )
        .into_response()
}

/// Pop any pending flash message from the request cookies. The caller is
/// responsible for attaching [`clear_flash_cookie`] to its response.
pub fn pop_flash(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    for pair in Cookie::split_parse(cookies) {
        let Ok(cookie) = pair else { continue };
        if cookie.name() == FLASH_COOKIE {
            return urlencoding::decode(cookie.value())
                .ok()
                .map(|v| v.into_owned());
        }
    }
    None
}

/// Expire the flash cookie on a response that consumed it.
pub fn clear_flash_cookie(response: &mut Response) {
    let cookie = Cookie::build((FLASH_COOKIE, ""))
        .path("/")
        .max_age(cookie::time::Duration::ZERO)
        .build();
    if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
}

/// The referring page when it is safe to return to, the index otherwise.
pub fn prev_url(headers: &HeaderMap, public_origin: &str) -> String {
    if let Some(referrer) = headers.get(header::REFERER).and_then(|v| v.to_str().ok()) {
        if is_safe_url(public_origin, referrer) {
            return referrer.to_string();
        }
    }
    "/".to_string()
}

/// Accept only same-origin `http`/`https` redirect targets. Relative targets
/// resolve against the configured origin and are therefore safe.
pub fn is_safe_url(public_origin: &str, target: &str) -> bool {
    let Ok(origin) = Url::parse(public_origin) else {
        return false;
    };
    let Ok(resolved) = origin.join(target) else {
        return false;
    };
    matches!(resolved.scheme(), "http" | "https")
        && origin.host_str() == resolved.host_str()
        && origin.port_or_known_default() == resolved.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://qc.example.org";

    #[test]
    fn relative_targets_are_safe() {
        assert!(is_safe_url(ORIGIN, "/study/1"));
        assert!(is_safe_url(ORIGIN, "study/1/timepoint/ABC_CMH_0001_01"));
        assert!(is_safe_url(ORIGIN, "/"));
    }

    #[test]
    fn same_origin_absolute_targets_are_safe() {
        assert!(is_safe_url(ORIGIN, "https://qc.example.org/index"));
        assert!(is_safe_url(ORIGIN, "https://qc.example.org:443/study/2"));
    }

    #[test]
    fn cross_origin_targets_are_rejected() {
        assert!(!is_safe_url(ORIGIN, "https://evil.example.com/"));
        assert!(!is_safe_url(ORIGIN, "http://qc.example.org.evil.com/index"));
    }

    #[test]
    fn non_http_schemes_are_rejected() {
        assert!(!is_safe_url(ORIGIN, "javascript:alert(1)"));
        assert!(!is_safe_url(ORIGIN, "ftp://qc.example.org/file"));
        assert!(!is_safe_url(ORIGIN, "data:text/html,hi"));
    }

    #[test]
    fn differing_ports_are_rejected() {
        assert!(!is_safe_url(ORIGIN, "https://qc.example.org:8443/index"));
    }

    #[test]
    fn prev_url_falls_back_to_index() {
        let mut headers = HeaderMap::new();
        assert_eq!(prev_url(&headers, ORIGIN), "/");

        headers.insert(
            header::REFERER,
            HeaderValue::from_static("https://elsewhere.org/x"),
        );
        assert_eq!(prev_url(&headers, ORIGIN), "/");

        headers.insert(
            header::REFERER,
            HeaderValue::from_static("https://qc.example.org/study/1"),
        );
        assert_eq!(prev_url(&headers, ORIGIN), "https://qc.example.org/study/1");
    }
}
