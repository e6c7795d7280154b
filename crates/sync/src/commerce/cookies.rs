//! Backend session cookies.
//!
//! The section-load and login endpoints identify the session by cookie, and
//! the section snapshot is only meaningful for the session that produced it.
//! [`SessionCookies`] lets `reqwest` read and write cookies through the same
//! [`CookieJar`] the cache uses, so a persisted profile keeps its backend
//! session along with its snapshot.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::header::HeaderValue;
use tracing::{debug, warn};
use url::Url;

use crate::storage::{Cookie, CookieJar, SameSite};

/// `reqwest` cookie provider backed by a [`CookieJar`].
pub struct SessionCookies {
    jar: Arc<dyn CookieJar>,
}

impl std::fmt::Debug for SessionCookies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCookies").finish_non_exhaustive()
    }
}

impl SessionCookies {
    /// Wrap a cookie jar.
    #[must_use]
    pub fn new(jar: Arc<dyn CookieJar>) -> Self {
        Self { jar }
    }
}

impl reqwest::cookie::CookieStore for SessionCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, _url: &Url) {
        let now = Utc::now();
        for header in cookie_headers {
            let Some(cookie) = header.to_str().ok().and_then(|raw| parse_set_cookie(raw, now))
            else {
                continue;
            };
            let result = if cookie.is_expired_at(now) {
                self.jar.remove_cookie(&cookie.name)
            } else {
                self.jar.set_cookie(cookie)
            };
            if let Err(e) = result {
                warn!(error = %e, "Failed to store backend cookie");
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let secure_channel = url.scheme() == "https";
        let cookies = self
            .jar
            .live_cookies()
            .inspect_err(|e| warn!(error = %e, "Failed to read cookies"))
            .ok()?;

        let header = cookies
            .iter()
            .filter(|cookie| secure_channel || !cookie.secure)
            .filter(|cookie| url.path().starts_with(&cookie.path))
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            None
        } else {
            HeaderValue::from_str(&header).ok()
        }
    }
}

/// Parse a `Set-Cookie` header value.
///
/// `Max-Age` takes precedence over `Expires`. Attributes the jar does not
/// persist (`Domain`, `HttpOnly`) are dropped.
fn parse_set_cookie(raw: &str, now: DateTime<Utc>) -> Option<Cookie> {
    let parsed = cookie::Cookie::parse(raw)
        .inspect_err(|e| debug!(error = %e, "Ignoring malformed Set-Cookie header"))
        .ok()?;
    if parsed.name().is_empty() {
        return None;
    }

    let mut stored = Cookie::new(parsed.name(), parsed.value_trimmed());
    if let Some(path) = parsed.path().filter(|path| path.starts_with('/')) {
        stored.path = path.to_string();
    }
    stored.secure = parsed.secure().unwrap_or(false);
    stored.same_site = match parsed.same_site() {
        Some(cookie::SameSite::Strict) => SameSite::Strict,
        Some(cookie::SameSite::None) => SameSite::None,
        Some(cookie::SameSite::Lax) | None => SameSite::Lax,
    };
    stored.expires = match parsed.max_age() {
        Some(max_age) => Some(now + Duration::seconds(max_age.whole_seconds())),
        None => parsed.expires_datetime().and_then(|expires| {
            DateTime::from_timestamp(expires.unix_timestamp(), expires.nanosecond())
        }),
    };
    Some(stored)
}
