//! Persistent key/value storage and cookie collaborators.
//!
//! The cached snapshot lives in a store owned by the commerce platform. These
//! traits are the only way the crate touches it, so a browser binding, a file
//! profile, or an in-memory test double can stand in for each other.
//!
//! # Backends
//!
//! - [`MemoryStorage`] - process-local, shareable between several
//!   [`LocalCache`](crate::cache::LocalCache) handles to model multiple tabs
//! - [`FileProfile`] - JSON file on disk, used by the CLI to keep a session
//!   across invocations

mod file;
mod memory;

pub use file::FileProfile;
pub use memory::MemoryStorage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by storage backends.
///
/// The cache store never lets these escape: reads degrade to "absent" and
/// failed writes are logged.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend is not available (e.g., storage disabled or quota exceeded).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Filesystem error.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored profile could not be (de)serialized.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A string key/value store with `localStorage` semantics.
pub trait KeyValueStore: Send + Sync {
    /// Read an item.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write an item, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove an item. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
    #[default]
    Lax,
    Strict,
    None,
}

/// A cookie as written by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Expiry instant (`None` for a session cookie).
    pub expires: Option<DateTime<Utc>>,
    /// Cookie path.
    pub path: String,
    /// `SameSite` attribute.
    pub same_site: SameSite,
    /// `Secure` attribute.
    pub secure: bool,
}

impl Cookie {
    /// A root-path, `SameSite=Lax` cookie.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires: None,
            path: "/".to_string(),
            same_site: SameSite::Lax,
            secure: false,
        }
    }

    /// Set the expiry instant.
    #[must_use]
    pub const fn expires_at(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Set the `Secure` attribute.
    #[must_use]
    pub const fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Returns `true` if the cookie has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }
}

/// Cookie storage with `document.cookie` semantics: expired cookies are
/// invisible.
pub trait CookieJar: Send + Sync {
    /// Read the value of a live cookie.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_cookie(&self, name: &str) -> Result<Option<String>, StorageError>;

    /// Store a cookie, replacing any cookie of the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set_cookie(&self, cookie: Cookie) -> Result<(), StorageError>;

    /// Remove a cookie. Removing a missing cookie is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove_cookie(&self, name: &str) -> Result<(), StorageError>;

    /// All live cookies, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn live_cookies(&self) -> Result<Vec<Cookie>, StorageError>;
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_session_cookie_never_expires() {
        let cookie = Cookie::new("a", "b");
        assert!(!cookie.is_expired_at(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn test_cookie_expiry_boundary() {
        let now = Utc::now();
        let cookie = Cookie::new("a", "b").expires_at(now);
        assert!(cookie.is_expired_at(now));
        assert!(!cookie.is_expired_at(now - Duration::seconds(1)));
    }
}
