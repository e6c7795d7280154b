//! In-memory storage backend.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;

use super::{Cookie, CookieJar, KeyValueStore, StorageError};

/// Process-local key/value store and cookie jar.
///
/// Wrap it in an `Arc` and hand the same instance to several caches to model
/// tabs of one origin sharing storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
    cookies: Mutex<HashMap<String, Cookie>>,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items (cookies excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns `true` if no items are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.lock().remove(key);
        Ok(())
    }
}

impl CookieJar for MemoryStorage {
    fn get_cookie(&self, name: &str) -> Result<Option<String>, StorageError> {
        let now = Utc::now();
        let mut cookies = self.cookies.lock();
        match cookies.get(name) {
            Some(cookie) if cookie.is_expired_at(now) => {
                cookies.remove(name);
                Ok(None)
            }
            Some(cookie) => Ok(Some(cookie.value.clone())),
            None => Ok(None),
        }
    }

    fn set_cookie(&self, cookie: Cookie) -> Result<(), StorageError> {
        self.cookies.lock().insert(cookie.name.clone(), cookie);
        Ok(())
    }

    fn remove_cookie(&self, name: &str) -> Result<(), StorageError> {
        self.cookies.lock().remove(name);
        Ok(())
    }

    fn live_cookies(&self) -> Result<Vec<Cookie>, StorageError> {
        let now = Utc::now();
        let mut cookies = self.cookies.lock();
        cookies.retain(|_, cookie| !cookie.is_expired_at(now));
        Ok(cookies.values().cloned().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_items_round_trip() {
        let storage = MemoryStorage::new();
        storage.set_item("k", "v").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v"));

        storage.remove_item("k").unwrap();
        assert_eq!(storage.get_item("k").unwrap(), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_expired_cookie_is_invisible() {
        let storage = MemoryStorage::new();
        storage
            .set_cookie(Cookie::new("gone", "true").expires_at(Utc::now() - Duration::minutes(1)))
            .unwrap();
        storage
            .set_cookie(Cookie::new("live", "true").expires_at(Utc::now() + Duration::minutes(1)))
            .unwrap();

        assert_eq!(storage.get_cookie("gone").unwrap(), None);
        assert_eq!(storage.get_cookie("live").unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn test_remove_missing_cookie_is_ok() {
        let storage = MemoryStorage::new();
        assert!(storage.remove_cookie("never-set").is_ok());
    }
}
