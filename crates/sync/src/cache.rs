//! Local cache store.
//!
//! Low-level accessor for the section snapshot written by the commerce
//! platform. The snapshot, its timeout, the invalidation map and the
//! freshness cookie all live in storage owned by the platform; this module
//! reads and writes them with the platform's key names and formats and holds
//! no business logic of its own.
//!
//! Nothing here returns an error. Parse failures and unavailable storage
//! degrade to an empty snapshot / `false`, and failed writes are logged.

use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use cartsync_core::{Section, SectionSet};

use crate::storage::{Cookie, CookieJar, KeyValueStore};

/// Minutes until the snapshot's timeout after a successful merge.
const CACHE_TIMEOUT_MINUTES: i64 = 30;

/// Minutes until the freshness cookie expires after a successful merge.
/// Kept shorter than the timeout so the cookie lapses before the backend
/// session does.
const FRESHNESS_COOKIE_MINUTES: i64 = 25;

/// Capacity of the storage-change channel.
const EVENT_CAPACITY: usize = 64;

/// Storage and cookie names owned by the commerce platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    /// Serialized section snapshot.
    pub storage: String,
    /// JSON-encoded ISO timestamp after which the snapshot is stale.
    pub timeout: String,
    /// JSON map of section name to `true` for sections needing a reload.
    pub invalidation: String,
    /// Freshness cookie, `true` while the snapshot may be trusted.
    pub session_cookie: String,
    /// Last login state derived by this crate.
    pub logged_in: String,
    /// Cookie mirroring the known GraphQL cart ID.
    pub cart_id_cookie: String,
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self {
            storage: "mage-cache-storage".to_string(),
            timeout: "mage-cache-timeout".to_string(),
            invalidation: "mage-cache-storage-section-invalidation".to_string(),
            session_cookie: "mage-cache-sessid".to_string(),
            logged_in: "loggedIn".to_string(),
            cart_id_cookie: "COMMERCE_CART_ID".to_string(),
        }
    }
}

/// Notification that a storage key changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// The key that was written.
    pub key: String,
}

/// Broadcast channel for storage-change notifications.
///
/// Clones share one channel. Handing the same `StorageEvents` to several
/// caches over one backing store is how cross-tab notification is modeled.
#[derive(Debug, Clone)]
pub struct StorageEvents {
    sender: broadcast::Sender<StorageEvent>,
}

impl Default for StorageEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEvents {
    /// Create a new channel.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Broadcast a change of `key`. Having no listeners is fine.
    pub fn emit(&self, key: &str) {
        let _ = self.sender.send(StorageEvent {
            key: key.to_string(),
        });
    }

    /// Receive subsequent notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.sender.subscribe()
    }
}

/// The decoded section snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSnapshot {
    sections: Map<String, Value>,
}

impl CacheSnapshot {
    /// Wrap a section map.
    #[must_use]
    pub const fn new(sections: Map<String, Value>) -> Self {
        Self { sections }
    }

    /// Payload of a section, if cached.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }

    /// Returns `true` if no sections are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// GraphQL cart ID from the `side-by-side` section.
    #[must_use]
    pub fn cart_id(&self) -> Option<String> {
        self.side_by_side_string("cart_id")
    }

    /// GraphQL bearer token from the `side-by-side` section.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.side_by_side_string("token")
    }

    /// Returns `true` if the customer section carries a `firstname` field.
    #[must_use]
    pub fn has_customer_name(&self) -> bool {
        self.section(Section::CUSTOMER)
            .and_then(Value::as_object)
            .is_some_and(|customer| customer.contains_key("firstname"))
    }

    /// Consume into the raw section map.
    #[must_use]
    pub fn into_sections(self) -> Map<String, Value> {
        self.sections
    }

    fn side_by_side_string(&self, field: &str) -> Option<String> {
        match self.section(Section::SIDE_BY_SIDE)?.get(field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Accessor for the platform-owned section cache.
pub struct LocalCache {
    store: Arc<dyn KeyValueStore>,
    cookies: Arc<dyn CookieJar>,
    keys: CacheKeys,
    events: StorageEvents,
    secure_cookies: bool,
}

impl std::fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache")
            .field("keys", &self.keys)
            .field("secure_cookies", &self.secure_cookies)
            .finish_non_exhaustive()
    }
}

impl LocalCache {
    /// Create a cache over the given storage and cookie jar with the
    /// platform's default key names.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, cookies: Arc<dyn CookieJar>) -> Self {
        Self {
            store,
            cookies,
            keys: CacheKeys::default(),
            events: StorageEvents::new(),
            secure_cookies: true,
        }
    }

    /// Use custom key names.
    #[must_use]
    pub fn with_keys(mut self, keys: CacheKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Share a notification channel with other caches over the same store.
    #[must_use]
    pub fn with_events(mut self, events: StorageEvents) -> Self {
        self.events = events;
        self
    }

    /// Whether cookies written by this cache carry the `Secure` attribute.
    #[must_use]
    pub const fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    /// Key names in use.
    #[must_use]
    pub const fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    /// The storage-change channel.
    #[must_use]
    pub const fn events(&self) -> &StorageEvents {
        &self.events
    }

    // =========================================================================
    // Snapshot
    // =========================================================================

    /// Read the snapshot.
    ///
    /// Returns an empty snapshot if the blob is missing, malformed, or
    /// stale per [`is_expired`](Self::is_expired).
    #[must_use]
    pub fn read_snapshot(&self) -> CacheSnapshot {
        let Some(raw) = self.get(&self.keys.storage) else {
            return CacheSnapshot::default();
        };
        if self.is_expired() {
            debug!("Section cache expired, ignoring snapshot");
            return CacheSnapshot::default();
        }
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(sections)) => CacheSnapshot::new(sections),
            Ok(_) => CacheSnapshot::default(),
            Err(e) => {
                warn!(error = %e, "Section cache is not valid JSON, treating as empty");
                CacheSnapshot::default()
            }
        }
    }

    /// Returns `true` if the snapshot must not be trusted: the freshness
    /// cookie is absent, or the timeout is missing, unparsable, or reached.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.cookie(&self.keys.session_cookie).as_deref() != Some("true") {
            return true;
        }
        let Some(raw) = self.get(&self.keys.timeout) else {
            return true;
        };
        parse_timeout(&raw).is_none_or(|timeout| now >= timeout)
    }

    /// Overwrite the given sections, leaving all other cached sections as
    /// they are, then push the timeout and freshness cookie forward and
    /// broadcast a change of the storage key.
    ///
    /// The read-modify-write is not atomic: concurrent merges from other
    /// handles on the same store are last-writer-wins for the whole blob.
    pub fn merge_sections(&self, updates: Map<String, Value>) {
        let now = Utc::now();

        let cookie = Cookie::new(&self.keys.session_cookie, "true")
            .expires_at(now + Duration::minutes(FRESHNESS_COOKIE_MINUTES))
            .secure(self.secure_cookies);
        if let Err(e) = self.cookies.set_cookie(cookie) {
            warn!(error = %e, "Failed to write freshness cookie");
        }

        let mut sections = match self.get(&self.keys.storage).map(|raw| serde_json::from_str(&raw)) {
            Some(Ok(Value::Object(sections))) => sections,
            _ => Map::new(),
        };
        sections.extend(updates);

        if !self.set(&self.keys.storage, &Value::Object(sections).to_string()) {
            return;
        }

        let timeout = (now + Duration::minutes(CACHE_TIMEOUT_MINUTES))
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        self.set(&self.keys.timeout, &Value::String(timeout).to_string());

        self.events.emit(&self.keys.storage);
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Flag sections for reload. A missing map is created; a malformed one
    /// is left alone.
    pub fn mark_invalid(&self, sections: &SectionSet) {
        let mut invalidations = match self.get(&self.keys.invalidation) {
            None => Map::new(),
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                Ok(Value::Null) => Map::new(),
                _ => return,
            },
        };
        for section in sections {
            invalidations.insert(section.to_string(), Value::Bool(true));
        }
        self.set(&self.keys.invalidation, &Value::Object(invalidations).to_string());
    }

    /// Remove sections from the invalidation map. A missing or malformed map
    /// is left alone.
    pub fn clear_invalid(&self, sections: &SectionSet) {
        let Some(Value::Object(mut invalidations)) = self
            .get(&self.keys.invalidation)
            .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
        else {
            return;
        };
        invalidations.retain(|key, _| !sections.contains(key));
        self.set(&self.keys.invalidation, &Value::Object(invalidations).to_string());
    }

    /// Returns `true` if any of `sections` is flagged for reload.
    #[must_use]
    pub fn is_any_invalid(&self, sections: &SectionSet) -> bool {
        let Some(Value::Object(invalidations)) = self
            .get(&self.keys.invalidation)
            .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
        else {
            return false;
        };
        invalidations
            .iter()
            .any(|(key, value)| value == &Value::Bool(true) && sections.contains(key))
    }

    /// Returns `true` only if there is no trace of a commerce session: no
    /// snapshot, no invalidation map, no timeout and no freshness cookie.
    #[must_use]
    pub fn is_pristine(&self) -> bool {
        self.get(&self.keys.invalidation).is_none()
            && self.get(&self.keys.storage).is_none()
            && self.get(&self.keys.timeout).is_none()
            && self.cookie(&self.keys.session_cookie).is_none()
    }

    // =========================================================================
    // Login flag and cart-ID cookie
    // =========================================================================

    /// Last persisted login state.
    #[must_use]
    pub fn logged_in_flag(&self) -> bool {
        self.get(&self.keys.logged_in).as_deref() == Some("true")
    }

    /// Persist the login state.
    pub fn set_logged_in_flag(&self, logged_in: bool) {
        self.set(&self.keys.logged_in, if logged_in { "true" } else { "false" });
    }

    /// Mirror a cart ID into its cookie for `days` days.
    pub fn remember_cart_id(&self, cart_id: &str, days: i64) {
        let cookie = Cookie::new(&self.keys.cart_id_cookie, cart_id)
            .expires_at(Utc::now() + Duration::days(days))
            .secure(self.secure_cookies);
        if let Err(e) = self.cookies.set_cookie(cookie) {
            warn!(error = %e, "Failed to write cart ID cookie");
        }
    }

    /// Drop the cart ID cookie.
    pub fn forget_cart_id(&self) {
        if let Err(e) = self.cookies.remove_cookie(&self.keys.cart_id_cookie) {
            warn!(error = %e, "Failed to remove cart ID cookie");
        }
    }

    /// Cart ID currently mirrored in the cookie.
    #[must_use]
    pub fn remembered_cart_id(&self) -> Option<String> {
        self.cookie(&self.keys.cart_id_cookie)
    }

    // =========================================================================
    // Change notification
    // =========================================================================

    /// Invoke `callback` whenever the snapshot key changes, whichever handle
    /// or section caused it. Runs until the returned task is aborted.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn listen<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: Fn(&StorageEvent) + Send + 'static,
    {
        let mut receiver = self.events.subscribe();
        let key = self.keys.storage.clone();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) if event.key == key => callback(&event),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Storage listener lagged, delivering one change");
                        callback(&StorageEvent { key: key.clone() });
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    // =========================================================================
    // Storage helpers
    // =========================================================================

    fn get(&self, key: &str) -> Option<String> {
        self.store
            .get_item(key)
            .inspect_err(|e| warn!(key, error = %e, "Storage read failed"))
            .ok()
            .flatten()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        self.store
            .set_item(key, value)
            .inspect_err(|e| warn!(key, error = %e, "Storage write failed"))
            .is_ok()
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies
            .get_cookie(name)
            .inspect_err(|e| warn!(name, error = %e, "Cookie read failed"))
            .ok()
            .flatten()
    }
}

/// Parse the JSON-encoded ISO timestamp stored under the timeout key.
fn parse_timeout(raw: &str) -> Option<DateTime<Utc>> {
    let value: String = serde_json::from_str(raw).ok()?;
    DateTime::parse_from_rfc3339(&value)
        .ok()
        .map(|timeout| timeout.with_timezone(&Utc))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::storage::{MemoryStorage, StorageError};

    fn cache() -> (Arc<MemoryStorage>, LocalCache) {
        let storage = Arc::new(MemoryStorage::new());
        let cache = LocalCache::new(storage.clone(), storage.clone());
        (storage, cache)
    }

    fn timeout_in(minutes: i64) -> String {
        Value::String(
            (Utc::now() + Duration::minutes(minutes)).to_rfc3339_opts(SecondsFormat::Millis, true),
        )
        .to_string()
    }

    fn fresh_cookie(storage: &MemoryStorage) {
        storage
            .set_cookie(
                Cookie::new("mage-cache-sessid", "true")
                    .expires_at(Utc::now() + Duration::minutes(10)),
            )
            .unwrap();
    }

    /// Store whose every operation fails.
    struct UnavailableStorage;

    impl KeyValueStore for UnavailableStorage {
        fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("disabled".to_string()))
        }
        fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disabled".to_string()))
        }
        fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disabled".to_string()))
        }
    }

    impl CookieJar for UnavailableStorage {
        fn get_cookie(&self, _name: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("disabled".to_string()))
        }
        fn set_cookie(&self, _cookie: Cookie) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disabled".to_string()))
        }
        fn remove_cookie(&self, _name: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disabled".to_string()))
        }
        fn live_cookies(&self) -> Result<Vec<Cookie>, StorageError> {
            Err(StorageError::Unavailable("disabled".to_string()))
        }
    }

    #[test]
    fn test_read_snapshot_missing_blob_is_empty() {
        let (storage, cache) = cache();
        fresh_cookie(&storage);
        storage.set_item("mage-cache-timeout", &timeout_in(10)).unwrap();
        assert!(cache.read_snapshot().is_empty());
    }

    #[test]
    fn test_read_snapshot_malformed_blob_is_empty() {
        let (storage, cache) = cache();
        fresh_cookie(&storage);
        storage.set_item("mage-cache-timeout", &timeout_in(10)).unwrap();

        for blob in ["{", "not json", "[1,2", "\"unterminated", "42", "[]", "null"] {
            storage.set_item("mage-cache-storage", blob).unwrap();
            assert!(cache.read_snapshot().is_empty(), "blob {blob:?}");
        }
    }

    #[test]
    fn test_read_snapshot_fresh_blob() {
        let (storage, cache) = cache();
        fresh_cookie(&storage);
        storage.set_item("mage-cache-timeout", &timeout_in(10)).unwrap();
        storage
            .set_item("mage-cache-storage", r#"{"cart":{"summary_count":1}}"#)
            .unwrap();

        let snapshot = cache.read_snapshot();
        assert_eq!(snapshot.section("cart"), Some(&json!({"summary_count": 1})));
    }

    #[test]
    fn test_read_snapshot_expired_blob_is_empty() {
        let (storage, cache) = cache();
        fresh_cookie(&storage);
        storage.set_item("mage-cache-timeout", &timeout_in(-1)).unwrap();
        storage.set_item("mage-cache-storage", r#"{"cart":{}}"#).unwrap();
        assert!(cache.read_snapshot().is_empty());
    }

    #[test]
    fn test_expired_without_cookie_even_with_future_timeout() {
        let (storage, cache) = cache();
        storage.set_item("mage-cache-timeout", &timeout_in(60 * 24)).unwrap();
        assert!(cache.is_expired());
    }

    #[test]
    fn test_expired_when_cookie_is_not_true() {
        let (storage, cache) = cache();
        storage
            .set_cookie(Cookie::new("mage-cache-sessid", "false"))
            .unwrap();
        storage.set_item("mage-cache-timeout", &timeout_in(10)).unwrap();
        assert!(cache.is_expired());
    }

    #[test]
    fn test_expired_without_timeout() {
        let (storage, cache) = cache();
        fresh_cookie(&storage);
        assert!(cache.is_expired());
    }

    #[test]
    fn test_expired_with_unparsable_timeout() {
        let (storage, cache) = cache();
        fresh_cookie(&storage);
        for raw in ["not json", "\"not a date\"", "12345"] {
            storage.set_item("mage-cache-timeout", raw).unwrap();
            assert!(cache.is_expired(), "timeout {raw:?}");
        }
    }

    #[test]
    fn test_expired_at_timeout_instant() {
        let (storage, cache) = cache();
        fresh_cookie(&storage);
        let timeout = Utc::now() + Duration::minutes(5);
        storage
            .set_item(
                "mage-cache-timeout",
                &Value::String(timeout.to_rfc3339_opts(SecondsFormat::Millis, true)).to_string(),
            )
            .unwrap();

        assert!(!cache.is_expired_at(timeout - Duration::seconds(1)));
        assert!(cache.is_expired_at(timeout + Duration::milliseconds(1)));
    }

    #[test]
    fn test_merge_sections_preserves_other_sections() {
        let (storage, cache) = cache();
        storage
            .set_item("mage-cache-storage", r#"{"cart":{"summary_count":1},"wishlist":{"n":2}}"#)
            .unwrap();

        let mut updates = Map::new();
        updates.insert("cart".to_string(), json!({"summary_count": 3}));
        cache.merge_sections(updates);

        let snapshot = cache.read_snapshot();
        assert_eq!(snapshot.section("cart"), Some(&json!({"summary_count": 3})));
        assert_eq!(snapshot.section("wishlist"), Some(&json!({"n": 2})));
    }

    #[test]
    fn test_merge_sections_tolerates_malformed_blob() {
        let (storage, cache) = cache();
        storage.set_item("mage-cache-storage", "{oops").unwrap();

        let mut updates = Map::new();
        updates.insert("customer".to_string(), json!({"firstname": "Ada"}));
        cache.merge_sections(updates);

        assert!(cache.read_snapshot().has_customer_name());
    }

    #[test]
    fn test_merge_sections_refreshes_metadata() {
        let (storage, cache) = cache();
        cache.merge_sections(Map::new());

        assert!(!cache.is_expired());
        assert_eq!(
            storage.get_cookie("mage-cache-sessid").unwrap().as_deref(),
            Some("true")
        );
        let timeout = parse_timeout(&storage.get_item("mage-cache-timeout").unwrap().unwrap())
            .unwrap();
        let minutes = (timeout - Utc::now()).num_minutes();
        assert!((29..=30).contains(&minutes), "timeout {minutes} minutes away");
    }

    #[tokio::test]
    async fn test_merge_sections_emits_storage_event() {
        let (_storage, cache) = cache();
        let mut receiver = cache.events().subscribe();

        cache.merge_sections(Map::new());

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.key, "mage-cache-storage");
    }

    #[test]
    fn test_mark_and_clear_invalid() {
        let (_storage, cache) = cache();
        let cart = SectionSet::cart();
        let customer: SectionSet = ["customer"].into_iter().collect();

        assert!(!cache.is_any_invalid(&cart));
        cache.mark_invalid(&SectionSet::session());
        assert!(cache.is_any_invalid(&cart));

        cache.clear_invalid(&cart);
        assert!(!cache.is_any_invalid(&cart));
        assert!(cache.is_any_invalid(&customer));
    }

    #[test]
    fn test_is_any_invalid_ignores_non_true_flags() {
        let (storage, cache) = cache();
        storage
            .set_item(
                "mage-cache-storage-section-invalidation",
                r#"{"cart":false,"customer":"true"}"#,
            )
            .unwrap();
        assert!(!cache.is_any_invalid(&SectionSet::session()));
    }

    #[test]
    fn test_malformed_invalidation_map_fails_soft() {
        let (storage, cache) = cache();
        storage
            .set_item("mage-cache-storage-section-invalidation", "{broken")
            .unwrap();

        cache.mark_invalid(&SectionSet::cart());
        cache.clear_invalid(&SectionSet::cart());

        assert!(!cache.is_any_invalid(&SectionSet::cart()));
        assert_eq!(
            storage
                .get_item("mage-cache-storage-section-invalidation")
                .unwrap()
                .as_deref(),
            Some("{broken")
        );
    }

    #[test]
    fn test_clear_invalid_without_map_is_noop() {
        let (storage, cache) = cache();
        cache.clear_invalid(&SectionSet::cart());
        assert_eq!(
            storage
                .get_item("mage-cache-storage-section-invalidation")
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_pristine_only_when_everything_absent() {
        let (storage, cache) = cache();
        assert!(cache.is_pristine());

        let traces: [&dyn Fn(&MemoryStorage); 4] = [
            &|s| s.set_item("mage-cache-storage", "{}").unwrap(),
            &|s| s.set_item("mage-cache-storage-section-invalidation", "{}").unwrap(),
            &|s| s.set_item("mage-cache-timeout", "\"x\"").unwrap(),
            &|s| s.set_cookie(Cookie::new("mage-cache-sessid", "false")).unwrap(),
        ];
        for trace in traces {
            let fresh = MemoryStorage::new();
            trace(&fresh);
            let fresh = Arc::new(fresh);
            let cache = LocalCache::new(fresh.clone(), fresh);
            assert!(!cache.is_pristine());
        }

        storage.set_item("mage-cache-timeout", "\"x\"").unwrap();
        assert!(!cache.is_pristine());
    }

    #[test]
    fn test_unavailable_storage_fails_soft() {
        let storage = Arc::new(UnavailableStorage);
        let cache = LocalCache::new(storage.clone(), storage);

        assert!(cache.read_snapshot().is_empty());
        assert!(cache.is_expired());
        assert!(!cache.is_any_invalid(&SectionSet::session()));
        assert!(!cache.logged_in_flag());

        cache.merge_sections(Map::new());
        cache.mark_invalid(&SectionSet::cart());
        cache.clear_invalid(&SectionSet::cart());
        cache.remember_cart_id("abc", 30);
    }

    #[test]
    fn test_snapshot_accessors() {
        let snapshot = CacheSnapshot::new(
            json!({
                "side-by-side": { "cart_id": "cart-1", "token": "tok" },
                "customer": { "firstname": "Ada" }
            })
            .as_object()
            .cloned()
            .unwrap(),
        );
        assert_eq!(snapshot.cart_id().as_deref(), Some("cart-1"));
        assert_eq!(snapshot.token().as_deref(), Some("tok"));
        assert!(snapshot.has_customer_name());
    }

    #[test]
    fn test_guest_customer_section_has_no_name() {
        let snapshot = CacheSnapshot::new(
            json!({ "customer": { "data_id": 1 }, "side-by-side": { "cart_id": "" } })
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert!(!snapshot.has_customer_name());
        assert_eq!(snapshot.cart_id(), None);
    }

    #[test]
    fn test_logged_in_flag_round_trip() {
        let (_storage, cache) = cache();
        assert!(!cache.logged_in_flag());
        cache.set_logged_in_flag(true);
        assert!(cache.logged_in_flag());
        cache.set_logged_in_flag(false);
        assert!(!cache.logged_in_flag());
    }

    #[test]
    fn test_cart_id_cookie() {
        let (_storage, cache) = cache();
        cache.remember_cart_id("cart-9", 30);
        assert_eq!(cache.remembered_cart_id().as_deref(), Some("cart-9"));
        cache.forget_cart_id();
        assert_eq!(cache.remembered_cart_id(), None);
    }

    #[tokio::test]
    async fn test_listen_filters_by_storage_key() {
        let (_storage, cache) = cache();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = cache.listen(move |event| {
            let _ = tx.send(event.key.clone());
        });

        cache.events().emit("unrelated");
        cache.merge_sections(Map::new());

        assert_eq!(rx.recv().await.as_deref(), Some("mage-cache-storage"));
        handle.abort();
    }

    #[tokio::test]
    async fn test_shared_events_reach_other_handles() {
        let storage = Arc::new(MemoryStorage::new());
        let events = StorageEvents::new();
        let tab_a = LocalCache::new(storage.clone(), storage.clone()).with_events(events.clone());
        let tab_b = LocalCache::new(storage.clone(), storage).with_events(events);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = tab_b.listen(move |_| {
            let _ = tx.send(());
        });

        let mut updates = Map::new();
        updates.insert("cart".to_string(), json!({"summary_count": 2}));
        tab_a.merge_sections(updates);

        assert_eq!(rx.recv().await, Some(()));
        assert_eq!(
            tab_b.read_snapshot().section("cart"),
            Some(&json!({"summary_count": 2}))
        );
        handle.abort();
    }

    #[test]
    fn test_concurrent_merges_are_last_writer_wins() {
        // Two handles read the same blob, each overwrites a different section
        // from its own stale copy; only the second write survives.
        let storage = Arc::new(MemoryStorage::new());
        let tab_a = LocalCache::new(storage.clone(), storage.clone());
        let tab_b = LocalCache::new(storage.clone(), storage.clone());
        tab_a.merge_sections(Map::new());

        let stale = storage.get_item("mage-cache-storage").unwrap().unwrap();

        let mut cart = Map::new();
        cart.insert("cart".to_string(), json!({"summary_count": 1}));
        tab_a.merge_sections(cart);

        // tab_b writes a blob derived from the stale read.
        storage.set_item("mage-cache-storage", &stale).unwrap();
        let mut customer = Map::new();
        customer.insert("customer".to_string(), json!({"firstname": "Ada"}));
        tab_b.merge_sections(customer);

        let snapshot = tab_a.read_snapshot();
        assert!(snapshot.has_customer_name());
        assert_eq!(snapshot.section("cart"), None);
    }
}
