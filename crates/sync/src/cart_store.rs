//! Cart state store.
//!
//! The one shared holder of cart state for a storefront. It keeps no copy of
//! the cart itself: every read projects the `cart` section of the local cache,
//! so the store can never disagree with what other tabs have written.
//!
//! Subscribers are never removed. A long-lived process that keeps subscribing
//! keeps growing the list; callers must tolerate being called after they stop
//! caring.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use cartsync_core::{Cart, Section, SessionType};

use crate::cache::LocalCache;
use crate::projection::project_cart;

/// Days the cart-ID cookie stays valid.
pub const CART_ID_COOKIE_DAYS: i64 = 30;

/// A cart subscriber.
pub type Subscriber = Arc<dyn Fn(&Cart) + Send + Sync>;

#[derive(Debug, Default)]
struct StoreState {
    /// Cart ID the backend refused; ignored until the cache reports another.
    rejected_cart_id: Option<String>,
    session_type: SessionType,
}

/// Observable holder of the current cart.
pub struct CartStateStore {
    cache: Arc<LocalCache>,
    state: Mutex<StoreState>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl std::fmt::Debug for CartStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStateStore")
            .field("state", &*self.state.lock())
            .field("subscribers", &self.subscribers.lock().len())
            .finish_non_exhaustive()
    }
}

impl CartStateStore {
    /// Create a store reading from `cache`.
    #[must_use]
    pub fn new(cache: Arc<LocalCache>) -> Self {
        Self {
            cache,
            state: Mutex::new(StoreState::default()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Project the cached `cart` section.
    #[must_use]
    pub fn current_cart(&self) -> Cart {
        project_cart(self.cache.read_snapshot().section(Section::CART))
    }

    /// The GraphQL cart ID from the `side-by-side` section.
    ///
    /// Returns `None` while the cache still holds an ID the backend rejected.
    /// A usable ID is mirrored into the cart-ID cookie.
    pub fn cart_id(&self) -> Option<String> {
        let id = self.cache.read_snapshot().cart_id()?;

        {
            let mut state = self.state.lock();
            if state.rejected_cart_id.as_deref() == Some(id.as_str()) {
                return None;
            }
            state.rejected_cart_id = None;
        }

        if self.cache.remembered_cart_id().as_deref() != Some(id.as_str()) {
            self.cache.remember_cart_id(&id, CART_ID_COOKIE_DAYS);
        }
        Some(id)
    }

    /// Bearer token for GraphQL calls, if the session has one.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.cache.read_snapshot().token()
    }

    /// Register `callback` and immediately call it once with the current cart.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&Cart) + Send + Sync + 'static,
    {
        let callback: Subscriber = Arc::new(callback);
        self.subscribers.lock().push(callback.clone());
        invoke(&callback, &self.current_cart());
    }

    /// Call every subscriber with the freshly projected cart.
    pub fn notify_all(&self) {
        self.broadcast(&self.current_cart());
    }

    /// Forget the current cart and notify every subscriber with an empty cart.
    ///
    /// Used when the backend reports the cart as missing or inaccessible.
    pub fn reset(&self) {
        {
            let mut state = self.state.lock();
            if let Some(id) = self.cache.read_snapshot().cart_id() {
                state.rejected_cart_id = Some(id);
            }
        }
        self.cache.forget_cart_id();
        self.broadcast(&Cart::default());
    }

    /// Guest or customer session.
    #[must_use]
    pub fn session_type(&self) -> SessionType {
        self.state.lock().session_type
    }

    /// Record the session type.
    pub fn set_session_type(&self, session_type: SessionType) {
        self.state.lock().session_type = session_type;
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn broadcast(&self, cart: &Cart) {
        // Snapshot the list so callbacks may subscribe without deadlocking.
        let subscribers = self.subscribers.lock().clone();
        debug!(count = subscribers.len(), "Notifying cart subscribers");
        for callback in &subscribers {
            invoke(callback, cart);
        }
    }
}

/// Call a subscriber, containing any panic to that subscriber.
fn invoke(callback: &Subscriber, cart: &Cart) {
    if catch_unwind(AssertUnwindSafe(|| callback(cart))).is_err() {
        error!("Cart subscriber panicked");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    use serde_json::{Map, Value, json};

    use super::*;
    use crate::storage::MemoryStorage;

    fn store_with(sections: Value) -> (Arc<LocalCache>, CartStateStore) {
        let storage = Arc::new(MemoryStorage::new());
        let cache = Arc::new(LocalCache::new(storage.clone(), storage));
        if let Value::Object(sections) = sections {
            cache.merge_sections(sections);
        }
        let store = CartStateStore::new(cache.clone());
        (cache, store)
    }

    fn cart_with_quantity(quantity: u32) -> Value {
        json!({
            "cart": {
                "summary_count": quantity,
                "items": [{ "qty": quantity, "product_sku": "A", "product_name": "Widget" }]
            },
            "side-by-side": { "cart_id": "cart-1" }
        })
    }

    #[test]
    fn test_subscribe_delivers_current_cart_immediately() {
        let (_cache, store) = store_with(cart_with_quantity(5));
        let seen = Arc::new(AtomicU32::new(0));

        let sink = seen.clone();
        store.subscribe(move |cart| sink.store(cart.total_quantity, Ordering::SeqCst));

        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_notify_all_calls_every_subscriber_in_order() {
        let (_cache, store) = store_with(cart_with_quantity(1));
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let order = order.clone();
            store.subscribe(move |_| order.lock().push(n));
        }
        order.lock().clear();

        store.notify_all();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_others() {
        let (_cache, store) = store_with(cart_with_quantity(2));
        let calls = Arc::new(AtomicUsize::new(0));

        store.subscribe(|_| panic!("broken widget"));
        let counter = calls.clone();
        store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.notify_all();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_notify_reflects_cache_changes() {
        let (cache, store) = store_with(cart_with_quantity(1));
        let seen = Arc::new(AtomicU32::new(0));
        let sink = seen.clone();
        store.subscribe(move |cart| sink.store(cart.total_quantity, Ordering::SeqCst));

        let mut updates = Map::new();
        updates.insert("cart".to_string(), json!({ "summary_count": 4, "items": [] }));
        cache.merge_sections(updates);
        store.notify_all();

        assert_eq!(seen.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_reset_clears_cart_id_and_notifies_empty_cart() {
        let (cache, store) = store_with(cart_with_quantity(3));
        assert_eq!(store.cart_id().as_deref(), Some("cart-1"));
        assert_eq!(cache.remembered_cart_id().as_deref(), Some("cart-1"));

        let last = Arc::new(Mutex::new(None));
        let sink = last.clone();
        store.subscribe(move |cart| *sink.lock() = Some(cart.clone()));

        store.reset();

        assert_eq!(*last.lock(), Some(Cart::default()));
        assert_eq!(store.cart_id(), None);
        assert_eq!(cache.remembered_cart_id(), None);
    }

    #[test]
    fn test_new_cart_id_after_reset_is_accepted() {
        let (cache, store) = store_with(cart_with_quantity(1));
        store.reset();
        assert_eq!(store.cart_id(), None);

        let mut updates = Map::new();
        updates.insert("side-by-side".to_string(), json!({ "cart_id": "cart-2" }));
        cache.merge_sections(updates);

        assert_eq!(store.cart_id().as_deref(), Some("cart-2"));
    }

    #[test]
    fn test_empty_cache_projects_default_cart() {
        let (_cache, store) = store_with(json!({}));
        assert_eq!(store.current_cart(), Cart::default());
        assert_eq!(store.cart_id(), None);
    }

    #[test]
    fn test_subscribers_accumulate() {
        let (_cache, store) = store_with(json!({}));
        for _ in 0..4 {
            store.subscribe(|_| {});
        }
        assert_eq!(store.subscriber_count(), 4);
    }

    #[test]
    fn test_session_type_defaults_to_guest() {
        let (_cache, store) = store_with(json!({}));
        assert_eq!(store.session_type(), SessionType::Guest);
        store.set_session_type(SessionType::Customer);
        assert_eq!(store.session_type(), SessionType::Customer);
    }
}
