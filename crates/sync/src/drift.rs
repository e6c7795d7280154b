//! Session drift resolution.
//!
//! The cached snapshot drifts from the backend session whenever something
//! happens outside this process: a login in another tab, a session timeout,
//! an order placed on the server-rendered checkout. The resolver reloads the
//! affected sections, republishes login state and re-renders cart
//! subscribers.
//!
//! Nothing in here fails outward. A timed-out or failed reload leaves the
//! cache untouched and is only logged; the republish and notify steps still
//! run so displays reflect whatever the cache holds.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use cartsync_core::SectionSet;

use crate::auth::AuthStatusPublisher;
use crate::busy::{BusyGuard, BusyIndicator};
use crate::cache::LocalCache;
use crate::cart_store::CartStateStore;
use crate::commerce::SectionSource;

/// Options for a drift resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriftOptions {
    /// Hold the busy indicator while resolving.
    pub wait: bool,
    /// Resolve even when no commerce session has ever existed.
    pub force: bool,
}

impl DriftOptions {
    /// Options with the busy indicator engaged.
    #[must_use]
    pub const fn waiting() -> Self {
        Self {
            wait: true,
            force: false,
        }
    }

    /// Set `force`.
    #[must_use]
    pub const fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// What a drift resolution did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftOutcome {
    /// The client is pristine; nothing was requested.
    Skipped,
    /// Sections were reloaded and merged.
    Refreshed,
    /// The reload failed or timed out; the cache was left as it was.
    Unchanged,
}

/// Reconciles the cached snapshot with the backend session.
pub struct DriftResolver {
    cache: Arc<LocalCache>,
    source: Arc<dyn SectionSource>,
    auth: Arc<AuthStatusPublisher>,
    store: Arc<CartStateStore>,
    busy: Arc<dyn BusyIndicator>,
    timeout: Duration,
}

impl std::fmt::Debug for DriftResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriftResolver")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl DriftResolver {
    /// Create a resolver. `timeout` bounds every section reload.
    #[must_use]
    pub fn new(
        cache: Arc<LocalCache>,
        source: Arc<dyn SectionSource>,
        auth: Arc<AuthStatusPublisher>,
        store: Arc<CartStateStore>,
        busy: Arc<dyn BusyIndicator>,
        timeout: Duration,
    ) -> Self {
        Self {
            cache,
            source,
            auth,
            store,
            busy,
            timeout,
        }
    }

    /// Reload `sections` and re-derive everything that depends on them.
    ///
    /// Pristine clients are skipped unless `options.force` is set. There is
    /// no locking: overlapping resolutions race on the cache blob.
    #[instrument(skip(self), fields(sections = %sections.joined()))]
    pub async fn resolve_drift(&self, sections: &SectionSet, options: DriftOptions) -> DriftOutcome {
        if self.cache.is_pristine() && !options.force {
            debug!("No commerce session has existed, skipping drift resolution");
            return DriftOutcome::Skipped;
        }

        let _busy = options.wait.then(|| BusyGuard::engage(self.busy.clone()));

        let refreshed = self.refresh_sections(sections).await;

        let state = self.auth.publish_auth_state();
        self.cache.set_logged_in_flag(state.is_logged_in());
        self.store.set_session_type(state.session_type());
        self.store.notify_all();

        if refreshed {
            DriftOutcome::Refreshed
        } else {
            DriftOutcome::Unchanged
        }
    }

    /// Reload `sections` and merge them into the cache, clearing their
    /// invalidation flags. Returns `false` if the reload failed or timed out.
    pub async fn refresh_sections(&self, sections: &SectionSet) -> bool {
        let load = self.source.load_sections(sections);
        let updates = match tokio::time::timeout(self.timeout, load).await {
            Ok(Ok(updates)) => updates,
            Ok(Err(e)) => {
                warn!(error = %e, "Section reload failed, keeping cached snapshot");
                return false;
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "Section reload timed out, keeping cached snapshot");
                return false;
            }
        };

        if self.cache.is_any_invalid(sections) {
            self.cache.clear_invalid(sections);
        }
        self.cache.merge_sections(updates);
        true
    }

    /// Resolve drift after `delay` on a background task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn defer(
        self: &Arc<Self>,
        sections: SectionSet,
        options: DriftOptions,
        delay: Duration,
    ) -> DeferredDrift {
        let resolver = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            resolver.resolve_drift(&sections, options).await
        });
        DeferredDrift { handle }
    }
}

/// A drift resolution scheduled on the runtime.
///
/// Dropping the handle does not cancel the resolution; call
/// [`cancel`](Self::cancel) for that.
#[derive(Debug)]
pub struct DeferredDrift {
    handle: JoinHandle<DriftOutcome>,
}

impl DeferredDrift {
    /// Abort the resolution. Has no effect once it has finished.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Returns `true` once the resolution has completed or been cancelled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the outcome. Returns `None` if it was cancelled.
    pub async fn join(self) -> Option<DriftOutcome> {
        match self.handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                if !e.is_cancelled() {
                    warn!(error = %e, "Deferred drift resolution failed");
                }
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{Map, Value, json};

    use super::*;
    use crate::commerce::CommerceError;
    use crate::storage::MemoryStorage;

    #[derive(Default)]
    struct FakeSource {
        calls: AtomicUsize,
        response: Mutex<Option<Map<String, Value>>>,
        delay: Option<Duration>,
    }

    impl FakeSource {
        fn returning(sections: Value) -> Self {
            Self {
                response: Mutex::new(sections.as_object().cloned()),
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SectionSource for FakeSource {
        async fn load_sections(
            &self,
            _sections: &SectionSet,
        ) -> Result<Map<String, Value>, CommerceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.response
                .lock()
                .clone()
                .ok_or(CommerceError::Status(500))
        }
    }

    #[derive(Default)]
    struct RecordingBusy(Mutex<Vec<bool>>);

    impl BusyIndicator for RecordingBusy {
        fn set_busy(&self, busy: bool) {
            self.0.lock().push(busy);
        }
    }

    struct Harness {
        cache: Arc<LocalCache>,
        store: Arc<CartStateStore>,
        busy: Arc<RecordingBusy>,
        source: Arc<FakeSource>,
        resolver: Arc<DriftResolver>,
    }

    fn harness(source: FakeSource) -> Harness {
        let storage = Arc::new(MemoryStorage::new());
        let cache = Arc::new(LocalCache::new(storage.clone(), storage));
        let store = Arc::new(CartStateStore::new(cache.clone()));
        let auth = Arc::new(AuthStatusPublisher::new(cache.clone()));
        let busy = Arc::new(RecordingBusy::default());
        let source = Arc::new(source);
        let resolver = Arc::new(DriftResolver::new(
            cache.clone(),
            source.clone(),
            auth,
            store.clone(),
            busy.clone(),
            Duration::from_secs(10),
        ));
        Harness {
            cache,
            store,
            busy,
            source,
            resolver,
        }
    }

    fn logged_in_session() -> Value {
        json!({
            "cart": { "summary_count": 2, "items": [{ "qty": 2, "product_sku": "A" }] },
            "customer": { "firstname": "Ada" },
            "side-by-side": { "cart_id": "cart-1" }
        })
    }

    #[tokio::test]
    async fn test_pristine_client_issues_no_request() {
        let h = harness(FakeSource::returning(logged_in_session()));

        let outcome = h
            .resolver
            .resolve_drift(&SectionSet::session(), DriftOptions::default())
            .await;

        assert_eq!(outcome, DriftOutcome::Skipped);
        assert_eq!(h.source.calls(), 0);
        assert!(h.busy.0.lock().is_empty());
    }

    #[tokio::test]
    async fn test_force_resolves_pristine_client() {
        let h = harness(FakeSource::returning(logged_in_session()));

        let outcome = h
            .resolver
            .resolve_drift(&SectionSet::session(), DriftOptions::default().forced(true))
            .await;

        assert_eq!(outcome, DriftOutcome::Refreshed);
        assert_eq!(h.source.calls(), 1);
        assert!(h.cache.logged_in_flag());
        assert_eq!(h.store.current_cart().total_quantity, 2);
    }

    #[tokio::test]
    async fn test_refresh_clears_invalidations_and_notifies() {
        let h = harness(FakeSource::returning(logged_in_session()));
        h.cache.mark_invalid(&SectionSet::session());

        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        h.store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = h
            .resolver
            .resolve_drift(&SectionSet::session(), DriftOptions::waiting())
            .await;

        assert_eq!(outcome, DriftOutcome::Refreshed);
        assert!(!h.cache.is_any_invalid(&SectionSet::session()));
        assert_eq!(notified.load(Ordering::SeqCst), 2);
        assert_eq!(*h.busy.0.lock(), vec![true, false]);
        assert_eq!(h.store.session_type(), cartsync_core::SessionType::Customer);
    }

    #[tokio::test]
    async fn test_failed_reload_leaves_cache_and_still_notifies() {
        let h = harness(FakeSource::default());
        h.cache.mark_invalid(&SectionSet::cart());

        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        h.store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = h
            .resolver
            .resolve_drift(&SectionSet::session(), DriftOptions::waiting())
            .await;

        assert_eq!(outcome, DriftOutcome::Unchanged);
        assert!(h.cache.is_any_invalid(&SectionSet::cart()));
        assert!(h.cache.read_snapshot().is_empty());
        assert_eq!(notified.load(Ordering::SeqCst), 2);
        assert_eq!(*h.busy.0.lock(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_reload_times_out() {
        let h = harness(FakeSource {
            delay: Some(Duration::from_secs(30)),
            ..FakeSource::returning(logged_in_session())
        });

        let outcome = h
            .resolver
            .resolve_drift(&SectionSet::session(), DriftOptions::default().forced(true))
            .await;

        assert_eq!(outcome, DriftOutcome::Unchanged);
        assert!(h.cache.is_pristine());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_drift_runs_after_delay() {
        let h = harness(FakeSource::returning(logged_in_session()));

        let deferred = h.resolver.defer(
            SectionSet::session(),
            DriftOptions::default().forced(true),
            Duration::from_millis(3000),
        );

        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert_eq!(h.source.calls(), 0);

        assert_eq!(deferred.join().await, Some(DriftOutcome::Refreshed));
        assert_eq!(h.source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_deferred_drift_never_runs() {
        let h = harness(FakeSource::returning(logged_in_session()));

        let deferred = h.resolver.defer(
            SectionSet::session(),
            DriftOptions::default().forced(true),
            Duration::from_secs(3),
        );
        deferred.cancel();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(deferred.is_finished());
        assert_eq!(deferred.join().await, None);
        assert_eq!(h.source.calls(), 0);
    }
}
