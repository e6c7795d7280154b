//! Auth status publisher.
//!
//! Login state is never stored on its own; it is read off the cached
//! `customer` section every time and pushed to whatever account displays the
//! embedding UI registers.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use cartsync_core::AuthState;

use crate::cache::{LocalCache, StorageEvent};

/// UI collaborator that renders the login state (account icon, greeting, ...).
pub trait AuthDisplay: Send + Sync {
    /// Show `state`.
    fn apply(&self, state: AuthState);
}

/// Derives login state from the cache and publishes it to account displays.
pub struct AuthStatusPublisher {
    cache: Arc<LocalCache>,
    displays: Mutex<Vec<Arc<dyn AuthDisplay>>>,
}

impl std::fmt::Debug for AuthStatusPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStatusPublisher")
            .field("displays", &self.displays.lock().len())
            .finish_non_exhaustive()
    }
}

impl AuthStatusPublisher {
    /// Create a publisher with no displays.
    #[must_use]
    pub fn new(cache: Arc<LocalCache>) -> Self {
        Self {
            cache,
            displays: Mutex::new(Vec::new()),
        }
    }

    /// Returns `true` if the cached customer section carries a first name.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.cache.read_snapshot().has_customer_name()
    }

    /// Current login state.
    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        AuthState::from_logged_in(self.is_logged_in())
    }

    /// Register a display.
    pub fn add_display(&self, display: Arc<dyn AuthDisplay>) {
        self.displays.lock().push(display);
    }

    /// Apply the current login state to every display and return it.
    pub fn publish_auth_state(&self) -> AuthState {
        let state = self.auth_state();
        let displays = self.displays.lock().clone();
        debug!(%state, displays = displays.len(), "Publishing auth state");
        for display in &displays {
            display.apply(state);
        }
        state
    }

    /// Invoke `callback` whenever the cache blob changes, whichever section
    /// changed and whichever handle wrote it.
    pub fn listen_for_changes<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: Fn(&StorageEvent) + Send + 'static,
    {
        self.cache.listen(callback)
    }

    /// Republish the login state on every cache change.
    pub fn listen_for_auth_updates(self: &Arc<Self>) -> JoinHandle<()> {
        let publisher = Arc::clone(self);
        self.listen_for_changes(move |_| {
            publisher.publish_auth_state();
        })
    }
}
