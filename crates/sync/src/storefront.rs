//! The storefront context.
//!
//! [`Storefront`] owns one of each component and is the surface UI code
//! talks to. Construct it once with [`Storefront::builder`] and clone it
//! wherever it is needed; clones share all state.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use cartsync_core::{AuthState, Cart, Section, SectionSet};

use crate::auth::{AuthDisplay, AuthStatusPublisher};
use crate::busy::{BusyGuard, BusyIndicator, NoopBusy};
use crate::cache::{LocalCache, StorageEvents};
use crate::cart_store::CartStateStore;
use crate::commerce::{
    CartBackend, CommerceClient, LoginBackend, LoginCredentials, LoginResponse, SectionSource,
};
use crate::config::SyncConfig;
use crate::drift::{DeferredDrift, DriftOptions, DriftOutcome, DriftResolver};
use crate::error::{Result, SyncError, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::mutation::{CartService, MutationOutcome};
use crate::storage::{CookieJar, KeyValueStore, MemoryStorage};

/// UI collaborator for the cart panel (minicart).
pub trait CartPanel: Send + Sync {
    /// Open the panel if closed, close it if open.
    fn toggle(&self);

    /// Open the panel.
    fn show(&self);
}

/// Panel that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPanel;

impl CartPanel for NoopPanel {
    fn toggle(&self) {}

    fn show(&self) {}
}

/// Cart and session synchronization for one storefront client.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: SyncConfig,
    cache: Arc<LocalCache>,
    store: Arc<CartStateStore>,
    auth: Arc<AuthStatusPublisher>,
    resolver: Arc<DriftResolver>,
    cart: CartService,
    login: Arc<dyn LoginBackend>,
    busy: Arc<dyn BusyIndicator>,
    panel: Arc<dyn CartPanel>,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("base_url", &self.inner.config.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl Storefront {
    /// Start building a storefront for `config`.
    #[must_use]
    pub fn builder(config: SyncConfig) -> StorefrontBuilder {
        StorefrontBuilder::new(config)
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Returns `true` if the cached customer section carries a name.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.inner.auth.is_logged_in()
    }

    /// Log in.
    ///
    /// On success the session sections are marked invalid so the next drift
    /// resolution reloads them for the new customer.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Login`] if the backend rejected the credentials,
    /// or [`SyncError::Commerce`] if the request failed or timed out.
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(&self, credentials: LoginCredentials) -> Result<LoginResponse> {
        add_breadcrumb("auth", "Login", None);

        let response = self.inner.login.login(&credentials).await?;
        if !response.is_success() {
            let message = response
                .message
                .unwrap_or_else(|| "login rejected".to_string());
            return Err(SyncError::Login(message));
        }

        self.inner.cache.mark_invalid(&SectionSet::session());
        set_sentry_user(&credentials.username);
        info!("Customer logged in");
        Ok(response)
    }

    /// Register an account display.
    pub fn add_auth_display(&self, display: Arc<dyn AuthDisplay>) {
        self.inner.auth.add_display(display);
    }

    /// Push the current login state to every account display.
    pub fn update_authentication_displays(&self) -> AuthState {
        self.inner.auth.publish_auth_state()
    }

    /// Update account displays on every cache change.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn listen_for_auth_updates(&self) -> JoinHandle<()> {
        self.inner.auth.listen_for_auth_updates()
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// The cart as currently cached.
    #[must_use]
    pub fn current_cart(&self) -> Cart {
        self.inner.store.current_cart()
    }

    /// Register a cart subscriber. It is invoked immediately with the
    /// current cart and again on every change. There is no unsubscribe.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&Cart) + Send + Sync + 'static,
    {
        self.inner.store.subscribe(callback);
    }

    /// Register a subscriber that only receives the total item quantity.
    pub fn watch_cart_quantity<F>(&self, callback: F)
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.inner
            .store
            .subscribe(move |cart| callback(cart.total_quantity));
    }

    /// Add a product and open the cart panel.
    ///
    /// The panel only opens when the backend returned an updated cart. A
    /// reset (the cart no longer exists or belongs to another session)
    /// leaves it closed, since there is nothing new to show.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cart`] if the mutation failed.
    pub async fn add_to_cart(
        &self,
        sku: &str,
        options: Vec<String>,
        quantity: u32,
    ) -> Result<MutationOutcome> {
        let outcome = self.inner.cart.add_item(sku, options, quantity).await?;
        if matches!(outcome, MutationOutcome::Updated(_)) {
            self.inner.panel.show();
        }
        Ok(outcome)
    }

    /// Remove a line item.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cart`] if the mutation failed.
    pub async fn remove_from_cart(&self, uid: &str) -> Result<MutationOutcome> {
        Ok(self.inner.cart.remove_item(uid).await?)
    }

    /// Set the quantity of a line item.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cart`] if the mutation failed.
    pub async fn update_cart_item(&self, uid: &str, quantity: u32) -> Result<MutationOutcome> {
        Ok(self.inner.cart.update_item_quantity(uid, quantity).await?)
    }

    /// Open or close the cart panel.
    pub fn toggle_cart_panel(&self) {
        self.inner.panel.toggle();
    }

    // =========================================================================
    // Drift
    // =========================================================================

    /// Resolve drift for the session sections after `delay` (the configured
    /// default when `None`).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn resolve_drift(&self, delay: Option<Duration>, wait_for_cart: bool) -> DeferredDrift {
        let delay = delay.unwrap_or(self.inner.config.drift_delay);
        let options = DriftOptions {
            wait: wait_for_cart,
            force: false,
        };
        debug!(?delay, wait_for_cart, "Scheduling drift resolution");
        self.inner
            .resolver
            .defer(SectionSet::session(), options, delay)
    }

    /// Resolve drift for the session sections now.
    pub async fn resolve_drift_now(&self, options: DriftOptions) -> DriftOutcome {
        self.inner
            .resolver
            .resolve_drift(&SectionSet::session(), options)
            .await
    }

    /// Re-derive the cart display from the cache now and on every cache
    /// change.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn update_cart_display(&self, wait_for_cart: bool) -> JoinHandle<()> {
        self.update_cart_from_cache(wait_for_cart);
        let storefront = self.clone();
        self.inner.cache.listen(move |_| {
            storefront.update_cart_from_cache(wait_for_cart);
        })
    }

    /// Re-derive the cart display from the cache.
    ///
    /// A session that was logged in and is now logged out has ended on the
    /// server, so its cart is reset. Nothing happens while no cart section is
    /// cached.
    pub fn update_cart_from_cache(&self, wait_for_cart: bool) {
        let _busy = wait_for_cart.then(|| BusyGuard::engage(self.inner.busy.clone()));

        let snapshot = self.inner.cache.read_snapshot();
        if snapshot.section(Section::CART).is_none() {
            debug!("No cached cart, keeping the default display");
            return;
        }

        let was_logged_in = self.inner.cache.logged_in_flag();
        let logged_in = snapshot.has_customer_name();
        if !logged_in && was_logged_in {
            info!("Customer session ended, resetting cart");
            clear_sentry_user();
            self.inner.store.reset();
        }

        self.inner.cache.set_logged_in_flag(logged_in);
        self.inner
            .store
            .set_session_type(AuthState::from_logged_in(logged_in).session_type());
        self.inner.store.notify_all();
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The configuration this storefront was built with.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// The local cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<LocalCache> {
        &self.inner.cache
    }

    /// The cart state store.
    #[must_use]
    pub fn cart_store(&self) -> &Arc<CartStateStore> {
        &self.inner.store
    }
}

/// Builder for [`Storefront`].
///
/// Every collaborator has a default: in-memory storage, no-op UI toggles,
/// and a [`CommerceClient`] for the network, whose session cookies live in
/// the configured cookie jar.
pub struct StorefrontBuilder {
    config: SyncConfig,
    storage: Option<Arc<dyn KeyValueStore>>,
    cookies: Option<Arc<dyn CookieJar>>,
    events: Option<StorageEvents>,
    busy: Arc<dyn BusyIndicator>,
    panel: Arc<dyn CartPanel>,
    displays: Vec<Arc<dyn AuthDisplay>>,
    sections: Option<Arc<dyn SectionSource>>,
    backend: Option<Arc<dyn CartBackend>>,
    login: Option<Arc<dyn LoginBackend>>,
}

impl std::fmt::Debug for StorefrontBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StorefrontBuilder {
    fn new(config: SyncConfig) -> Self {
        Self {
            config,
            storage: None,
            cookies: None,
            events: None,
            busy: Arc::new(NoopBusy),
            panel: Arc::new(NoopPanel),
            displays: Vec::new(),
            sections: None,
            backend: None,
            login: None,
        }
    }

    /// Use `profile` for both key/value storage and cookies.
    #[must_use]
    pub fn with_profile<P>(self, profile: Arc<P>) -> Self
    where
        P: KeyValueStore + CookieJar + 'static,
    {
        self.with_storage(profile.clone()).with_cookies(profile)
    }

    /// Key/value storage for the section cache.
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Cookie jar for the freshness and cart-ID cookies and the backend
    /// session.
    #[must_use]
    pub fn with_cookies(mut self, cookies: Arc<dyn CookieJar>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    /// Share a storage-change channel with other storefronts over the same
    /// storage.
    #[must_use]
    pub fn with_events(mut self, events: StorageEvents) -> Self {
        self.events = Some(events);
        self
    }

    /// Busy indicator.
    #[must_use]
    pub fn with_busy(mut self, busy: Arc<dyn BusyIndicator>) -> Self {
        self.busy = busy;
        self
    }

    /// Cart panel.
    #[must_use]
    pub fn with_panel(mut self, panel: Arc<dyn CartPanel>) -> Self {
        self.panel = panel;
        self
    }

    /// Account display. May be called more than once.
    #[must_use]
    pub fn with_auth_display(mut self, display: Arc<dyn AuthDisplay>) -> Self {
        self.displays.push(display);
        self
    }

    /// Section source, replacing the HTTP client.
    #[must_use]
    pub fn with_section_source(mut self, sections: Arc<dyn SectionSource>) -> Self {
        self.sections = Some(sections);
        self
    }

    /// Cart backend, replacing the HTTP client.
    #[must_use]
    pub fn with_cart_backend(mut self, backend: Arc<dyn CartBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Login backend, replacing the HTTP client.
    #[must_use]
    pub fn with_login_backend(mut self, login: Arc<dyn LoginBackend>) -> Self {
        self.login = Some(login);
        self
    }

    /// Assemble the storefront.
    #[must_use]
    pub fn build(self) -> Storefront {
        let memory = Arc::new(MemoryStorage::new());
        let storage: Arc<dyn KeyValueStore> = match self.storage {
            Some(storage) => storage,
            None => memory.clone(),
        };
        let cookies: Arc<dyn CookieJar> = match self.cookies {
            Some(cookies) => cookies,
            None => memory,
        };

        let mut cache = LocalCache::new(storage, cookies.clone())
            .with_secure_cookies(self.config.secure_cookies());
        if let Some(events) = self.events {
            cache = cache.with_events(events);
        }
        let cache = Arc::new(cache);

        let client = Arc::new(CommerceClient::with_cookie_jar(&self.config, cookies));
        let sections: Arc<dyn SectionSource> = match self.sections {
            Some(sections) => sections,
            None => client.clone(),
        };
        let backend: Arc<dyn CartBackend> = match self.backend {
            Some(backend) => backend,
            None => client.clone(),
        };
        let login: Arc<dyn LoginBackend> = match self.login {
            Some(login) => login,
            None => client,
        };

        let store = Arc::new(CartStateStore::new(cache.clone()));
        let auth = Arc::new(AuthStatusPublisher::new(cache.clone()));
        for display in self.displays {
            auth.add_display(display);
        }

        let resolver = Arc::new(DriftResolver::new(
            cache.clone(),
            sections,
            auth.clone(),
            store.clone(),
            self.busy.clone(),
            self.config.section_timeout,
        ));
        let cart = CartService::new(
            cache.clone(),
            store.clone(),
            backend,
            resolver.clone(),
            self.busy.clone(),
        );

        Storefront {
            inner: Arc::new(StorefrontInner {
                config: self.config,
                cache,
                store,
                auth,
                resolver,
                cart,
                login,
                busy: self.busy,
                panel: self.panel,
            }),
        }
    }
}
