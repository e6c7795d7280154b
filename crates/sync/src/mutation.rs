//! Cart mutation service.
//!
//! Runs add/remove/update against the GraphQL backend and reconciles the
//! result with local state:
//!
//! 1. Errors are classified by `extensions.category`. A missing or
//!    inaccessible cart resets the cart store; rejected input is logged and
//!    the returned cart is used as-is; anything else fails the call.
//! 2. `null` placeholder items are dropped.
//! 3. `total_quantity` is recomputed from the surviving items, since the
//!    backend sometimes reports a stale total after adding a single item.
//! 4. The `cart` section is reloaded so other tabs see the change, and
//!    subscribers are notified.
//!
//! Mutations are not idempotent and are never retried; a caller retrying
//! after a timeout may add an item twice.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use cartsync_core::{Cart, SectionSet};

use crate::busy::{BusyGuard, BusyIndicator};
use crate::cart_store::{CART_ID_COOKIE_DAYS, CartStateStore};
use crate::cache::LocalCache;
use crate::commerce::{
    CartBackend, CartItemInput, CartItemUpdateInput, CartMutationResponse, CommerceError,
    ErrorCategory, GraphQlError, format_graphql_errors,
};
use crate::drift::DriftResolver;
use crate::error::add_breadcrumb;

/// Errors that can occur during a cart mutation.
#[derive(Debug, Error)]
pub enum CartError {
    /// The request did not complete.
    #[error("transport error: {0}")]
    Transport(#[from] CommerceError),

    /// The backend reported errors that cannot be recovered locally.
    #[error("backend errors: {}", format_graphql_errors(.0))]
    Backend(Vec<GraphQlError>),

    /// No cart ID is known and none could be created.
    #[error("no cart is available")]
    NoCart,

    /// The backend answered without a cart and without errors.
    #[error("backend returned no cart")]
    EmptyResponse,
}

/// Result of a successful mutation call.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// The mutation was applied; this is the cart the backend returned,
    /// with placeholders dropped and the total corrected.
    Updated(Cart),
    /// The backend rejected the cart itself; local cart state was reset.
    Reset,
}

/// How a set of GraphQL errors is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handling {
    Proceed,
    Reset,
    ProceedWithWarning,
    Fail,
}

/// Classify errors, most severe recoverable category first.
fn classify(errors: &[GraphQlError]) -> Handling {
    if errors.is_empty() {
        return Handling::Proceed;
    }
    let any = |category: ErrorCategory| errors.iter().any(|e| e.category() == category);
    if any(ErrorCategory::NoSuchEntity) || any(ErrorCategory::Authorization) {
        Handling::Reset
    } else if any(ErrorCategory::Input) {
        Handling::ProceedWithWarning
    } else {
        Handling::Fail
    }
}

/// Performs cart mutations and reconciles their results.
pub struct CartService {
    cache: Arc<LocalCache>,
    store: Arc<CartStateStore>,
    backend: Arc<dyn CartBackend>,
    resolver: Arc<DriftResolver>,
    busy: Arc<dyn BusyIndicator>,
}

impl std::fmt::Debug for CartService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartService").finish_non_exhaustive()
    }
}

impl CartService {
    /// Create a service.
    #[must_use]
    pub fn new(
        cache: Arc<LocalCache>,
        store: Arc<CartStateStore>,
        backend: Arc<dyn CartBackend>,
        resolver: Arc<DriftResolver>,
        busy: Arc<dyn BusyIndicator>,
    ) -> Self {
        Self {
            cache,
            store,
            backend,
            resolver,
            busy,
        }
    }

    /// Add `quantity` units of `sku` with the given selected option UIDs.
    ///
    /// If no cart ID is known, the session sections are reloaded first; if
    /// that still yields none, a session cart is created.
    ///
    /// # Errors
    ///
    /// Returns an error if no cart can be obtained, the request fails, or the
    /// backend reports an unrecoverable error.
    #[instrument(skip(self, options), fields(sku = %sku, quantity = quantity))]
    pub async fn add_item(
        &self,
        sku: &str,
        options: Vec<String>,
        quantity: u32,
    ) -> Result<MutationOutcome, CartError> {
        add_breadcrumb("cart", "Add to cart", Some(&[("sku", sku)]));

        let (cart_id, created) = self.obtain_cart_id().await?;
        let _busy = BusyGuard::engage(self.busy.clone());

        let token = self.store.token();
        let items = vec![CartItemInput::new(sku, quantity).with_options(options)];
        let response = self
            .backend
            .add_products_to_cart(&cart_id, items, token.as_deref())
            .await
            .inspect_err(|e| warn!(error = %e, "Add to cart request failed"))?;

        let refresh = if created {
            SectionSet::session()
        } else {
            SectionSet::cart()
        };
        self.reconcile(response, &refresh).await
    }

    /// Remove a line item.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NoCart`] if no cart ID is known, or an error if
    /// the request fails or the backend reports an unrecoverable error.
    #[instrument(skip(self), fields(uid = %uid))]
    pub async fn remove_item(&self, uid: &str) -> Result<MutationOutcome, CartError> {
        add_breadcrumb("cart", "Remove from cart", Some(&[("uid", uid)]));

        let cart_id = self.store.cart_id().ok_or(CartError::NoCart)?;
        let _busy = BusyGuard::engage(self.busy.clone());

        let token = self.store.token();
        let response = self
            .backend
            .remove_item_from_cart(&cart_id, uid, token.as_deref())
            .await
            .inspect_err(|e| warn!(error = %e, "Remove from cart request failed"))?;

        self.reconcile(response, &SectionSet::cart()).await
    }

    /// Set the quantity of a line item. A quantity of zero removes it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NoCart`] if no cart ID is known, or an error if
    /// the request fails or the backend reports an unrecoverable error.
    #[instrument(skip(self), fields(uid = %uid, quantity = quantity))]
    pub async fn update_item_quantity(
        &self,
        uid: &str,
        quantity: u32,
    ) -> Result<MutationOutcome, CartError> {
        add_breadcrumb("cart", "Update cart item", Some(&[("uid", uid)]));

        let cart_id = self.store.cart_id().ok_or(CartError::NoCart)?;
        let _busy = BusyGuard::engage(self.busy.clone());

        let token = self.store.token();
        let items = vec![CartItemUpdateInput {
            cart_item_uid: uid.to_string(),
            quantity,
        }];
        let response = self
            .backend
            .update_cart_items(&cart_id, items, token.as_deref())
            .await
            .inspect_err(|e| warn!(error = %e, "Update cart request failed"))?;

        self.reconcile(response, &SectionSet::cart()).await
    }

    /// Known cart ID, or one obtained by reloading the session or creating a
    /// session cart. The flag is `true` when the cart was just created.
    async fn obtain_cart_id(&self) -> Result<(String, bool), CartError> {
        if let Some(id) = self.store.cart_id() {
            return Ok((id, false));
        }

        debug!("No cart ID known, reloading session sections");
        self.resolver.refresh_sections(&SectionSet::session()).await;
        if let Some(id) = self.store.cart_id() {
            return Ok((id, false));
        }

        debug!("Session has no cart, creating one");
        let token = self.store.token();
        let id = self
            .backend
            .create_session_cart(token.as_deref())
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to create session cart");
                CartError::NoCart
            })?;
        self.cache.remember_cart_id(&id, CART_ID_COOKIE_DAYS);
        Ok((id, true))
    }

    async fn reconcile(
        &self,
        response: CartMutationResponse,
        refresh: &SectionSet,
    ) -> Result<MutationOutcome, CartError> {
        match classify(&response.errors) {
            Handling::Proceed => {}
            Handling::Reset => {
                error!(
                    errors = %format_graphql_errors(&response.errors),
                    "Cart does not exist or is not accessible, resetting cart"
                );
                self.store.reset();
                return Ok(MutationOutcome::Reset);
            }
            Handling::ProceedWithWarning => {
                warn!(
                    errors = %format_graphql_errors(&response.errors),
                    "Some items in the cart might not be available anymore"
                );
            }
            Handling::Fail => {
                let err = CartError::Backend(response.errors);
                let event_id = sentry::capture_error(&err);
                error!(error = %err, sentry_event_id = %event_id, "Cart mutation failed");
                return Err(err);
            }
        }

        for user_error in &response.user_errors {
            warn!(
                code = user_error.code.as_deref().unwrap_or("UNKNOWN"),
                message = %user_error.message,
                "Cart item rejected"
            );
        }

        let Some(payload) = response.cart else {
            error!("Cart mutation returned no cart");
            return Err(CartError::EmptyResponse);
        };

        let placeholders = payload.placeholder_count();
        if placeholders > 0 {
            debug!(placeholders, "Dropping placeholder items");
        }

        let mut cart: Cart = payload.into();
        let counted = cart.items_quantity();
        if counted != cart.total_quantity {
            debug!(
                reported = cart.total_quantity,
                counted, "Correcting cart total quantity"
            );
            cart.total_quantity = counted;
        }

        self.resolver.refresh_sections(refresh).await;
        self.store.notify_all();

        Ok(MutationOutcome::Updated(cart))
    }
}
