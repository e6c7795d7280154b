//! Unified error handling with Sentry integration.
//!
//! [`SyncError`] is the error of the public [`Storefront`](crate::Storefront)
//! surface. Component errors convert into it with `?`.
//!
//! Sentry helpers are safe to call without an initialised client; they are
//! no-ops in that case.

use thiserror::Error;

use cartsync_core::{Email, EmailError};

use crate::commerce::CommerceError;
use crate::config::ConfigError;
use crate::mutation::CartError;
use crate::storage::StorageError;

/// Error type for the storefront surface.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Commerce backend request failed.
    #[error("Commerce error: {0}")]
    Commerce(#[from] CommerceError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Persistent storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid email address.
    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    /// The backend rejected the login.
    #[error("Login rejected: {0}")]
    Login(String),
}

impl SyncError {
    /// Report the error to Sentry and log it.
    ///
    /// Rejected logins and invalid input are expected outcomes and are only
    /// logged.
    pub fn report(&self) {
        if matches!(self, Self::Login(_) | Self::Email(_)) {
            tracing::warn!(error = %self, "Storefront operation rejected");
            return;
        }
        let event_id = sentry::capture_error(self);
        tracing::error!(
            error = %self,
            sentry_event_id = %event_id,
            "Storefront operation failed"
        );
    }
}

/// Result type alias for `SyncError`.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Set the Sentry user context after a successful login.
pub fn set_sentry_user(email: &Email) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            email: Some(email.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this when the session is found to be logged out.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a cart or session action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_display() {
        let err = SyncError::Login("Invalid login or password.".to_string());
        assert_eq!(err.to_string(), "Login rejected: Invalid login or password.");

        let err = SyncError::from(CommerceError::Timeout("login"));
        assert_eq!(err.to_string(), "Commerce error: login request timed out");

        let err = SyncError::from(CartError::NoCart);
        assert_eq!(err.to_string(), "Cart error: no cart is available");
    }

    #[test]
    fn test_sentry_helpers_without_client() {
        add_breadcrumb("cart", "Added item", Some(&[("sku", "A")]));
        set_sentry_user(&Email::parse("ada@example.com").unwrap());
        clear_sentry_user();
        SyncError::from(CartError::NoCart).report();
    }
}
