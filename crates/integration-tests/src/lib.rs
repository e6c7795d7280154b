//! Integration tests for cartsync.
//!
//! The tests run the real HTTP client against a `wiremock` server standing
//! in for the commerce backend.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartsync-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `section_load` - section reloads, drift resolution, backend cookies
//! - `cart_mutations` - GraphQL cart mutations and error classification
//! - `login` - AJAX login

use std::sync::Arc;

use cartsync::Storefront;
use cartsync::config::SyncConfig;
use cartsync::storage::MemoryStorage;
use url::Url;

/// Configuration pointing at a mock server.
///
/// # Panics
///
/// Panics if `uri` is not a valid URL.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn mock_config(uri: &str) -> SyncConfig {
    SyncConfig::new(Url::parse(uri).unwrap())
}

/// A storefront backed by in-memory storage and the real HTTP client.
#[must_use]
pub fn storefront(config: SyncConfig, storage: Arc<MemoryStorage>) -> Storefront {
    Storefront::builder(config).with_profile(storage).build()
}
