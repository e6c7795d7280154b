//! cartsync - storefront cart and session synchronization.
//!
//! Keeps a locally cached snapshot of the commerce backend's `cart`,
//! `customer` and `side-by-side` sections consistent with the server
//! session, exposes a small observable API for cart and account widgets, and
//! performs cart mutations against the GraphQL backend.
//!
//! # Architecture
//!
//! - [`cache`] - the externally-owned key/value snapshot, its timeout,
//!   invalidation set and freshness cookie
//! - [`drift`] - decides when the snapshot may be trusted and refreshes it
//! - [`projection`] - normalizes the two raw cart shapes into [`Cart`]
//! - [`cart_store`] - observable holder of the projected cart
//! - [`mutation`] - add/remove/update with error classification and
//!   total-quantity correction
//! - [`auth`] - login status derived from the cached customer section
//! - [`storefront`] - the context object wiring everything together
//!
//! Storage, cookies, the network and the UI toggles are collaborators behind
//! traits ([`storage`], [`commerce`], [`busy`]).
//!
//! [`Cart`]: cartsync_core::Cart

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod busy;
pub mod cache;
pub mod cart_store;
pub mod commerce;
pub mod config;
pub mod drift;
pub mod error;
pub mod mutation;
pub mod projection;
pub mod storage;
pub mod storefront;

pub use storefront::{Storefront, StorefrontBuilder};
