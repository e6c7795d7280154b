//! cartsync core - shared types library.
//!
//! This crate provides the types passed between the cartsync components:
//! - `cartsync` - cache store, drift resolution, cart mutations
//! - `cartsync-cli` - headless driver for the public surface
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Canonical cart shape, money, cache sections, session status, emails

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
