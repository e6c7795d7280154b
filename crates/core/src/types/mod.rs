//! Core types for cartsync.
//!
//! This module provides the canonical cart and the session vocabulary shared
//! by every component.

pub mod cart;
pub mod email;
pub mod price;
pub mod section;
pub mod status;

pub use cart::{
    BundleOption, BundleOptionValue, Cart, CartItem, CartPrices, ConfigurableOption,
    VariantOptions, wire,
};
pub use email::{Email, EmailError};
pub use price::Money;
pub use section::{Section, SectionSet};
pub use status::{AuthState, SessionType};
