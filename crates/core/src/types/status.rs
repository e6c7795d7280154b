//! Session and authentication status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether the cart belongs to a guest or a registered customer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    /// Anonymous visitor.
    #[default]
    Guest,
    /// Logged-in customer.
    Customer,
}

impl SessionType {
    /// Get the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Customer => "customer",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary login state applied to account displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthState {
    /// A customer name is present in the cached customer section.
    LoggedIn,
    /// No customer name is cached.
    LoggedOut,
}

impl AuthState {
    /// Build from a logged-in flag.
    #[must_use]
    pub const fn from_logged_in(logged_in: bool) -> Self {
        if logged_in {
            Self::LoggedIn
        } else {
            Self::LoggedOut
        }
    }

    /// Returns `true` for [`AuthState::LoggedIn`].
    #[must_use]
    pub const fn is_logged_in(self) -> bool {
        matches!(self, Self::LoggedIn)
    }

    /// Display class for this state (`logged-in` / `logged-out`).
    #[must_use]
    pub const fn as_class(self) -> &'static str {
        match self {
            Self::LoggedIn => "logged-in",
            Self::LoggedOut => "logged-out",
        }
    }

    /// Session type implied by this state.
    #[must_use]
    pub const fn session_type(self) -> SessionType {
        match self {
            Self::LoggedIn => SessionType::Customer,
            Self::LoggedOut => SessionType::Guest,
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_class())
    }
}
