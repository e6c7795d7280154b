//! Monetary amounts as reported by the commerce backend.
//!
//! The backend and the section cache both report prices as plain JSON numbers
//! (the section cache occasionally as numeric strings), so amounts are kept as
//! `f64` and only formatted for display.

use serde::{Deserialize, Serialize};

/// A monetary amount with an optional ISO 4217 currency code.
///
/// The section cache never carries a currency, so `currency` is only present
/// on carts that came from a GraphQL response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    #[serde(default)]
    pub value: f64,
    /// ISO 4217 currency code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl Money {
    /// Create an amount without currency information.
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self {
            value,
            currency: None,
        }
    }

    /// Attach a currency code.
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Format for display (e.g., "9.99 USD", or "9.99" when the currency is unknown).
    #[must_use]
    pub fn display(&self) -> String {
        self.currency.as_ref().map_or_else(
            || format!("{:.2}", self.value),
            |code| format!("{:.2} {code}", self.value),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_currency() {
        assert_eq!(Money::new(9.5).display(), "9.50");
    }

    #[test]
    fn test_display_with_currency() {
        assert_eq!(Money::new(19.99).with_currency("USD").display(), "19.99 USD");
    }

    #[test]
    fn test_missing_currency_is_not_serialized() {
        let json = serde_json::to_value(Money::new(1.0)).unwrap_or_default();
        assert_eq!(json, serde_json::json!({ "value": 1.0 }));
    }
}
