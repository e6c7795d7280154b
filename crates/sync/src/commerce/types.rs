//! Request and response types for the commerce backend.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};

use cartsync_core::Email;
use cartsync_core::wire::CartPayload;

use super::GraphQlError;

// =============================================================================
// Cart inputs
// =============================================================================

/// A product to add to the cart (`CartItemInput`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItemInput {
    /// Product SKU.
    pub sku: String,
    /// Quantity to add.
    pub quantity: u32,
    /// Option value UIDs selected on the product page.
    pub selected_options: Vec<String>,
}

impl CartItemInput {
    /// Build an input for `quantity` units of `sku`.
    #[must_use]
    pub fn new(sku: impl Into<String>, quantity: u32) -> Self {
        Self {
            sku: sku.into(),
            quantity,
            selected_options: Vec::new(),
        }
    }

    /// Attach selected option UIDs.
    #[must_use]
    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.selected_options = options;
        self
    }
}

/// A quantity change for an existing line item (`CartItemUpdateInput`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItemUpdateInput {
    /// Line item UID.
    pub cart_item_uid: String,
    /// New quantity; zero removes the line.
    pub quantity: u32,
}

// =============================================================================
// Cart responses
// =============================================================================

/// A non-fatal error reported by `addProductsToCart`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CartUserError {
    /// Machine-readable code (e.g., `PRODUCT_NOT_FOUND`).
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

/// Outcome of a cart mutation.
///
/// GraphQL errors are returned alongside the cart rather than as an `Err`,
/// because some of them (invalid input) still come with a usable cart.
#[derive(Debug, Clone, Default)]
pub struct CartMutationResponse {
    /// The cart after the mutation, if the backend returned one.
    pub cart: Option<CartPayload>,
    /// Per-item problems reported inside the payload.
    pub user_errors: Vec<CartUserError>,
    /// Top-level GraphQL errors.
    pub errors: Vec<GraphQlError>,
}

// =============================================================================
// Login
// =============================================================================

/// Login form fields.
pub struct LoginCredentials {
    /// Customer email, sent as `username`.
    pub username: Email,
    /// Customer password.
    pub password: SecretString,
    /// Additional form fields passed through unchanged.
    pub extra: Map<String, Value>,
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("extra", &self.extra)
            .finish()
    }
}

impl LoginCredentials {
    /// Credentials with no extra form fields.
    #[must_use]
    pub fn new(username: Email, password: SecretString) -> Self {
        Self {
            username,
            password,
            extra: Map::new(),
        }
    }

    /// Request body for the AJAX login endpoint.
    pub(crate) fn to_form(&self) -> Map<String, Value> {
        let mut form = self.extra.clone();
        form.insert(
            "username".to_string(),
            Value::String(self.username.to_string()),
        );
        form.insert(
            "password".to_string(),
            Value::String(self.password.expose_secret().to_string()),
        );
        form.insert(
            "captcha_form_id".to_string(),
            Value::String("user_login".to_string()),
        );
        form.insert("context".to_string(), Value::String("checkout".to_string()));
        form
    }
}

/// Response of the AJAX login endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    /// `true` if the login was rejected.
    #[serde(default)]
    pub errors: bool,
    /// Message to show the customer.
    #[serde(default)]
    pub message: Option<String>,
    /// Any other fields the backend returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LoginResponse {
    /// Returns `true` if the backend accepted the credentials.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !self.errors
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_login_form_fields() {
        let mut credentials = LoginCredentials::new(
            Email::parse("ada@example.com").unwrap(),
            SecretString::from("hunter2".to_string()),
        );
        credentials
            .extra
            .insert("form_key".to_string(), json!("abc"));

        let form = credentials.to_form();
        assert_eq!(form["username"], json!("ada@example.com"));
        assert_eq!(form["password"], json!("hunter2"));
        assert_eq!(form["captcha_form_id"], json!("user_login"));
        assert_eq!(form["context"], json!("checkout"));
        assert_eq!(form["form_key"], json!("abc"));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = LoginCredentials::new(
            Email::parse("ada@example.com").unwrap(),
            SecretString::from("hunter2".to_string()),
        );
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }

    #[test]
    fn test_login_response() {
        let ok: LoginResponse =
            serde_json::from_value(json!({ "errors": false, "message": "Login successful." }))
                .unwrap();
        assert!(ok.is_success());

        let rejected: LoginResponse = serde_json::from_value(
            json!({ "errors": true, "message": "Invalid login or password.", "captcha": false }),
        )
        .unwrap();
        assert!(!rejected.is_success());
        assert_eq!(rejected.extra["captcha"], json!(false));
    }
}
