//! Commerce backend client.
//!
//! # Endpoints
//!
//! - `GET /customer/section/load/` - fresh section payloads for the session
//! - `POST /customer/ajax/login/` - AJAX customer login
//! - `POST /graphql` - cart mutations
//!
//! The drift resolver and the mutation service depend on the
//! [`SectionSource`] and [`CartBackend`] traits rather than on
//! [`CommerceClient`] itself, so either side can be replaced in tests or by
//! another transport.

mod conversions;
mod cookies;
pub mod queries;
pub mod types;

pub use cookies::SessionCookies;
pub use types::*;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use graphql_client::{GraphQLQuery, Response};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use cartsync_core::SectionSet;

use crate::config::SyncConfig;
use crate::storage::CookieJar;

use queries::{
    AddProductsToCart, CreateSessionCart, RemoveItemFromCart, UpdateCartItems,
    add_products_to_cart, create_session_cart, remove_item_from_cart, update_cart_items,
};

/// `Accept` header the platform's own section loader sends.
const SECTION_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";

/// Errors that can occur when talking to the commerce backend.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The request was aborted after its timeout.
    #[error("{0} request timed out")]
    Timeout(&'static str),

    /// The backend answered with a non-success status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The response lacked a required part.
    #[error("response is missing {0}")]
    MissingData(&'static str),
}

/// Error category from `extensions.category`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    /// `graphql-no-such-entity`: the cart does not exist.
    NoSuchEntity,
    /// `graphql-authorization`: the session may not access the cart.
    Authorization,
    /// `graphql-input`: some input (typically a product) was rejected.
    Input,
    /// Any other category.
    Other(String),
    /// No category was reported.
    Unknown,
}

impl ErrorCategory {
    fn parse(category: Option<&str>) -> Self {
        match category {
            Some("graphql-no-such-entity") => Self::NoSuchEntity,
            Some("graphql-authorization") => Self::Authorization,
            Some("graphql-input") => Self::Input,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Unknown,
        }
    }
}

/// A GraphQL error returned by the commerce backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphQlError {
    /// Error message.
    pub message: String,
    /// Path to the failing field.
    pub path: Vec<String>,
    /// Raw `extensions.category`, if any.
    pub category: Option<String>,
}

impl GraphQlError {
    /// An error with only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
            category: None,
        }
    }

    /// Attach an `extensions.category`.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Classified category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::parse(self.category.as_deref())
    }
}

impl fmt::Display for GraphQlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if !self.path.is_empty() {
            write!(f, " path: {}", self.path.join("."))?;
        }
        if let Some(category) = &self.category {
            write!(f, " [{category}]")?;
        }
        Ok(())
    }
}

impl From<graphql_client::Error> for GraphQlError {
    fn from(error: graphql_client::Error) -> Self {
        let category = error
            .extensions
            .as_ref()
            .and_then(|extensions| extensions.get("category"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let path = error.path.map_or_else(Vec::new, |path| {
            path.into_iter()
                .map(|fragment| match fragment {
                    graphql_client::PathFragment::Key(key) => key,
                    graphql_client::PathFragment::Index(index) => index.to_string(),
                })
                .collect()
        });
        Self {
            message: error.message,
            path,
            category,
        }
    }
}

/// Format GraphQL errors for display.
#[must_use]
pub fn format_graphql_errors(errors: &[GraphQlError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Collaborator traits
// =============================================================================

/// Source of fresh section payloads.
#[async_trait]
pub trait SectionSource: Send + Sync {
    /// Load `sections` for the current session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is not a JSON
    /// object.
    async fn load_sections(
        &self,
        sections: &SectionSet,
    ) -> Result<Map<String, Value>, CommerceError>;
}

/// GraphQL cart operations.
///
/// `token` is the bearer token from the `side-by-side` section, when present.
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// Create (or fetch) the cart of the current session and return its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or no ID is returned.
    async fn create_session_cart(&self, token: Option<&str>) -> Result<String, CommerceError>;

    /// Add products to a cart.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure. GraphQL errors are reported in
    /// the response.
    async fn add_products_to_cart(
        &self,
        cart_id: &str,
        items: Vec<CartItemInput>,
        token: Option<&str>,
    ) -> Result<CartMutationResponse, CommerceError>;

    /// Remove a line item from a cart.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    async fn remove_item_from_cart(
        &self,
        cart_id: &str,
        uid: &str,
        token: Option<&str>,
    ) -> Result<CartMutationResponse, CommerceError>;

    /// Change line item quantities.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    async fn update_cart_items(
        &self,
        cart_id: &str,
        items: Vec<CartItemUpdateInput>,
        token: Option<&str>,
    ) -> Result<CartMutationResponse, CommerceError>;
}

/// Customer login endpoint.
#[async_trait]
pub trait LoginBackend: Send + Sync {
    /// Submit credentials for the current session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or times out. Rejected
    /// credentials are reported in the response.
    async fn login(&self, credentials: &LoginCredentials) -> Result<LoginResponse, CommerceError>;
}

// =============================================================================
// CommerceClient
// =============================================================================

/// HTTP client for the commerce backend.
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
}

struct CommerceClientInner {
    client: reqwest::Client,
    section_url: Url,
    login_url: Url,
    graphql_url: Url,
    store_code: String,
    login_timeout: Duration,
    graphql_timeout: Duration,
}

impl fmt::Debug for CommerceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommerceClient")
            .field("graphql_url", &self.inner.graphql_url.as_str())
            .field("store_code", &self.inner.store_code)
            .finish_non_exhaustive()
    }
}

/// Result of a GraphQL call that reached the backend.
struct GraphQlReply<T> {
    data: Option<T>,
    errors: Vec<GraphQlError>,
}

impl CommerceClient {
    /// Create a client with its own in-memory cookie store.
    #[must_use]
    pub fn new(config: &SyncConfig) -> Self {
        let client = reqwest::Client::builder().cookie_store(true).build();
        Self::with_http_client(config, client)
    }

    /// Create a client whose session cookies live in `jar`.
    #[must_use]
    pub fn with_cookie_jar(config: &SyncConfig, jar: Arc<dyn CookieJar>) -> Self {
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::new(SessionCookies::new(jar)))
            .build();
        Self::with_http_client(config, client)
    }

    fn with_http_client(config: &SyncConfig, client: reqwest::Result<reqwest::Client>) -> Self {
        let client = client.unwrap_or_else(|e| {
            warn!(
                error = %e,
                "Failed to build commerce HTTP client; backend session cookies will not persist"
            );
            reqwest::Client::default()
        });
        Self {
            inner: Arc::new(CommerceClientInner {
                client,
                section_url: config.section_load_url(),
                login_url: config.login_url(),
                graphql_url: config.graphql_url(),
                store_code: config.store_code.clone(),
                login_timeout: config.login_timeout,
                graphql_timeout: config.graphql_timeout,
            }),
        }
    }

    /// Execute a GraphQL operation.
    ///
    /// Non-success statuses are tolerated when the body still carries a
    /// GraphQL response, since some backends report authorization failures
    /// that way. The request is aborted after the configured GraphQL timeout.
    async fn execute<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
        token: Option<&str>,
    ) -> Result<GraphQlReply<Q::ResponseData>, CommerceError> {
        let request_body = Q::build_query(variables);

        let mut request = self
            .inner
            .client
            .post(self.inner.graphql_url.clone())
            .header("Content-Type", "application/json")
            .json(&request_body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let (status, response_text) = tokio::time::timeout(self.inner.graphql_timeout, async move {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, CommerceError>((status, text))
        })
        .await
        .map_err(|_| CommerceError::Timeout("graphql"))??;

        let response: Response<Q::ResponseData> = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(_) if !status.is_success() => {
                tracing::error!(
                    status = %status,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Commerce GraphQL returned non-success status"
                );
                return Err(CommerceError::Status(status.as_u16()));
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse commerce GraphQL response"
                );
                return Err(CommerceError::Parse(e));
            }
        };

        let errors: Vec<GraphQlError> = response
            .errors
            .unwrap_or_default()
            .into_iter()
            .map(GraphQlError::from)
            .collect();

        if !errors.is_empty() {
            debug!(errors = ?errors, "GraphQL errors in response");
        }

        if response.data.is_none() && errors.is_empty() {
            return Err(CommerceError::MissingData("data"));
        }

        Ok(GraphQlReply {
            data: response.data,
            errors,
        })
    }

    /// Log in with the AJAX login endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, times out, or the response is
    /// not a login result. Rejected credentials are not an error; check
    /// [`LoginResponse::is_success`].
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<LoginResponse, CommerceError> {
        let request = self
            .inner
            .client
            .post(self.inner.login_url.clone())
            .header("Content-Type", "application/json")
            .header("Store", &self.inner.store_code)
            .header("X-Requested-With", "XMLHttpRequest")
            .json(&credentials.to_form());

        let response = tokio::time::timeout(self.inner.login_timeout, async move {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, CommerceError>((status, text))
        })
        .await
        .map_err(|_| CommerceError::Timeout("login"))??;

        let (status, text) = response;
        match serde_json::from_str::<LoginResponse>(&text) {
            Ok(result) => Ok(result),
            Err(_) if !status.is_success() => Err(CommerceError::Status(status.as_u16())),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl LoginBackend for CommerceClient {
    async fn login(&self, credentials: &LoginCredentials) -> Result<LoginResponse, CommerceError> {
        Self::login(self, credentials).await
    }
}

#[async_trait]
impl SectionSource for CommerceClient {
    #[instrument(skip(self), fields(sections = %sections.joined()))]
    async fn load_sections(
        &self,
        sections: &SectionSet,
    ) -> Result<Map<String, Value>, CommerceError> {
        let mut url = self.inner.section_url.clone();
        url.query_pairs_mut()
            .append_pair("sections", &sections.joined())
            .append_pair("force_new_section_timestamp", "false");

        let response = self
            .inner
            .client
            .get(url)
            .header("Accept", SECTION_ACCEPT)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CommerceError::Status(status.as_u16()));
        }

        match response.json::<Value>().await? {
            Value::Object(sections) => Ok(sections),
            _ => Err(CommerceError::MissingData("section map")),
        }
    }
}

#[async_trait]
impl CartBackend for CommerceClient {
    #[instrument(skip(self, token))]
    async fn create_session_cart(&self, token: Option<&str>) -> Result<String, CommerceError> {
        let reply = self
            .execute::<CreateSessionCart>(create_session_cart::Variables, token)
            .await?;
        reply
            .data
            .and_then(|data| data.cart_id)
            .filter(|id| !id.is_empty())
            .ok_or(CommerceError::MissingData("cart ID"))
    }

    #[instrument(skip(self, items, token), fields(cart_id = %cart_id, items = items.len()))]
    async fn add_products_to_cart(
        &self,
        cart_id: &str,
        items: Vec<CartItemInput>,
        token: Option<&str>,
    ) -> Result<CartMutationResponse, CommerceError> {
        let variables = add_products_to_cart::Variables {
            cart_id: cart_id.to_string(),
            cart_items: items.into_iter().map(Into::into).collect(),
        };
        let reply = self.execute::<AddProductsToCart>(variables, token).await?;
        let (cart, user_errors) = reply
            .data
            .and_then(|data| data.add_products_to_cart)
            .map(conversions::add_products_output)
            .map_or((None, Vec::new()), |(cart, user_errors)| (Some(cart), user_errors));

        Ok(CartMutationResponse {
            cart,
            user_errors,
            errors: reply.errors,
        })
    }

    #[instrument(skip(self, token), fields(cart_id = %cart_id, uid = %uid))]
    async fn remove_item_from_cart(
        &self,
        cart_id: &str,
        uid: &str,
        token: Option<&str>,
    ) -> Result<CartMutationResponse, CommerceError> {
        let variables = remove_item_from_cart::Variables {
            cart_id: cart_id.to_string(),
            uid: uid.to_string(),
        };
        let reply = self.execute::<RemoveItemFromCart>(variables, token).await?;

        Ok(CartMutationResponse {
            cart: reply
                .data
                .and_then(|data| data.remove_item_from_cart)
                .map(|output| output.cart.into()),
            user_errors: Vec::new(),
            errors: reply.errors,
        })
    }

    #[instrument(skip(self, items, token), fields(cart_id = %cart_id, items = items.len()))]
    async fn update_cart_items(
        &self,
        cart_id: &str,
        items: Vec<CartItemUpdateInput>,
        token: Option<&str>,
    ) -> Result<CartMutationResponse, CommerceError> {
        let variables = update_cart_items::Variables {
            cart_id: cart_id.to_string(),
            items: items.into_iter().map(Into::into).collect(),
        };
        let reply = self.execute::<UpdateCartItems>(variables, token).await?;

        Ok(CartMutationResponse {
            cart: reply
                .data
                .and_then(|data| data.update_cart_items)
                .map(|output| output.cart.into()),
            user_errors: Vec::new(),
            errors: reply.errors,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_error_category_parsing() {
        assert_eq!(
            GraphQlError::new("x").with_category("graphql-no-such-entity").category(),
            ErrorCategory::NoSuchEntity
        );
        assert_eq!(
            GraphQlError::new("x").with_category("graphql-authorization").category(),
            ErrorCategory::Authorization
        );
        assert_eq!(
            GraphQlError::new("x").with_category("graphql-input").category(),
            ErrorCategory::Input
        );
        assert_eq!(
            GraphQlError::new("x").with_category("internal").category(),
            ErrorCategory::Other("internal".to_string())
        );
        assert_eq!(GraphQlError::new("x").category(), ErrorCategory::Unknown);
    }

    #[test]
    fn test_from_graphql_client_error() {
        let raw: graphql_client::Error = serde_json::from_value(json!({
            "message": "Could not find a cart with ID \"abc\"",
            "path": ["addProductsToCart", 0],
            "extensions": { "category": "graphql-no-such-entity" }
        }))
        .unwrap();

        let error = GraphQlError::from(raw);
        assert_eq!(error.category(), ErrorCategory::NoSuchEntity);
        assert_eq!(error.path, vec!["addProductsToCart", "0"]);
    }

    #[test]
    fn test_format_graphql_errors() {
        assert_eq!(format_graphql_errors(&[]), "(no error details provided)");

        let errors = vec![
            GraphQlError::new("first").with_category("graphql-input"),
            GraphQlError {
                message: "second".to_string(),
                path: vec!["cart".to_string(), "items".to_string()],
                category: None,
            },
        ];
        assert_eq!(
            format_graphql_errors(&errors),
            "first [graphql-input]; second path: cart.items"
        );
    }

    #[test]
    fn test_client_build_failure_falls_back_to_default_client() {
        let config = SyncConfig::new(Url::parse("https://shop.example.com").unwrap());
        let failed = reqwest::Client::builder().user_agent("bad\nagent").build();
        assert!(failed.is_err());

        let client = CommerceClient::with_http_client(&config, failed);
        assert_eq!(client.inner.graphql_url.as_str(), "https://shop.example.com/graphql");
        assert_eq!(client.inner.graphql_timeout, config.graphql_timeout);
    }

    #[test]
    fn test_commerce_error_messages() {
        assert_eq!(
            CommerceError::Timeout("login").to_string(),
            "login request timed out"
        );
        assert_eq!(
            CommerceError::Timeout("graphql").to_string(),
            "graphql request timed out"
        );
        assert_eq!(
            CommerceError::Status(503).to_string(),
            "unexpected HTTP status 503"
        );
    }
}
