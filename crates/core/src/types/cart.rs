//! The canonical cart.
//!
//! Every cart that reaches a subscriber has this shape, whether it was
//! projected from the local section cache or returned by a GraphQL mutation.
//!
//! # Wire format
//!
//! [`Cart`] serializes to (and deserializes from) the GraphQL `CartFields`
//! fragment shape described in [`wire`]. Feeding a serialized cart back into
//! the projection therefore yields the same cart again.

use serde::{Deserialize, Serialize};

use super::price::Money;

/// Cart-level price totals.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CartPrices {
    /// Subtotal before tax.
    #[serde(default)]
    pub subtotal_excluding_tax: Money,
}

/// A configurable product option (e.g., "Size: M").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurableOption {
    /// Option name.
    pub option_label: String,
    /// Selected value.
    pub value_label: String,
}

/// A single selection inside a bundle option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleOptionValue {
    /// Display label of the selection.
    pub label: String,
    /// Quantity of the selection, when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
}

/// A bundle option with its selected values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleOption {
    /// Option name.
    pub label: String,
    /// Selected values.
    #[serde(default)]
    pub values: Vec<BundleOptionValue>,
}

/// Item-level variant information.
///
/// Configurable and bundle options are mutually exclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum VariantOptions {
    /// Options of a configurable product.
    Configurable(Vec<ConfigurableOption>),
    /// Options of a bundle product.
    Bundle(Vec<BundleOption>),
}

/// A line item in the canonical cart.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    /// Backend line item ID (absent for items projected from the section cache).
    pub uid: Option<String>,
    /// Product SKU.
    pub sku: String,
    /// Product name.
    pub name: String,
    /// Product page URL or URL key.
    pub url: Option<String>,
    /// Thumbnail image URL.
    pub thumbnail_url: Option<String>,
    /// Quantity in the cart.
    pub quantity: u32,
    /// Price of a single unit.
    pub unit_price: Money,
    /// Variant information for configurable and bundle products.
    pub variant_options: Option<VariantOptions>,
}

/// The canonical cart shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "wire::CartPayload", into = "wire::CartPayload")]
pub struct Cart {
    /// Cart identifier (`None` for the empty placeholder cart).
    pub id: Option<String>,
    /// Line items.
    pub items: Vec<CartItem>,
    /// Total number of units across all line items.
    pub total_quantity: u32,
    /// Cart-level totals.
    pub prices: CartPrices,
}

impl Cart {
    /// Sum of the quantities of all line items.
    #[must_use]
    pub fn items_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Returns `true` if the cart holds no line items.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// GraphQL `CartFields` fragment shape.
///
/// These types mirror the backend response one-to-one. Line items are
/// nullable because the backend returns `null` placeholders for rejected
/// items; converting into a [`Cart`] drops them.
pub mod wire {
    use serde::{Deserialize, Serialize};

    use super::{BundleOption, CartPrices, ConfigurableOption, Money, VariantOptions};

    /// URL wrapper used by `thumbnail { url }`.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct ImagePayload {
        /// Image URL.
        #[serde(default)]
        pub url: Option<String>,
    }

    /// `product { ... }` on a cart item.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct ProductPayload {
        /// Product name.
        #[serde(default)]
        pub name: String,
        /// Product SKU.
        #[serde(default)]
        pub sku: String,
        /// Product URL (the GraphQL fragment reports `url_key`).
        #[serde(default, alias = "url_key", skip_serializing_if = "Option::is_none")]
        pub url: Option<String>,
        /// Product thumbnail.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub thumbnail: Option<ImagePayload>,
    }

    /// `prices { price { ... } }` on a cart item.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct ItemPricesPayload {
        /// Unit price.
        #[serde(default)]
        pub price: Money,
    }

    /// `configured_variant { thumbnail { url } }` on configurable items.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct ConfiguredVariantPayload {
        /// Variant thumbnail.
        #[serde(default)]
        pub thumbnail: Option<ImagePayload>,
    }

    /// A cart line item.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct CartItemPayload {
        /// Line item ID.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub uid: Option<String>,
        /// Quantity.
        #[serde(default)]
        pub quantity: u32,
        /// Line prices.
        #[serde(default)]
        pub prices: ItemPricesPayload,
        /// Product details.
        #[serde(default)]
        pub product: ProductPayload,
        /// Options of a configurable item.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub configurable_options: Option<Vec<ConfigurableOption>>,
        /// Selected variant of a configurable item.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub configured_variant: Option<ConfiguredVariantPayload>,
        /// Options of a bundle item.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub bundle_options: Option<Vec<BundleOption>>,
    }

    /// The cart as returned by `cart`, `addProductsToCart`, `updateCartItems`
    /// and `removeItemFromCart`.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct CartPayload {
        /// Masked cart ID.
        #[serde(default)]
        pub id: Option<String>,
        /// Line items, possibly containing `null` placeholders.
        #[serde(default)]
        pub items: Vec<Option<CartItemPayload>>,
        /// Cart-level totals.
        #[serde(default)]
        pub prices: CartPrices,
        /// Total quantity as reported by the backend.
        #[serde(default)]
        pub total_quantity: u32,
    }

    impl CartPayload {
        /// Number of `null` placeholder items.
        #[must_use]
        pub fn placeholder_count(&self) -> usize {
            self.items.iter().filter(|item| item.is_none()).count()
        }
    }

    impl From<CartItemPayload> for super::CartItem {
        fn from(item: CartItemPayload) -> Self {
            let variant_thumbnail = item
                .configured_variant
                .and_then(|variant| variant.thumbnail)
                .and_then(|thumbnail| thumbnail.url);
            let product_thumbnail = item.product.thumbnail.and_then(|thumbnail| thumbnail.url);

            let variant_options = match (item.bundle_options, item.configurable_options) {
                (Some(bundle), _) if !bundle.is_empty() => Some(VariantOptions::Bundle(bundle)),
                (_, Some(configurable)) if !configurable.is_empty() => {
                    Some(VariantOptions::Configurable(configurable))
                }
                _ => None,
            };

            Self {
                uid: item.uid,
                sku: item.product.sku,
                name: item.product.name,
                url: item.product.url,
                thumbnail_url: variant_thumbnail.or(product_thumbnail),
                quantity: item.quantity,
                unit_price: item.prices.price,
                variant_options,
            }
        }
    }

    impl From<super::CartItem> for CartItemPayload {
        fn from(item: super::CartItem) -> Self {
            let (configurable_options, bundle_options) = match item.variant_options {
                Some(VariantOptions::Configurable(options)) => (Some(options), None),
                Some(VariantOptions::Bundle(options)) => (None, Some(options)),
                None => (None, None),
            };

            Self {
                uid: item.uid,
                quantity: item.quantity,
                prices: ItemPricesPayload {
                    price: item.unit_price,
                },
                product: ProductPayload {
                    name: item.name,
                    sku: item.sku,
                    url: item.url,
                    thumbnail: item.thumbnail_url.map(|url| ImagePayload { url: Some(url) }),
                },
                configurable_options,
                configured_variant: None,
                bundle_options,
            }
        }
    }

    impl From<CartPayload> for super::Cart {
        fn from(payload: CartPayload) -> Self {
            Self {
                id: payload.id,
                items: payload.items.into_iter().flatten().map(Into::into).collect(),
                total_quantity: payload.total_quantity,
                prices: payload.prices,
            }
        }
    }

    impl From<super::Cart> for CartPayload {
        fn from(cart: super::Cart) -> Self {
            Self {
                id: cart.id,
                items: cart.items.into_iter().map(|item| Some(item.into())).collect(),
                prices: cart.prices,
                total_quantity: cart.total_quantity,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn graphql_cart() -> serde_json::Value {
        json!({
            "id": "masked-123",
            "items": [
                {
                    "uid": "MQ==",
                    "quantity": 2,
                    "prices": { "price": { "value": 12.5, "currency": "USD" } },
                    "product": {
                        "name": "Tee",
                        "sku": "TEE-M",
                        "url_key": "tee",
                        "thumbnail": { "url": "/tee.jpg" }
                    },
                    "configurable_options": [
                        { "option_label": "Size", "value_label": "M" }
                    ],
                    "configured_variant": { "thumbnail": { "url": "/tee-m.jpg" } }
                },
                null
            ],
            "prices": { "subtotal_excluding_tax": { "value": 25.0, "currency": "USD" } },
            "total_quantity": 2
        })
    }

    #[test]
    fn test_deserialize_graphql_cart_drops_null_items() {
        let cart: Cart = serde_json::from_value(graphql_cart()).unwrap();

        assert_eq!(cart.id.as_deref(), Some("masked-123"));
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total_quantity, 2);
        assert_eq!(cart.prices.subtotal_excluding_tax.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_item_fields_are_flattened() {
        let cart: Cart = serde_json::from_value(graphql_cart()).unwrap();
        let item = &cart.items[0];

        assert_eq!(item.uid.as_deref(), Some("MQ=="));
        assert_eq!(item.sku, "TEE-M");
        assert_eq!(item.name, "Tee");
        assert_eq!(item.url.as_deref(), Some("tee"));
        assert_eq!(item.quantity, 2);
        assert!((item.unit_price.value - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_configured_variant_thumbnail_wins() {
        let cart: Cart = serde_json::from_value(graphql_cart()).unwrap();
        assert_eq!(cart.items[0].thumbnail_url.as_deref(), Some("/tee-m.jpg"));
    }

    #[test]
    fn test_bundle_options_take_precedence_over_configurable() {
        let payload = json!({
            "items": [{
                "quantity": 1,
                "product": { "name": "Kit", "sku": "KIT" },
                "bundle_options": [
                    { "label": "Pick", "values": [{ "label": "Red", "quantity": 1.0 }] }
                ],
                "configurable_options": [
                    { "option_label": "Size", "value_label": "M" }
                ]
            }],
            "total_quantity": 1
        });
        let cart: Cart = serde_json::from_value(payload).unwrap();

        assert!(matches!(
            cart.items[0].variant_options,
            Some(VariantOptions::Bundle(_))
        ));
    }

    #[test]
    fn test_serialized_cart_reads_back_identically() {
        let cart: Cart = serde_json::from_value(graphql_cart()).unwrap();
        let again: Cart = serde_json::from_value(serde_json::to_value(&cart).unwrap()).unwrap();
        assert_eq!(cart, again);
    }

    #[test]
    fn test_default_cart_is_empty() {
        let cart = Cart::default();
        assert!(cart.is_empty());
        assert_eq!(cart.id, None);
        assert_eq!(cart.total_quantity, 0);
    }

    #[test]
    fn test_items_quantity() {
        let cart: Cart = serde_json::from_value(json!({
            "items": [
                { "quantity": 2, "product": { "name": "A", "sku": "A" } },
                { "quantity": 3, "product": { "name": "B", "sku": "B" } }
            ],
            "total_quantity": 1
        }))
        .unwrap();
        assert_eq!(cart.items_quantity(), 5);
    }

    #[test]
    fn test_placeholder_count() {
        let payload: wire::CartPayload = serde_json::from_value(graphql_cart()).unwrap();
        assert_eq!(payload.placeholder_count(), 1);
    }
}
