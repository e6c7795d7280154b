//! Cart projection.
//!
//! The `cart` section written by the commerce platform and the cart returned
//! by GraphQL mutations have different shapes. Both are normalized into the
//! canonical [`Cart`] here, once, so nothing downstream ever sees a raw shape.
//!
//! The shape is decided by a discriminator: a section payload always carries
//! at least one of `summary_count`, `subtotalAmount` or `data_id`, none of
//! which exist in the GraphQL fragment.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use cartsync_core::wire::CartPayload;
use cartsync_core::{
    BundleOption, BundleOptionValue, Cart, CartItem, CartPrices, ConfigurableOption, Money,
    VariantOptions,
};

/// Fields that only occur in the section shape.
const SECTION_MARKERS: [&str; 3] = ["summary_count", "subtotalAmount", "data_id"];

/// Errors that can occur while decoding a raw cart.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The payload is not a JSON object.
    #[error("cart payload is not an object")]
    NotAnObject,

    /// The payload does not match the detected shape.
    #[error("cart payload does not match its shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// A raw cart in one of the two shapes the projection understands.
#[derive(Debug, Clone)]
pub enum RawCart {
    /// GraphQL `CartFields` fragment, as returned by cart mutations.
    Backend(CartPayload),
    /// The `cart` section of the local cache.
    Section(CartSection),
}

impl RawCart {
    /// Decode a raw cart, choosing the shape by its discriminating fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an object or does not fit the
    /// shape it was identified as.
    pub fn detect(value: &Value) -> Result<Self, ProjectionError> {
        let object = value.as_object().ok_or(ProjectionError::NotAnObject)?;
        if SECTION_MARKERS.iter().any(|marker| object.contains_key(*marker)) {
            Ok(Self::Section(CartSection::deserialize(value)?))
        } else {
            Ok(Self::Backend(CartPayload::deserialize(value)?))
        }
    }
}

/// Normalize a decoded raw cart.
#[must_use]
pub fn project(raw: RawCart) -> Cart {
    match raw {
        RawCart::Backend(payload) => payload.into(),
        RawCart::Section(section) => section.into(),
    }
}

/// Normalize an optional raw cart value.
///
/// Absent or undecodable input yields the empty placeholder cart; this
/// function never fails.
#[must_use]
pub fn project_cart(value: Option<&Value>) -> Cart {
    let Some(value) = value.filter(|value| !value.is_null()) else {
        return Cart::default();
    };
    match RawCart::detect(value) {
        Ok(raw) => project(raw),
        Err(e) => {
            warn!(error = %e, "Could not project cart, using empty cart");
            Cart::default()
        }
    }
}

// =============================================================================
// Section shape
// =============================================================================

/// `cart` section of the local cache.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CartSection {
    /// Section data ID, used as the cart ID of the projection.
    #[serde(default, deserialize_with = "lenient_string")]
    pub data_id: Option<String>,
    /// Number of units in the cart.
    #[serde(default, deserialize_with = "lenient_u32")]
    pub summary_count: u32,
    /// Cart subtotal.
    #[serde(default, rename = "subtotalAmount", deserialize_with = "lenient_f64")]
    pub subtotal_amount: f64,
    /// Line items.
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<SectionItem>,
}

/// A line item in the `cart` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionItem {
    /// Quote item ID.
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_id: Option<String>,
    /// Product SKU.
    #[serde(default)]
    pub product_sku: String,
    /// Product name.
    #[serde(default)]
    pub product_name: String,
    /// Product page URL.
    #[serde(default)]
    pub product_url: Option<String>,
    /// Product image.
    #[serde(default)]
    pub product_image: Option<SectionImage>,
    /// Unit price.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub product_price_value: f64,
    /// Quantity.
    #[serde(default, deserialize_with = "lenient_u32")]
    pub qty: u32,
    /// Product type (`simple`, `configurable`, `bundle`, ...).
    #[serde(default)]
    pub product_type: Option<String>,
    /// Selected options; interpretation depends on `product_type`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<SectionOption>,
}

/// `product_image` of a section item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionImage {
    /// Image URL.
    #[serde(default)]
    pub src: Option<String>,
}

/// A selected option of a section item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionOption {
    /// Option name.
    #[serde(default)]
    pub label: String,
    /// A single label for configurable items, a list of selections for bundles.
    #[serde(default)]
    pub value: Value,
}

impl SectionOption {
    fn into_configurable(self) -> ConfigurableOption {
        ConfigurableOption {
            option_label: self.label,
            value_label: value_label(&self.value),
        }
    }

    fn into_bundle(self) -> BundleOption {
        let values = match self.value {
            Value::Array(values) => values.iter().filter_map(bundle_value).collect(),
            Value::Null => Vec::new(),
            other => bundle_value(&other).into_iter().collect(),
        };
        BundleOption {
            label: self.label,
            values,
        }
    }
}

fn value_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn bundle_value(value: &Value) -> Option<BundleOptionValue> {
    match value {
        Value::Object(object) => Some(BundleOptionValue {
            label: object.get("label").map(value_label).unwrap_or_default(),
            quantity: object.get("quantity").and_then(number_from_value),
        }),
        Value::Null => None,
        other => Some(BundleOptionValue {
            label: value_label(other),
            quantity: None,
        }),
    }
}

impl From<SectionItem> for CartItem {
    fn from(item: SectionItem) -> Self {
        let variant_options = match item.product_type.as_deref() {
            Some("bundle") if !item.options.is_empty() => Some(VariantOptions::Bundle(
                item.options.into_iter().map(SectionOption::into_bundle).collect(),
            )),
            Some("configurable") if !item.options.is_empty() => {
                Some(VariantOptions::Configurable(
                    item.options
                        .into_iter()
                        .map(SectionOption::into_configurable)
                        .collect(),
                ))
            }
            _ => None,
        };

        Self {
            uid: None,
            sku: item.product_sku,
            name: item.product_name,
            url: item.product_url,
            thumbnail_url: item.product_image.and_then(|image| image.src),
            quantity: item.qty,
            unit_price: Money::new(item.product_price_value),
            variant_options,
        }
    }
}

impl From<CartSection> for Cart {
    fn from(section: CartSection) -> Self {
        Self {
            id: section.data_id,
            items: section.items.into_iter().map(Into::into).collect(),
            total_quantity: section.summary_count,
            prices: CartPrices {
                subtotal_excluding_tax: Money::new(section.subtotal_amount),
            },
        }
    }
}

// =============================================================================
// Lenient scalars
// =============================================================================
//
// The platform renders section data from PHP templates; numbers frequently
// arrive as strings ("3", "9.99") and IDs as either.

fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(number_from_value(&Value::deserialize(deserializer)?).unwrap_or_default())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = number_from_value(&Value::deserialize(deserializer)?).unwrap_or_default();
    // Negative and non-finite quantities clamp to zero.
    Ok(value.clamp(0.0, f64::from(u32::MAX)) as u32)
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
