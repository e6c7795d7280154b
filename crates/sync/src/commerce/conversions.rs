//! Conversions between generated GraphQL types and crate types.
//!
//! Every cart mutation selects the same `CartFields` fragment, but
//! `graphql_client` generates a separate copy of the fragment types in each
//! operation module. `cart_fields_conversion!` implements the conversion into
//! [`CartPayload`] once per module.

use cartsync_core::wire::CartPayload;

use super::queries::{add_products_to_cart, update_cart_items};
use super::types::{CartItemInput, CartItemUpdateInput, CartUserError};

/// Round a backend `Float` quantity to a unit count.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn quantity(value: f64) -> u32 {
    value.round().clamp(0.0, f64::from(u32::MAX)) as u32
}

macro_rules! cart_fields_conversion {
    ($operation:ident) => {
        mod $operation {
            use cartsync_core::wire::{
                CartItemPayload, CartPayload, ConfiguredVariantPayload, ImagePayload,
                ItemPricesPayload, ProductPayload,
            };
            use cartsync_core::{
                BundleOption, BundleOptionValue, CartPrices, ConfigurableOption, Money,
            };

            use crate::commerce::conversions::quantity;
            use crate::commerce::queries::$operation as generated;

            fn currency(code: generated::CurrencyEnum) -> String {
                match code {
                    generated::CurrencyEnum::Other(code) => code,
                    known => format!("{known:?}"),
                }
            }

            fn money(value: Option<f64>, code: Option<generated::CurrencyEnum>) -> Money {
                Money {
                    value: value.unwrap_or_default(),
                    currency: code.map(currency),
                }
            }

            fn cart_item(item: generated::CartFieldsItems) -> CartItemPayload {
                let mut payload = CartItemPayload {
                    uid: Some(item.uid),
                    quantity: quantity(item.quantity),
                    prices: ItemPricesPayload {
                        price: item
                            .prices
                            .map(|prices| money(prices.price.value, prices.price.currency))
                            .unwrap_or_default(),
                    },
                    product: ProductPayload {
                        name: item.product.name.unwrap_or_default(),
                        sku: item.product.sku.unwrap_or_default(),
                        url: item.product.url_key,
                        thumbnail: item
                            .product
                            .thumbnail
                            .map(|thumbnail| ImagePayload { url: thumbnail.url }),
                    },
                    configurable_options: None,
                    configured_variant: None,
                    bundle_options: None,
                };

                match item.on {
                    generated::CartFieldsItemsOn::ConfigurableCartItem(configurable) => {
                        payload.configurable_options = Some(
                            configurable
                                .configurable_options
                                .into_iter()
                                .flatten()
                                .map(|option| ConfigurableOption {
                                    option_label: option.option_label,
                                    value_label: option.value_label,
                                })
                                .collect(),
                        );
                        payload.configured_variant = Some(ConfiguredVariantPayload {
                            thumbnail: configurable
                                .configured_variant
                                .thumbnail
                                .map(|thumbnail| ImagePayload { url: thumbnail.url }),
                        });
                    }
                    generated::CartFieldsItemsOn::BundleCartItem(bundle) => {
                        payload.bundle_options = Some(
                            bundle
                                .bundle_options
                                .into_iter()
                                .flatten()
                                .map(|option| BundleOption {
                                    label: option.label,
                                    values: option
                                        .values
                                        .into_iter()
                                        .flatten()
                                        .map(|value| BundleOptionValue {
                                            label: value.label,
                                            quantity: Some(value.quantity),
                                        })
                                        .collect(),
                                })
                                .collect(),
                        );
                    }
                    _ => {}
                }

                payload
            }

            impl From<generated::CartFields> for CartPayload {
                fn from(cart: generated::CartFields) -> Self {
                    Self {
                        id: Some(cart.id),
                        items: cart
                            .items
                            .unwrap_or_default()
                            .into_iter()
                            .map(|item| item.map(cart_item))
                            .collect(),
                        prices: CartPrices {
                            subtotal_excluding_tax: cart
                                .prices
                                .and_then(|prices| prices.subtotal_excluding_tax)
                                .map(|subtotal| money(subtotal.value, subtotal.currency))
                                .unwrap_or_default(),
                        },
                        total_quantity: quantity(cart.total_quantity),
                    }
                }
            }
        }
    };
}

mod fragments {
    cart_fields_conversion!(add_products_to_cart);
    cart_fields_conversion!(remove_item_from_cart);
    cart_fields_conversion!(update_cart_items);
}

// =============================================================================
// Inputs
// =============================================================================

impl From<CartItemInput> for add_products_to_cart::CartItemInput {
    fn from(input: CartItemInput) -> Self {
        let selected_options = (!input.selected_options.is_empty())
            .then(|| input.selected_options.into_iter().map(Some).collect());
        Self {
            sku: input.sku,
            quantity: f64::from(input.quantity),
            selected_options,
        }
    }
}

impl From<CartItemUpdateInput> for update_cart_items::CartItemUpdateInput {
    fn from(input: CartItemUpdateInput) -> Self {
        Self {
            cart_item_uid: Some(input.cart_item_uid),
            quantity: Some(f64::from(input.quantity)),
        }
    }
}

// =============================================================================
// User errors
// =============================================================================

impl From<add_products_to_cart::AddProductsToCartAddProductsToCartUserErrors> for CartUserError {
    fn from(error: add_products_to_cart::AddProductsToCartAddProductsToCartUserErrors) -> Self {
        let code = match error.code {
            add_products_to_cart::CartUserInputErrorType::Other(code) => code,
            known => format!("{known:?}"),
        };
        Self {
            code: Some(code),
            message: error.message,
        }
    }
}

/// Convert the `addProductsToCart` payload into the cart and its user errors.
pub(super) fn add_products_output(
    output: add_products_to_cart::AddProductsToCartAddProductsToCart,
) -> (CartPayload, Vec<CartUserError>) {
    let user_errors = output
        .user_errors
        .into_iter()
        .flatten()
        .map(CartUserError::from)
        .collect();
    (output.cart.into(), user_errors)
}
