//! Show cached state.

use cartsync::Storefront;
use cartsync_core::Section;

use super::print_cart;

/// Print login state, cache freshness and the cached cart.
#[allow(clippy::print_stdout)]
pub fn show(storefront: &Storefront) {
    let cache = storefront.cache();
    let store = storefront.cart_store();

    println!("Logged in:    {}", storefront.is_logged_in());
    println!("Session type: {}", store.session_type());
    println!("Cart ID:      {}", store.cart_id().as_deref().unwrap_or("-"));
    println!("Pristine:     {}", cache.is_pristine());
    println!("Expired:      {}", cache.is_expired());

    let invalid: Vec<&str> = [Section::CART, Section::CUSTOMER, Section::SIDE_BY_SIDE]
        .into_iter()
        .filter(|name| cache.is_any_invalid(&std::iter::once(*name).collect()))
        .collect();
    if !invalid.is_empty() {
        println!("Invalidated:  {}", invalid.join(", "));
    }

    println!();
    print_cart(&storefront.current_cart());
}
