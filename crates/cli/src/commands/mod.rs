//! CLI command implementations.

pub mod cart;
pub mod session;
pub mod status;

use cartsync::busy::BusyIndicator;
use cartsync_core::Cart;

/// Busy indicator that logs instead of disabling controls.
pub struct TerminalBusy;

impl BusyIndicator for TerminalBusy {
    fn set_busy(&self, busy: bool) {
        if busy {
            tracing::info!("Waiting for cart...");
        } else {
            tracing::debug!("Cart ready");
        }
    }
}

/// Print a cart as a table of line items.
#[allow(clippy::print_stdout)]
pub fn print_cart(cart: &Cart) {
    println!(
        "Cart {} ({} items, subtotal {})",
        cart.id.as_deref().unwrap_or("-"),
        cart.total_quantity,
        cart.prices.subtotal_excluding_tax.display()
    );
    for item in &cart.items {
        println!(
            "  {:>3} x {:<20} {:<30} {:>10}  uid={}",
            item.quantity,
            item.sku,
            item.name,
            item.unit_price.display(),
            item.uid.as_deref().unwrap_or("-")
        );
    }
}
