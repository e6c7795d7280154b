//! Cart mutation commands.

use cartsync::Storefront;
use cartsync::error::SyncError;
use cartsync::mutation::MutationOutcome;

use super::print_cart;

#[allow(clippy::print_stdout)]
fn report(outcome: &MutationOutcome) {
    match outcome {
        MutationOutcome::Updated(cart) => print_cart(cart),
        MutationOutcome::Reset => {
            println!("The cart was no longer valid and has been reset.");
        }
    }
}

/// Add a product to the cart.
///
/// # Errors
///
/// Returns an error if the mutation failed.
pub async fn add(
    storefront: &Storefront,
    sku: &str,
    options: Vec<String>,
    quantity: u32,
) -> Result<(), SyncError> {
    tracing::info!("Adding {quantity} x {sku}");
    let outcome = storefront.add_to_cart(sku, options, quantity).await?;
    report(&outcome);
    Ok(())
}

/// Remove a line item.
///
/// # Errors
///
/// Returns an error if the mutation failed.
pub async fn remove(storefront: &Storefront, uid: &str) -> Result<(), SyncError> {
    tracing::info!("Removing line item {uid}");
    let outcome = storefront.remove_from_cart(uid).await?;
    report(&outcome);
    Ok(())
}

/// Change a line item quantity.
///
/// # Errors
///
/// Returns an error if the mutation failed.
pub async fn update(storefront: &Storefront, uid: &str, quantity: u32) -> Result<(), SyncError> {
    tracing::info!("Setting line item {uid} to {quantity}");
    let outcome = storefront.update_cart_item(uid, quantity).await?;
    report(&outcome);
    Ok(())
}
