//! Session commands: drift resolution, login and invalidation.
//!
//! # Environment Variables
//!
//! - `COMMERCE_PASSWORD` - Password used by `login`

use cartsync::Storefront;
use cartsync::commerce::LoginCredentials;
use cartsync::drift::{DriftOptions, DriftOutcome};
use cartsync::error::SyncError;
use cartsync_core::{Email, SectionSet};
use secrecy::SecretString;
use thiserror::Error;

/// Errors that can occur during session commands.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Storefront operation failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Reload the session sections.
#[allow(clippy::print_stdout)]
pub async fn resolve(storefront: &Storefront, force: bool, wait: bool) {
    let outcome = storefront
        .resolve_drift_now(DriftOptions { wait, force })
        .await;
    match outcome {
        DriftOutcome::Skipped => {
            println!("No commerce session exists yet; nothing to resolve (use --force).");
        }
        DriftOutcome::Refreshed => println!("Sections reloaded."),
        DriftOutcome::Unchanged => println!("Reload failed; cached state kept."),
    }
    println!("Logged in: {}", storefront.is_logged_in());
}

/// Log in with the password from `COMMERCE_PASSWORD`.
///
/// # Errors
///
/// Returns an error if the password is not set, the email is invalid, or
/// the login failed.
#[allow(clippy::print_stdout)]
pub async fn login(storefront: &Storefront, username: &str) -> Result<(), SessionError> {
    let password = std::env::var("COMMERCE_PASSWORD")
        .map_err(|_| SessionError::MissingEnvVar("COMMERCE_PASSWORD"))?;
    let username = Email::parse(username).map_err(SyncError::from)?;

    let credentials = LoginCredentials::new(username, SecretString::from(password));
    let response = storefront.login(credentials).await.inspect_err(SyncError::report)?;

    println!(
        "{}",
        response.message.as_deref().unwrap_or("Logged in.")
    );
    println!("Run `cartsync resolve` to load the customer session.");
    Ok(())
}

/// Mark sections invalid.
#[allow(clippy::print_stdout)]
pub fn invalidate(storefront: &Storefront, sections: &[String]) {
    let sections: SectionSet = sections.iter().map(String::as_str).collect();
    storefront.cache().mark_invalid(&sections);
    println!("Invalidated: {}", sections.joined());
}
