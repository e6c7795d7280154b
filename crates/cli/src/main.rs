//! cartsync CLI - drive the storefront sync layer from a terminal.
//!
//! State (the section cache, its cookies and the backend session cookies)
//! lives in a JSON profile file, so consecutive invocations behave like one
//! browser.
//!
//! # Usage
//!
//! ```bash
//! # Show the cached cart and session state
//! cartsync status
//!
//! # Reload the session sections from the backend
//! cartsync resolve --force
//!
//! # Add two units of a product
//! cartsync add --sku WIDGET-1 --qty 2
//!
//! # Log in (password from COMMERCE_PASSWORD)
//! cartsync login --username ada@example.com
//! ```
//!
//! # Environment Variables
//!
//! - `COMMERCE_BASE_URL` - Origin of the commerce backend (required)
//! - `COMMERCE_PASSWORD` - Password for `login`
//! - `CARTSYNC_PROFILE` - Profile file (default `.cartsync-profile.json`)
//! - `SENTRY_DSN` - Error tracking

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::sync::Arc;

use cartsync::Storefront;
use cartsync::config::SyncConfig;
use cartsync::storage::FileProfile;
use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "cartsync")]
#[command(author, version, about = "Storefront cart and session sync")]
struct Cli {
    /// Profile file holding cached sections and cookies
    #[arg(
        long,
        env = "CARTSYNC_PROFILE",
        default_value = ".cartsync-profile.json",
        global = true
    )]
    profile: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the cached cart and session state
    Status,
    /// Reload the session sections from the backend
    Resolve {
        /// Resolve even if no commerce session has ever existed
        #[arg(long)]
        force: bool,

        /// Do not engage the busy indicator
        #[arg(long)]
        no_wait: bool,
    },
    /// Add a product to the cart
    Add {
        /// Product SKU
        #[arg(short, long)]
        sku: String,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1)]
        qty: u32,

        /// Selected option UID (repeatable)
        #[arg(short, long = "option")]
        options: Vec<String>,
    },
    /// Remove a line item
    Remove {
        /// Line item UID
        #[arg(short, long)]
        uid: String,
    },
    /// Change the quantity of a line item
    Update {
        /// Line item UID
        #[arg(short, long)]
        uid: String,

        /// New quantity
        #[arg(short, long)]
        qty: u32,
    },
    /// Log in with the AJAX login endpoint
    Login {
        /// Customer email
        #[arg(short, long)]
        username: String,
    },
    /// Mark sections invalid so the next resolve reloads them
    Invalidate {
        /// Section names
        #[arg(required = true)]
        sections: Vec<String>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &SyncConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Map tracing levels to Sentry: errors and warnings become events, the rest
/// breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cartsync=info,cartsync_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    let profile = Arc::new(FileProfile::new(cli.profile));
    let storefront = Storefront::builder(config)
        .with_profile(profile)
        .with_busy(Arc::new(commands::TerminalBusy))
        .build();

    match cli.command {
        Commands::Status => commands::status::show(&storefront),
        Commands::Resolve { force, no_wait } => {
            commands::session::resolve(&storefront, force, !no_wait).await;
        }
        Commands::Add { sku, qty, options } => {
            commands::cart::add(&storefront, &sku, options, qty).await?;
        }
        Commands::Remove { uid } => commands::cart::remove(&storefront, &uid).await?,
        Commands::Update { uid, qty } => commands::cart::update(&storefront, &uid, qty).await?,
        Commands::Login { username } => commands::session::login(&storefront, &username).await?,
        Commands::Invalidate { sections } => commands::session::invalidate(&storefront, &sections),
    }
    Ok(())
}
