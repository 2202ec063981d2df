//! Key lifecycle admin binary.
//!
//! # Usage
//!
//! ```bash
//! # List the committed key set
//! keymint --db keys.redb list
//!
//! # Rotate master and refresh keys older than an hour
//! keymint --db keys.redb rotate-master --min-age-seconds 3600
//!
//! # First key for a brand-new site
//! keymint --db keys.redb add-site-key --site-id 125
//! ```
//!
//! Results are printed as JSON arrays of key records (never including the
//! secret); audit hashes of mutated records go to the log.

#![allow(clippy::print_stdout, reason = "CLI results belong on stdout")]

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use keymint_core::{KeyListing, KeySchedule, RotationPolicy, RotationResult};
use keymint_service::{KeyAdminService, RedbKeyStore, SystemEnv, WriteLock};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Key lifecycle admin tool
#[derive(Parser, Debug)]
#[command(name = "keymint")]
#[command(about = "Encryption key lifecycle administration")]
#[command(version)]
struct Args {
    /// Path to the key database
    #[arg(long, default_value = "keymint.redb")]
    db: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Master/refresh key activation delay in seconds
    #[arg(long, default_value_t = 3_600)]
    master_activates_in_seconds: u64,

    /// Master/refresh key validity window in seconds, from activation
    #[arg(long, default_value_t = 7_200)]
    master_expires_after_seconds: u64,

    /// Site key activation delay in seconds
    #[arg(long, default_value_t = 36_000)]
    site_activates_in_seconds: u64,

    /// Site key validity window in seconds, from activation
    #[arg(long, default_value_t = 72_000)]
    site_expires_after_seconds: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the committed key set, ordered by site and activation time
    List,

    /// Rotate the master and refresh keys
    RotateMaster {
        /// Only rotate keys activated more than this many seconds ago
        #[arg(long, default_value_t = 0)]
        min_age_seconds: u64,

        /// Rotate regardless of key age
        #[arg(long)]
        force: bool,
    },

    /// Rotate one site's key
    RotateSite {
        /// Site to rotate
        #[arg(long)]
        site_id: i32,

        /// Only rotate keys activated more than this many seconds ago
        #[arg(long, default_value_t = 0)]
        min_age_seconds: u64,

        /// Rotate regardless of key age
        #[arg(long)]
        force: bool,
    },

    /// Rotate every tenant site's key
    RotateAllSites {
        /// Only rotate keys activated more than this many seconds ago
        #[arg(long, default_value_t = 0)]
        min_age_seconds: u64,

        /// Rotate regardless of key age
        #[arg(long)]
        force: bool,
    },

    /// Mint the first key for a brand-new site
    AddSiteKey {
        /// Site to mint for
        #[arg(long)]
        site_id: i32,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    // Invalid policy configuration is fatal before any storage is touched.
    let schedule = KeySchedule::new(
        RotationPolicy::new(
            Duration::from_secs(args.master_activates_in_seconds),
            Duration::from_secs(args.master_expires_after_seconds),
        )?,
        RotationPolicy::new(
            Duration::from_secs(args.site_activates_in_seconds),
            Duration::from_secs(args.site_expires_after_seconds),
        )?,
    );

    let store = RedbKeyStore::open(&args.db)?;
    let service = KeyAdminService::new(SystemEnv::new(), store, schedule, WriteLock::new());

    match args.command {
        Command::List => {
            let listings = service.list_keys()?;
            print_listings(&listings)?;
        },

        Command::RotateMaster { min_age_seconds, force } => {
            let result =
                service.rotate_master_keys(Duration::from_secs(min_age_seconds), force)?;
            print_rotation(&result)?;
        },

        Command::RotateSite { site_id, min_age_seconds, force } => {
            let result =
                service.rotate_site_key(site_id, Duration::from_secs(min_age_seconds), force)?;
            print_rotation(&result)?;
        },

        Command::RotateAllSites { min_age_seconds, force } => {
            let result =
                service.rotate_all_site_keys(Duration::from_secs(min_age_seconds), force)?;
            print_rotation(&result)?;
        },

        Command::AddSiteKey { site_id } => {
            let key = service.add_site_key(site_id)?;
            print_listings(&[KeyListing::from(&key)])?;
        },
    }

    Ok(())
}

fn print_rotation(result: &RotationResult) -> Result<(), serde_json::Error> {
    tracing::info!(
        considered = result.considered_sites.len(),
        rotated = result.rotated.len(),
        "rotation complete"
    );

    let listings: Vec<KeyListing> = result.rotated.iter().map(KeyListing::from).collect();
    print_listings(&listings)
}

fn print_listings(listings: &[KeyListing]) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(listings)?);
    Ok(())
}
