//! MeetingDir CLI
//!
//! Command-line front end to the geocoding client.

#![allow(clippy::print_stdout)]

mod settings;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use integration_geocoding::{GeocodeResult, GeocodingClient, GeocodingConfig, NominatimGeocodingClient};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// MeetingDir CLI
#[derive(Parser)]
#[command(name = "meetingdir-cli")]
#[command(author, version, about = "MeetingDir geocoding CLI", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a TOML config file (default: ./geocoding.toml if present)
    #[arg(short, long, global = true, env = "MEETINGDIR_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Flags that override individual configuration fields
#[derive(clap::Args, Debug, Default)]
struct Overrides {
    /// Nominatim base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Retries after the first failed attempt
    #[arg(long, global = true)]
    retries: Option<u32>,

    /// Per-request timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Comma-separated country codes to bias results (e.g. "us,ca")
    #[arg(long, global = true)]
    country_codes: Option<String>,

    /// Identifying User-Agent sent with every request
    #[arg(long, global = true)]
    user_agent: Option<String>,
}

impl Overrides {
    fn apply(self, config: &mut GeocodingConfig) {
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(retries) = self.retries {
            config.options.retries = retries;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.options.timeout_ms = timeout_ms;
        }
        if let Some(country_codes) = self.country_codes {
            config.options.country_codes = Some(country_codes);
        }
        if let Some(user_agent) = self.user_agent {
            config.options.user_agent = user_agent;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve an address to coordinates
    Geocode {
        /// Free-form address
        address: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve coordinates to an address
    #[command(allow_negative_numbers = true)]
    Reverse {
        /// Latitude in degrees
        latitude: f64,

        /// Longitude in degrees
        longitude: f64,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve many addresses, one request per rate-limit window
    ///
    /// Example: meetingdir-cli batch "Times Square, New York" "Alexanderplatz, Berlin"
    /// Example: meetingdir-cli batch --file addresses.txt --detailed
    Batch {
        /// Addresses to resolve
        addresses: Vec<String>,

        /// Read additional addresses from a file, one per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Report failed addresses instead of dropping them
        #[arg(long)]
        detailed: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Non-empty, trimmed lines; `#` starts a comment line
fn parse_address_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn print_result(result: &GeocodeResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("📍 {result}");
        if let Some(confidence) = result.confidence {
            println!("   Confidence: {confidence:.3}");
        }
        if let Some(address) = &result.address {
            let line = address.format_line();
            if !line.is_empty() {
                println!("   Address: {line}");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = log_filter_from_verbosity(cli.verbose);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut geocoding = settings::load_config(cli.config.as_deref())
        .context("Failed to load geocoding configuration")?;
    cli.overrides.apply(&mut geocoding);
    geocoding
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid geocoding configuration: {e}"))?;

    if matches!(cli.command, Commands::Config) {
        print!("{}", toml::to_string_pretty(&geocoding)?);
        return Ok(());
    }

    let client = NominatimGeocodingClient::new(&geocoding)?;
    info!(base_url = %geocoding.base_url, "Geocoding client ready");

    match cli.command {
        Commands::Geocode { address, json } => {
            let result = client.geocode(&address).await?;
            print_result(&result, json)?;
        },

        Commands::Reverse {
            latitude,
            longitude,
            json,
        } => {
            let result = client.reverse_geocode(latitude, longitude).await?;
            print_result(&result, json)?;
        },

        Commands::Batch {
            mut addresses,
            file,
            detailed,
        } => {
            if let Some(file) = file {
                let contents = tokio::fs::read_to_string(&file)
                    .await
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                addresses.extend(parse_address_lines(&contents));
            }
            if addresses.is_empty() {
                anyhow::bail!("No addresses given");
            }

            if detailed {
                let items = client.batch_geocode_detailed(&addresses).await;
                let failed = items.iter().filter(|item| !item.is_success()).count();
                for item in &items {
                    match &item.outcome {
                        Ok(result) => println!("✅ {} → {result}", item.address),
                        Err(e) => println!("❌ {} → [{}] {e}", item.address, e.kind()),
                    }
                }
                println!();
                println!("📊 {} resolved, {failed} failed", items.len() - failed);
            } else {
                let results = client.batch_geocode(&addresses).await;
                for result in &results {
                    println!("📍 {result}");
                }
                println!();
                println!("📊 {} of {} resolved", results.len(), addresses.len());
            }
        },

        Commands::Config => {},
    }

    client.on_idle().await;
    Ok(())
}
