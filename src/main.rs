//! Blocklist control - command line entry point.
//!
//! Runs a single request through the command layer and prints the response
//! it would send, or reports that the request passes through to DNS
//! resolution.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use blocklist_control::command::CommandControl;
use blocklist_control::config::Config;
use blocklist_control::filter::InMemoryFilter;
use blocklist_control::filter::loader::FilterLoader;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file.
    #[arg(long, env = "CONFIG_PATH", default_value = "config.toml")]
    config: PathBuf,

    /// HTTP method of the request.
    #[arg(long, default_value = "GET")]
    method: String,

    /// Full request URL, e.g. https://dns.example/dntolist?dn=ads.example.com
    url: String,
}

async fn load_filter(config: &Config) -> blocklist_control::Result<InMemoryFilter> {
    let Some(path) = config.filter_path.as_deref() else {
        info!("No filter_path configured, using an empty filter");
        return Ok(InMemoryFilter::default());
    };

    let filter = FilterLoader::load(path).await?;
    info!(
        "Filter loaded: {} tags, {} domains",
        filter.tag_count(),
        filter.domain_count()
    );
    Ok(filter)
}

async fn run(args: Args) -> Result<()> {
    let config = if args.config.exists() {
        Config::load(&args.config).context("Failed to load configuration")?
    } else {
        debug!(path = %args.config.display(), "config file not found, using defaults");
        Config::default()
    };

    let latest_timestamp = config
        .latest_timestamp()
        .context("Failed to resolve blocklist timestamp")?;
    info!("Blocklist timestamp: {latest_timestamp}");

    let filter = load_filter(&config)
        .await
        .context("Failed to load blocklist filter")?;
    let control =
        CommandControl::new(latest_timestamp).with_configure_url(config.configure_url.clone());

    let envelope = control.handle(&args.method, &args.url, &filter);
    if envelope.is_exception {
        info!(from = %envelope.exception_from, "Command raised an exception");
    }

    let Some(response) = envelope.http_response() else {
        println!("pass-through: request continues to DNS resolution");
        return Ok(());
    };

    println!("{:?} {}", response.version(), response.status());
    for (name, value) in response.headers() {
        println!("{name}: {}", value.to_str().unwrap_or("<binary>"));
    }
    println!();
    println!("{}", response.body());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    run(Args::parse()).await
}
