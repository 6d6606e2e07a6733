//! papertrade - Main Entry Point
//!
//! Boots the simulated trading engine: ledger, ranking, and the live
//! standings broadcast.

use anyhow::Result;
use clap::Parser;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use papertrade::common::traits::InMemoryPriceSource;
use papertrade::config;
use papertrade::engine::TradingService;

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Seed a demo price table instead of waiting for a live feed
    #[arg(long)]
    demo_prices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting papertrade engine");
    info!("Configuration file: {}", args.config);

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let app_config = config::load_config(Some(args.config.as_str()))?;

    let prices = Arc::new(InMemoryPriceSource::new());
    if args.demo_prices {
        prices.set_price("TCS", dec!(3250.50));
        prices.set_price("INFY", dec!(1500.25));
        prices.set_price("RELIANCE", dec!(2410.00));
        info!("Seeded {} demo prices", prices.len());
    }

    let service = TradingService::new(&app_config, prices);
    info!(
        "Engine ready: {} subscribers connected",
        service.hub().stats().await.subscribers
    );

    // Keep the application running
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal, cleaning up...");

    Ok(())
}
