mod app;
mod completion;
mod config;
mod http;
mod relay;

use crate::app::AppHandles;
use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const VERSION: &str = env!("VERSION");

#[derive(Parser)]
#[command(name = "whatsapp-relay")]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
#[command(version = VERSION)]
struct CliArguments {
    /// TOML config file, defaults to ./config.toml when present.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn init_tracing() {
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer())
        .init();
    info!("build version: {VERSION}");
}

fn main() -> Result<()> {
    dotenv().ok();

    init_tracing();
    let args = CliArguments::parse();
    let config = config::AppConfig::load(args.config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async move { AppHandles::new(config).run().await })
}
