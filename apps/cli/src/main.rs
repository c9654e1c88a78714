mod commands;
mod config;
mod context;
mod notifier;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();
    if let Err(err) = commands::dispatch(cli).await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

/// `RUST_LOG` overrides the default `info` filter. Records from the `log`
/// facade used by the library crates are forwarded to the subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
