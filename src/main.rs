#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # sandboxd
//!
//! Interactive code-execution sandbox service. Accepts untrusted C++ source
//! over a TCP socket, compiles it, and runs the result under CPU-time and
//! address-space limits, streaming the interactive session back to the
//! client as typed JSON messages.

use clap::Parser;
use tracing::{error, info};

use sandboxd::config::Config;

/// Interactive code-execution sandbox service.
#[derive(Parser)]
#[command(name = "sandboxd", version)]
struct Cli {
    /// Path to TOML config file.
    #[arg(long)]
    config: Option<String>,

    /// Override the listen address from the config file/defaults.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref());

    if let Some(port) = cli.port {
        config.server.listen = format!("0.0.0.0:{port}");
    }

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    let validation_errors = config.validate();
    if !validation_errors.is_empty() {
        for err in &validation_errors {
            error!("config error: {err}");
        }
        std::process::exit(1);
    }

    info!("sandboxd v{} starting", env!("CARGO_PKG_VERSION"));
    info!("compiler: {} -std={}", config.compiler.binary, config.compiler.std);
    info!("workspace root: {}", config.workspace.root);

    sandboxd::server::run(config).await;

    info!("goodbye");
}
