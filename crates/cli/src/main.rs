//! Eventing bridge CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Load configuration**: defaults, `eventing.toml`, `EVENTING_*`
//!    variables and command-line flags, layered with `figment`.
//! 2. **Wire observability**: `tracing-subscriber` with a pretty or JSON
//!    layer, plus an OpenTelemetry OTLP exporter when an endpoint is set.
//! 3. **Construct infrastructure**: load the environment and build the HTTP
//!    endpoint registry.
//! 4. **Run the command**: `send` one event, or `listen` on one or more
//!    references until Ctrl-C.

use std::sync::Arc;

use clap::Parser;

mod commands;
mod config;
mod telemetry;

use commands::{Bridge, Cli, Command, PrintProcessor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref(), cli.overrides())?;
    let _telemetry = telemetry::init(&config.logging, &config.telemetry)?;

    let bridge = Bridge::new(&config)?;
    match cli.command {
        Command::Send {
            reference,
            body,
            headers,
        } => {
            let reply = commands::send(&bridge, &reference, body, headers).await?;
            println!("{}", commands::message_json(&reply));
        }
        Command::Listen { references } => {
            commands::listen(&bridge, &references, Arc::new(PrintProcessor), async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Unable to listen for Ctrl-C");
                }
            })
            .await?;
        }
    }
    Ok(())
}
