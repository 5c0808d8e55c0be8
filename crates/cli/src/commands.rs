//! Command-line surface and the `send` / `listen` commands.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use eventing::{
    Consumer, EndpointConfig, Environment, EventingEndpoint, EventingResult, Message,
    Placeholders, Processor,
};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use transport_http::HttpEndpointRegistry;

use crate::config::BridgeConfig;

/// Bridge between logical service references and HTTP CloudEvents endpoints.
#[derive(Debug, Parser)]
#[command(name = "eventing-bridge", version)]
pub struct Cli {
    /// TOML configuration file (default: ./eventing.toml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// CloudEvents spec version: 0.1 or 0.2.
    #[arg(long, global = true)]
    pub spec_version: Option<String>,

    /// Send events in structured mode as one JSON envelope.
    #[arg(long, global = true)]
    pub json_serialization: bool,

    /// Environment descriptor file.
    #[arg(long, global = true)]
    pub environment: Option<String>,

    /// Fail on services missing from the environment instead of deriving them.
    #[arg(long, global = true)]
    pub no_default_services: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send one event and print the reply.
    Send {
        /// Logical reference, e.g. `eventing:endpoint/orders`.
        reference: String,

        /// Event body.
        #[arg(long, default_value = "")]
        body: String,

        /// Extra header as `name=value`; may be repeated.
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },
    /// Receive events and print each one as a JSON line until Ctrl-C.
    Listen {
        /// Logical references; several may share one listener.
        #[arg(required = true)]
        references: Vec<String>,
    },
}

impl Cli {
    /// Command-line values that override every other configuration source.
    pub fn overrides(&self) -> Vec<(&'static str, Value)> {
        let mut overrides = Vec::new();
        if let Some(version) = &self.spec_version {
            overrides.push(("spec_version", json!(version)));
        }
        if self.json_serialization {
            overrides.push(("json_serialization", json!(true)));
        }
        if let Some(path) = &self.environment {
            overrides.push(("environment.path", json!(path)));
        }
        if self.no_default_services {
            overrides.push(("default_services", json!(false)));
        }
        overrides
    }
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got '{s}'")),
    }
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// Everything the commands need: the environment and the HTTP transport.
pub struct Bridge {
    environment: Environment,
    endpoint_config: EndpointConfig,
    registry: HttpEndpointRegistry,
}

impl Bridge {
    pub fn new(config: &BridgeConfig) -> anyhow::Result<Self> {
        let environment = match config.environment_source() {
            Some(source) => Environment::load(&source).context("failed to load environment")?,
            None => {
                warn!("No environment configured, every service is derived from its name");
                Environment::default()
            }
        };
        let registry =
            HttpEndpointRegistry::new(config.http_transport(), Arc::new(Placeholders::from_env()))?;

        Ok(Self {
            environment,
            endpoint_config: config.endpoint_config()?,
            registry,
        })
    }

    pub fn endpoint(&self, reference: &str) -> anyhow::Result<EventingEndpoint> {
        let endpoint = EventingEndpoint::create(
            reference.parse()?,
            &self.environment,
            &self.endpoint_config,
            &self.registry,
        )
        .with_context(|| format!("failed to resolve '{reference}'"))?;
        Ok(endpoint)
    }
}

/// Sends one event and returns the reply.
pub async fn send(
    bridge: &Bridge,
    reference: &str,
    body: String,
    headers: Vec<(String, String)>,
) -> anyhow::Result<Message> {
    let endpoint = bridge.endpoint(reference)?;
    endpoint.start().await?;

    let mut message = Message::new(body);
    for (name, value) in headers {
        message.headers.insert(name, value);
    }
    let result = endpoint.create_producer()?.send(message).await;
    endpoint.stop().await?;

    let reply = result.with_context(|| format!("failed to send to {}", endpoint.uri()))?;
    info!(uri = %endpoint.uri(), "Event sent");
    Ok(reply)
}

/// Starts a consumer per reference, all feeding `processor`, until `shutdown` resolves.
pub async fn listen(
    bridge: &Bridge,
    references: &[String],
    processor: Arc<dyn Processor>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let mut running: Vec<(EventingEndpoint, Arc<dyn Consumer>)> = Vec::new();
    for reference in references {
        let endpoint = bridge.endpoint(reference)?;
        endpoint.start().await?;
        let consumer = endpoint.create_consumer(processor.clone())?;
        consumer
            .start()
            .await
            .with_context(|| format!("failed to listen on {}", endpoint.uri()))?;
        info!(reference = %reference, uri = %endpoint.uri(), "Listening");
        running.push((endpoint, consumer));
    }

    shutdown.await;

    for (endpoint, consumer) in running {
        consumer.stop().await?;
        endpoint.stop().await?;
    }
    info!("Listeners stopped");
    Ok(())
}

/// Prints each received event to stdout as one JSON line.
pub struct PrintProcessor;

#[async_trait]
impl Processor for PrintProcessor {
    async fn process(&self, message: Message) -> EventingResult<()> {
        println!("{}", message_json(&message));
        Ok(())
    }
}

/// JSON rendering of a message for terminal output.
pub fn message_json(message: &Message) -> Value {
    let headers: Map<String, Value> = message
        .headers
        .iter()
        .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
        .collect();
    json!({
        "id": message.id().to_string(),
        "headers": headers,
        "body": String::from_utf8_lossy(&message.body),
    })
}
