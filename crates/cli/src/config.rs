//! Configuration loading.
//!
//! Sources, lowest priority first:
//!
//! 1. built-in defaults;
//! 2. the TOML file given by `--config`, or `eventing.toml` in the working
//!    directory when present;
//! 3. `EVENTING_*` environment variables, `__` separating nested keys
//!    (`EVENTING_HTTP__TIMEOUT_SECS=5` → `http.timeout_secs = 5`);
//! 4. `EVENTING_ENVIRONMENT`, carrying the environment descriptor JSON itself;
//! 5. command-line overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use eventing::{EndpointConfig, EnvironmentSource, EventingResult, SpecVersion};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::debug;
use transport_http::HttpTransportConfig;

/// Environment variable prefix for configuration keys.
pub const ENV_PREFIX: &str = "EVENTING_";
/// Environment variable carrying an inline environment descriptor.
pub const ENVIRONMENT_VAR: &str = "EVENTING_ENVIRONMENT";
/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "eventing.toml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint; tracing export is off when unset.
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Descriptor file, plain or `file:`-prefixed.
    pub path: Option<String>,
    /// Descriptor JSON.
    pub inline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Host listeners bind instead of the service host.
    pub bind_host: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            bind_host: None,
        }
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub spec_version: String,
    pub json_serialization: bool,
    pub default_services: bool,
    pub environment: EnvironmentConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            spec_version: SpecVersion::V0_1.as_str().to_string(),
            json_serialization: false,
            default_services: true,
            environment: EnvironmentConfig::default(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Endpoint settings. Fails on an unknown spec version.
    pub fn endpoint_config(&self) -> EventingResult<EndpointConfig> {
        Ok(EndpointConfig {
            spec_version: self.spec_version.parse()?,
            json_serialization: self.json_serialization,
            default_services: self.default_services,
        })
    }

    /// Where to read the environment from. An inline descriptor wins over a path.
    pub fn environment_source(&self) -> Option<EnvironmentSource> {
        match (&self.environment.inline, &self.environment.path) {
            (Some(json), _) => Some(EnvironmentSource::Inline(json.clone())),
            (None, Some(path)) => Some(EnvironmentSource::from_location(path)),
            (None, None) => None,
        }
    }

    pub fn http_transport(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            timeout: Duration::from_secs(self.http.timeout_secs),
            bind_host: self.http.bind_host.clone(),
        }
    }
}

/// Builds the configuration from every source.
///
/// `overrides` holds command-line values as `(dotted.key, value)` pairs.
pub fn load(
    config_file: Option<&Path>,
    overrides: Vec<(&'static str, serde_json::Value)>,
) -> anyhow::Result<BridgeConfig> {
    let mut figment = Figment::from(Serialized::defaults(BridgeConfig::default()));

    match config_file {
        Some(path) => {
            if !path.exists() {
                bail!("configuration file {} not found", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default.exists() {
                figment = figment.merge(Toml::file(default));
            }
        }
    }

    figment = figment.merge(
        Env::prefixed(ENV_PREFIX)
            .ignore(&["environment"])
            .split("__"),
    );
    if let Ok(inline) = std::env::var(ENVIRONMENT_VAR) {
        figment = figment.merge(Serialized::default("environment.inline", inline));
    }

    for (key, value) in overrides {
        figment = figment.merge(Serialized::default(key, value));
    }

    let config: BridgeConfig = figment
        .extract()
        .context("failed to extract configuration")?;
    debug!(
        spec_version = %config.spec_version,
        json_serialization = config.json_serialization,
        "Configuration loaded"
    );
    Ok(config)
}
