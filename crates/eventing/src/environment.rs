//! Load-once registry of [`ServiceDefinition`]s.
//!
//! The environment is read from a JSON descriptor at configuration time:
//!
//! ```json
//! {
//!   "services": [
//!     {
//!       "type": "endpoint",
//!       "protocol": "http",
//!       "name": "myEndpoint",
//!       "host": "localhost",
//!       "port": 9001,
//!       "metadata": { "service.path": "/a/path", "event.type": "org.example.event" }
//!     }
//!   ]
//! }
//! ```
//!
//! Once built it is never mutated, so lookups from many workers need no locking.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::{EventingError, EventingResult};
use crate::identifiers::ServiceName;
use crate::service::{metadata, normalize_path, Protocol, ServiceDefinition, ServiceType};

/// Zone placeholder given to synthesised default definitions.
pub const DEFAULT_ZONE_PLACEHOLDER: &str = "{{env:NAMESPACE}}";

/// Where the environment descriptor comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentSource {
    /// A file on disk. A leading `file:` prefix is accepted and stripped.
    Path(PathBuf),
    /// The descriptor JSON itself, typically carried by one environment variable.
    Inline(String),
}

impl EnvironmentSource {
    /// Builds a path source from a `file:`-prefixed or plain path string.
    pub fn from_location(location: &str) -> Self {
        let path = location.strip_prefix("file:").unwrap_or(location);
        Self::Path(PathBuf::from(path))
    }
}

// ---------------------------------------------------------------------------
// Descriptor (wire) types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EnvironmentDescriptor {
    services: Vec<ServiceDescriptor>,
}

#[derive(Debug, Deserialize)]
struct ServiceDescriptor {
    #[serde(rename = "type")]
    service_type: ServiceType,
    protocol: Protocol,
    name: ServiceName,
    host: String,
    #[serde(default)]
    port: Option<i64>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl ServiceDescriptor {
    fn into_definition(self) -> EventingResult<ServiceDefinition> {
        // Negative ports (e.g. -1) mean "no explicit port".
        let port = match self.port {
            None => None,
            Some(p) if p < 0 => None,
            Some(p) => Some(u16::try_from(p).map_err(|_| {
                EventingError::configuration(format!(
                    "service '{}' has out-of-range port {p}",
                    self.name
                ))
            })?),
        };

        Ok(ServiceDefinition::new(
            self.service_type,
            self.protocol,
            self.name,
            Some(self.host),
            port,
            self.metadata,
        ))
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Immutable, ordered collection of service definitions.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    services: Vec<ServiceDefinition>,
}

impl Environment {
    /// Builds an environment from already-constructed definitions.
    ///
    /// Fails if two definitions share the same `(type, name)` pair.
    pub fn new(services: Vec<ServiceDefinition>) -> EventingResult<Self> {
        let mut seen = HashSet::new();
        for def in &services {
            if !seen.insert((def.service_type(), def.name().clone())) {
                return Err(EventingError::configuration(format!(
                    "duplicate service \"{}\" with type \"{}\"",
                    def.name(),
                    def.service_type()
                )));
            }
        }
        Ok(Self { services })
    }

    /// Loads the environment from `source`.
    pub fn load(source: &EnvironmentSource) -> EventingResult<Self> {
        match source {
            EnvironmentSource::Inline(json) => Self::from_json(json),
            EnvironmentSource::Path(path) => Self::from_path(path),
        }
    }

    /// Parses a JSON descriptor.
    pub fn from_json(json: &str) -> EventingResult<Self> {
        let descriptor: EnvironmentDescriptor = serde_json::from_str(json).map_err(|e| {
            EventingError::configuration(format!("invalid environment descriptor: {e}"))
        })?;

        let services = descriptor
            .services
            .into_iter()
            .map(ServiceDescriptor::into_definition)
            .collect::<EventingResult<Vec<_>>>()?;

        let env = Self::new(services)?;
        debug!(services = env.len(), "Environment descriptor parsed");
        Ok(env)
    }

    fn from_path(path: &Path) -> EventingResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            EventingError::configuration(format!(
                "unable to read environment descriptor {}: {e}",
                path.display()
            ))
        })?;
        let env = Self::from_json(&json)?;
        info!(path = %path.display(), services = env.len(), "Environment loaded");
        Ok(env)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceDefinition> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Finds the service for `target`, which may be `name` or `name/extra/path`.
    ///
    /// With a context path the result is a derived copy whose path is
    /// `/extra/path`; the registered definition is untouched. A miss is not an
    /// error.
    pub fn lookup(&self, service_type: ServiceType, target: &str) -> Option<ServiceDefinition> {
        let (name, context_path) = split_target(target);

        self.services
            .iter()
            .find(|def| def.service_type() == service_type && def.name().as_str() == name)
            .map(|def| match context_path {
                Some(path) => def.with_path(path),
                None => def.clone(),
            })
    }

    /// Like [`Environment::lookup`], but a miss is a [`EventingError::NotFound`].
    pub fn mandatory_lookup(
        &self,
        service_type: ServiceType,
        target: &str,
    ) -> EventingResult<ServiceDefinition> {
        self.lookup(service_type, target)
            .ok_or_else(|| EventingError::NotFound {
                name: target.to_string(),
                service_type,
            })
    }

    /// Like [`Environment::lookup`], but a miss synthesises a default definition.
    ///
    /// The default speaks `http`, has no host or port, and carries the zone
    /// placeholder [`DEFAULT_ZONE_PLACEHOLDER`] so the resolver derives the host
    /// as `name.<namespace>`.
    pub fn lookup_or_default(
        &self,
        service_type: ServiceType,
        target: &str,
    ) -> EventingResult<ServiceDefinition> {
        if let Some(def) = self.lookup(service_type, target) {
            return Ok(def);
        }

        let (name, context_path) = split_target(target);
        let name = ServiceName::new(name).ok_or_else(|| {
            EventingError::configuration(format!("invalid service name in target '{target}'"))
        })?;

        let mut meta = BTreeMap::from([(
            metadata::SERVICE_ZONE.to_string(),
            DEFAULT_ZONE_PLACEHOLDER.to_string(),
        )]);
        if let Some(path) = context_path {
            meta.insert(metadata::SERVICE_PATH.to_string(), normalize_path(path));
        }

        debug!(name = %name, service_type = %service_type, "Synthesised default service definition");
        Ok(ServiceDefinition::new(
            service_type,
            Protocol::Http,
            name,
            None,
            None,
            meta,
        ))
    }
}

/// Splits `name/extra/path` into `("name", Some("extra/path"))`.
fn split_target(target: &str) -> (&str, Option<&str>) {
    match target.split_once('/') {
        Some((name, path)) => (name, Some(path)),
        None => (target, None),
    }
}
