//! Immutable description of one target service.
//!
//! A [`ServiceDefinition`] is built once (from the environment descriptor or
//! synthesised as a default) and never mutated afterwards. Every derived
//! variant, such as a context-path override, is a fresh value built from a
//! merged metadata map, so definitions published into an [`crate::Environment`]
//! can be read concurrently without synchronisation.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::EventingError;
use crate::identifiers::{ServiceId, ServiceName};

/// Well-known metadata keys carried by a [`ServiceDefinition`].
pub mod metadata {
    /// Context path of the service (`/a/path`).
    pub const SERVICE_PATH: &str = "service.path";
    /// Zone suffix appended to the name when no host is set. May hold placeholders.
    pub const SERVICE_ZONE: &str = "service.zone";
    /// Service type, recorded on load so the map is self-describing.
    pub const SERVICE_TYPE: &str = "service.type";
    /// Service protocol, recorded on load so the map is self-describing.
    pub const SERVICE_PROTOCOL: &str = "service.protocol";
    /// Event type stamped on produced events.
    pub const EVENT_TYPE: &str = "event.type";
    /// Content type stamped on produced messages.
    pub const CONTENT_TYPE: &str = "content.type";
    /// Header name used to demultiplex a shared listener.
    pub const FILTER_HEADER_NAME: &str = "filter.header.name";
    /// Header value used to demultiplex a shared listener.
    pub const FILTER_HEADER_VALUE: &str = "filter.header.value";
}

// ---------------------------------------------------------------------------
// Service type
// ---------------------------------------------------------------------------

/// Kind of logical service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    /// A directly addressable service.
    Endpoint,
    /// An eventing channel.
    Channel,
}

impl ServiceType {
    /// Returns the descriptor spelling of this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Endpoint => "endpoint",
            Self::Channel => "channel",
        }
    }
}

impl FromStr for ServiceType {
    type Err = EventingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "endpoint" => Ok(Self::Endpoint),
            "channel" => Ok(Self::Channel),
            other => Err(EventingError::configuration(format!(
                "unknown service type '{other}', expected 'endpoint' or 'channel'"
            ))),
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

/// Wire protocol used to reach a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Protocol {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
}

impl Protocol {
    /// Returns the URI scheme for this protocol.
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl FromStr for Protocol {
    type Err = EventingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(EventingError::UnsupportedProtocol {
                protocol: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Protocol {
    type Error = EventingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Protocol> for String {
    fn from(protocol: Protocol) -> Self {
        protocol.scheme().to_string()
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.scheme())
    }
}

// ---------------------------------------------------------------------------
// Service definition
// ---------------------------------------------------------------------------

/// Immutable description of one target service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDefinition {
    id: ServiceId,
    service_type: ServiceType,
    protocol: Protocol,
    name: ServiceName,
    host: Option<String>,
    port: Option<u16>,
    metadata: BTreeMap<String, String>,
}

impl ServiceDefinition {
    /// Builds a new definition with a fresh id.
    ///
    /// An empty `host` is treated as absent. The type and protocol are also
    /// recorded in the metadata map under [`metadata::SERVICE_TYPE`] and
    /// [`metadata::SERVICE_PROTOCOL`].
    pub fn new(
        service_type: ServiceType,
        protocol: Protocol,
        name: ServiceName,
        host: Option<String>,
        port: Option<u16>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        let mut metadata = metadata;
        metadata.insert(metadata::SERVICE_TYPE.to_string(), service_type.to_string());
        metadata.insert(metadata::SERVICE_PROTOCOL.to_string(), protocol.to_string());

        Self {
            id: ServiceId::new_random(),
            service_type,
            protocol,
            name,
            host: host.filter(|h| !h.is_empty()),
            port,
            metadata,
        }
    }

    /// Identity assigned when the definition was built; derived copies share it.
    pub fn id(&self) -> ServiceId {
        self.id
    }

    /// Whether this is an `endpoint` or a `channel`.
    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    /// Wire protocol, which also fixes the URL scheme.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Lookup key within the environment.
    pub fn name(&self) -> &ServiceName {
        &self.name
    }

    /// Explicit host, if the descriptor set a non-empty one.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Explicit port, if any.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Full metadata map, including the recorded type and protocol.
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Returns a non-empty metadata value.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Context path (`service.path`), as stored.
    pub fn path(&self) -> Option<&str> {
        self.metadata_value(metadata::SERVICE_PATH)
    }

    /// Zone suffix (`service.zone`) used to derive a host; may hold placeholders.
    pub fn zone(&self) -> Option<&str> {
        self.metadata_value(metadata::SERVICE_ZONE)
    }

    /// Event type stamped on produced events (`event.type`).
    pub fn event_type(&self) -> Option<&str> {
        self.metadata_value(metadata::EVENT_TYPE)
    }

    /// Content type stamped on produced events (`content.type`).
    pub fn content_type(&self) -> Option<&str> {
        self.metadata_value(metadata::CONTENT_TYPE)
    }

    /// Returns the `(header-name, header-value)` filter when both halves are set.
    pub fn filter(&self) -> Option<(&str, &str)> {
        match (
            self.metadata_value(metadata::FILTER_HEADER_NAME),
            self.metadata_value(metadata::FILTER_HEADER_VALUE),
        ) {
            (Some(name), Some(value)) => Some((name, value)),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Copy-on-write derivations
    // -----------------------------------------------------------------------

    /// Returns a copy whose metadata is `self.metadata` overlaid with `overrides`.
    ///
    /// `self` is left untouched.
    pub fn merged<I, K, V>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut metadata = self.metadata.clone();
        metadata.extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));
        Self {
            metadata,
            ..self.clone()
        }
    }

    /// Returns a copy with the context path replaced by `path`.
    ///
    /// The path is normalised to exactly one leading `/`.
    pub fn with_path(&self, path: &str) -> Self {
        self.merged([(metadata::SERVICE_PATH, normalize_path(path))])
    }

    /// Returns a copy with the given protocol.
    pub fn with_protocol(&self, protocol: Protocol) -> Self {
        let mut derived = self.merged([(metadata::SERVICE_PROTOCOL, protocol.to_string())]);
        derived.protocol = protocol;
        derived
    }

    /// Returns a copy with the given explicit host.
    pub fn with_host(&self, host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()).filter(|h| !h.is_empty()),
            ..self.clone()
        }
    }

    /// Returns a copy with the given explicit port.
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            port: Some(port),
            ..self.clone()
        }
    }
}

/// Normalises a context path to exactly one leading `/`.
pub fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> ServiceDefinition {
        ServiceDefinition::new(
            ServiceType::Endpoint,
            Protocol::Http,
            ServiceName::new("myEndpoint").unwrap(),
            Some("my-node".to_string()),
            Some(9001),
            BTreeMap::from([(metadata::SERVICE_PATH.to_string(), "/a/path".to_string())]),
        )
    }

    #[test]
    fn test_new_records_type_and_protocol_in_metadata() {
        let def = definition();
        assert_eq!(def.metadata_value(metadata::SERVICE_TYPE), Some("endpoint"));
        assert_eq!(def.metadata_value(metadata::SERVICE_PROTOCOL), Some("http"));
    }

    #[test]
    fn test_empty_host_is_absent() {
        let def = ServiceDefinition::new(
            ServiceType::Channel,
            Protocol::Http,
            ServiceName::new("c1").unwrap(),
            Some(String::new()),
            None,
            BTreeMap::new(),
        );
        assert_eq!(def.host(), None);
        assert_eq!(def.port(), None);
    }

    #[test]
    fn test_with_path_derives_new_value() {
        let original = definition();
        let derived = original.with_path("another/path");

        assert_eq!(derived.path(), Some("/another/path"));
        assert_eq!(original.path(), Some("/a/path"));
        assert_eq!(derived.id(), original.id());
        assert_eq!(derived.name(), original.name());
    }

    #[test]
    fn test_normalize_path_collapses_leading_slashes() {
        assert_eq!(normalize_path("a"), "/a");
        assert_eq!(normalize_path("/a"), "/a");
        assert_eq!(normalize_path("//a/b"), "/a/b");
    }

    #[test]
    fn test_filter_requires_both_halves() {
        let def = definition().merged([(metadata::FILTER_HEADER_NAME, "ce-source")]);
        assert_eq!(def.filter(), None);

        let def = def.merged([(metadata::FILTER_HEADER_VALUE, "CE1")]);
        assert_eq!(def.filter(), Some(("ce-source", "CE1")));
    }

    #[test]
    fn test_protocol_parse_rejects_unknown() {
        assert_eq!("https".parse::<Protocol>().unwrap(), Protocol::Https);
        assert_eq!(
            "amqp".parse::<Protocol>().unwrap_err(),
            EventingError::UnsupportedProtocol {
                protocol: "amqp".to_string()
            }
        );
    }

    #[test]
    fn test_with_protocol_updates_metadata() {
        let def = definition().with_protocol(Protocol::Https);
        assert_eq!(def.protocol(), Protocol::Https);
        assert_eq!(def.metadata_value(metadata::SERVICE_PROTOCOL), Some("https"));
    }
}
