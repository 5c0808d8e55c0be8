//! Logical endpoint references.
//!
//! A reference names a service independently of where it lives:
//!
//! ```text
//! eventing:<type>/<name>[/<path>][?protocol=..&host=..&port=..&path=..]
//! ```
//!
//! `eventing://` is accepted as well. Query parameters override the matching
//! fields of the looked-up definition, copy-on-write.

use std::str::FromStr;

use crate::errors::{EventingError, EventingResult};
use crate::service::{normalize_path, Protocol, ServiceDefinition, ServiceType};

/// URI scheme of a logical reference.
pub const SCHEME: &str = "eventing";

/// Per-call overrides carried in a reference's query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceOverrides {
    pub protocol: Option<Protocol>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
}

impl ReferenceOverrides {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A parsed `eventing:` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointReference {
    service_type: ServiceType,
    name: String,
    context_path: Option<String>,
    overrides: ReferenceOverrides,
}

impl EndpointReference {
    pub fn new(service_type: ServiceType, name: impl Into<String>) -> Self {
        Self {
            service_type,
            name: name.into(),
            context_path: None,
            overrides: ReferenceOverrides::default(),
        }
    }

    /// Adds a context path, builder-style.
    pub fn with_context_path(mut self, path: impl AsRef<str>) -> Self {
        let path = path.as_ref().trim_matches('/');
        self.context_path = (!path.is_empty()).then(|| path.to_string());
        self
    }

    pub fn parse(input: &str) -> EventingResult<Self> {
        let rest = input
            .strip_prefix(SCHEME)
            .and_then(|r| r.strip_prefix(':'))
            .ok_or_else(|| {
                EventingError::configuration(format!(
                    "endpoint reference '{input}' must start with '{SCHEME}:'"
                ))
            })?;
        let rest = rest.strip_prefix("//").unwrap_or(rest);

        let (location, query) = match rest.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (rest, None),
        };

        let mut segments = location.splitn(3, '/');
        let service_type: ServiceType = segments.next().unwrap_or_default().parse()?;
        let name = segments.next().unwrap_or_default();
        if name.is_empty() {
            return Err(EventingError::configuration(format!(
                "endpoint reference '{input}' has no service name"
            )));
        }

        let mut reference = Self::new(service_type, name);
        if let Some(path) = segments.next() {
            reference = reference.with_context_path(path);
        }
        if let Some(query) = query {
            reference.overrides = parse_overrides(query)?;
        }
        Ok(reference)
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context_path(&self) -> Option<&str> {
        self.context_path.as_deref()
    }

    pub fn overrides(&self) -> &ReferenceOverrides {
        &self.overrides
    }

    /// The lookup target: `name` or `name/path`.
    pub fn target(&self) -> String {
        match &self.context_path {
            Some(path) => format!("{}/{}", self.name, path),
            None => self.name.clone(),
        }
    }

    /// `eventing://<type>/<target>`, without overrides.
    ///
    /// This is what producers stamp as the event source.
    pub fn canonical(&self) -> String {
        format!("{SCHEME}://{}/{}", self.service_type, self.target())
    }

    /// Applies the query overrides to a looked-up definition.
    pub fn apply_overrides(&self, definition: ServiceDefinition) -> ServiceDefinition {
        let o = &self.overrides;
        let mut def = definition;
        if let Some(protocol) = o.protocol {
            def = def.with_protocol(protocol);
        }
        if let Some(host) = &o.host {
            def = def.with_host(host.as_str());
        }
        if let Some(port) = o.port {
            def = def.with_port(port);
        }
        if let Some(path) = &o.path {
            def = def.with_path(path);
        }
        def
    }
}

impl FromStr for EndpointReference {
    type Err = EventingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for EndpointReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

fn parse_overrides(query: &str) -> EventingResult<ReferenceOverrides> {
    let mut overrides = ReferenceOverrides::default();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "protocol" => overrides.protocol = Some(value.parse()?),
            "host" => overrides.host = Some(value.to_string()).filter(|v| !v.is_empty()),
            "port" => {
                let port = value.parse::<u16>().map_err(|_| {
                    EventingError::configuration(format!("invalid port override '{value}'"))
                })?;
                overrides.port = Some(port);
            }
            "path" => overrides.path = Some(normalize_path(value)),
            other => {
                return Err(EventingError::configuration(format!(
                    "unknown endpoint reference parameter '{other}'"
                )))
            }
        }
    }
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::identifiers::ServiceName;

    #[test]
    fn test_parse_simple() {
        let r = EndpointReference::parse("eventing:endpoint/myEndpoint").unwrap();
        assert_eq!(r.service_type(), ServiceType::Endpoint);
        assert_eq!(r.name(), "myEndpoint");
        assert_eq!(r.context_path(), None);
        assert!(r.overrides().is_empty());
        assert_eq!(r.canonical(), "eventing://endpoint/myEndpoint");
    }

    #[test]
    fn test_parse_with_path_and_overrides() {
        let r: EndpointReference =
            "eventing://channel/orders/a/path?protocol=https&host=example.com&port=8443"
                .parse()
                .unwrap();
        assert_eq!(r.service_type(), ServiceType::Channel);
        assert_eq!(r.target(), "orders/a/path");
        assert_eq!(r.overrides().protocol, Some(Protocol::Https));
        assert_eq!(r.overrides().host.as_deref(), Some("example.com"));
        assert_eq!(r.overrides().port, Some(8443));
        assert_eq!(r.to_string(), "eventing://channel/orders/a/path");
    }

    #[test]
    fn test_parse_errors() {
        assert!(EndpointReference::parse("http://x/y").is_err());
        assert!(EndpointReference::parse("eventing:endpoint").is_err());
        assert!(EndpointReference::parse("eventing:queue/x").is_err());
        assert!(EndpointReference::parse("eventing:endpoint/x?port=abc").is_err());
        assert!(matches!(
            EndpointReference::parse("eventing:endpoint/x?protocol=ftp"),
            Err(EventingError::UnsupportedProtocol { .. })
        ));
    }

    #[test]
    fn test_overrides_are_copy_on_write() {
        let original = ServiceDefinition::new(
            ServiceType::Endpoint,
            Protocol::Http,
            ServiceName::new("svc").unwrap(),
            Some("localhost".to_string()),
            Some(9001),
            BTreeMap::new(),
        );
        let r = EndpointReference::parse("eventing:endpoint/svc?host=other&port=9002&path=x")
            .unwrap();

        let derived = r.apply_overrides(original.clone());
        assert_eq!(derived.host(), Some("other"));
        assert_eq!(derived.port(), Some(9002));
        assert_eq!(derived.path(), Some("/x"));
        assert_eq!(original.host(), Some("localhost"));
        assert_eq!(original.port(), Some(9001));
    }
}
