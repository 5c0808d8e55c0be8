//! Physical address resolution for a [`ServiceDefinition`].
//!
//! The algorithm is deterministic and fails fast:
//!
//! 1. scheme from the protocol;
//! 2. host from `host`, or `name[.zone]` with the zone placeholder-resolved;
//! 3. port only when explicitly set;
//! 4. path from metadata, normalised to one leading `/`;
//! 5. the header filter when both filter halves are set.
//!
//! Turning a [`ServiceAddress`] into a concrete endpoint (query parameters,
//! caching) is the transport's job; see the `EndpointRegistry` port.

use tracing::warn;

use crate::errors::{EventingError, EventingResult};
use crate::placeholders::PlaceholderResolver;
use crate::service::{normalize_path, Protocol, ServiceDefinition};

/// Query parameter carrying the filter header name.
pub const FILTER_HEADER_NAME_PARAM: &str = "filter.headerName";
/// Query parameter carrying the filter header value.
pub const FILTER_HEADER_VALUE_PARAM: &str = "filter.headerValue";

/// Exact-match filter on one inbound header.
///
/// Lets several logical consumers share one physical listener: each consumer
/// only receives requests whose `name` header equals `value`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderFilter {
    /// Header to inspect, matched case-insensitively.
    pub name: String,
    /// Exact value the header must carry.
    pub value: String,
}

impl HeaderFilter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Returns the filter as `(parameter, value)` query pairs.
    pub fn query_pairs(&self) -> [(&'static str, &str); 2] {
        [
            (FILTER_HEADER_NAME_PARAM, self.name.as_str()),
            (FILTER_HEADER_VALUE_PARAM, self.value.as_str()),
        ]
    }
}

/// Resolved physical location of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAddress {
    pub protocol: Protocol,
    pub host: String,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub filter: Option<HeaderFilter>,
    /// Match and send requests by path only, ignoring any absolute authority.
    ///
    /// Always set: a mesh sidecar may rewrite the request authority.
    pub use_relative_path: bool,
}

impl ServiceAddress {
    /// Resolves the physical address of `definition`.
    ///
    /// A zone placeholder that fails to resolve degrades to "no zone suffix".
    pub fn resolve(
        definition: &ServiceDefinition,
        placeholders: &dyn PlaceholderResolver,
    ) -> EventingResult<Self> {
        let host = match definition.host() {
            Some(host) => host.to_string(),
            None => derive_host(definition, placeholders),
        };
        if host.is_empty() {
            return Err(EventingError::configuration(format!(
                "service \"{}\" has no host",
                definition.name()
            )));
        }

        Ok(Self {
            protocol: definition.protocol(),
            host,
            port: definition.port(),
            path: definition.path().map(normalize_path),
            filter: definition
                .filter()
                .map(|(name, value)| HeaderFilter::new(name, value)),
            use_relative_path: true,
        })
    }

    /// `scheme://host[:port]`, without path or query.
    pub fn authority_uri(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.protocol.scheme(), self.host, port),
            None => format!("{}://{}", self.protocol.scheme(), self.host),
        }
    }
}

impl std::fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.authority_uri())?;
        if let Some(path) = &self.path {
            write!(f, "{path}")?;
        }
        Ok(())
    }
}

fn derive_host(definition: &ServiceDefinition, placeholders: &dyn PlaceholderResolver) -> String {
    let name = definition.name().as_str();

    let zone = definition.zone().and_then(|zone| match placeholders.resolve(zone) {
        Ok(resolved) => Some(resolved),
        Err(e) => {
            warn!(
                service = %name,
                zone = %zone,
                error = %e,
                "Zone placeholder unresolved, using bare service name as host"
            );
            None
        }
    });

    match zone.filter(|z| !z.is_empty()) {
        Some(zone) => format!("{name}.{zone}"),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use super::*;
    use crate::environment::DEFAULT_ZONE_PLACEHOLDER;
    use crate::identifiers::ServiceName;
    use crate::placeholders::Placeholders;
    use crate::service::{metadata, ServiceType};

    fn definition(host: Option<&str>, port: Option<u16>, meta: &[(&str, &str)]) -> ServiceDefinition {
        ServiceDefinition::new(
            ServiceType::Endpoint,
            Protocol::Http,
            ServiceName::new("myEndpoint").unwrap(),
            host.map(str::to_string),
            port,
            meta.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    fn namespace(ns: &str) -> Placeholders {
        Placeholders::from_properties(HashMap::from([("NAMESPACE".to_string(), ns.to_string())]))
    }

    #[test]
    fn test_explicit_host_port_and_path() {
        let def = definition(Some("localhost"), Some(9001), &[(metadata::SERVICE_PATH, "/a/path")]);
        let addr = ServiceAddress::resolve(&def, &namespace("ns")).unwrap();
        assert_eq!(addr.to_string(), "http://localhost:9001/a/path");
        assert!(addr.use_relative_path);
        assert_eq!(addr.filter, None);
    }

    #[test]
    fn test_context_path_override_changes_uri() {
        let def = definition(Some("localhost"), Some(9001), &[(metadata::SERVICE_PATH, "/a/path")])
            .with_path("another/path");
        let addr = ServiceAddress::resolve(&def, &namespace("ns")).unwrap();
        assert_eq!(addr.to_string(), "http://localhost:9001/another/path");
    }

    #[test]
    fn test_path_without_leading_slash_and_no_port() {
        let def = definition(Some("svc"), None, &[(metadata::SERVICE_PATH, "events")]);
        let addr = ServiceAddress::resolve(&def, &namespace("ns")).unwrap();
        assert_eq!(addr.to_string(), "http://svc/events");
    }

    #[test]
    fn test_host_derived_from_zone() {
        let def = definition(None, None, &[(metadata::SERVICE_ZONE, DEFAULT_ZONE_PLACEHOLDER)]);
        let addr = ServiceAddress::resolve(&def, &namespace("team-a")).unwrap();
        assert_eq!(addr.host, "myEndpoint.team-a");
    }

    #[test]
    fn test_unresolved_zone_degrades_to_name() {
        let def = definition(None, None, &[(metadata::SERVICE_ZONE, "{{nothing}}")]);
        let addr = ServiceAddress::resolve(&def, &namespace("team-a")).unwrap();
        assert_eq!(addr.host, "myEndpoint");
    }

    #[test]
    fn test_filter_captured() {
        let def = definition(
            Some("localhost"),
            Some(8080),
            &[
                (metadata::FILTER_HEADER_NAME, "ce-source"),
                (metadata::FILTER_HEADER_VALUE, "CE1"),
            ],
        );
        let addr = ServiceAddress::resolve(&def, &namespace("ns")).unwrap();
        assert_eq!(addr.filter, Some(HeaderFilter::new("ce-source", "CE1")));
        assert_eq!(
            addr.filter.unwrap().query_pairs(),
            [("filter.headerName", "ce-source"), ("filter.headerValue", "CE1")]
        );
    }

    #[test]
    fn test_https_scheme() {
        let def = definition(Some("secure"), Some(8443), &[]).with_protocol(Protocol::Https);
        let addr = ServiceAddress::resolve(&def, &namespace("ns")).unwrap();
        assert_eq!(addr.to_string(), "https://secure:8443");
    }
}
