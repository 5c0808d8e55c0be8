//! Build-or-reuse cache of HTTP endpoints, keyed by composed URI.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use eventing::{
    EndpointRegistry, EventingError, EventingResult, PhysicalEndpoint, PlaceholderResolver,
    ServiceAddress, ServiceDefinition, TransportError,
};
use parking_lot::Mutex;
use reqwest::{Client, ClientBuilder, Url};
use tracing::{debug, info};

use crate::endpoint::HttpEndpoint;

/// Settings for the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    /// Per-request timeout for producers.
    pub timeout: Duration,
    /// Host consumers bind instead of the service host (e.g. `0.0.0.0`).
    pub bind_host: Option<String>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            bind_host: None,
        }
    }
}

/// [`EndpointRegistry`] over HTTP.
pub struct HttpEndpointRegistry {
    client: Client,
    bind_host: Option<String>,
    placeholders: Arc<dyn PlaceholderResolver>,
    endpoints: Mutex<HashMap<String, Arc<HttpEndpoint>>>,
}

impl HttpEndpointRegistry {
    pub fn new(
        config: HttpTransportConfig,
        placeholders: Arc<dyn PlaceholderResolver>,
    ) -> Result<Self, TransportError> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Io(format!("unable to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            bind_host: config.bind_host,
            placeholders,
            endpoints: Mutex::new(HashMap::new()),
        })
    }

    /// Number of distinct physical endpoints created so far.
    pub fn len(&self) -> usize {
        self.endpoints.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.lock().is_empty()
    }
}

impl EndpointRegistry for HttpEndpointRegistry {
    fn resolve(&self, definition: &ServiceDefinition) -> EventingResult<Arc<dyn PhysicalEndpoint>> {
        let address = ServiceAddress::resolve(definition, self.placeholders.as_ref())?;
        let url = physical_url(&address)?;
        let key = url.to_string();

        let mut endpoints = self.endpoints.lock();
        if let Some(existing) = endpoints.get(&key) {
            debug!(uri = %key, "Reusing HTTP endpoint");
            return Ok(existing.clone());
        }

        let endpoint = Arc::new(HttpEndpoint::new(
            address,
            url,
            self.client.clone(),
            self.bind_host.clone(),
        ));
        endpoints.insert(key.clone(), endpoint.clone());
        info!(uri = %key, service = %definition.name(), "Created HTTP endpoint");
        Ok(endpoint)
    }
}

/// Composes the physical URL, appending the header filter as query parameters.
pub fn physical_url(address: &ServiceAddress) -> EventingResult<Url> {
    let mut url = Url::parse(&address.to_string()).map_err(|e| {
        EventingError::configuration(format!("invalid physical address '{address}': {e}"))
    })?;
    if let Some(filter) = &address.filter {
        url.query_pairs_mut().extend_pairs(filter.query_pairs());
    }
    Ok(url)
}
