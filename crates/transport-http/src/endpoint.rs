//! The HTTP physical endpoint and its consumer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use eventing::{
    Consumer, PhysicalEndpoint, Processor, Producer, Protocol, ServiceAddress, TransportError,
};
use reqwest::{Client, Url};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::listener::{register_route, RouteRegistration};
use crate::producer::HttpProducer;

/// Physical endpoint for one composed URI.
///
/// Shared between every logical endpoint resolving to the same URI; `start`
/// and `stop` are counted so the endpoint stays up while any user remains.
#[derive(Debug)]
pub struct HttpEndpoint {
    uri: String,
    url: Url,
    address: ServiceAddress,
    client: Client,
    bind_host: Option<String>,
    users: Arc<AtomicUsize>,
}

impl HttpEndpoint {
    pub(crate) fn new(
        address: ServiceAddress,
        url: Url,
        client: Client,
        bind_host: Option<String>,
    ) -> Self {
        Self {
            uri: url.to_string(),
            url,
            address,
            client,
            bind_host,
            users: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// `Host` the consumer insists on, or `None` to match by path only.
    ///
    /// Uses the URL's own authority so a default port is left out, as
    /// clients send it.
    fn route_authority(&self) -> Option<String> {
        if self.address.use_relative_path {
            return None;
        }
        let host = self.url.host_str()?;
        Some(match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    /// The URL producers POST to: the composed URI without filter parameters.
    fn target_url(&self) -> Url {
        let mut url = self.url.clone();
        url.set_query(None);
        url
    }

    /// `host:port` the consumer side binds.
    fn bind_addr(&self) -> String {
        let host = self.bind_host.as_deref().unwrap_or(&self.address.host);
        let port = self.address.port.unwrap_or(match self.address.protocol {
            Protocol::Http => 80,
            Protocol::Https => 443,
        });
        format!("{host}:{port}")
    }

    fn listen_path(&self) -> String {
        self.address.path.clone().unwrap_or_else(|| "/".to_string())
    }
}

#[async_trait]
impl PhysicalEndpoint for HttpEndpoint {
    fn uri(&self) -> &str {
        &self.uri
    }

    async fn start(&self) -> Result<(), TransportError> {
        if self.users.fetch_add(1, Ordering::SeqCst) == 0 {
            info!(uri = %self.uri, "HTTP endpoint started");
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        let previous = self
            .users
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if previous == Ok(1) {
            info!(uri = %self.uri, "HTTP endpoint stopped");
        }
        Ok(())
    }

    fn create_producer(&self) -> Result<Arc<dyn Producer>, TransportError> {
        Ok(Arc::new(HttpProducer::new(
            self.client.clone(),
            self.target_url(),
            self.address.filter.clone(),
            self.users.clone(),
        )))
    }

    fn create_consumer(
        &self,
        processor: Arc<dyn Processor>,
    ) -> Result<Arc<dyn Consumer>, TransportError> {
        if self.address.protocol == Protocol::Https {
            return Err(TransportError::Bind {
                addr: self.bind_addr(),
                message: "TLS listeners are not supported".to_string(),
            });
        }
        Ok(Arc::new(HttpConsumer {
            bind_addr: self.bind_addr(),
            path: self.listen_path(),
            filter: self.address.filter.clone(),
            authority: self.route_authority(),
            processor,
            registration: Mutex::new(None),
        }))
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

/// Receives POSTs for one path (and filter) on the shared listener.
pub struct HttpConsumer {
    bind_addr: String,
    path: String,
    filter: Option<eventing::HeaderFilter>,
    authority: Option<String>,
    processor: Arc<dyn Processor>,
    registration: Mutex<Option<RouteRegistration>>,
}

#[async_trait]
impl Consumer for HttpConsumer {
    async fn start(&self) -> Result<(), TransportError> {
        let mut registration = self.registration.lock().await;
        if registration.is_none() {
            *registration = Some(
                register_route(
                    &self.bind_addr,
                    &self.path,
                    self.filter.clone(),
                    self.authority.clone(),
                    self.processor.clone(),
                )
                .await?,
            );
            debug!(addr = %self.bind_addr, path = %self.path, "Consumer started");
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        if self.registration.lock().await.take().is_some() {
            debug!(addr = %self.bind_addr, path = %self.path, "Consumer stopped");
        }
        Ok(())
    }
}
