//! Port traits implemented by the physical transport.
//!
//! The domain never performs network I/O. An infrastructure crate supplies an
//! [`EndpointRegistry`] that turns a resolved [`ServiceDefinition`] into a
//! [`PhysicalEndpoint`], which in turn hands out producers and consumers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::{EventingResult, TransportError};
use crate::message::Message;
use crate::service::ServiceDefinition;

/// Downstream step that receives inbound messages.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Handles one message. An error is reported back to the sender.
    async fn process(&self, message: Message) -> EventingResult<()>;
}

/// Outbound half of a physical endpoint.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Sends `message` and returns the transport's reply.
    async fn send(&self, message: Message) -> Result<Message, TransportError>;
}

/// Inbound half of a physical endpoint.
///
/// A consumer only receives messages between `start` and `stop`.
#[async_trait]
pub trait Consumer: Send + Sync {
    async fn start(&self) -> Result<(), TransportError>;

    async fn stop(&self) -> Result<(), TransportError>;
}

/// A physical endpoint bound to one URI.
///
/// Endpoints are shared between every adapter that resolves to the same URI,
/// so `start` and `stop` must tolerate being called once per user.
#[async_trait]
pub trait PhysicalEndpoint: Send + Sync + std::fmt::Debug {
    /// The fully composed physical URI, query parameters included.
    fn uri(&self) -> &str;

    async fn start(&self) -> Result<(), TransportError>;

    async fn stop(&self) -> Result<(), TransportError>;

    fn create_producer(&self) -> Result<Arc<dyn Producer>, TransportError>;

    fn create_consumer(
        &self,
        processor: Arc<dyn Processor>,
    ) -> Result<Arc<dyn Consumer>, TransportError>;
}

/// Builds or reuses physical endpoints for resolved service definitions.
pub trait EndpointRegistry: Send + Sync {
    /// Returns the endpoint for `definition`, creating it on first use.
    ///
    /// Fails with a configuration error when the definition cannot be turned
    /// into a physical address.
    fn resolve(&self, definition: &ServiceDefinition) -> EventingResult<Arc<dyn PhysicalEndpoint>>;
}
