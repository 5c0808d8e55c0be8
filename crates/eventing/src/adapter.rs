//! The eventing endpoint: a logical reference bound to a physical delegate.
//!
//! [`EventingEndpoint`] owns its delegate [`PhysicalEndpoint`] and forwards
//! lifecycle calls to it explicitly. Producers it creates stamp outbound
//! messages before delegating; consumers it creates normalise inbound messages
//! before handing them downstream.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::consumer::ConsumerTransform;
use crate::environment::Environment;
use crate::errors::EventingResult;
use crate::message::Message;
use crate::ports::{Consumer, EndpointRegistry, PhysicalEndpoint, Processor, Producer};
use crate::producer::{ProduceContext, ProducerTransform};
use crate::reference::EndpointReference;
use crate::service::ServiceDefinition;
use crate::version::{Processors, SpecVersion};

/// Settings shared by every endpoint of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointConfig {
    pub spec_version: SpecVersion,
    /// Force structured-mode transmission on the producer side.
    pub json_serialization: bool,
    /// Synthesise a default definition for unknown services instead of failing.
    pub default_services: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            spec_version: SpecVersion::V0_1,
            json_serialization: false,
            default_services: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// A logical endpoint wrapping its physical delegate.
#[derive(Debug, Clone)]
pub struct EventingEndpoint {
    reference: EndpointReference,
    service: ServiceDefinition,
    processors: Processors,
    json_serialization: bool,
    delegate: Arc<dyn PhysicalEndpoint>,
}

impl EventingEndpoint {
    /// Resolves `reference` against `environment` and binds the delegate.
    ///
    /// Every failure (unknown service, bad protocol, unresolvable address)
    /// surfaces here, never later on first use.
    #[instrument(skip_all, fields(reference = %reference))]
    pub fn create(
        reference: EndpointReference,
        environment: &Environment,
        config: &EndpointConfig,
        registry: &dyn EndpointRegistry,
    ) -> EventingResult<Self> {
        let target = reference.target();
        let service = if config.default_services {
            environment.lookup_or_default(reference.service_type(), &target)?
        } else {
            environment.mandatory_lookup(reference.service_type(), &target)?
        };
        let service = reference.apply_overrides(service);

        let delegate = registry.resolve(&service)?;
        debug!(uri = %delegate.uri(), "Endpoint bound to physical delegate");

        Ok(Self {
            reference,
            service,
            processors: config.spec_version.processors(),
            json_serialization: config.json_serialization,
            delegate,
        })
    }

    pub fn reference(&self) -> &EndpointReference {
        &self.reference
    }

    pub fn service(&self) -> &ServiceDefinition {
        &self.service
    }

    pub fn spec_version(&self) -> SpecVersion {
        self.processors.version
    }

    /// Physical URI of the delegate.
    pub fn uri(&self) -> &str {
        self.delegate.uri()
    }

    pub async fn start(&self) -> EventingResult<()> {
        self.delegate.start().await?;
        info!(reference = %self.reference, uri = %self.uri(), "Endpoint started");
        Ok(())
    }

    pub async fn stop(&self) -> EventingResult<()> {
        self.delegate.stop().await?;
        info!(reference = %self.reference, uri = %self.uri(), "Endpoint stopped");
        Ok(())
    }

    pub fn create_producer(&self) -> EventingResult<EventProducer> {
        let delegate = self.delegate.create_producer()?;
        Ok(EventProducer {
            transform: self.processors.producer,
            context: ProduceContext::for_service(
                &self.service,
                self.reference.canonical(),
                self.json_serialization,
            ),
            delegate,
        })
    }

    /// Creates a consumer that normalises each message before `downstream`.
    pub fn create_consumer(
        &self,
        downstream: Arc<dyn Processor>,
    ) -> EventingResult<Arc<dyn Consumer>> {
        let processor = Arc::new(EventConsumer {
            transform: self.processors.consumer,
            downstream,
        });
        Ok(self.delegate.create_consumer(processor)?)
    }
}

// ---------------------------------------------------------------------------
// Producer / consumer wiring
// ---------------------------------------------------------------------------

/// Stamps outbound messages, then hands them to the physical producer.
pub struct EventProducer {
    transform: ProducerTransform,
    context: ProduceContext,
    delegate: Arc<dyn Producer>,
}

impl EventProducer {
    pub fn context(&self) -> &ProduceContext {
        &self.context
    }

    /// Sends one message. Transport failures propagate unchanged.
    pub async fn send(&self, mut message: Message) -> EventingResult<Message> {
        self.transform.apply(&self.context, &mut message)?;
        let reply = self.delegate.send(message).await?;
        Ok(reply)
    }
}

impl std::fmt::Debug for EventProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventProducer")
            .field("transform", &self.transform)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Normalises inbound messages, then hands them downstream.
pub struct EventConsumer {
    transform: ConsumerTransform,
    downstream: Arc<dyn Processor>,
}

#[async_trait]
impl Processor for EventConsumer {
    async fn process(&self, mut message: Message) -> EventingResult<()> {
        self.transform.apply(&mut message)?;
        self.downstream.process(message).await
    }
}
