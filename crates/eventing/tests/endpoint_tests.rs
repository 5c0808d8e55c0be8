//! End-to-end behaviour of `EventingEndpoint` over an in-memory transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use eventing::{
    Consumer, EndpointConfig, EndpointRegistry, Environment, EventingEndpoint,
    EventingError, EventingResult, Message, PhysicalEndpoint, Placeholders, Processor, Producer,
    ServiceAddress, ServiceDefinition, SpecVersion, StructuredEvent, TransportError,
    STRUCTURED_CONTENT_TYPE,
};

const DESCRIPTOR: &str = r#"{
    "services": [
        {
            "type": "endpoint",
            "protocol": "http",
            "name": "myEndpoint",
            "host": "localhost",
            "port": 9001,
            "metadata": {
                "service.path": "/a/path",
                "event.type": "org.example.event",
                "content.type": "text/plain"
            }
        }
    ]
}"#;

// ---------------------------------------------------------------------------
// In-memory transport
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryEndpoint {
    uri: String,
    starts: AtomicUsize,
    stops: AtomicUsize,
    sent: Arc<Mutex<Vec<Message>>>,
    processors: Mutex<Vec<Arc<dyn Processor>>>,
}

impl std::fmt::Debug for MemoryEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEndpoint").field("uri", &self.uri).finish()
    }
}

impl MemoryEndpoint {
    /// Delivers `message` the way a listener would.
    async fn deliver(&self, message: Message) -> EventingResult<()> {
        let processor = self.processors.lock().unwrap()[0].clone();
        processor.process(message).await
    }
}

struct MemoryProducer {
    sent: Arc<Mutex<Vec<Message>>>,
}

#[async_trait]
impl Producer for MemoryProducer {
    async fn send(&self, message: Message) -> Result<Message, TransportError> {
        self.sent.lock().unwrap().push(message);
        Ok(Message::new("ok"))
    }
}

struct NoopConsumer;

#[async_trait]
impl Consumer for NoopConsumer {
    async fn start(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[async_trait]
impl PhysicalEndpoint for MemoryEndpoint {
    fn uri(&self) -> &str {
        &self.uri
    }

    async fn start(&self) -> Result<(), TransportError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn create_producer(&self) -> Result<Arc<dyn Producer>, TransportError> {
        Ok(Arc::new(MemoryProducer {
            sent: self.sent.clone(),
        }))
    }

    fn create_consumer(
        &self,
        processor: Arc<dyn Processor>,
    ) -> Result<Arc<dyn Consumer>, TransportError> {
        self.processors.lock().unwrap().push(processor);
        Ok(Arc::new(NoopConsumer))
    }
}

struct MemoryRegistry {
    placeholders: Placeholders,
    endpoints: Mutex<Vec<Arc<MemoryEndpoint>>>,
}

impl MemoryRegistry {
    fn new() -> Self {
        Self {
            placeholders: Placeholders::from_properties(HashMap::from([(
                "NAMESPACE".to_string(),
                "default".to_string(),
            )])),
            endpoints: Mutex::new(Vec::new()),
        }
    }

    fn last(&self) -> Arc<MemoryEndpoint> {
        self.endpoints.lock().unwrap().last().unwrap().clone()
    }
}

impl EndpointRegistry for MemoryRegistry {
    fn resolve(&self, definition: &ServiceDefinition) -> EventingResult<Arc<dyn PhysicalEndpoint>> {
        let address = ServiceAddress::resolve(definition, &self.placeholders)?;
        let endpoint = Arc::new(MemoryEndpoint {
            uri: address.to_string(),
            ..MemoryEndpoint::default()
        });
        self.endpoints.lock().unwrap().push(endpoint.clone());
        Ok(endpoint)
    }
}

#[derive(Default)]
struct Collect {
    received: Mutex<Vec<Message>>,
}

#[async_trait]
impl Processor for Collect {
    async fn process(&self, message: Message) -> EventingResult<()> {
        self.received.lock().unwrap().push(message);
        Ok(())
    }
}

fn config(version: SpecVersion) -> EndpointConfig {
    EndpointConfig {
        spec_version: version,
        ..EndpointConfig::default()
    }
}

fn endpoint(reference: &str, config: &EndpointConfig, registry: &MemoryRegistry) -> EventingResult<EventingEndpoint> {
    let env = Environment::from_json(DESCRIPTOR).unwrap();
    EventingEndpoint::create(reference.parse()?, &env, config, registry)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_producer_stamps_v0_1_attributes() {
    let registry = MemoryRegistry::new();
    let ep = endpoint("eventing:endpoint/myEndpoint", &config(SpecVersion::V0_1), &registry).unwrap();
    assert_eq!(ep.uri(), "http://localhost:9001/a/path");

    let reply = ep
        .create_producer()
        .unwrap()
        .send(Message::new("test").with_header("Host", "caller"))
        .await
        .unwrap();
    assert_eq!(reply.body_str(), Some("ok"));

    let sent = registry.last().sent.lock().unwrap()[0].clone();
    let h = &sent.headers;
    assert_eq!(h.get("CE-CloudEventsVersion"), Some("0.1"));
    assert_eq!(h.get("CE-EventType"), Some("org.example.event"));
    assert_eq!(h.get("CE-Source"), Some("eventing://endpoint/myEndpoint"));
    assert_eq!(h.get("Content-Type"), Some("text/plain"));
    assert!(h.contains("CE-EventID"));
    assert!(h.contains("CE-EventTime"));
    assert!(!h.contains("Host"));
    assert_eq!(sent.body_str(), Some("test"));
}

#[tokio::test]
async fn test_context_path_from_reference() {
    let registry = MemoryRegistry::new();
    let ep = endpoint(
        "eventing:endpoint/myEndpoint/another/path",
        &config(SpecVersion::V0_1),
        &registry,
    )
    .unwrap();
    assert_eq!(ep.uri(), "http://localhost:9001/another/path");
}

#[tokio::test]
async fn test_consumer_unpacks_v0_2_structured_event() {
    let registry = MemoryRegistry::new();
    let ep = endpoint("eventing:endpoint/myEndpoint", &config(SpecVersion::V0_2), &registry).unwrap();
    let downstream = Arc::new(Collect::default());
    ep.create_consumer(downstream.clone()).unwrap();

    let body = json!({
        "specversion": "0.2",
        "type": "org.example.event",
        "id": "X1",
        "time": "2019-03-04T10:15:30+00:00",
        "source": "/somewhere",
        "data": "test"
    });
    let message = Message::new(body.to_string()).with_header("Content-Type", STRUCTURED_CONTENT_TYPE);
    registry.last().deliver(message).await.unwrap();

    let received = downstream.received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].headers.get("ce-id"), Some("X1"));
    assert_eq!(received[0].headers.get("ce-source"), Some("/somewhere"));
    assert_eq!(received[0].body_str(), Some("test"));
}

#[tokio::test]
async fn test_malformed_event_is_not_delivered() {
    let registry = MemoryRegistry::new();
    let ep = endpoint("eventing:endpoint/myEndpoint", &config(SpecVersion::V0_2), &registry).unwrap();
    let downstream = Arc::new(Collect::default());
    ep.create_consumer(downstream.clone()).unwrap();

    let message = Message::new("{broken").with_header("Content-Type", STRUCTURED_CONTENT_TYPE);
    let err = registry.last().deliver(message).await.unwrap_err();

    assert!(matches!(err, EventingError::MalformedEvent { .. }));
    assert!(downstream.received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_structured_round_trip_through_consumer() {
    let mut event = StructuredEvent::new(SpecVersion::V0_2);
    event.content_type = Some("text/plain".to_string());
    event.data = Some(eventing::EventData::Json(json!("hello")));
    event.extensions.insert("traceparent".to_string(), json!("00-abc-def-01"));

    let registry = MemoryRegistry::new();
    let ep = endpoint("eventing:endpoint/myEndpoint", &config(SpecVersion::V0_2), &registry).unwrap();
    let downstream = Arc::new(Collect::default());
    ep.create_consumer(downstream.clone()).unwrap();

    let message = Message::new(event.encode().unwrap()).with_header("Content-Type", STRUCTURED_CONTENT_TYPE);
    registry.last().deliver(message).await.unwrap();

    let received = downstream.received.lock().unwrap();
    let received = &received[0];
    assert_eq!(received.content_type(), Some("text/plain"));
    assert_eq!(received.body_str(), Some("hello"));
    assert_eq!(received.headers.get("traceparent"), Some("00-abc-def-01"));
}

#[tokio::test]
async fn test_json_serialization_then_consume_restores_body() {
    let registry = MemoryRegistry::new();
    let cfg = EndpointConfig {
        spec_version: SpecVersion::V0_2,
        json_serialization: true,
        ..EndpointConfig::default()
    };
    let ep = endpoint("eventing:endpoint/myEndpoint", &cfg, &registry).unwrap();
    ep.create_producer().unwrap().send(Message::new("test")).await.unwrap();
    let sent = registry.last().sent.lock().unwrap()[0].clone();
    assert_eq!(sent.content_type(), Some(STRUCTURED_CONTENT_TYPE));

    let downstream = Arc::new(Collect::default());
    ep.create_consumer(downstream.clone()).unwrap();
    registry.last().deliver(sent).await.unwrap();

    let received = downstream.received.lock().unwrap();
    let received = &received[0];
    assert_eq!(received.content_type(), Some("text/plain"));
    assert_eq!(received.body_str(), Some("test"));
    assert_eq!(received.headers.get("ce-type"), Some("org.example.event"));
    assert_eq!(received.headers.get("ce-source"), Some("eventing://endpoint/myEndpoint"));
}

#[tokio::test]
async fn test_unknown_service_uses_default_definition() {
    let registry = MemoryRegistry::new();
    let ep = endpoint("eventing:channel/orders/in", &config(SpecVersion::V0_1), &registry).unwrap();
    assert_eq!(ep.uri(), "http://orders.default/in");
}

#[tokio::test]
async fn test_unknown_service_without_defaults_is_not_found() {
    let registry = MemoryRegistry::new();
    let cfg = EndpointConfig {
        default_services: false,
        ..EndpointConfig::default()
    };
    let err = endpoint("eventing:channel/orders", &cfg, &registry).unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"Unable to find the service "orders" with type "channel""#
    );
}

#[tokio::test]
async fn test_lifecycle_is_forwarded_to_delegate() {
    let registry = MemoryRegistry::new();
    let ep = endpoint("eventing:endpoint/myEndpoint", &config(SpecVersion::V0_1), &registry).unwrap();

    ep.start().await.unwrap();
    ep.stop().await.unwrap();

    let delegate = registry.last();
    assert_eq!(delegate.starts.load(Ordering::SeqCst), 1);
    assert_eq!(delegate.stops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_reference_overrides_reach_the_delegate() {
    let registry = MemoryRegistry::new();
    let ep = endpoint(
        "eventing:endpoint/myEndpoint?protocol=https&host=example.com&port=8443&path=/x",
        &config(SpecVersion::V0_1),
        &registry,
    )
    .unwrap();
    assert_eq!(ep.uri(), "https://example.com:8443/x");
    assert_eq!(
        ep.create_producer().unwrap().context().source,
        "eventing://endpoint/myEndpoint"
    );
}
