//! Eventing bridge domain.
//!
//! Binds logical service references (`eventing:endpoint/orders`) to physical
//! HTTP endpoints described by an [`Environment`], and translates messages to
//! and from CloudEvents in the configured spec version.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no network
//! dependencies. It defines *what* a physical transport must provide through
//! the traits in [`ports`]; `transport-http` defines *how*.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`service`] | `ServiceDefinition`, `ServiceType`, `Protocol`, metadata keys |
//! | [`environment`] | Descriptor loading and service lookup |
//! | [`placeholders`] | `{{env:VAR}}` / `{{key}}` resolution |
//! | [`address`] | Physical address resolution and header filters |
//! | [`reference`] | Logical `eventing:` endpoint references |
//! | [`message`] | Messages and case-insensitive headers |
//! | [`version`] | Spec-version strategy and attribute-name tables |
//! | [`event`] | Structured-mode envelope codec |
//! | [`producer`] / [`consumer`] | Per-message outbound / inbound transforms |
//! | [`ports`] | Traits implemented by the physical transport |
//! | [`adapter`] | `EventingEndpoint`: composition over a physical delegate |
//! | [`identifiers`] | Newtype identifiers |
//! | [`types`] | Timestamps and content mode |
//! | [`errors`] | Error and retry-policy types |

pub mod adapter;
pub mod address;
pub mod consumer;
pub mod environment;
pub mod errors;
pub mod event;
pub mod identifiers;
pub mod message;
pub mod placeholders;
pub mod ports;
pub mod producer;
pub mod reference;
pub mod service;
pub mod types;
pub mod version;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use adapter::{EndpointConfig, EventConsumer, EventProducer, EventingEndpoint};
pub use address::{HeaderFilter, ServiceAddress};
pub use consumer::ConsumerTransform;
pub use environment::{Environment, EnvironmentSource};
pub use errors::{EventingError, EventingResult, RetryPolicy, TransportError};
pub use event::{EventData, StructuredEvent};
pub use identifiers::{MessageId, ServiceId, ServiceName};
pub use message::{Headers, Message};
pub use placeholders::{PlaceholderError, PlaceholderResolver, Placeholders};
pub use ports::{Consumer, EndpointRegistry, PhysicalEndpoint, Processor, Producer};
pub use producer::{ProduceContext, ProducerTransform};
pub use reference::{EndpointReference, ReferenceOverrides};
pub use service::{Protocol, ServiceDefinition, ServiceType};
pub use types::{ContentMode, Timestamp, STRUCTURED_CONTENT_TYPE};
pub use version::{processors_for, Attribute, Processors, SpecVersion};
