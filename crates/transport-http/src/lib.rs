//! HTTP transport for the eventing bridge.
//!
//! Implements the `eventing` port traits over HTTP: producers POST with
//! `reqwest`, consumers register routes on a shared `axum` listener.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** No domain rules live here. Address resolution and
//! message transforms come from `eventing`; this crate only composes URIs,
//! caches endpoints and moves bytes.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`registry`] | `HttpEndpointRegistry`: URI composition and endpoint cache |
//! | [`endpoint`] | `HttpEndpoint` and its consumer |
//! | [`producer`] | `HttpProducer` |
//! | [`listener`] | Shared per-address listener with path and header-filter routing |

pub mod endpoint;
pub mod listener;
pub mod producer;
pub mod registry;

pub use endpoint::{HttpConsumer, HttpEndpoint};
pub use producer::{HttpProducer, STATUS_HEADER};
pub use registry::{physical_url, HttpEndpointRegistry, HttpTransportConfig};
