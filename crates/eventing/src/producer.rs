//! Outbound transform: stamps version-conformant attributes on a message.

use tracing::trace;

use crate::errors::EventingResult;
use crate::event::StructuredEvent;
use crate::message::{Message, CONTENT_TYPE, HOST};
use crate::service::ServiceDefinition;
use crate::types::{ContentMode, STRUCTURED_CONTENT_TYPE};
use crate::version::{Attribute, SpecVersion};

/// Per-endpoint inputs to the producer transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceContext {
    /// Event type from the target's metadata.
    pub event_type: Option<String>,
    /// Content type from the target's metadata.
    pub content_type: Option<String>,
    /// Logical endpoint reference, used as the event source.
    pub source: String,
    /// Send the whole message as one structured-mode JSON envelope.
    pub json_serialization: bool,
}

impl ProduceContext {
    pub fn for_service(
        service: &ServiceDefinition,
        source: impl Into<String>,
        json_serialization: bool,
    ) -> Self {
        Self {
            event_type: service.event_type().map(str::to_string),
            content_type: service.content_type().map(str::to_string),
            source: source.into(),
            json_serialization,
        }
    }
}

/// Producer half of a version's [`Processors`](crate::version::Processors).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerTransform {
    version: SpecVersion,
}

impl ProducerTransform {
    pub fn new(version: SpecVersion) -> Self {
        Self { version }
    }

    pub fn version(&self) -> SpecVersion {
        self.version
    }

    /// Prepares `message` for the physical producer.
    ///
    /// Attributes are only ever set when absent. The inherited `Host` header
    /// is always dropped so the transport derives it from the resolved URI.
    /// A message that is already in structured mode is not stamped again.
    pub fn apply(&self, ctx: &ProduceContext, message: &mut Message) -> EventingResult<()> {
        message.headers.remove(HOST);

        if ContentMode::of(message) == ContentMode::Structured {
            trace!(message_id = %message.id(), "Message already structured, leaving attributes as-is");
            return Ok(());
        }

        let names = self.version.names();
        let event_time = message.created().to_offset_date_time();
        let headers = &mut message.headers;

        headers.insert_if_absent(names.header(Attribute::SpecVersion), self.version.as_str());
        if let Some(event_type) = &ctx.event_type {
            headers.insert_if_absent(names.header(Attribute::Type), event_type.as_str());
        }
        if !headers.contains(&names.header(Attribute::Id)) {
            headers.insert(names.header(Attribute::Id), uuid::Uuid::new_v4().to_string());
        }
        headers.insert_if_absent(names.header(Attribute::Time), event_time);
        headers.insert_if_absent(names.header(Attribute::Source), ctx.source.as_str());
        if let Some(content_type) = &ctx.content_type {
            headers.insert_if_absent(CONTENT_TYPE, content_type.as_str());
        }

        if ctx.json_serialization {
            self.to_structured(message)?;
        }

        trace!(
            message_id = %message.id(),
            version = %self.version,
            structured = ctx.json_serialization,
            "Stamped outbound event"
        );
        Ok(())
    }

    /// Moves the stamped attributes and body into a structured envelope.
    fn to_structured(&self, message: &mut Message) -> EventingResult<()> {
        let names = self.version.names();
        let event = StructuredEvent::from_message(self.version, message);

        let attribute_headers: Vec<String> = message
            .headers
            .iter()
            .filter(|(name, _)| names.field_for_header(name).is_some())
            .map(|(name, _)| name.to_string())
            .collect();
        for name in attribute_headers {
            message.headers.remove(&name);
        }

        message.body = event.encode()?;
        message.headers.insert(CONTENT_TYPE, STRUCTURED_CONTENT_TYPE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    use super::*;

    fn context(json: bool) -> ProduceContext {
        ProduceContext {
            event_type: Some("org.example.event".to_string()),
            content_type: Some("text/plain".to_string()),
            source: "eventing://endpoint/myEndpoint".to_string(),
            json_serialization: json,
        }
    }

    #[test]
    fn test_v0_1_binary_stamping() {
        let created = Utc.with_ymd_and_hms(2019, 3, 4, 10, 15, 30).unwrap();
        let mut message = Message::created_at("test", created);

        ProducerTransform::new(SpecVersion::V0_1)
            .apply(&context(false), &mut message)
            .unwrap();

        let h = &message.headers;
        assert_eq!(h.get("CE-CloudEventsVersion"), Some("0.1"));
        assert_eq!(h.get("CE-EventType"), Some("org.example.event"));
        assert_eq!(h.get("CE-Source"), Some("eventing://endpoint/myEndpoint"));
        assert_eq!(h.get("CE-EventTime"), Some("2019-03-04T10:15:30+00:00"));
        assert_eq!(h.get(CONTENT_TYPE), Some("text/plain"));
        assert!(h.get("CE-EventID").is_some_and(|id| !id.is_empty()));
        assert_eq!(message.body_str(), Some("test"));
    }

    #[test]
    fn test_v0_2_binary_stamping() {
        let mut message = Message::new("test");
        ProducerTransform::new(SpecVersion::V0_2)
            .apply(&context(false), &mut message)
            .unwrap();

        let h = &message.headers;
        assert_eq!(h.get("ce-specversion"), Some("0.2"));
        assert_eq!(h.get("ce-type"), Some("org.example.event"));
        assert_eq!(h.get("ce-source"), Some("eventing://endpoint/myEndpoint"));
        assert!(h.contains("ce-id"));
        assert!(h.contains("ce-time"));
    }

    #[test]
    fn test_existing_attributes_are_kept() {
        let mut message = Message::new("test")
            .with_header("CE-EventType", "custom.type")
            .with_header("ce-eventid", "fixed-id")
            .with_header(CONTENT_TYPE, "application/json");

        ProducerTransform::new(SpecVersion::V0_1)
            .apply(&context(false), &mut message)
            .unwrap();

        assert_eq!(message.headers.get("CE-EventType"), Some("custom.type"));
        assert_eq!(message.headers.get("CE-EventID"), Some("fixed-id"));
        assert_eq!(message.headers.get(CONTENT_TYPE), Some("application/json"));
    }

    #[test]
    fn test_applying_twice_changes_nothing() {
        let transform = ProducerTransform::new(SpecVersion::V0_2);
        let mut message = Message::new("test");

        transform.apply(&context(false), &mut message).unwrap();
        let first = message.headers.clone();
        transform.apply(&context(false), &mut message).unwrap();

        assert_eq!(message.headers, first);
    }

    #[test]
    fn test_host_header_removed() {
        let mut message = Message::new("test").with_header("host", "caller.example.com");
        ProducerTransform::new(SpecVersion::V0_1)
            .apply(&context(false), &mut message)
            .unwrap();
        assert!(!message.headers.contains(HOST));
    }

    #[test]
    fn test_json_serialization_builds_envelope() {
        let mut message = Message::new("test").with_header("X-Trace", "t1");
        let transform = ProducerTransform::new(SpecVersion::V0_2);
        transform.apply(&context(true), &mut message).unwrap();

        assert_eq!(message.content_type(), Some(STRUCTURED_CONTENT_TYPE));
        assert!(!message.headers.contains("ce-id"));
        assert_eq!(message.headers.get("X-Trace"), Some("t1"));

        let envelope: Value = serde_json::from_slice(&message.body).unwrap();
        assert_eq!(envelope["specversion"], "0.2");
        assert_eq!(envelope["type"], "org.example.event");
        assert_eq!(envelope["source"], "eventing://endpoint/myEndpoint");
        assert_eq!(envelope["contenttype"], "text/plain");
        assert_eq!(envelope["data"], "test");
        assert!(envelope["id"].is_string());

        // A second pass leaves the envelope alone.
        let before = message.body.clone();
        transform.apply(&context(true), &mut message).unwrap();
        assert_eq!(message.body, before);
    }

    #[test]
    fn test_json_serialization_carries_binary_body() {
        let payload = vec![0xff, 0x00, 0x10];
        let mut message = Message::new(payload.clone());
        ProducerTransform::new(SpecVersion::V0_2)
            .apply(&context(true), &mut message)
            .unwrap();

        let envelope: Value = serde_json::from_slice(&message.body).unwrap();
        assert_eq!(envelope["data"], "/wAQ");

        crate::consumer::ConsumerTransform::new(SpecVersion::V0_2)
            .apply(&mut message)
            .unwrap();
        assert_eq!(message.body, payload);
        assert_eq!(message.content_type(), Some("text/plain"));
    }
}
