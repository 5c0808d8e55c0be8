//! Inbound transform: turns structured-mode messages into binary-mode ones.

use tracing::{debug, trace};

use crate::errors::EventingResult;
use crate::event::StructuredEvent;
use crate::message::{Message, HOST};
use crate::types::ContentMode;
use crate::version::SpecVersion;

/// Consumer half of a version's [`Processors`](crate::version::Processors).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerTransform {
    version: SpecVersion,
}

impl ConsumerTransform {
    pub fn new(version: SpecVersion) -> Self {
        Self { version }
    }

    pub fn version(&self) -> SpecVersion {
        self.version
    }

    /// Normalises an inbound message.
    ///
    /// Binary-mode messages pass through untouched. Structured-mode bodies are
    /// parsed and spread over headers and body; a malformed body fails with
    /// [`EventingError::MalformedEvent`](crate::EventingError::MalformedEvent)
    /// and leaves the message as it was.
    pub fn apply(&self, message: &mut Message) -> EventingResult<ContentMode> {
        let mode = ContentMode::of(message);
        if mode == ContentMode::Binary {
            trace!(message_id = %message.id(), "Binary-mode event, passing through");
            return Ok(mode);
        }

        let event = StructuredEvent::decode(self.version, &message.body)?;
        let transport_host = message.headers.get(HOST).map(str::to_string);

        event.apply_to(message);

        // `Host` belongs to the transport; an envelope field or extension of
        // that name never replaces it.
        match transport_host {
            Some(host) => message.headers.insert(HOST, host),
            None => {
                message.headers.remove(HOST);
            }
        }

        debug!(
            message_id = %message.id(),
            version = %self.version,
            "Unpacked structured-mode event"
        );
        Ok(mode)
    }
}
