//! Structured-mode envelope for one spec version.
//!
//! A [`StructuredEvent`] is the JSON object that forms a structured-mode
//! body. Its top-level fields are split into the attribute fields, the
//! content type, the data, and the extensions object, all named according to
//! the version's [`AttributeNames`](crate::version::AttributeNames) table.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Value};

use crate::errors::{EventingError, EventingResult};
use crate::message::{Message, CONTENT_TYPE};
use crate::types::STRUCTURED_CONTENT_TYPE;
use crate::version::{Attribute, SpecVersion};

/// Envelope field marking `data` as a base64 string.
pub const DATA_ENCODING_FIELD: &str = "datacontentencoding";
/// The only `datacontentencoding` value understood.
pub const BASE64_ENCODING: &str = "base64";

/// Payload carried in the `data` field.
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    /// Embedded as-is: JSON values and text.
    Json(Value),
    /// Bytes that are not text, carried as base64.
    Binary(Vec<u8>),
}

/// One event in structured form.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredEvent {
    version: SpecVersion,
    /// Top-level fields other than content type, data and extensions.
    pub fields: BTreeMap<String, Value>,
    pub content_type: Option<String>,
    pub data: Option<EventData>,
    pub extensions: BTreeMap<String, Value>,
}

impl StructuredEvent {
    /// Creates an empty event with the spec-version field already set.
    pub fn new(version: SpecVersion) -> Self {
        let mut event = Self {
            version,
            fields: BTreeMap::new(),
            content_type: None,
            data: None,
            extensions: BTreeMap::new(),
        };
        event.set(Attribute::SpecVersion, version.as_str());
        event
    }

    pub fn version(&self) -> SpecVersion {
        self.version
    }

    /// Sets a logical attribute using this version's field name.
    pub fn set(&mut self, attribute: Attribute, value: impl Into<String>) {
        let field = self.version.names().field(attribute);
        self.fields
            .insert(field.to_string(), Value::String(value.into()));
    }

    /// Returns a logical attribute as a string, when present and a string.
    pub fn get(&self, attribute: Attribute) -> Option<&str> {
        self.fields
            .get(self.version.names().field(attribute))
            .and_then(Value::as_str)
    }

    // -----------------------------------------------------------------------
    // Wire encoding
    // -----------------------------------------------------------------------

    /// Serialises the envelope to its JSON body.
    pub fn encode(&self) -> EventingResult<Vec<u8>> {
        let names = self.version.names();
        let mut object: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if let Some(ct) = &self.content_type {
            object.insert(names.content_type.to_string(), Value::String(ct.clone()));
        }
        match &self.data {
            Some(EventData::Json(value)) => {
                object.insert(names.data.to_string(), value.clone());
            }
            Some(EventData::Binary(bytes)) => {
                object.insert(names.data.to_string(), Value::String(STANDARD.encode(bytes)));
                object.insert(
                    DATA_ENCODING_FIELD.to_string(),
                    Value::String(BASE64_ENCODING.to_string()),
                );
            }
            None => {}
        }
        if !self.extensions.is_empty() {
            let extensions: Map<String, Value> = self
                .extensions
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            object.insert(names.extensions.to_string(), Value::Object(extensions));
        }

        serde_json::to_vec(&Value::Object(object))
            .map_err(|e| EventingError::malformed(format!("unable to encode envelope: {e}")))
    }

    /// Parses a structured body. The body must be one JSON object.
    pub fn decode(version: SpecVersion, body: &[u8]) -> EventingResult<Self> {
        let names = version.names();
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| EventingError::malformed(format!("invalid JSON envelope: {e}")))?;
        let Value::Object(mut object) = value else {
            return Err(EventingError::malformed("envelope is not a JSON object"));
        };

        let content_type = object
            .remove(names.content_type)
            .and_then(non_empty)
            .map(header_value);
        let base64 = object
            .get(DATA_ENCODING_FIELD)
            .and_then(Value::as_str)
            .is_some_and(|e| e.eq_ignore_ascii_case(BASE64_ENCODING));
        if base64 {
            object.remove(DATA_ENCODING_FIELD);
        }
        let data = match object.remove(names.data).and_then(non_empty) {
            Some(Value::String(encoded)) if base64 => {
                let bytes = STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| EventingError::malformed(format!("invalid base64 data: {e}")))?;
                Some(EventData::Binary(bytes))
            }
            Some(_) if base64 => {
                return Err(EventingError::malformed("base64 data is not a string"));
            }
            other => other.map(EventData::Json),
        };
        let extensions = match object.remove(names.extensions).and_then(non_empty) {
            Some(Value::Object(ext)) => ext.into_iter().collect(),
            _ => BTreeMap::new(),
        };

        Ok(Self {
            version,
            fields: object.into_iter().collect(),
            content_type,
            data,
            extensions,
        })
    }

    // -----------------------------------------------------------------------
    // Message mapping
    // -----------------------------------------------------------------------

    /// Builds the envelope from a binary-mode message.
    ///
    /// Every header carrying this version's prefix becomes a top-level field;
    /// the `Content-Type` header becomes the content-type field; the body becomes
    /// `data`, embedded as JSON when the content type is JSON and the body parses,
    /// as a string when it is text, and as base64 otherwise.
    pub fn from_message(version: SpecVersion, message: &Message) -> Self {
        let names = version.names();
        let mut event = Self::new(version);

        for (header, value) in message.headers.iter() {
            if let Some(field) = names.field_for_header(header) {
                event.fields.insert(field, Value::String(value.to_string()));
            }
        }

        event.content_type = message
            .content_type()
            .filter(|ct| !ct.eq_ignore_ascii_case(STRUCTURED_CONTENT_TYPE))
            .map(str::to_string);

        if !message.body.is_empty() {
            let json = event.content_type.as_deref().is_some_and(is_json_media_type);
            let embedded = if json {
                serde_json::from_slice::<Value>(&message.body).ok()
            } else {
                None
            };
            event.data = Some(match embedded {
                Some(value) => EventData::Json(value),
                None => match std::str::from_utf8(&message.body) {
                    Ok(text) => EventData::Json(Value::String(text.to_string())),
                    Err(_) => EventData::Binary(message.body.clone()),
                },
            });
        }

        event
    }

    /// Writes the envelope onto `message` as binary-mode headers and body.
    ///
    /// Content type goes to `Content-Type`, data to the body, each extension to
    /// a plain header, and every other field to a header in this version's
    /// casing. Absent or empty values leave the message untouched.
    pub fn apply_to(self, message: &mut Message) {
        let names = self.version.names();

        if let Some(ct) = self.content_type {
            message.headers.insert(CONTENT_TYPE, ct);
        }
        if let Some(data) = self.data {
            message.body = match data {
                EventData::Json(Value::String(s)) => s.into_bytes(),
                EventData::Json(other) => other.to_string().into_bytes(),
                EventData::Binary(bytes) => bytes,
            };
        }
        for (key, value) in self.extensions {
            if let Some(value) = non_empty(value) {
                message.headers.insert(key, header_value(value));
            }
        }
        for (field, value) in self.fields {
            if let Some(value) = non_empty(value) {
                message
                    .headers
                    .insert(names.header_for_field(&field), header_value(value));
            }
        }
    }
}

/// `None` for null, empty strings, empty arrays and empty objects.
fn non_empty(value: Value) -> Option<Value> {
    match &value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        _ => Some(value),
    }
}

/// Header text for a JSON value: strings verbatim, anything else as JSON.
fn header_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn is_json_media_type(content_type: &str) -> bool {
    let media_type = content_type.split(';').next().unwrap_or("").trim();
    media_type.eq_ignore_ascii_case("application/json")
        || media_type.to_ascii_lowercase().ends_with("+json")
}
