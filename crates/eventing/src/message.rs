//! Messages exchanged with the enclosing pipeline.
//!
//! A [`Message`] is a body plus a header map. Header names are compared
//! case-insensitively, as on HTTP, while the first spelling used for a name is
//! preserved on output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::identifiers::MessageId;
use crate::types::Timestamp;

/// Transport header carrying the payload content type.
pub const CONTENT_TYPE: &str = "Content-Type";
/// Transport header carrying the request authority.
pub const HOST: &str = "Host";

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// Case-insensitive, ordered header map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    // lowercase name -> (original name, value)
    entries: BTreeMap<String, (String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of `name`, matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|(_, v)| v.as_str())
    }

    /// Whether `name` is present, ignoring case.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Sets `name` to `value`, replacing any existing value.
    ///
    /// The spelling of an existing name is kept.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        self.entries
            .entry(name.to_ascii_lowercase())
            .and_modify(|(_, v)| *v = value.clone())
            .or_insert((name, value));
    }

    /// Sets `name` to `value` only when no value is present.
    ///
    /// Returns `true` when the value was inserted.
    pub fn insert_if_absent(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        let key = name.to_ascii_lowercase();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, (name, value.into()));
        true
    }

    /// Removes `name`, ignoring case, and returns its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries
            .remove(&name.to_ascii_lowercase())
            .map(|(_, v)| v)
    }

    /// Iterates `(name, value)` pairs using the preserved spelling.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One unit of work flowing through the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: MessageId,
    created: Timestamp,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Message {
    /// Creates a message stamped with the current time.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            id: MessageId::new_random(),
            created: Timestamp::now(),
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// Creates a message with an explicit creation time.
    pub fn created_at(body: impl Into<Vec<u8>>, created: DateTime<Utc>) -> Self {
        Self {
            created: Timestamp::from_utc(created),
            ..Self::new(body)
        }
    }

    /// Adds a header, builder-style.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn created(&self) -> Timestamp {
        self.created
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE)
    }

    /// Returns the body as UTF-8 text, if it is valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}
