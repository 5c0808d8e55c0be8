//! CloudEvents spec-version strategy.
//!
//! Each supported version is one variant of [`SpecVersion`] paired with a
//! static [`AttributeNames`] table. The producer and consumer transforms are
//! the same code for every version; only the table differs. Adding a version
//! means adding a variant and a table.
//!
//! | version | spec-version | type | id | time | headers |
//! |---------|--------------|------|----|------|---------|
//! | 0.1 | `cloudEventsVersion` | `eventType` | `eventID` | `eventTime` | `CE-<Capitalized>` |
//! | 0.2 | `specversion` | `type` | `id` | `time` | `ce-<lowercase>` |

use std::str::FromStr;

use crate::consumer::ConsumerTransform;
use crate::errors::{EventingError, EventingResult};
use crate::producer::ProducerTransform;

/// Logical event attributes stamped by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    SpecVersion,
    Type,
    Id,
    Time,
    Source,
}

impl Attribute {
    pub const ALL: [Attribute; 5] = [
        Attribute::SpecVersion,
        Attribute::Type,
        Attribute::Id,
        Attribute::Time,
        Attribute::Source,
    ];
}

/// How a version spells envelope field names as headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCase {
    /// `CE-` + field with its first letter upper-cased (`CE-EventType`).
    Capitalized,
    /// `ce-` + field lower-cased (`ce-type`).
    Lowercase,
}

/// Field and header naming for one spec version.
#[derive(Debug, PartialEq, Eq)]
pub struct AttributeNames {
    pub spec_version: &'static str,
    pub event_type: &'static str,
    pub id: &'static str,
    pub time: &'static str,
    pub source: &'static str,
    pub content_type: &'static str,
    pub data: &'static str,
    pub extensions: &'static str,
    pub header_prefix: &'static str,
    pub header_case: HeaderCase,
}

impl AttributeNames {
    /// Envelope field name for `attribute`.
    pub fn field(&self, attribute: Attribute) -> &'static str {
        match attribute {
            Attribute::SpecVersion => self.spec_version,
            Attribute::Type => self.event_type,
            Attribute::Id => self.id,
            Attribute::Time => self.time,
            Attribute::Source => self.source,
        }
    }

    /// Binary-mode header name for `attribute`.
    pub fn header(&self, attribute: Attribute) -> String {
        self.header_for_field(self.field(attribute))
    }

    /// Binary-mode header name for an arbitrary top-level envelope field.
    pub fn header_for_field(&self, field: &str) -> String {
        match self.header_case {
            HeaderCase::Capitalized => {
                let mut chars = field.chars();
                match chars.next() {
                    Some(first) => format!(
                        "{}{}{}",
                        self.header_prefix,
                        first.to_uppercase(),
                        chars.as_str()
                    ),
                    None => self.header_prefix.to_string(),
                }
            }
            HeaderCase::Lowercase => {
                format!("{}{}", self.header_prefix, field.to_lowercase())
            }
        }
    }

    /// Maps a binary-mode header back to its envelope field name.
    ///
    /// Returns `None` for headers without this version's prefix. Known
    /// attributes map to their exact field spelling.
    pub fn field_for_header(&self, header: &str) -> Option<String> {
        let prefix_len = self.header_prefix.len();
        if header.len() <= prefix_len
            || !header.is_char_boundary(prefix_len)
            || !header[..prefix_len].eq_ignore_ascii_case(self.header_prefix)
        {
            return None;
        }

        if let Some(attribute) = Attribute::ALL
            .into_iter()
            .find(|a| self.header(*a).eq_ignore_ascii_case(header))
        {
            return Some(self.field(attribute).to_string());
        }

        let suffix = &header[prefix_len..];
        Some(match self.header_case {
            HeaderCase::Capitalized => {
                let mut chars = suffix.chars();
                match chars.next() {
                    Some(first) => format!("{}{}", first.to_lowercase(), chars.as_str()),
                    None => String::new(),
                }
            }
            HeaderCase::Lowercase => suffix.to_lowercase(),
        })
    }
}

static V0_1_NAMES: AttributeNames = AttributeNames {
    spec_version: "cloudEventsVersion",
    event_type: "eventType",
    id: "eventID",
    time: "eventTime",
    source: "source",
    content_type: "contentType",
    data: "data",
    extensions: "extensions",
    header_prefix: "CE-",
    header_case: HeaderCase::Capitalized,
};

static V0_2_NAMES: AttributeNames = AttributeNames {
    spec_version: "specversion",
    event_type: "type",
    id: "id",
    time: "time",
    source: "source",
    content_type: "contenttype",
    data: "data",
    extensions: "extensions",
    header_prefix: "ce-",
    header_case: HeaderCase::Lowercase,
};

/// A supported CloudEvents spec version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecVersion {
    V0_1,
    V0_2,
}

impl SpecVersion {
    /// Every registered version, oldest first.
    pub const ALL: [SpecVersion; 2] = [SpecVersion::V0_1, SpecVersion::V0_2];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::V0_1 => "0.1",
            Self::V0_2 => "0.2",
        }
    }

    pub fn names(self) -> &'static AttributeNames {
        match self {
            Self::V0_1 => &V0_1_NAMES,
            Self::V0_2 => &V0_2_NAMES,
        }
    }

    /// The `{producer, consumer}` transform pair for this version.
    pub fn processors(self) -> Processors {
        Processors {
            version: self,
            producer: ProducerTransform::new(self),
            consumer: ConsumerTransform::new(self),
        }
    }
}

impl FromStr for SpecVersion {
    type Err = EventingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| EventingError::UnsupportedVersion {
                version: s.to_string(),
            })
    }
}

impl std::fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Producer and consumer transforms bound to one spec version.
///
/// Plain `Copy` data: safe to share and call from any number of workers.
#[derive(Debug, Clone, Copy)]
pub struct Processors {
    pub version: SpecVersion,
    pub producer: ProducerTransform,
    pub consumer: ConsumerTransform,
}

/// Looks up the transform pair for a configured version string.
pub fn processors_for(version: &str) -> EventingResult<Processors> {
    Ok(version.parse::<SpecVersion>()?.processors())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v0_1_header_names() {
        let names = SpecVersion::V0_1.names();
        assert_eq!(names.header(Attribute::SpecVersion), "CE-CloudEventsVersion");
        assert_eq!(names.header(Attribute::Type), "CE-EventType");
        assert_eq!(names.header(Attribute::Id), "CE-EventID");
        assert_eq!(names.header(Attribute::Time), "CE-EventTime");
        assert_eq!(names.header(Attribute::Source), "CE-Source");
    }

    #[test]
    fn test_v0_2_header_names() {
        let names = SpecVersion::V0_2.names();
        assert_eq!(names.header(Attribute::SpecVersion), "ce-specversion");
        assert_eq!(names.header(Attribute::Type), "ce-type");
        assert_eq!(names.header(Attribute::Id), "ce-id");
        assert_eq!(names.header(Attribute::Time), "ce-time");
        assert_eq!(names.header(Attribute::Source), "ce-source");
    }

    #[test]
    fn test_versions_have_distinct_names() {
        let v1 = SpecVersion::V0_1.names();
        let v2 = SpecVersion::V0_2.names();
        for attribute in Attribute::ALL {
            if attribute != Attribute::Source {
                assert_ne!(v1.field(attribute), v2.field(attribute));
            }
            assert_ne!(v1.header(attribute), v2.header(attribute));
        }
        assert_ne!(v1.content_type, v2.content_type);
    }

    #[test]
    fn test_field_for_header_round_trips_known_attributes() {
        for version in SpecVersion::ALL {
            let names = version.names();
            for attribute in Attribute::ALL {
                let header = names.header(attribute).to_ascii_lowercase();
                assert_eq!(
                    names.field_for_header(&header).as_deref(),
                    Some(names.field(attribute))
                );
            }
        }
    }

    #[test]
    fn test_field_for_header_unknown_and_foreign() {
        let v1 = SpecVersion::V0_1.names();
        assert_eq!(v1.field_for_header("CE-MyExt").as_deref(), Some("myExt"));
        assert_eq!(v1.field_for_header("Content-Type"), None);
        assert_eq!(v1.field_for_header("CE-"), None);

        let v2 = SpecVersion::V0_2.names();
        assert_eq!(v2.field_for_header("CE-MyExt").as_deref(), Some("myext"));
    }

    #[test]
    fn test_version_dispatch() {
        assert_eq!(processors_for("0.1").unwrap().version, SpecVersion::V0_1);
        assert_eq!(processors_for("0.2").unwrap().version, SpecVersion::V0_2);
        assert!(matches!(
            processors_for("1.0"),
            Err(EventingError::UnsupportedVersion { version }) if version == "1.0"
        ));
    }
}
