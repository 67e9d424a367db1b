// Entity Models - the five record kinds tracked by the registry
//
// Each entity has:
// - An opaque string identity, unique within its own collection
// - Plain values (names, scales, areas, timestamps)
// - Foreign references held as ids, never as embedded copies
//
// The registry owns every stored entity; these types carry no storage logic.

pub mod image;
pub mod measurement;
pub mod microscope;
pub mod operator;
pub mod sample;

pub use image::{Image, SUPPORTED_IMAGE_EXTENSIONS};
pub use measurement::Measurement;
pub use microscope::{Microscope, MicroscopeQuality};
pub use operator::{AccessLevel, Operation, Operator};
pub use sample::{Sample, SampleStatus};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ENTITY KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Operator,
    Microscope,
    Sample,
    Image,
    Measurement,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Operator => "operator",
            EntityKind::Microscope => "microscope",
            EntityKind::Sample => "sample",
            EntityKind::Image => "image",
            EntityKind::Measurement => "measurement",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common identity surface shared by every stored record.
pub trait Entity: Clone + fmt::Debug {
    const KIND: EntityKind;

    fn id(&self) -> &str;
}

// ============================================================================
// TIMESTAMPS
// ============================================================================

/// Fixed interchange format for every timestamp (no timezone).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a `yyyy-MM-dd HH:mm:ss` timestamp (surrounding whitespace ignored).
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Serde adapter so entity timestamps serialize in the interchange format.
pub mod timestamp_format {
    use super::{format_timestamp, parse_timestamp};
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format_timestamp() {
        let ts = parse_timestamp("2024-01-15 10:30:00").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-15 10:30:00");

        // Whitespace around the value is tolerated
        let padded = parse_timestamp("  2024-01-15 10:30:00 ").unwrap();
        assert_eq!(ts, padded);
    }

    #[test]
    fn test_parse_timestamp_rejects_other_formats() {
        assert!(parse_timestamp("15/01/2024 10:30:00").is_err());
        assert!(parse_timestamp("2024-01-15T10:30:00").is_err());
        assert!(parse_timestamp("2024-01-15").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_entity_kind_display() {
        assert_eq!(EntityKind::Measurement.to_string(), "measurement");
        assert_eq!(EntityKind::Microscope.as_str(), "microscope");
    }
}
