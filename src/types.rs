//! Incident wire types shared with the Argus REST API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Unique identifier for an incident
pub type IncidentId = i64;

/// An incident as pushed by the realtime feed.
///
/// Everything but the key, start time and source is optional on the wire;
/// missing or `null` values fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Primary key
    pub pk: IncidentId,
    /// When the monitored condition started
    pub start_time: DateTime<Utc>,
    /// When it ended; `Infinity` while a stateful incident is still open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<EndTime>,
    /// Whether the incident has a start and an end
    #[serde(default, deserialize_with = "null_as_default")]
    pub stateful: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub details_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ticket_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub open: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub acked: bool,
    /// Severity, 1 (critical) through 5 (information)
    #[serde(default = "default_level", deserialize_with = "level_or_default")]
    pub level: u8,
    /// System that reported the incident
    pub source: SourceSystem,
    /// Identifier of the incident within its source system
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_incident_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<IncidentTag>,
}

fn default_level() -> u8 {
    5
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn level_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u8, D::Error> {
    Ok(Option::<u8>::deserialize(deserializer)?.unwrap_or_else(default_level))
}

impl Incident {
    /// Human-readable severity name
    pub fn severity_name(&self) -> &'static str {
        match self.level {
            1 => "Critical",
            2 => "High",
            3 => "Moderate",
            4 => "Low",
            _ => "Information",
        }
    }

    /// Whether a stateful incident has no end time yet
    pub fn is_ongoing(&self) -> bool {
        self.stateful && matches!(self.end_time, None | Some(EndTime::Infinity))
    }
}

/// Source system of an incident
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSystem {
    pub pk: i64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub source_type: String,
}

/// A `key=value` tag attached to an incident
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentTag {
    pub added_by: i64,
    pub added_time: DateTime<Utc>,
    pub tag: String,
}

/// End time of an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndTime {
    /// The incident has not ended
    Infinity,
    At(DateTime<Utc>),
}

impl Serialize for EndTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            EndTime::Infinity => serializer.serialize_str("infinity"),
            EndTime::At(ts) => serializer.serialize_str(&ts.to_rfc3339()),
        }
    }
}

impl<'de> Deserialize<'de> for EndTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.eq_ignore_ascii_case("infinity") {
            return Ok(EndTime::Infinity);
        }
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| EndTime::At(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}
