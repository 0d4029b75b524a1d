use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};
use std::fmt;

pub mod error;

pub use error::CommonError;

pub const EVENT_TYPE_KEY: &str = "type";
pub const TIMESTAMP_KEY: &str = "timestamp";
pub const UNKNOWN: &str = "unknown";

/// The MRA event types understood by the ingestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Threat,
    Device,
    Audit,
}

impl EventType {
    pub const ALL: [EventType; 3] = [EventType::Threat, EventType::Device, EventType::Audit];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Threat => "THREAT",
            EventType::Device => "DEVICE",
            EventType::Audit => "AUDIT",
        }
    }

    /// Matches the wire name of an event type. The comparison is case sensitive.
    pub fn from_name(name: &str) -> Option<EventType> {
        EventType::ALL.iter().copied().find(|event_type| event_type.as_str() == name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Joins the event types in the comma separated form expected by the MRA stream API.
pub fn join_event_types(event_types: &[EventType]) -> String {
    event_types.iter().map(EventType::as_str).collect::<Vec<_>>().join(",")
}

/// Returns the `type` of a raw event, if present and textual.
pub fn event_type_of(event: &Value) -> Option<&str> {
    event.get(EVENT_TYPE_KEY).and_then(Value::as_str)
}

/// A single occurrence reported by the MRA stream.
/// The raw JSON body is decoded into one of the known kinds; anything else
/// is kept as `Unrecognized` so that its existence is never lost.
#[derive(Debug, Clone, PartialEq)]
pub struct MraEvent {
    pub timestamp: Option<String>,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Threat(ThreatEvent),
    Device(DeviceEvent),
    Audit(AuditEvent),
    Unrecognized { event_type: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatEvent {
    #[serde(default, deserialize_with = "number")]
    pub severity: Option<Number>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub threat_type: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub target_guid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEvent {
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub os_version: Option<String>,
    #[serde(default, deserialize_with = "number")]
    pub risk_score: Option<Number>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub device_guid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub action: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub user_id: Option<String>,
}

/// Accepts any JSON scalar and keeps its textual form, e.g. a numeric `userId`.
fn scalar_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(Value::Number(value)) => Ok(Some(value.to_string())),
        Some(Value::Bool(value)) => Ok(Some(value.to_string())),
        Some(other) => Err(de::Error::custom(format!("expected a scalar value, found {}", other))),
    }
}

/// Accepts a JSON number or a string holding one.
fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Number>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(value)) => Ok(Some(value)),
        Some(Value::String(value)) => value
            .trim()
            .parse::<Number>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected a number, found \"{}\"", value))),
        Some(other) => Err(de::Error::custom(format!("expected a number, found {}", other))),
    }
}

impl MraEvent {
    /// Decodes a raw MRA event.
    /// A `null` value is treated as an absent key.
    pub fn from_value(event: &Value) -> Result<MraEvent, CommonError> {
        let body = event.as_object().ok_or_else(|| CommonError::BadDataError {
            message: format!("An MRA event must be a JSON object. Received: {}", event),
        })?;

        let timestamp = match body.get(TIMESTAMP_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(timestamp)) => Some(timestamp.clone()),
            Some(other) => {
                return Err(CommonError::BadDataError {
                    message: format!("The event timestamp must be a string. Received: {}", other),
                })
            }
        };

        let event_type = event_type_of(event);
        let kind = match event_type.and_then(EventType::from_name) {
            Some(EventType::Threat) => EventKind::Threat(decode_body(event, EventType::Threat)?),
            Some(EventType::Device) => EventKind::Device(decode_body(event, EventType::Device)?),
            Some(EventType::Audit) => EventKind::Audit(decode_body(event, EventType::Audit)?),
            None => EventKind::Unrecognized { event_type: event_type.map(str::to_owned) },
        };

        Ok(MraEvent { timestamp, kind })
    }

    /// The value of the `event_type` tag of this event.
    pub fn event_type(&self) -> &str {
        match &self.kind {
            EventKind::Threat(_) => EventType::Threat.as_str(),
            EventKind::Device(_) => EventType::Device.as_str(),
            EventKind::Audit(_) => EventType::Audit.as_str(),
            EventKind::Unrecognized { event_type } => event_type.as_deref().unwrap_or(UNKNOWN),
        }
    }
}

fn decode_body<T: DeserializeOwned>(event: &Value, event_type: EventType) -> Result<T, CommonError> {
    T::deserialize(event).map_err(|err| CommonError::BadDataError {
        message: format!("Cannot decode {} event. Err: {}", event_type, err),
    })
}

/// An EventForwarder receives the events decoded from the MRA stream,
/// one at a time, and delivers them to a destination.
#[async_trait::async_trait]
pub trait EventForwarder: Send + Sync {
    /// Forwards a single event on behalf of the given enterprise.
    /// Implementations handle their own failures; nothing is reported back to the stream.
    async fn write(&self, event: &Value, enterprise_name: &str);
}
