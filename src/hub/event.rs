use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Identifier attached to a location event. Only used for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventId {
    Number(i64),
    Text(String),
}

impl EventId {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(EventId::Number),
            Value::String(s) => Some(EventId::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventId::Number(n) => write!(f, "{n}"),
            EventId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EventId {
    fn from(n: i64) -> Self {
        EventId::Number(n)
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        EventId::Text(s)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        EventId::Text(s.to_string())
    }
}

/// A location update handed to the hub by an external publisher.
///
/// `data` is forwarded to clients verbatim. `id` is optional on the wire:
/// an identifier of an unexpected shape is discarded rather than rejecting
/// the whole event, so a bad id never blocks delivery.
///
/// ```json
/// {"id": 42, "data": {"id": 42, "lat": 52.52, "lon": 13.40, "device": "phone"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEvent {
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<EventId>,
    pub data: Value,
}

impl LocationEvent {
    pub fn new(id: impl Into<EventId>, data: Value) -> Self {
        Self {
            id: Some(id.into()),
            data,
        }
    }

    pub fn without_id(data: Value) -> Self {
        Self { id: None, data }
    }

    /// The id to log for this event: the explicit id, else `data.id`.
    pub fn diagnostic_id(&self) -> Option<EventId> {
        self.id
            .clone()
            .or_else(|| self.data.get("id").and_then(EventId::from_value))
    }
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<EventId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(EventId::from_value(&value))
}
