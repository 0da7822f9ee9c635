use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies this server process to clients.
///
/// Captured once at process start and handed to every session by value.
/// Clients compare it across reconnects to detect a restart. On the wire it
/// is Unix time in seconds with millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerStartup(f64);

impl ServerStartup {
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(instant.timestamp_millis() as f64 / 1000.0)
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0
    }
}
