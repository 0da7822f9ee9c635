//! Runtime port record
//!
//! A small JSON object shared with a companion launcher/MQTT process:
//!
//! ```json
//! { "http_port": 0, "mqtt_port": 1883, "actual_http_port": 53121 }
//! ```
//!
//! `*_port` is what should be bound (negative = disabled, `0` = let the OS
//! pick), `actual_*_port` is what was bound. Keys this crate does not know
//! about are kept when the record is rewritten.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::utils::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_port: Option<i64>,
    /// MQTT fields are not used by this crate; they pass through unchanged
    /// for the companion MQTT process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt_port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_http_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_mqtt_port: Option<u16>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RuntimeRecord {
    /// Read the record at `path`. A missing or unreadable file yields an
    /// empty record so callers fall back to their defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "runtime record not found, using defaults");
                return Self::default();
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read runtime record");
                return Self::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(record) => {
                debug!(path = %path.display(), ?record, "loaded runtime record");
                record
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to parse runtime record");
                Self::default()
            }
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        debug!(path = %path.display(), record = ?self, "wrote runtime record");
        Ok(())
    }

    /// Load, modify and write back the record at `path`.
    pub fn update(path: &Path, change: impl FnOnce(&mut Self)) -> Result<Self> {
        let mut record = Self::load(path);
        change(&mut record);
        record.write(path)?;
        Ok(record)
    }

    /// Delete the record at `path`. A missing file is not an error.
    pub fn remove(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "removed runtime record");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Port the HTTP/WebSocket listener should bind, or `None` when the
    /// record disables it. `fallback` applies when the record has no
    /// `http_port`.
    pub fn http_listener_port(&self, fallback: u16) -> Option<u16> {
        let port = self.http_port.unwrap_or(i64::from(fallback));
        u16::try_from(port).ok()
    }
}
