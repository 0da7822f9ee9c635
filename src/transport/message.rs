use serde::{Deserialize, Serialize};
use serde_json::Value;
use tungstenite::protocol::Message as WsMessage;

use crate::config::ServerStartup;
use crate::hub::LocationEvent;
use crate::utils::Result;

/// Frames pushed from the server to clients. Field names are part of the
/// wire contract.
#[derive(Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "welcome")]
    Welcome { server_startup: ServerStartup },
    #[serde(rename = "location")]
    Location { data: Value },
}

impl ServerMessage {
    pub fn location(event: &LocationEvent) -> Self {
        ServerMessage::Location {
            data: event.data.clone(),
        }
    }

    /// Decode a text frame received from the server.
    pub fn from_text(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_ws(&self) -> Result<WsMessage> {
        Ok(WsMessage::text(serde_json::to_string(self)?))
    }
}
