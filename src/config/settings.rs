use serde::Deserialize;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub server: ServerSettings,
    pub hub: HubSettings,
    pub runtime: RuntimeSettings,
}

/// Where the WebSocket listener binds and how long shutdown may take.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub shutdown_grace_secs: u64,
    /// Connections that have not completed the WebSocket upgrade within this
    /// many seconds are dropped.
    pub handshake_timeout_secs: u64,
}

/// Broadcast hub limits.
///
/// `max_connections` bounds the number of registered subscribers;
/// `queue_capacity` bounds each subscriber's pending events.
#[derive(Debug, Deserialize, Clone)]
pub struct HubSettings {
    pub topic: String,
    pub max_connections: usize,
    pub queue_capacity: usize,
}

/// Location of the runtime port record shared with companion processes.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeSettings {
    pub record_path: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub hub: Option<PartialHubSettings>,
    pub runtime: Option<PartialRuntimeSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub shutdown_grace_secs: Option<u64>,
    pub handshake_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialHubSettings {
    pub topic: Option<String>,
    pub max_connections: Option<usize>,
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialRuntimeSettings {
    pub record_path: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            shutdown_grace_secs: 5,
            handshake_timeout_secs: 10,
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            topic: "locations".to_string(),
            max_connections: 1000,
            queue_capacity: 256,
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            record_path: ".runtime-config.json".to_string(),
        }
    }
}

impl PartialSettings {
    /// Overlay whatever was provided on top of the defaults.
    pub fn merge(self) -> Settings {
        let default = Settings::default();
        let server = self.server;
        let hub = self.hub;
        let runtime = self.runtime;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
                shutdown_grace_secs: server
                    .as_ref()
                    .and_then(|s| s.shutdown_grace_secs)
                    .unwrap_or(default.server.shutdown_grace_secs),
                handshake_timeout_secs: server
                    .as_ref()
                    .and_then(|s| s.handshake_timeout_secs)
                    .unwrap_or(default.server.handshake_timeout_secs),
            },
            hub: HubSettings {
                topic: hub
                    .as_ref()
                    .and_then(|h| h.topic.clone())
                    .unwrap_or(default.hub.topic),
                max_connections: hub
                    .as_ref()
                    .and_then(|h| h.max_connections)
                    .unwrap_or(default.hub.max_connections),
                queue_capacity: hub
                    .as_ref()
                    .and_then(|h| h.queue_capacity)
                    .unwrap_or(default.hub.queue_capacity),
            },
            runtime: RuntimeSettings {
                record_path: runtime
                    .and_then(|r| r.record_path)
                    .unwrap_or(default.runtime.record_path),
            },
        }
    }
}
