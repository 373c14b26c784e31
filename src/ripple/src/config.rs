//! Node configuration, loaded from a TOML file.
//!
//! `CLIENT_ID` and `CLIENT_PASSWORD` environment variables override the
//! corresponding replication keys, so orchestration can inject per-node
//! identity and broker credentials without rewriting config files.

use anyhow::{Context, Result};
use config::{Config as ConfigLoader, File};
use replication::ReplicationConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// IP address the TCP server binds to.
    pub host: String,

    /// Port the TCP server listens on.
    pub port: u16,

    /// Storage engine: "rwlock" (default) or "sharded".
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Replication settings; replication runs only when
    /// `replication.enabled` is true.
    pub replication: ReplicationConfig,
}

fn default_engine() -> String {
    "rwlock".to_string()
}

impl Config {
    /// Load configuration from a TOML file, applying environment
    /// variable overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = ConfigLoader::builder()
            .add_source(File::from(path))
            .build()
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        let mut config: Config = settings
            .try_deserialize()
            .context("invalid configuration")?;

        if let Ok(client_id) = std::env::var("CLIENT_ID") {
            config.replication.client_id = client_id;
        }
        if let Ok(client_password) = std::env::var("CLIENT_PASSWORD") {
            config.replication.client_password = Some(client_password);
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 7379,
            engine: default_engine(),
            replication: ReplicationConfig {
                enabled: false,
                mqtt_broker: "localhost".to_string(),
                mqtt_port: 1883,
                topic_prefix: "ripple".to_string(),
                client_id: "node1".to_string(),
                client_password: None,
                wire_format: Default::default(),
                publish_timeout_ms: 5_000,
                publish_retries: 3,
                reconnect_base_ms: 500,
                reconnect_cap_ms: 30_000,
            },
        }
    }
}
