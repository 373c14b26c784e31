use serde::{Deserialize, Serialize};

use crate::codec::WireFormat;

/// Configuration for MQTT-based replication.
///
/// `client_id` doubles as the MQTT session identity and the origin id
/// carried in every published event; loop prevention depends on these
/// being the same value. `topic_prefix` scopes a set of nodes to one
/// logical replication group and must be unique per isolated cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Whether replication is active for this node.
    pub enabled: bool,

    /// Hostname or IP of the MQTT broker.
    pub mqtt_broker: String,

    /// Broker port (1883 for plain MQTT).
    pub mqtt_port: u16,

    /// Namespace root for this cluster's event topics.
    pub topic_prefix: String,

    /// Unique node identity; also the event origin id.
    pub client_id: String,

    /// Optional broker password; the CLIENT_PASSWORD environment
    /// variable overrides it at load time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_password: Option<String>,

    /// Encoding for published events. Decoders accept both formats.
    #[serde(default)]
    pub wire_format: WireFormat,

    /// Upper bound on a single publish attempt.
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,

    /// Attempts before a publish is dropped with a warning.
    #[serde(default = "default_publish_retries")]
    pub publish_retries: u32,

    /// Base delay for reconnect backoff.
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,

    /// Cap for reconnect backoff.
    #[serde(default = "default_reconnect_cap_ms")]
    pub reconnect_cap_ms: u64,
}

fn default_publish_timeout_ms() -> u64 {
    5_000
}

fn default_publish_retries() -> u32 {
    3
}

fn default_reconnect_base_ms() -> u64 {
    500
}

fn default_reconnect_cap_ms() -> u64 {
    30_000
}

impl ReplicationConfig {
    /// Node-scoped subtopic this node publishes its events to.
    pub fn publish_topic(&self) -> String {
        format!("{}/events/{}", self.topic_prefix, self.client_id)
    }

    /// Wildcard pattern covering every node's events subtopic.
    ///
    /// Subscribing to everything (own subtopic included) is deliberate:
    /// loop prevention filters by event origin, not by topic shape.
    pub fn subscribe_pattern(&self) -> String {
        format!("{}/events/#", self.topic_prefix)
    }
}

/// Config with test defaults, for unit tests across this crate.
#[cfg(test)]
pub(crate) fn test_config(client_id: &str) -> ReplicationConfig {
    ReplicationConfig {
        enabled: true,
        mqtt_broker: "localhost".to_string(),
        mqtt_port: 1883,
        topic_prefix: "ripple_test".to_string(),
        client_id: client_id.to_string(),
        client_password: None,
        wire_format: WireFormat::default(),
        publish_timeout_ms: default_publish_timeout_ms(),
        publish_retries: default_publish_retries(),
        reconnect_base_ms: default_reconnect_base_ms(),
        reconnect_cap_ms: default_reconnect_cap_ms(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_layout() {
        let cfg = test_config("node1");
        assert_eq!(cfg.publish_topic(), "ripple_test/events/node1");
        assert_eq!(cfg.subscribe_pattern(), "ripple_test/events/#");
    }

    #[test]
    fn defaults_fill_in_optional_knobs() {
        let cfg: ReplicationConfig = serde_json::from_str(
            r#"{
                "enabled": true,
                "mqtt_broker": "localhost",
                "mqtt_port": 1883,
                "topic_prefix": "p",
                "client_id": "n"
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.wire_format, WireFormat::Cbor);
        assert_eq!(cfg.publish_timeout_ms, 5_000);
        assert_eq!(cfg.publish_retries, 3);
        assert_eq!(cfg.reconnect_base_ms, 500);
        assert_eq!(cfg.reconnect_cap_ms, 30_000);
        assert_eq!(cfg.client_password, None);
    }

    #[test]
    fn wire_format_accepts_lowercase_names() {
        let cfg: ReplicationConfig = serde_json::from_str(
            r#"{
                "enabled": true,
                "mqtt_broker": "localhost",
                "mqtt_port": 1883,
                "topic_prefix": "p",
                "client_id": "n",
                "wire_format": "json"
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.wire_format, WireFormat::Json);
    }
}
