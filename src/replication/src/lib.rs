//! MQTT-based replication between nodes.
//!
//! Every node publishes its committed writes as events on
//! `{topic_prefix}/events/{client_id}` and subscribes to
//! `{topic_prefix}/events/#`, so all nodes sharing a prefix converge
//! without a coordinator. Events carry the publishing node's identity;
//! a node discards events whose origin matches its own, which is the
//! sole loop-prevention mechanism.
//!
//! All failures in this layer are contained here: decode, publish, and
//! apply errors are logged and dropped, never surfaced to the client
//! whose write already committed locally.

pub mod applier;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod publisher;
pub mod replicator;

// Re-exports for convenience
pub use applier::Applier;
pub use codec::{decode, encode, WireFormat};
pub use config::ReplicationConfig;
pub use connection::{ConnectionManager, ConnectionState, InboundMessage};
pub use error::{DecodeError, EncodeError, PublishError};
pub use event::ReplicationEvent;
pub use publisher::Publisher;
pub use replicator::Replicator;
