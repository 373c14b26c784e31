use std::time::Duration;

use log::{debug, info, warn};
use rand::Rng;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::{broadcast, mpsc, watch};

use crate::config::ReplicationConfig;
use crate::error::PublishError;

/// Capacity of the inbound handoff channel between the bus I/O loop
/// and the applier task.
const INBOUND_CHANNEL_CAPACITY: usize = 1024;

const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Lifecycle of the node's single bus connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// The wildcard subscription is live; publishes succeed and
    /// subscribed messages flow. The only state in which the bus is
    /// usable.
    Subscribed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Subscribed => write!(f, "subscribed"),
        }
    }
}

/// A raw message delivered by the bus, before decoding.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Owns the one MQTT connection of a node process.
///
/// The publisher and applier reach the bus only through this handle;
/// neither holds a second connection. A supervisor task drives the
/// rumqttc event loop: it re-issues the wildcard subscription on every
/// (re)connect, forwards inbound publishes to the applier channel, and
/// retries failed connections with capped exponential backoff.
/// Explicitly lifecycled, never a global: tests and multi-node setups
/// construct and tear down independent instances freely.
pub struct ConnectionManager {
    client: AsyncClient,
    state: watch::Receiver<ConnectionState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ConnectionManager {
    /// Start the connection and its supervisor task.
    ///
    /// Returns the manager and the channel on which inbound bus
    /// messages arrive.
    pub fn connect(cfg: &ReplicationConfig) -> (Self, mpsc::Receiver<InboundMessage>) {
        let mut options =
            MqttOptions::new(cfg.client_id.clone(), cfg.mqtt_broker.clone(), cfg.mqtt_port);
        options.set_keep_alive(KEEP_ALIVE);
        if let Some(password) = &cfg.client_password {
            options.set_credentials(cfg.client_id.clone(), password.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, 64);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);

        info!(
            "connecting to broker {}:{} as {}",
            cfg.mqtt_broker, cfg.mqtt_port, cfg.client_id
        );

        tokio::spawn(supervise(
            eventloop,
            client.clone(),
            cfg.clone(),
            state_tx,
            inbound_tx,
            shutdown_rx,
        ));

        let manager = ConnectionManager {
            client,
            state: state_rx,
            shutdown_tx,
        };
        (manager, inbound_rx)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Queue a payload for the broker at QoS 1.
    ///
    /// Fails fast with `NotConnected` outside the Subscribed state so
    /// the publisher's retry loop, not the MQTT client's internal
    /// buffering, decides how long to keep trying.
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        if self.state() != ConnectionState::Subscribed {
            return Err(PublishError::NotConnected);
        }
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(PublishError::from)
    }

    /// Disconnect from the broker and stop the supervisor.
    ///
    /// Called on every shutdown path; the connection is released, not
    /// abandoned. In-flight publishes may be lost (best-effort).
    pub async fn disconnect(&self) {
        let _ = self.client.disconnect().await;
        let _ = self.shutdown_tx.send(());
        info!("bus connection closed");
    }
}

/// Drive the MQTT event loop until shutdown.
async fn supervise(
    mut eventloop: EventLoop,
    client: AsyncClient,
    cfg: ReplicationConfig,
    state_tx: watch::Sender<ConnectionState>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut backoff = Backoff::new(
        Duration::from_millis(cfg.reconnect_base_ms),
        Duration::from_millis(cfg.reconnect_cap_ms),
    );
    let pattern = cfg.subscribe_pattern();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                let _ = state_tx.send(ConnectionState::Disconnected);
                info!("bus supervisor stopped");
                return;
            }
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    backoff.reset();
                    info!("connected to broker, subscribing to {}", pattern);
                    // Subscriptions do not survive a reconnect; re-issue
                    // on every ConnAck.
                    if let Err(e) = client.subscribe(pattern.clone(), QoS::AtLeastOnce).await {
                        warn!("subscribe request failed: {}", e);
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    let _ = state_tx.send(ConnectionState::Subscribed);
                    info!("subscription to {} active", pattern);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = InboundMessage {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    };
                    // Hand off to the applier task; decoding and store
                    // access must not run on the I/O loop, and neither
                    // may a full channel stall it (keepalives stop and
                    // the broker drops the connection).
                    forward_inbound(&inbound_tx, message);
                }
                Ok(_) => {}
                Err(e) => {
                    let _ = state_tx.send(ConnectionState::Disconnected);
                    let delay = backoff.next_delay();
                    warn!("bus connection error: {} (reconnecting in {:?})", e, delay);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown_rx.recv() => {
                            let _ = state_tx.send(ConnectionState::Disconnected);
                            info!("bus supervisor stopped");
                            return;
                        }
                    }
                    let _ = state_tx.send(ConnectionState::Connecting);
                }
            }
        }
    }
}

/// Queue an inbound message for the applier without ever blocking the
/// event loop. A lagging applier loses messages (logged at warn); a
/// gone applier means shutdown is in progress.
fn forward_inbound(inbound_tx: &mpsc::Sender<InboundMessage>, message: InboundMessage) {
    match inbound_tx.try_send(message) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!("applier lagging, dropping inbound message on {}", dropped.topic);
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("applier channel closed, dropping inbound message");
        }
    }
}

/// Capped exponential backoff with jitter for reconnect attempts.
struct Backoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl Backoff {
    fn new(base: Duration, cap: Duration) -> Self {
        Backoff {
            base,
            cap,
            attempt: 0,
        }
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn next_delay(&mut self) -> Duration {
        let factor = 1u32 << self.attempt.min(10);
        let delay = std::cmp::min(self.base.saturating_mul(factor), self.cap);
        self.attempt = self.attempt.saturating_add(1);
        // Up to 25% jitter so a restarted cluster doesn't thunder in.
        let jitter = rand::thread_rng().gen_range(0.0..0.25);
        std::cmp::min(delay.mul_f64(1.0 + jitter), self.cap)
    }
}
