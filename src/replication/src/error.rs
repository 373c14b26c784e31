/// Error type for event encoding.
#[derive(Debug)]
pub enum EncodeError {
    /// Events with empty keys are rejected before they reach the wire.
    EmptyKey,
    Serialize(String),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::EmptyKey => write!(f, "refusing to encode event with empty key"),
            EncodeError::Serialize(msg) => write!(f, "serialize error: {}", msg),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Error type for event decoding.
///
/// A payload that parses as neither the legacy JSON format nor the
/// binary CBOR format is malformed. The caller logs and discards it;
/// no payload may terminate the consuming loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    Malformed,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Malformed => write!(f, "payload is neither valid JSON nor valid CBOR"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Error type for publishing an event to the bus.
#[derive(Debug)]
pub enum PublishError {
    /// The connection is not in the Subscribed state.
    NotConnected,
    Client(rumqttc::ClientError),
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::NotConnected => write!(f, "not connected to broker"),
            PublishError::Client(e) => write!(f, "mqtt client error: {}", e),
        }
    }
}

impl std::error::Error for PublishError {}

impl From<rumqttc::ClientError> for PublishError {
    fn from(err: rumqttc::ClientError) -> Self {
        PublishError::Client(err)
    }
}
