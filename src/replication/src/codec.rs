//! Dual-format event codec.
//!
//! Two wire formats coexist on the bus so mixed-version clusters can
//! interoperate: the legacy human-readable JSON format and the compact
//! CBOR format. Both serialize the same logical fields. Decoding is a
//! tagged-result pipeline, not exception-driven branching: try JSON,
//! else CBOR, else a typed `Malformed` failure for the caller to log
//! and discard.

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, EncodeError};
use crate::event::ReplicationEvent;

/// Which encoding a publisher writes. Decoders accept both regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Legacy self-describing text format.
    Json,
    /// Compact binary format (default).
    #[default]
    Cbor,
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireFormat::Json => write!(f, "json"),
            WireFormat::Cbor => write!(f, "cbor"),
        }
    }
}

/// Encode an event in the given wire format.
///
/// The non-empty-key invariant is enforced here, at the last gate
/// before the wire.
pub fn encode(event: &ReplicationEvent, format: WireFormat) -> Result<Vec<u8>, EncodeError> {
    if event.operation.key().is_empty() {
        return Err(EncodeError::EmptyKey);
    }
    match format {
        WireFormat::Json => {
            serde_json::to_vec(event).map_err(|e| EncodeError::Serialize(e.to_string()))
        }
        WireFormat::Cbor => {
            let mut buf = Vec::new();
            ciborium::ser::into_writer(event, &mut buf)
                .map_err(|e| EncodeError::Serialize(e.to_string()))?;
            Ok(buf)
        }
    }
}

/// Decode a payload, auto-detecting the format.
///
/// JSON is attempted first; any parse failure there (syntax or
/// structure) falls through to CBOR. Failure of both is a typed,
/// non-fatal result.
pub fn decode(payload: &[u8]) -> Result<ReplicationEvent, DecodeError> {
    if let Ok(text) = std::str::from_utf8(payload) {
        if let Ok(event) = serde_json::from_str::<ReplicationEvent>(text) {
            return Ok(event);
        }
    }
    ciborium::de::from_reader::<ReplicationEvent, _>(payload).map_err(|_| DecodeError::Malformed)
}
