//! Telemetry envelope decoding
//!
//! Every frame on the stream is a JSON object `{event, data, timestamp?}`.
//! Only [`STATE_CHANGED_EVENT`] carries a snapshot; other discriminators are
//! passed through as [`Frame::Other`] so newer servers can add events.

use serde::Deserialize;

use crate::error::ProtocolError;
use crate::reconciler::MachineSnapshot;

/// Discriminator of machine snapshot frames
pub const STATE_CHANGED_EVENT: &str = "machine.state.changed";

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// A decoded telemetry frame
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// Machine snapshot to reconcile
    StateChanged(MachineSnapshot),
    /// Any other event, by discriminator
    Other(String),
}

/// Decode one text frame
///
/// # Errors
///
/// [`ProtocolError::MalformedFrame`] when the text is not an envelope, and
/// [`ProtocolError::MissingPayload`] when a state-change frame has no
/// snapshot object.
pub fn parse_frame(text: &str) -> Result<Frame, ProtocolError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;

    if envelope.event != STATE_CHANGED_EVENT {
        return Ok(Frame::Other(envelope.event));
    }

    if !envelope.data.is_object() {
        return Err(ProtocolError::MissingPayload {
            event: envelope.event,
            reason: "data is not an object".to_string(),
        });
    }

    serde_json::from_value(envelope.data)
        .map(Frame::StateChanged)
        .map_err(|e| ProtocolError::MissingPayload {
            event: STATE_CHANGED_EVENT.to_string(),
            reason: e.to_string(),
        })
}
