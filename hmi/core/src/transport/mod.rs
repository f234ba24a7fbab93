//! Telemetry Transport
//!
//! The streaming half of the console: a [`TelemetrySource`] opens
//! connections, and the [`TelemetryStream`] state machine decides when.
//!
//! - [`WebSocketSource`]: the plant gateway's `/ws/telemetry` endpoint
//! - [`ChannelSource`]: in-process channels (embedded simulators, tests)
//!
//! # Reconnect policy
//!
//! On close or error the stream goes `Offline` and schedules exactly one
//! reconnect after a fixed delay (4 s by default). Attempts are unbounded and
//! never back off: the peer is on the plant LAN and expected back quickly.

pub mod channel;
pub mod envelope;
pub mod telemetry;
pub mod websocket;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::TransportError;

pub use channel::ChannelSource;
pub use envelope::{parse_frame, Frame, STATE_CHANGED_EVENT};
pub use telemetry::{ConnectionState, StreamEvent, StreamEventKind, StreamOutcome, TelemetryStream};
pub use websocket::WebSocketSource;

/// Text frames from one open connection; an `Err` item ends the connection
pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;

/// Opens telemetry connections
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Open a new connection
    ///
    /// Dropping the returned stream closes the connection.
    async fn open(&self) -> Result<FrameStream, TransportError>;
}
