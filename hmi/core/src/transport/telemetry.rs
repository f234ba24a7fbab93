//! Telemetry Stream state machine
//!
//! ```text
//!   connect()            opened               close / error
//! ───────────► Connecting ──────► Online ─────────────────► Offline
//!                  ▲                                           │
//!                  └──────────── reconnect delay ◄─────────────┘
//! ```
//!
//! The stream never blocks its owner. Opening, reading and the reconnect
//! timer run in spawned tasks that post [`StreamEvent`]s back; the owner feeds
//! them to [`TelemetryStream::handle`] one at a time.
//!
//! Every event is stamped with the connection generation it belongs to.
//! `connect` and `shutdown` advance the generation, so events from a torn-down
//! connection or timer are recognised and dropped even if they were already
//! queued.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::envelope::{parse_frame, Frame};
use super::TelemetrySource;
use crate::reconciler::MachineSnapshot;

/// Telemetry link state shown to the operator
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Opening a connection
    Connecting,
    /// Receiving frames
    Online,
    /// No live connection
    #[default]
    Offline,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Connecting => "CONNECTING",
            Self::Online => "ONLINE",
            Self::Offline => "OFFLINE",
        })
    }
}

/// Loop-back event from a stream task
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamEvent {
    /// Connection generation that produced the event
    pub generation: u64,
    /// What happened
    pub kind: StreamEventKind,
}

/// Stream task notifications
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEventKind {
    /// The connection opened
    Opened,
    /// One text frame, in receipt order
    Frame(String),
    /// The connection failed to open, errored or closed
    Closed(String),
    /// The reconnect delay elapsed
    ReconnectDue,
}

/// What the owner should do after [`TelemetryStream::handle`]
#[derive(Clone, Debug, PartialEq)]
pub enum StreamOutcome {
    /// Connection state changed
    State(ConnectionState),
    /// A snapshot to reconcile
    Snapshot(MachineSnapshot),
    /// Nothing to do (stale event, dropped frame, unknown event)
    Ignored,
}

/// Connection lifecycle for the telemetry stream
pub struct TelemetryStream {
    source: Arc<dyn TelemetrySource>,
    events: mpsc::UnboundedSender<StreamEvent>,
    reconnect_delay: Duration,
    state: ConnectionState,
    generation: u64,
    reader: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
    active: bool,
}

impl TelemetryStream {
    /// Create an idle stream
    ///
    /// Task notifications are posted to `events`.
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        reconnect_delay: Duration,
        events: mpsc::UnboundedSender<StreamEvent>,
    ) -> Self {
        Self {
            source,
            events,
            reconnect_delay,
            state: ConnectionState::Offline,
            generation: 0,
            reader: None,
            reconnect: None,
            active: false,
        }
    }

    /// Current link state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Current connection generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a reconnect timer is armed
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect.is_some()
    }

    /// Whether a connection task is running
    pub fn has_connection(&self) -> bool {
        self.reader.is_some()
    }

    /// Open a fresh connection, closing any existing one first
    pub fn connect(&mut self) -> ConnectionState {
        self.cancel_tasks();
        self.active = true;
        self.generation += 1;
        self.state = ConnectionState::Connecting;

        let generation = self.generation;
        let source = Arc::clone(&self.source);
        let events = self.events.clone();
        tracing::debug!(generation, "Opening telemetry connection");

        self.reader = Some(tokio::spawn(async move {
            let post = |kind| {
                // The owner may already be gone; nothing left to notify.
                let _ = events.send(StreamEvent { generation, kind });
            };

            let mut frames = match source.open().await {
                Ok(frames) => frames,
                Err(e) => {
                    post(StreamEventKind::Closed(e.to_string()));
                    return;
                }
            };
            post(StreamEventKind::Opened);

            while let Some(item) = frames.next().await {
                match item {
                    Ok(text) => post(StreamEventKind::Frame(text)),
                    Err(e) => {
                        post(StreamEventKind::Closed(e.to_string()));
                        return;
                    }
                }
            }
            post(StreamEventKind::Closed("stream ended".to_string()));
        }));

        self.state
    }

    /// Apply one task notification
    pub fn handle(&mut self, event: StreamEvent) -> StreamOutcome {
        if !self.active || event.generation != self.generation {
            tracing::trace!(
                generation = event.generation,
                current = self.generation,
                "Stale telemetry event dropped"
            );
            return StreamOutcome::Ignored;
        }

        match event.kind {
            StreamEventKind::Opened => {
                self.state = ConnectionState::Online;
                tracing::info!(generation = self.generation, "Telemetry online");
                StreamOutcome::State(self.state)
            }
            StreamEventKind::Frame(text) => match parse_frame(&text) {
                Ok(Frame::StateChanged(snapshot)) => StreamOutcome::Snapshot(snapshot),
                Ok(Frame::Other(event)) => {
                    tracing::trace!(%event, "Telemetry event ignored");
                    StreamOutcome::Ignored
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Telemetry frame dropped");
                    StreamOutcome::Ignored
                }
            },
            StreamEventKind::Closed(reason) => {
                self.reader = None;
                self.state = ConnectionState::Offline;
                tracing::warn!(
                    %reason,
                    retry_in_ms = self.reconnect_delay.as_millis() as u64,
                    "Telemetry offline"
                );
                self.schedule_reconnect();
                StreamOutcome::State(self.state)
            }
            StreamEventKind::ReconnectDue => {
                self.reconnect = None;
                StreamOutcome::State(self.connect())
            }
        }
    }

    /// Close the connection and suppress any pending reconnect
    pub fn shutdown(&mut self) {
        self.cancel_tasks();
        self.active = false;
        self.generation += 1;
        self.state = ConnectionState::Offline;
        tracing::debug!("Telemetry stream shut down");
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect.is_some() {
            return;
        }
        let generation = self.generation;
        let delay = self.reconnect_delay;
        let events = self.events.clone();

        self.reconnect = Some(tokio::spawn(async move {
            // Fixed-delay reconnect: one attempt per delay, no backoff.
            tokio::time::sleep(delay).await;
            let _ = events.send(StreamEvent {
                generation,
                kind: StreamEventKind::ReconnectDue,
            });
        }));
    }

    fn cancel_tasks(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(timer) = self.reconnect.take() {
            timer.abort();
        }
    }
}

impl Drop for TelemetryStream {
    fn drop(&mut self) {
        self.cancel_tasks();
    }
}
