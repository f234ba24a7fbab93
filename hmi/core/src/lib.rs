//! HMI Core - Headless Control-and-Telemetry Session for the Elevator Console
//!
//! This crate holds the operator console's session logic, independent of any
//! rendering technology. It authenticates the operator, keeps the telemetry
//! stream alive, turns push-button input into controller commands and
//! reconciles machine snapshots into display state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Operator Surface                            │
//! │        (hmi-console line surface, kiosk UI, test harness)         │
//! │                               │                                   │
//! │                     OperatorEvent (up)                            │
//! │                     ConsoleMessage (down)                         │
//! └───────────────────────────────┼───────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────┼───────────────────────────────────┐
//! │                           HMI CORE                                │
//! │  ┌────────────────────────────┴─────────────────────────────────┐ │
//! │  │                          Console                              │ │
//! │  │  ┌──────────┐  ┌───────────┐  ┌──────────┐  ┌──────────────┐ │ │
//! │  │  │ Session  │  │ Telemetry │  │ Command  │  │     HMI      │ │ │
//! │  │  │ Manager  │  │  Stream   │  │ Channel  │  │  Reconciler  │ │ │
//! │  │  └────┬─────┘  └─────┬─────┘  └────┬─────┘  └──────────────┘ │ │
//! │  │       │        ┌─────┴─────┐       │        ┌──────────────┐ │ │
//! │  │       │        │ Telemetry │       │        │    Poll      │ │ │
//! │  │       │        │  Source   │       │        │  Scheduler   │ │ │
//! │  │       │        └─────┬─────┘       │        └──────┬───────┘ │ │
//! │  └───────┼──────────────┼─────────────┼───────────────┼─────────┘ │
//! └──────────┼──────────────┼─────────────┼───────────────┼───────────┘
//!            │              │             │               │
//!       HTTP gateway    WebSocket    HTTP gateway    HTTP gateway
//!      /auth/token      /ws/telemetry /plc/command   /alarms, /ai
//! ```
//!
//! # Key Types
//!
//! - [`Console`]: owns the session and handles every event serially
//! - [`OperatorEvent`]: what the operator did
//! - [`ConsoleMessage`]: what the surface should show
//! - [`Gateway`]: HTTP operations, with [`HttpGateway`] for production
//! - [`TelemetrySource`]: stream connections, with [`WebSocketSource`] and
//!   [`ChannelSource`]
//!
//! # Quick Start
//!
//! ```ignore
//! use hmi_core::{load_config, Console, OperatorEvent};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> hmi_core::Result<()> {
//!     let config = load_config()?;
//!     let (msg_tx, mut msg_rx) = mpsc::channel(256);
//!     let (op_tx, op_rx) = mpsc::channel(64);
//!
//!     let console = Console::from_config(&config, msg_tx)?;
//!     tokio::spawn(console.run(op_rx));
//!
//!     while let Some(message) = msg_rx.recv().await {
//!         // Render, and forward operator input on op_tx
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`session`]: bearer-token lifecycle and the persisted token slot
//! - [`transport`]: telemetry sources, envelope decoding, reconnect state machine
//! - [`command`]: momentary push-buttons and best-effort dispatch
//! - [`reconciler`]: snapshot to display-state reconciliation
//! - [`poller`]: clock, alarm and insights refresh
//! - [`gateway`]: HTTP gateway client
//! - [`console`]: the top-level controller
//! - [`config`]: TOML, environment and CLI configuration
//!
//! # No Rendering Dependencies
//!
//! Nothing here draws. Surfaces receive [`ConsoleMessage`]s and render them
//! however they like.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod command;
pub mod config;
pub mod console;
pub mod error;
pub mod events;
pub mod gateway;
pub mod messages;
pub mod poller;
pub mod reconciler;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use command::{
    dispatch_best_effort, ButtonLine, CommandChannel, Dispatch, InputSignal, LineCommand,
    Modality, DOWN_CONTROL, UP_CONTROL,
};
pub use console::{Console, ConsoleEvent};
pub use error::{AuthError, ConsoleError, ProtocolError, Result, StorageError, TransportError};
pub use events::{Credentials, OperatorEvent};
pub use gateway::{
    ActiveAlarm, AlarmRecord, FaultKind, Gateway, HttpGateway, Insights, UserProfile,
};
pub use messages::ConsoleMessage;
pub use poller::{PollIntervals, PollKind, PollResult, PollScheduler};
pub use reconciler::{
    reconcile, DisplayChange, HmiDisplay, Lamp, MachineSnapshot, MotorLabel, ReconcileReport, Tag,
};
pub use session::{
    attach, BearerToken, FileTokenStore, MemoryTokenStore, SessionManager, TokenStore, Validation,
};
pub use transport::{
    ChannelSource, ConnectionState, StreamEvent, StreamEventKind, StreamOutcome, TelemetrySource,
    TelemetryStream, WebSocketSource,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, ConsoleConfig, ConsoleToml,
};
