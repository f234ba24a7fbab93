//! Error Taxonomy
//!
//! Every failure inside the console session falls into one of four families:
//!
//! - [`AuthError`]: bad credentials, expired or rejected token
//! - [`TransportError`]: gateway or telemetry endpoint unreachable
//! - [`ProtocolError`]: a frame or body that does not parse
//! - [`StorageError`]: the persisted token slot could not be read or written
//!
//! None of them is fatal. The [`Console`](crate::console::Console) maps each
//! one to a recovery (login screen, offline pill, silent drop) and logs it.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Authentication failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The token endpoint refused the credentials
    #[error("{detail}")]
    Rejected {
        /// Server-supplied detail, or the generic fallback
        detail: String,
    },

    /// A profile check or authenticated call was refused
    #[error("session rejected by gateway (HTTP {status})")]
    SessionInvalid {
        /// HTTP status returned by the gateway
        status: u16,
    },
}

/// Network and gateway failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request never produced a response
    #[error("gateway unreachable: {0}")]
    Unreachable(String),

    /// The gateway answered with a non-success status
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        /// Endpoint path that failed
        endpoint: String,
        /// HTTP status code
        status: u16,
    },

    /// The telemetry stream could not be opened
    #[error("telemetry connect failed: {0}")]
    Connect(String),

    /// The telemetry stream closed or errored after opening
    #[error("telemetry stream closed: {0}")]
    Closed(String),

    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// Malformed inbound data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A stream frame was not valid JSON or not an envelope
    #[error("malformed telemetry frame: {0}")]
    MalformedFrame(String),

    /// A state-change envelope had no usable snapshot payload
    #[error("event {event} carried no usable payload: {reason}")]
    MissingPayload {
        /// Event discriminator
        event: String,
        /// Why the payload was rejected
        reason: String,
    },

    /// An HTTP response body did not match the expected shape
    #[error("unexpected response body from {endpoint}: {reason}")]
    UnexpectedBody {
        /// Endpoint path
        endpoint: String,
        /// Decoder message
        reason: String,
    },
}

/// Token slot failures
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading the slot failed for a reason other than absence
    #[error("failed to read token slot at {path}: {source}")]
    Read {
        /// Slot location
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Writing or clearing the slot failed
    #[error("failed to write token slot at {path}: {source}")]
    Write {
        /// Slot location
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// No location could be derived for the slot
    #[error("no data directory available for the token slot")]
    NoDataDir,
}

/// Top-level error for the console core
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Authentication failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Network failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed data
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Token slot failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias used across the core
pub type Result<T> = std::result::Result<T, ConsoleError>;
