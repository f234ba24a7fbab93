//! In-process telemetry source
//!
//! Serves pre-registered connections from tokio channels. Used when the
//! console is embedded next to a simulator, and by tests that need to open,
//! feed and drop connections on demand.
//!
//! ```ignore
//! let source = ChannelSource::new();
//! let feed = source.push_connection();
//! feed.send(r#"{"event":"machine.state.changed","data":{"pos":0.5}}"#.into())?;
//! drop(feed); // server closes the connection
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{FrameStream, TelemetrySource};
use crate::error::TransportError;

type Pending = Result<mpsc::UnboundedReceiver<String>, TransportError>;

/// Telemetry source backed by channels
#[derive(Clone, Default)]
pub struct ChannelSource {
    pending: Arc<Mutex<VecDeque<Pending>>>,
    opens: Arc<AtomicUsize>,
}

impl ChannelSource {
    /// Source with no queued connections
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a connection for the next `open`
    ///
    /// Frames sent on the returned sender arrive in order; dropping it closes
    /// the connection. `is_closed()` on the sender reports whether the
    /// consumer has let go of its end.
    pub fn push_connection(&self) -> mpsc::UnboundedSender<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.pending.lock().push_back(Ok(rx));
        tx
    }

    /// Queue a refused connection attempt
    pub fn push_refusal(&self, reason: impl Into<String>) {
        self.pending
            .lock()
            .push_back(Err(TransportError::Connect(reason.into())));
    }

    /// Number of `open` calls so far
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetrySource for ChannelSource {
    async fn open(&self) -> Result<FrameStream, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let next = self.pending.lock().pop_front();
        match next {
            Some(Ok(rx)) => Ok(UnboundedReceiverStream::new(rx).map(Ok).boxed()),
            Some(Err(e)) => Err(e),
            None => Err(TransportError::Connect("no connection queued".to_string())),
        }
    }
}
