//! Poll Scheduler
//!
//! Periodic out-of-band refresh while a session is active: the live clock,
//! active alarms and predictive-maintenance insights. Each poller is one task
//! on its own interval; the first tick comes one full period after `start`.
//!
//! Results are stamped with the session epoch passed to
//! [`PollScheduler::start`], so a result already in flight when the session
//! ends can be told apart from one belonging to the next session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::ConsoleConfig;
use crate::error::{AuthError, ConsoleError};
use crate::gateway::{ActiveAlarm, Gateway, Insights};
use crate::session::BearerToken;

/// Clock display format
pub const CLOCK_FORMAT: &str = "%H:%M:%S";

/// Refresh periods
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollIntervals {
    /// Live clock tick
    pub clock: Duration,
    /// Active alarms refresh
    pub alarms: Duration,
    /// Insights refresh
    pub insights: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            clock: Duration::from_secs(1),
            alarms: Duration::from_secs(2),
            insights: Duration::from_secs(5),
        }
    }
}

impl From<&ConsoleConfig> for PollIntervals {
    fn from(config: &ConsoleConfig) -> Self {
        Self {
            clock: config.clock_interval,
            alarms: config.alarm_interval,
            insights: config.insights_interval,
        }
    }
}

/// One poll outcome
#[derive(Clone, Debug, PartialEq)]
pub struct PollResult {
    /// Session epoch the poll ran under
    pub epoch: u64,
    /// What was fetched
    pub kind: PollKind,
}

/// Poll payloads
#[derive(Clone, Debug, PartialEq)]
pub enum PollKind {
    /// Local wall-clock time, formatted with [`CLOCK_FORMAT`]
    Clock(String),
    /// Current active alarms
    Alarms(Vec<ActiveAlarm>),
    /// Latest insights
    Insights(Insights),
    /// The gateway refused the session token
    SessionRejected(AuthError),
}

/// Owns the periodic poll tasks of one session
pub struct PollScheduler {
    gateway: Arc<dyn Gateway>,
    intervals: PollIntervals,
    results: mpsc::UnboundedSender<PollResult>,
    tasks: Vec<JoinHandle<()>>,
}

impl PollScheduler {
    /// Idle scheduler posting to `results`
    pub fn new(
        gateway: Arc<dyn Gateway>,
        intervals: PollIntervals,
        results: mpsc::UnboundedSender<PollResult>,
    ) -> Self {
        Self {
            gateway,
            intervals,
            results,
            tasks: Vec::new(),
        }
    }

    /// Whether pollers are running
    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Start all pollers for a session, replacing any running set
    pub fn start(&mut self, epoch: u64, token: BearerToken) {
        self.stop();
        tracing::debug!(epoch, "Starting pollers");

        let results = self.results.clone();
        self.tasks.push(spawn_every(self.intervals.clock, move || {
            let results = results.clone();
            async move {
                let now = chrono::Local::now().format(CLOCK_FORMAT).to_string();
                let _ = results.send(PollResult {
                    epoch,
                    kind: PollKind::Clock(now),
                });
            }
        }));

        let results = self.results.clone();
        let gateway = Arc::clone(&self.gateway);
        self.tasks.push(spawn_every(self.intervals.alarms, move || {
            let results = results.clone();
            let gateway = Arc::clone(&gateway);
            let token = token.clone();
            async move {
                let outcome = gateway.active_alarms(&token).await;
                if let Some(kind) = settle("alarms", outcome, PollKind::Alarms) {
                    let _ = results.send(PollResult { epoch, kind });
                }
            }
        }));

        let results = self.results.clone();
        let gateway = Arc::clone(&self.gateway);
        self.tasks.push(spawn_every(self.intervals.insights, move || {
            let results = results.clone();
            let gateway = Arc::clone(&gateway);
            async move {
                let outcome = gateway.insights().await;
                if let Some(kind) = settle("insights", outcome, PollKind::Insights) {
                    let _ = results.send(PollResult { epoch, kind });
                }
            }
        }));
    }

    /// Abort every poller
    ///
    /// Takes effect immediately: no task runs another tick after this returns.
    pub fn stop(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        tracing::debug!("Pollers stopped");
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Map a poll outcome to a payload; transport and decode failures are skipped
fn settle<T>(
    what: &'static str,
    outcome: Result<T, ConsoleError>,
    wrap: fn(T) -> PollKind,
) -> Option<PollKind> {
    match outcome {
        Ok(value) => Some(wrap(value)),
        Err(ConsoleError::Auth(reason)) => Some(PollKind::SessionRejected(reason)),
        Err(e) => {
            tracing::debug!(poll = what, error = %e, "Poll failed, will retry next tick");
            None
        }
    }
}

fn spawn_every<F, Fut>(period: Duration, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            tick().await;
        }
    })
}
