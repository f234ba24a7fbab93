//! Console Controller
//!
//! The single owner of all session state. Operator events, telemetry task
//! notifications, poll results and dispatch outcomes all arrive as
//! [`ConsoleEvent`]s and are handled one at a time, so nothing here needs a
//! lock.
//!
//! # Lifecycle
//!
//! ```text
//! start ─► validate token ─┬─► (valid)   begin_session: pollers + stream
//!                          └─► (invalid) LoginRequired
//!
//! logout ─► release held lines ─► stream.shutdown ─► pollers.stop
//!        ─► advance epoch ─► clear token ─► LoggedOut
//! ```
//!
//! Teardown runs in reverse start order and completes before `handle_event`
//! returns. Events queued before teardown carry an old epoch or generation
//! and are dropped, so nothing reaches the display after `LoggedOut`.

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::command::{dispatch_best_effort, CommandChannel, Dispatch};
use crate::config::ConsoleConfig;
use crate::error::{AuthError, ConsoleError, Result, StorageError};
use crate::events::{Credentials, OperatorEvent};
use crate::gateway::{AlarmRecord, FaultKind, Gateway, HttpGateway, UserProfile};
use crate::messages::ConsoleMessage;
use crate::poller::{PollIntervals, PollKind, PollResult, PollScheduler};
use crate::reconciler::{reconcile, HmiDisplay};
use crate::session::{FileTokenStore, SessionManager, TokenStore, Validation};
use crate::transport::{StreamEvent, StreamOutcome, TelemetrySource, TelemetryStream, WebSocketSource};

/// Everything the console reacts to
#[derive(Debug)]
pub enum ConsoleEvent {
    /// Operator input
    Operator(OperatorEvent),
    /// Telemetry task notification
    Stream(StreamEvent),
    /// Periodic poll outcome
    Poll(PollResult),
    /// A best-effort dispatch was refused for auth reasons
    DispatchRejected {
        /// Session epoch the dispatch was issued under
        epoch: u64,
        /// Gateway refusal
        reason: AuthError,
    },
    /// Alarm history fetch finished
    AlarmHistory {
        /// Session epoch the fetch was issued under
        epoch: u64,
        /// Records or the failure
        result: Result<Vec<AlarmRecord>>,
    },
}

/// Top-level console controller
pub struct Console {
    gateway: Arc<dyn Gateway>,
    session: SessionManager,
    profile: Option<UserProfile>,
    stream: TelemetryStream,
    pollers: PollScheduler,
    commands: CommandChannel,
    display: HmiDisplay,
    /// Advanced on every session start and end
    epoch: u64,
    active: bool,
    tx: mpsc::Sender<ConsoleMessage>,
    loopback_tx: mpsc::UnboundedSender<ConsoleEvent>,
    loopback_rx: mpsc::UnboundedReceiver<ConsoleEvent>,
    stream_rx: mpsc::UnboundedReceiver<StreamEvent>,
    poll_rx: mpsc::UnboundedReceiver<PollResult>,
}

impl Console {
    /// Assemble a console from its collaborators
    pub fn new(
        gateway: Arc<dyn Gateway>,
        source: Arc<dyn TelemetrySource>,
        store: Box<dyn TokenStore>,
        config: &ConsoleConfig,
        tx: mpsc::Sender<ConsoleMessage>,
    ) -> Self {
        let (stream_tx, stream_rx) = mpsc::unbounded_channel();
        let (poll_tx, poll_rx) = mpsc::unbounded_channel();
        let (loopback_tx, loopback_rx) = mpsc::unbounded_channel();

        Self {
            session: SessionManager::restore(Arc::clone(&gateway), store),
            stream: TelemetryStream::new(source, config.reconnect_delay, stream_tx),
            pollers: PollScheduler::new(
                Arc::clone(&gateway),
                PollIntervals::from(config),
                poll_tx,
            ),
            gateway,
            profile: None,
            commands: CommandChannel::default(),
            display: HmiDisplay::new(),
            epoch: 0,
            active: false,
            tx,
            loopback_tx,
            loopback_rx,
            stream_rx,
            poll_rx,
        }
    }

    /// Console wired to the real gateway, WebSocket and token file
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built or no token slot location can
    /// be derived.
    pub fn from_config(config: &ConsoleConfig, tx: mpsc::Sender<ConsoleMessage>) -> Result<Self> {
        let gateway = Arc::new(HttpGateway::new(config)?);
        let source = Arc::new(WebSocketSource::new(config.telemetry_url.clone()));
        let slot = config.token_slot_path().ok_or(StorageError::NoDataDir)?;
        tracing::debug!(slot = %slot.display(), "Using token slot");

        Ok(Self::new(
            gateway,
            source,
            Box::new(FileTokenStore::new(slot)),
            config,
            tx,
        ))
    }

    /// Whether a session is running
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Current session epoch
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Last displayed machine state
    pub fn display(&self) -> &HmiDisplay {
        &self.display
    }

    /// Profile of the running session
    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// Telemetry stream state machine
    pub fn stream(&self) -> &TelemetryStream {
        &self.stream
    }

    /// Push-button state
    pub fn commands(&self) -> &CommandChannel {
        &self.commands
    }

    /// Resume a persisted session, or ask for a login
    pub async fn start(&mut self) {
        self.validate_and_start().await;
    }

    /// Run until the operator quits or the surface goes away
    pub async fn run(mut self, mut operator: mpsc::Receiver<OperatorEvent>) {
        self.start().await;
        while let Some(event) = self.next_event(&mut operator).await {
            if self.handle_event(event).await.is_break() {
                break;
            }
        }
        self.suspend();
        tracing::info!("Console stopped");
    }

    /// Wait for the next event from any source
    ///
    /// Returns `None` once the operator channel is closed.
    pub async fn next_event(
        &mut self,
        operator: &mut mpsc::Receiver<OperatorEvent>,
    ) -> Option<ConsoleEvent> {
        tokio::select! {
            event = operator.recv() => event.map(ConsoleEvent::Operator),
            Some(event) = self.stream_rx.recv() => Some(ConsoleEvent::Stream(event)),
            Some(result) = self.poll_rx.recv() => Some(ConsoleEvent::Poll(result)),
            Some(event) = self.loopback_rx.recv() => Some(event),
        }
    }

    /// Handle one event
    pub async fn handle_event(&mut self, event: ConsoleEvent) -> ControlFlow<()> {
        match event {
            ConsoleEvent::Operator(event) => return self.handle_operator(event).await,
            ConsoleEvent::Stream(event) => self.handle_stream(event).await,
            ConsoleEvent::Poll(result) => self.handle_poll(result).await,
            ConsoleEvent::DispatchRejected { epoch, reason } => {
                if self.is_current(epoch) {
                    tracing::warn!(%reason, "Gateway refused session during dispatch");
                    self.logout().await;
                }
            }
            ConsoleEvent::AlarmHistory { epoch, result } => {
                if !self.is_current(epoch) {
                    return ControlFlow::Continue(());
                }
                match result {
                    Ok(records) => self.send(ConsoleMessage::AlarmHistory(Ok(records))).await,
                    Err(ConsoleError::Auth(reason)) => {
                        self.send(ConsoleMessage::AlarmHistory(Err(reason.to_string())))
                            .await;
                        self.logout().await;
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Alarm history unavailable");
                        self.send(ConsoleMessage::AlarmHistory(Err(e.to_string())))
                            .await;
                    }
                }
            }
        }
        ControlFlow::Continue(())
    }

    // ============================================
    // Operator input
    // ============================================

    async fn handle_operator(&mut self, event: OperatorEvent) -> ControlFlow<()> {
        match event {
            OperatorEvent::Login(credentials) => self.login(credentials).await,
            OperatorEvent::Logout => self.logout().await,
            OperatorEvent::Quit => return ControlFlow::Break(()),
            _ if !self.active => {
                tracing::debug!("Operator input ignored without a session");
            }
            OperatorEvent::Input { control, signal } => {
                if let Some(command) = self.commands.on_signal(&control, signal) {
                    tracing::info!(
                        tag = %command.tag,
                        value = command.value,
                        modality = ?signal.modality(),
                        "Input line"
                    );
                    self.send(ConsoleMessage::ButtonFeedback {
                        control: command.control.clone(),
                        pressed: command.value,
                    })
                    .await;
                    self.dispatch(Dispatch::Line(command));
                }
            }
            OperatorEvent::GlobalRelease => {
                for command in self.commands.release_all() {
                    tracing::info!(tag = %command.tag, "Input line released globally");
                    self.send(ConsoleMessage::ButtonFeedback {
                        control: command.control.clone(),
                        pressed: false,
                    })
                    .await;
                    self.dispatch(Dispatch::Line(command));
                }
            }
            OperatorEvent::InjectFault(kind) => self.inject_fault(kind),
            OperatorEvent::OpenAlarmLog => self.open_alarm_log(),
        }
        ControlFlow::Continue(())
    }

    async fn login(&mut self, credentials: Credentials) {
        if self.active {
            tracing::debug!("Login ignored, session already active");
            return;
        }
        match self
            .session
            .acquire_token(&credentials.username, &credentials.password)
            .await
        {
            Ok(_) => self.validate_and_start().await,
            Err(e) => {
                self.send(ConsoleMessage::LoginFailed {
                    reason: e.to_string(),
                })
                .await;
            }
        }
    }

    async fn validate_and_start(&mut self) {
        match self.session.validate().await {
            Validation::Valid(profile) => self.begin_session(profile).await,
            Validation::NoToken | Validation::Invalid(_) => {
                self.send(ConsoleMessage::LoginRequired).await;
            }
            Validation::Unreachable(_) => {
                // Token kept; a later login or restart may confirm it.
                self.send(ConsoleMessage::LoginRequired).await;
            }
        }
    }

    async fn begin_session(&mut self, profile: UserProfile) {
        let Some(token) = self.session.token().cloned() else {
            self.send(ConsoleMessage::LoginRequired).await;
            return;
        };

        self.epoch += 1;
        self.active = true;
        self.display = HmiDisplay::new();
        let fault_panel_visible = profile.is_admin();
        tracing::info!(
            epoch = self.epoch,
            username = %profile.username,
            fault_panel_visible,
            "Session started"
        );
        self.profile = Some(profile.clone());
        self.send(ConsoleMessage::SessionStarted {
            profile,
            fault_panel_visible,
        })
        .await;

        self.pollers.start(self.epoch, token);
        let state = self.stream.connect();
        self.send(ConsoleMessage::Connection(state)).await;
    }

    /// End the session and forget the token
    async fn logout(&mut self) {
        self.suspend();
        self.session.invalidate();
        self.profile = None;
        self.display = HmiDisplay::new();
        tracing::info!("Logged out");
        self.send(ConsoleMessage::LoggedOut).await;
        self.send(ConsoleMessage::LoginRequired).await;
    }

    /// Stop everything the session started, keeping the token
    fn suspend(&mut self) {
        if !self.active {
            return;
        }
        for command in self.commands.release_all() {
            tracing::info!(tag = %command.tag, "Releasing held input line");
            self.dispatch(Dispatch::Line(command));
        }
        self.stream.shutdown();
        self.pollers.stop();
        self.epoch += 1;
        self.active = false;
    }

    fn inject_fault(&mut self, kind: FaultKind) {
        let is_admin = self.profile.as_ref().is_some_and(UserProfile::is_admin);
        if !is_admin {
            tracing::warn!(fault = %kind, "Fault injection refused for non-admin session");
            return;
        }
        tracing::info!(fault = %kind, "Injecting fault");
        self.dispatch(Dispatch::Fault(kind));
    }

    fn open_alarm_log(&mut self) {
        let Some(token) = self.session.token().cloned() else {
            return;
        };
        let gateway = Arc::clone(&self.gateway);
        let loopback = self.loopback_tx.clone();
        let epoch = self.epoch;

        tokio::spawn(async move {
            let result = gateway.alarm_history(&token).await;
            let _ = loopback.send(ConsoleEvent::AlarmHistory { epoch, result });
        });
    }

    fn dispatch(&self, action: Dispatch) {
        let Some(token) = self.session.token().cloned() else {
            tracing::debug!(?action, "No token, dispatch skipped");
            return;
        };
        let loopback = self.loopback_tx.clone();
        let epoch = self.epoch;
        dispatch_best_effort(Arc::clone(&self.gateway), token, action, move |reason| {
            let _ = loopback.send(ConsoleEvent::DispatchRejected { epoch, reason });
        });
    }

    // ============================================
    // Loop-back events
    // ============================================

    async fn handle_stream(&mut self, event: StreamEvent) {
        if !self.active {
            return;
        }
        match self.stream.handle(event) {
            StreamOutcome::State(state) => self.send(ConsoleMessage::Connection(state)).await,
            StreamOutcome::Snapshot(snapshot) => {
                let report = reconcile(&mut self.display, &snapshot);
                for change in report.changes {
                    self.send(ConsoleMessage::Display(change)).await;
                }
                self.send(ConsoleMessage::CycleTime(report.elapsed)).await;
            }
            StreamOutcome::Ignored => {}
        }
    }

    async fn handle_poll(&mut self, result: PollResult) {
        if !self.is_current(result.epoch) {
            tracing::trace!(epoch = result.epoch, "Stale poll result dropped");
            return;
        }
        match result.kind {
            PollKind::Clock(now) => self.send(ConsoleMessage::Clock(now)).await,
            PollKind::Alarms(alarms) => self.send(ConsoleMessage::Alarms(alarms)).await,
            PollKind::Insights(insights) => self.send(ConsoleMessage::Insights(insights)).await,
            PollKind::SessionRejected(reason) => {
                tracing::warn!(%reason, "Gateway refused session during poll");
                self.logout().await;
            }
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.active && epoch == self.epoch
    }

    async fn send(&self, message: ConsoleMessage) {
        if self.tx.send(message).await.is_err() {
            tracing::debug!("Surface gone, message dropped");
        }
    }
}
