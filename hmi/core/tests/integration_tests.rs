//! Console integration tests
//!
//! Drive a full [`Console`] with a scripted gateway and an in-process
//! telemetry source. Tests cover:
//! - Login, token persistence and session resume
//! - Push-button dispatch and release guarantees
//! - Admin gating of fault injection
//! - Logout teardown (no display update after `LoggedOut`)
//! - Malformed frames and rejected sessions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

use hmi_core::{
    ActiveAlarm, AlarmRecord, AuthError, BearerToken, ChannelSource, ConnectionState, Console,
    ConsoleConfig, ConsoleEvent, ConsoleMessage, Credentials, DisplayChange, FaultKind, Gateway,
    HmiDisplay, InputSignal, Insights, Lamp, Modality, MemoryTokenStore, MotorLabel, OperatorEvent,
    PollKind, Result, TransportError, UserProfile,
};

// =============================================================================
// Scripted gateway
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
enum Call {
    SetLine { token: String, tag: String, value: bool },
    Fault(FaultKind),
}

#[derive(Default)]
struct MockGateway {
    calls: Mutex<Vec<Call>>,
    profile_unreachable: AtomicBool,
    reject_commands: AtomicBool,
    insights_unauthorized: AtomicBool,
}

impl MockGateway {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn request_token(&self, username: &str, password: &str) -> Result<BearerToken> {
        match (username, password) {
            ("operator", "op123") | ("admin", "admin123") => {
                Ok(BearerToken::new(format!("jwt-{username}")))
            }
            _ => Err(AuthError::Rejected {
                detail: "Incorrect username or password".into(),
            }
            .into()),
        }
    }

    async fn current_user(&self, token: &BearerToken) -> Result<UserProfile> {
        if self.profile_unreachable.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable("connection refused".into()).into());
        }
        let role = match token.as_str() {
            "jwt-admin" => "admin",
            "jwt-operator" => "operator",
            _ => return Err(AuthError::SessionInvalid { status: 401 }.into()),
        };
        Ok(UserProfile {
            username: role.into(),
            role: role.into(),
        })
    }

    async fn set_line(&self, token: &BearerToken, tag: &str, value: bool) -> Result<()> {
        self.calls.lock().push(Call::SetLine {
            token: token.as_str().into(),
            tag: tag.into(),
            value,
        });
        if self.reject_commands.load(Ordering::SeqCst) {
            return Err(AuthError::SessionInvalid { status: 403 }.into());
        }
        Ok(())
    }

    async fn inject_fault(&self, _: &BearerToken, fault: FaultKind) -> Result<()> {
        self.calls.lock().push(Call::Fault(fault));
        Ok(())
    }

    async fn active_alarms(&self, _: &BearerToken) -> Result<Vec<ActiveAlarm>> {
        Ok(Vec::new())
    }

    async fn alarm_history(&self, _: &BearerToken) -> Result<Vec<AlarmRecord>> {
        Ok(vec![AlarmRecord {
            timestamp: "2024-05-01T10:00:00".into(),
            code: "ERR_INTERLOCK".into(),
            message: "MC1 and MC2 energised together".into(),
            severity: Some("CRITICAL".into()),
        }])
    }

    async fn insights(&self) -> Result<Insights> {
        if self.insights_unauthorized.load(Ordering::SeqCst) {
            // Public endpoint: a 401 here says nothing about the session.
            return Err(TransportError::Status {
                endpoint: "/ai/insights".into(),
                status: 401,
            }
            .into());
        }
        Ok(Insights {
            health_score: 100,
            insights: "Optimal".into(),
            avg_travel_time: 0.0,
        })
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    console: Console,
    gateway: Arc<MockGateway>,
    source: ChannelSource,
    store: MemoryTokenStore,
    ops_tx: mpsc::Sender<OperatorEvent>,
    ops_rx: mpsc::Receiver<OperatorEvent>,
    messages: mpsc::Receiver<ConsoleMessage>,
}

impl Harness {
    fn new(store: MemoryTokenStore) -> Self {
        let gateway = Arc::new(MockGateway::default());
        let source = ChannelSource::new();
        let (tx, messages) = mpsc::channel(1024);
        let (ops_tx, ops_rx) = mpsc::channel(16);
        let console = Console::new(
            gateway.clone(),
            Arc::new(source.clone()),
            Box::new(store.clone()),
            &ConsoleConfig::default(),
            tx,
        );
        Self {
            console,
            gateway,
            source,
            store,
            ops_tx,
            ops_rx,
            messages,
        }
    }

    async fn operator(&mut self, event: OperatorEvent) {
        let _ = self.console.handle_event(ConsoleEvent::Operator(event)).await;
    }

    async fn login(&mut self, username: &str, password: &str) {
        self.operator(OperatorEvent::Login(Credentials::new(username, password)))
            .await;
    }

    /// Handle the next event from any source
    async fn step(&mut self) {
        let event = self.console.next_event(&mut self.ops_rx).await.unwrap();
        let _ = self.console.handle_event(event).await;
    }

    fn drain(&mut self) -> Vec<ConsoleMessage> {
        std::iter::from_fn(|| self.messages.try_recv().ok()).collect()
    }

    /// Log in as operator with an open telemetry connection
    async fn online(&mut self) -> mpsc::UnboundedSender<String> {
        let feed = self.source.push_connection();
        self.login("operator", "op123").await;
        self.step().await;
        assert_eq!(
            self.drain().last(),
            Some(&ConsoleMessage::Connection(ConnectionState::Online))
        );
        feed
    }
}

/// Let spawned dispatch tasks run to completion
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn press(control: &str) -> OperatorEvent {
    OperatorEvent::Input {
        control: control.into(),
        signal: InputSignal::Press(Modality::Pointer),
    }
}

fn leave(control: &str) -> OperatorEvent {
    OperatorEvent::Input {
        control: control.into(),
        signal: InputSignal::Leave(Modality::Pointer),
    }
}

fn line(tag: &str, value: bool) -> Call {
    Call::SetLine {
        token: "jwt-operator".into(),
        tag: tag.into(),
        value,
    }
}

// =============================================================================
// Session
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_start_without_token_asks_for_login() {
    let mut h = Harness::new(MemoryTokenStore::new());
    h.console.start().await;
    assert_eq!(h.drain(), vec![ConsoleMessage::LoginRequired]);
    assert!(!h.console.is_active());
}

/// A successful login persists the token and brings up stream and pollers.
#[tokio::test(start_paused = true)]
async fn test_login_starts_session() {
    let mut h = Harness::new(MemoryTokenStore::new());
    let _feed = h.source.push_connection();

    h.login("operator", "op123").await;

    assert_eq!(
        h.drain(),
        vec![
            ConsoleMessage::SessionStarted {
                profile: UserProfile {
                    username: "operator".into(),
                    role: "operator".into(),
                },
                fault_panel_visible: false,
            },
            ConsoleMessage::Connection(ConnectionState::Connecting),
        ]
    );
    assert_eq!(h.store.peek(), Some(BearerToken::new("jwt-operator")));

    h.step().await;
    assert_eq!(
        h.drain(),
        vec![ConsoleMessage::Connection(ConnectionState::Online)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rejected_login_shows_detail_inline() {
    let mut h = Harness::new(MemoryTokenStore::new());
    h.login("operator", "nope").await;

    assert_eq!(
        h.drain(),
        vec![ConsoleMessage::LoginFailed {
            reason: "Incorrect username or password".into()
        }]
    );
    assert_eq!(h.store.peek(), None);
    assert!(!h.console.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_persisted_admin_token_resumes_with_fault_panel() {
    let mut h = Harness::new(MemoryTokenStore::with_token("jwt-admin"));
    let _feed = h.source.push_connection();
    h.console.start().await;

    let messages = h.drain();
    assert!(matches!(
        &messages[0],
        ConsoleMessage::SessionStarted {
            fault_panel_visible: true,
            ..
        }
    ));
    assert!(h.console.profile().is_some_and(UserProfile::is_admin));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_persisted_token_is_cleared() {
    let mut h = Harness::new(MemoryTokenStore::with_token("jwt-expired"));
    h.console.start().await;

    assert_eq!(h.drain(), vec![ConsoleMessage::LoginRequired]);
    assert_eq!(h.store.peek(), None);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_validation_keeps_token() {
    let mut h = Harness::new(MemoryTokenStore::with_token("jwt-operator"));
    h.gateway.profile_unreachable.store(true, Ordering::SeqCst);
    h.console.start().await;

    assert_eq!(h.drain(), vec![ConsoleMessage::LoginRequired]);
    assert_eq!(h.store.peek(), Some(BearerToken::new("jwt-operator")));
    assert_eq!(h.source.opens(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_insights_refusal_keeps_session() {
    let mut h = Harness::new(MemoryTokenStore::new());
    let _feed = h.online().await;
    h.gateway.insights_unauthorized.store(true, Ordering::SeqCst);

    let started = tokio::time::Instant::now();
    while started.elapsed() < Duration::from_secs(11) {
        h.step().await;
    }

    let messages = h.drain();
    assert!(!messages.contains(&ConsoleMessage::LoggedOut));
    assert!(!messages
        .iter()
        .any(|m| matches!(m, ConsoleMessage::Insights(_))));
    assert!(h.console.is_active());
    assert_eq!(h.store.peek(), Some(BearerToken::new("jwt-operator")));
}

// =============================================================================
// Telemetry
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_snapshot_updates_display() {
    let mut h = Harness::new(MemoryTokenStore::new());
    let feed = h.online().await;

    feed.send(
        r#"{"event":"machine.state.changed","data":{"mc1":false,"mc2":false,"ls1":true,"l1":true}}"#
            .into(),
    )
    .unwrap();
    h.step().await;

    let messages = h.drain();
    assert!(messages.contains(&ConsoleMessage::Display(DisplayChange::DoorOpen(true))));
    assert!(messages.contains(&ConsoleMessage::Display(DisplayChange::Lamp {
        lamp: Lamp::L1,
        lit: true
    })));
    assert!(matches!(messages.last(), Some(ConsoleMessage::CycleTime(_))));
    assert!(h.console.display().door_open());
    assert_eq!(h.console.display().motor(), MotorLabel::Idle);
}

/// Invalid JSON on the stream is dropped without touching the display.
#[tokio::test(start_paused = true)]
async fn test_malformed_frame_changes_nothing() {
    let mut h = Harness::new(MemoryTokenStore::new());
    let feed = h.online().await;

    feed.send(r#"{"event":"machine.state.changed","data":{"pos":0.5,"l2":true}}"#.into())
        .unwrap();
    h.step().await;
    h.drain();
    let before = h.console.display().clone();

    feed.send("{\"event\": \"machine.state.cha".into()).unwrap();
    h.step().await;

    assert_eq!(h.drain(), Vec::new());
    assert_eq!(h.console.display(), &before);
    assert_eq!(h.console.stream().state(), ConnectionState::Online);
}

#[tokio::test(start_paused = true)]
async fn test_stream_close_goes_offline_then_reconnects() {
    let mut h = Harness::new(MemoryTokenStore::new());
    let feed = h.online().await;
    let _next = h.source.push_connection();

    drop(feed);
    h.step().await;
    assert_eq!(
        h.drain(),
        vec![ConsoleMessage::Connection(ConnectionState::Offline)]
    );

    // Clock and alarm polls interleave with the 4 s reconnect timer.
    let closed_at = tokio::time::Instant::now();
    while h.console.stream().state() != ConnectionState::Online {
        h.step().await;
    }
    assert!(closed_at.elapsed() >= Duration::from_secs(4));
    assert_eq!(h.source.opens(), 2);

    let states: Vec<_> = h
        .drain()
        .into_iter()
        .filter_map(|m| match m {
            ConsoleMessage::Connection(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![ConnectionState::Connecting, ConnectionState::Online]
    );
}

// =============================================================================
// Controls
// =============================================================================

/// Press then pointer-leave issues exactly one high and one low command.
#[tokio::test(start_paused = true)]
async fn test_press_and_leave_dispatch_one_pair() {
    let mut h = Harness::new(MemoryTokenStore::new());
    let _feed = h.online().await;

    h.operator(press("up")).await;
    h.operator(press("up")).await;
    settle().await;
    h.operator(leave("up")).await;
    h.operator(leave("up")).await;
    settle().await;

    assert_eq!(
        h.drain(),
        vec![
            ConsoleMessage::ButtonFeedback {
                control: "up".into(),
                pressed: true
            },
            ConsoleMessage::ButtonFeedback {
                control: "up".into(),
                pressed: false
            },
        ]
    );
    assert_eq!(h.gateway.calls(), vec![line("bp1", true), line("bp1", false)]);
}

#[tokio::test(start_paused = true)]
async fn test_global_release_frees_held_controls() {
    let mut h = Harness::new(MemoryTokenStore::new());
    let _feed = h.online().await;

    h.operator(press("down")).await;
    settle().await;
    h.operator(OperatorEvent::GlobalRelease).await;
    h.operator(OperatorEvent::GlobalRelease).await;
    settle().await;

    assert_eq!(h.gateway.calls(), vec![line("bp2", true), line("bp2", false)]);
    assert!(!h.console.commands().line("down").unwrap().pressed);
}

#[tokio::test(start_paused = true)]
async fn test_input_ignored_without_session() {
    let mut h = Harness::new(MemoryTokenStore::new());
    h.operator(press("up")).await;
    settle().await;

    assert!(h.drain().is_empty());
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fault_injection_requires_admin() {
    let mut h = Harness::new(MemoryTokenStore::new());
    let _feed = h.online().await;
    h.operator(OperatorEvent::InjectFault(FaultKind::Jam)).await;
    settle().await;
    assert!(h.gateway.calls().is_empty());

    let mut admin = Harness::new(MemoryTokenStore::with_token("jwt-admin"));
    let _admin_feed = admin.source.push_connection();
    admin.console.start().await;
    admin.operator(OperatorEvent::InjectFault(FaultKind::Reset)).await;
    settle().await;
    assert_eq!(admin.gateway.calls(), vec![Call::Fault(FaultKind::Reset)]);
}

/// A command refused for auth reasons ends the session.
#[tokio::test(start_paused = true)]
async fn test_rejected_command_logs_out() {
    let mut h = Harness::new(MemoryTokenStore::new());
    let _feed = h.online().await;
    h.gateway.reject_commands.store(true, Ordering::SeqCst);

    h.operator(press("up")).await;
    settle().await;
    h.drain();
    h.step().await;

    let messages = h.drain();
    assert!(messages.contains(&ConsoleMessage::LoggedOut));
    assert!(!h.console.is_active());
    assert_eq!(h.store.peek(), None);
}

// =============================================================================
// Logout
// =============================================================================

/// Logout with a pending reconnect timer and an in-flight poll: nothing
/// reaches the display afterwards.
#[tokio::test(start_paused = true)]
async fn test_logout_silences_everything() {
    let mut h = Harness::new(MemoryTokenStore::new());
    let feed = h.online().await;

    drop(feed);
    h.step().await;
    assert!(h.console.stream().reconnect_pending());

    // The first clock tick is the in-flight poll.
    let in_flight = h.console.next_event(&mut h.ops_rx).await.unwrap();
    assert!(matches!(
        in_flight,
        ConsoleEvent::Poll(ref result) if matches!(result.kind, PollKind::Clock(_))
    ));
    h.drain();

    h.operator(OperatorEvent::Logout).await;
    assert_eq!(
        h.drain(),
        vec![ConsoleMessage::LoggedOut, ConsoleMessage::LoginRequired]
    );
    assert!(!h.console.stream().reconnect_pending());

    let _ = h.console.handle_event(in_flight).await;
    let next = tokio::time::timeout(
        Duration::from_secs(60),
        h.console.next_event(&mut h.ops_rx),
    )
    .await;

    assert!(next.is_err(), "no event may fire after logout");
    assert!(h.drain().is_empty());
    assert_eq!(h.source.opens(), 1);
    assert_eq!(h.store.peek(), None);
}

/// A new session starts from a blank display, so unchanged machine state is
/// shown again.
#[tokio::test(start_paused = true)]
async fn test_relogin_redraws_display() {
    let mut h = Harness::new(MemoryTokenStore::new());
    let snapshot = r#"{"event":"machine.state.changed","data":{"mc1":false,"mc2":false,"ls1":true,"l1":true}}"#;

    let feed = h.online().await;
    feed.send(snapshot.into()).unwrap();
    h.step().await;
    assert!(h.console.display().door_open());

    h.operator(OperatorEvent::Logout).await;
    h.drain();
    assert_eq!(h.console.display(), &HmiDisplay::new());

    let feed = h.online().await;
    feed.send(snapshot.into()).unwrap();
    h.step().await;

    let messages = h.drain();
    assert!(messages.contains(&ConsoleMessage::Display(DisplayChange::DoorOpen(true))));
    assert!(messages.contains(&ConsoleMessage::Display(DisplayChange::Lamp {
        lamp: Lamp::L1,
        lit: true
    })));
}

#[tokio::test(start_paused = true)]
async fn test_logout_releases_held_lines() {
    let mut h = Harness::new(MemoryTokenStore::new());
    let _feed = h.online().await;

    h.operator(press("up")).await;
    settle().await;
    h.drain();
    h.operator(OperatorEvent::Logout).await;
    settle().await;

    assert_eq!(h.gateway.calls(), vec![line("bp1", true), line("bp1", false)]);
    assert!(!h
        .drain()
        .iter()
        .any(|m| matches!(m, ConsoleMessage::ButtonFeedback { .. })));
}

// =============================================================================
// Alarm log and run loop
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_alarm_log_fetches_history() {
    let mut h = Harness::new(MemoryTokenStore::new());
    let _feed = h.online().await;

    h.operator(OperatorEvent::OpenAlarmLog).await;
    settle().await;
    h.step().await;

    let messages = h.drain();
    let Some(ConsoleMessage::AlarmHistory(Ok(records))) = messages.first() else {
        panic!("expected alarm history, got {messages:?}");
    };
    assert_eq!(records[0].code, "ERR_INTERLOCK");
    assert_eq!(records[0].severity.as_deref(), Some("CRITICAL"));
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_stops_on_quit() {
    let h = Harness::new(MemoryTokenStore::with_token("jwt-operator"));
    let _feed = h.source.push_connection();
    let Harness {
        console,
        ops_tx,
        mut messages,
        store,
        ..
    } = h;

    let (op_tx, op_rx) = mpsc::channel(4);
    drop(ops_tx);
    let runner = tokio::spawn(console.run(op_rx));

    assert!(matches!(
        messages.recv().await,
        Some(ConsoleMessage::SessionStarted { .. })
    ));
    op_tx.send(OperatorEvent::Quit).await.unwrap();
    runner.await.unwrap();

    // Quitting keeps the token for the next start.
    assert_eq!(store.peek(), Some(BearerToken::new("jwt-operator")));
}
