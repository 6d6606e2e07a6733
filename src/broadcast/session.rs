//! Viewer session lifecycle: reconnect backoff and polling fallback
//!
//! The state machine is a single source of truth for the current delay
//! and retry budget, testable without a real network. The
//! [`StandingsStreamClient`] drives it over a real WebSocket connection.

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Instant};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, instrument, warn};

use super::wire::{parse_message, ControlMessage, WireMessage};
use crate::common::errors::{EngineError, Result};
use crate::common::traits::StandingsPoller;
use crate::common::types::StandingsSnapshot;
use crate::config::types::{BroadcastConfig, ReconnectConfig};

/// Lifecycle state of one viewer session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, waiting for the first snapshot
    Connecting,
    Open,
    /// Transport failed; waiting out the backoff delay before retrying
    Reconnecting { attempt: u32 },
    /// Retry budget exhausted; degraded to periodic point-in-time polls
    Polling,
    Closing,
    Closed,
}

/// What the session driver should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Attempt a (re)connection now
    Connect,
    /// Wait out a backoff delay, then reconnect
    Backoff(Duration),
    /// Take one point-in-time poll, then wait the poll interval
    Poll(Duration),
    /// Nothing left to do
    Stop,
}

/// Exponential backoff schedule: base delay doubling per attempt,
/// capped, with a bounded retry count
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
    poll_interval: Duration,
}

impl ReconnectPolicy {
    pub fn new(
        base_delay: Duration,
        max_delay: Duration,
        max_attempts: u32,
        poll_interval: Duration,
    ) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
            poll_interval,
        }
    }

    /// Delay before the given 1-based attempt: `base * 2^(attempt-1)`, capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn attempts_exhausted(&self, attempt: u32) -> bool {
        attempt > self.max_attempts
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.max_attempts,
            Duration::from_secs(config.poll_interval_seconds),
        )
    }
}

/// Session state machine
///
/// `Connecting -> Open -> {Closing -> Closed}`, with
/// `Open -> Reconnecting -> Connecting` on transport failure and
/// `Reconnecting -> Polling` once the retry budget is spent.
#[derive(Debug)]
pub struct SessionFsm {
    state: SessionState,
    policy: ReconnectPolicy,
    attempt: u32,
}

impl SessionFsm {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: SessionState::Connecting,
            policy,
            attempt: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Degraded-connectivity indicator: streaming has been given up on
    pub fn is_degraded(&self) -> bool {
        self.state == SessionState::Polling
    }

    /// Transport established; resets the retry budget
    pub fn on_connected(&mut self) {
        self.state = SessionState::Open;
        self.attempt = 0;
    }

    /// Transport failed or could not be established
    pub fn on_transport_error(&mut self) {
        match self.state {
            SessionState::Closing | SessionState::Closed => {}
            _ => {
                self.attempt += 1;
                if self.policy.attempts_exhausted(self.attempt) {
                    self.state = SessionState::Polling;
                } else {
                    self.state = SessionState::Reconnecting {
                        attempt: self.attempt,
                    };
                }
            }
        }
    }

    /// Backoff delay elapsed; ready to reconnect
    pub fn on_backoff_elapsed(&mut self) {
        if matches!(self.state, SessionState::Reconnecting { .. }) {
            self.state = SessionState::Connecting;
        }
    }

    pub fn on_close_requested(&mut self) {
        self.state = SessionState::Closing;
    }

    pub fn on_closed(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Decide the driver's next step from the current state
    pub fn next_action(&self) -> SessionAction {
        match self.state {
            SessionState::Connecting => SessionAction::Connect,
            SessionState::Open => SessionAction::Connect,
            SessionState::Reconnecting { attempt } => {
                SessionAction::Backoff(self.policy.delay_for(attempt))
            }
            SessionState::Polling => SessionAction::Poll(self.policy.poll_interval),
            SessionState::Closing | SessionState::Closed => SessionAction::Stop,
        }
    }
}

/// Liveness tracking for one connection
///
/// One side sends periodic pings; a peer that stays silent beyond the
/// timeout is considered dead and the connection is closed.
#[derive(Debug)]
pub struct KeepAlive {
    ping_interval: Duration,
    pong_timeout: Duration,
    last_ping: Instant,
    last_pong: Instant,
}

impl KeepAlive {
    pub fn new(ping_interval: Duration, pong_timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            ping_interval,
            pong_timeout,
            last_ping: now,
            last_pong: now,
        }
    }

    /// Whether it is time to send the next ping
    pub fn should_ping(&self, now: Instant) -> bool {
        now.duration_since(self.last_ping) >= self.ping_interval
    }

    pub fn on_ping_sent(&mut self, now: Instant) {
        self.last_ping = now;
    }

    pub fn on_pong(&mut self, now: Instant) {
        self.last_pong = now;
    }

    /// Whether the pong silence has exceeded the timeout
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.last_pong) > self.pong_timeout
    }
}

/// Events surfaced by a viewer session to its consumer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A standings snapshot arrived (streamed or polled)
    Standings(StandingsSnapshot),
    /// Lifecycle transition, including the degraded indicator
    State(SessionState),
}

/// A single connected viewer of the standings stream
///
/// Connects to the push channel, answers server pings with pongs, parses
/// leaderboard frames, and on transport failure walks the reconnect
/// backoff schedule. Once the retry budget is exhausted it degrades to
/// periodic polling through the supplied [`StandingsPoller`].
pub struct StandingsStreamClient {
    url: String,
    fsm: SessionFsm,
    poller: Arc<dyn StandingsPoller>,
    is_connected: Arc<AtomicBool>,
    ping_interval: Duration,
    pong_timeout: Duration,
}

impl StandingsStreamClient {
    pub fn new(url: &str, policy: ReconnectPolicy, poller: Arc<dyn StandingsPoller>) -> Self {
        Self {
            url: url.to_string(),
            fsm: SessionFsm::new(policy),
            poller,
            is_connected: Arc::new(AtomicBool::new(false)),
            ping_interval: Duration::from_secs(10),
            pong_timeout: Duration::from_secs(30),
        }
    }

    /// Build a client from the broadcast configuration: stream URL,
    /// reconnect schedule, and liveness cadence all come from config
    pub fn from_config(config: &BroadcastConfig, poller: Arc<dyn StandingsPoller>) -> Self {
        Self::new(&config.stream_url, ReconnectPolicy::from(&config.reconnect), poller)
            .with_keepalive(
                Duration::from_secs(config.heartbeat_interval_seconds),
                Duration::from_secs(config.pong_timeout_seconds),
            )
    }

    /// Override the liveness schedule (ping cadence and tolerated silence)
    pub fn with_keepalive(mut self, ping_interval: Duration, pong_timeout: Duration) -> Self {
        self.ping_interval = ping_interval;
        self.pong_timeout = pong_timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst)
    }

    /// Run the session until the event receiver is dropped
    #[instrument(skip(self, events), fields(url = %self.url))]
    pub async fn run(mut self, events: mpsc::Sender<SessionEvent>) {
        loop {
            match self.fsm.next_action() {
                SessionAction::Connect => {
                    if events
                        .send(SessionEvent::State(self.fsm.state()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                    match self.stream_once(&events).await {
                        Ok(()) => {
                            // Clean close requested by the consumer
                            self.fsm.on_close_requested();
                        }
                        Err(e) => {
                            warn!("Stream transport failed: {}", e);
                            self.is_connected.store(false, Ordering::SeqCst);
                            self.fsm.on_transport_error();
                        }
                    }
                }
                SessionAction::Backoff(delay) => {
                    info!("Reconnecting in {:?}", delay);
                    if events
                        .send(SessionEvent::State(self.fsm.state()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                    sleep(delay).await;
                    self.fsm.on_backoff_elapsed();
                }
                SessionAction::Poll(poll_interval) => {
                    if events
                        .send(SessionEvent::State(self.fsm.state()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                    warn!("Streaming unavailable, degraded to polling");
                    loop {
                        match self.poller.poll_standings().await {
                            Ok(snapshot) => {
                                if events
                                    .send(SessionEvent::Standings(snapshot))
                                    .await
                                    .is_err()
                                {
                                    self.fsm.on_close_requested();
                                    break;
                                }
                            }
                            Err(e) => debug!("Poll failed: {}", e),
                        }
                        if events.is_closed() {
                            self.fsm.on_close_requested();
                            break;
                        }
                        sleep(poll_interval).await;
                    }
                }
                SessionAction::Stop => break,
            }
        }

        self.fsm.on_closed();
        info!("Session closed");
    }

    /// One full connection lifetime: connect, stream until the transport
    /// drops or the consumer goes away
    async fn stream_once(&mut self, events: &mpsc::Sender<SessionEvent>) -> Result<()> {
        info!("Connecting to standings stream: {}", self.url);
        let (ws_stream, _response) = connect_async(&self.url)
            .await
            .map_err(|e| EngineError::WebSocketConnection(e.to_string()))?;

        info!("Standings stream established");
        self.is_connected.store(true, Ordering::SeqCst);
        self.fsm.on_connected();
        if events
            .send(SessionEvent::State(self.fsm.state()))
            .await
            .is_err()
        {
            return Ok(());
        }

        let (mut write, mut read) = ws_stream.split();
        let mut keepalive = KeepAlive::new(self.ping_interval, self.pong_timeout);
        let mut liveness_check = interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                msg = read.next() => {
                    // Any inbound traffic proves the server is alive
                    keepalive.on_pong(Instant::now());
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match parse_message(&text) {
                                WireMessage::Control(ControlMessage::Ping) => {
                                    debug!("Server ping, answering pong");
                                    write
                                        .send(Message::Text(
                                            ControlMessage::Pong.as_str().to_string(),
                                        ))
                                        .await?;
                                }
                                WireMessage::Control(_) => {}
                                WireMessage::Leaderboard(frame) => {
                                    let snapshot = frame.into_snapshot();
                                    if events
                                        .send(SessionEvent::Standings(snapshot))
                                        .await
                                        .is_err()
                                    {
                                        return Ok(());
                                    }
                                }
                                WireMessage::Raw(raw) => {
                                    warn!("Unrecognized stream message: {}", raw);
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!("Stream closed by server: {:?}", frame);
                            return Err(EngineError::WebSocketCommunication(
                                "server closed connection".to_string(),
                            ));
                        }
                        Some(Err(e)) => {
                            error!("Stream error: {}", e);
                            return Err(e.into());
                        }
                        None => {
                            return Err(EngineError::WebSocketCommunication(
                                "stream ended".to_string(),
                            ));
                        }
                        _ => {}
                    }
                }
                _ = liveness_check.tick() => {
                    if events.is_closed() {
                        return Ok(());
                    }
                    let now = Instant::now();
                    if keepalive.is_expired(now) {
                        return Err(EngineError::WebSocketCommunication(
                            "server silent past the pong timeout".to_string(),
                        ));
                    }
                    if keepalive.should_ping(now) {
                        write
                            .send(Message::Text(
                                ControlMessage::Ping.as_str().to_string(),
                            ))
                            .await?;
                        keepalive.on_ping_sent(now);
                    }
                }
            }
        }
    }
}
