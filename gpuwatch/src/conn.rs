//! Connection lifecycle as an explicit state machine.
//!
//! The manager never touches a socket. Every call returns the `Command`s the
//! driver (see `ws::Link`) must execute, and every event coming back is tagged
//! with the generation of the attempt that produced it. Each new attempt, stop
//! and endpoint change bumps the generation, so completions from superseded
//! attempts or timers are recognised and dropped.

use std::time::Duration;

use tracing::{debug, info, warn};

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Status as shown to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    Idle,
    Connecting,
    Open,
    Closed,
    Error,
}

impl ConnStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnStatus::Idle => "idle",
            ConnStatus::Connecting => "connecting",
            ConnStatus::Open => "open",
            ConnStatus::Closed => "closed",
            ConnStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Connecting,
    Open,
    BackoffWait,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect { generation: u64, url: String },
    Disconnect { generation: u64 },
    ScheduleReconnect { generation: u64, delay: Duration },
    CancelReconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Error(String),
    Closed,
}

/// What the driver reports back, tagged with a generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Transport(TransportEvent),
    ReconnectTimer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    delay: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            delay: base,
            attempt: 0,
        }
    }

    /// Current delay; the next call returns double that, capped at `max`.
    pub fn next_delay(&mut self) -> Duration {
        let d = self.delay;
        self.delay = (self.delay * 2).min(self.max);
        self.attempt = self.attempt.saturating_add(1);
        d
    }

    pub fn reset(&mut self) {
        self.delay = self.base;
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn current_delay(&self) -> Duration {
        self.delay
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

#[derive(Debug)]
pub struct ConnectionManager {
    endpoint: Option<String>,
    running: bool,
    phase: Phase,
    status: ConnStatus,
    last_error: Option<String>,
    backoff: Backoff,
    generation: u64,
    // generation of the live connection attempt, if any
    live: Option<u64>,
    // generation the pending reconnect timer belongs to, if any
    timer: Option<u64>,
}

impl ConnectionManager {
    pub fn new(endpoint: Option<String>, backoff: Backoff) -> Self {
        Self {
            endpoint,
            running: false,
            phase: Phase::Idle,
            status: ConnStatus::Idle,
            last_error: None,
            backoff,
            generation: 0,
            live: None,
            timer: None,
        }
    }

    pub fn status(&self) -> ConnStatus {
        self.status
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn start(&mut self) -> Vec<Command> {
        if self.running {
            return Vec::new();
        }
        self.running = true;
        self.backoff.reset();
        self.connect()
    }

    pub fn stop(&mut self) -> Vec<Command> {
        self.running = false;
        let cmds = self.teardown();
        self.phase = Phase::Stopped;
        if self.status != ConnStatus::Idle {
            self.status = ConnStatus::Closed;
        }
        info!("connection stopped");
        cmds
    }

    /// Reconfigure the endpoint. While running this drops the current
    /// connection and dials the new endpoint right away with fresh backoff.
    pub fn set_endpoint(&mut self, url: String) -> Vec<Command> {
        if self.endpoint.as_deref() == Some(url.as_str()) {
            return Vec::new();
        }
        info!(endpoint = %url, "endpoint changed");
        self.endpoint = Some(url);
        if !self.running {
            return Vec::new();
        }
        let mut cmds = self.teardown();
        self.backoff.reset();
        cmds.extend(self.connect());
        cmds
    }

    /// Feed an event from the connection task of `generation`.
    /// Returns the message payload to decode (if any) and commands to execute.
    pub fn on_event(
        &mut self,
        generation: u64,
        ev: TransportEvent,
    ) -> (Option<String>, Vec<Command>) {
        if self.live != Some(generation) {
            debug!(generation, current = self.generation, "ignoring stale transport event");
            return (None, Vec::new());
        }
        match ev {
            TransportEvent::Opened => {
                self.backoff.reset();
                self.phase = Phase::Open;
                self.status = ConnStatus::Open;
                self.last_error = None;
                info!(endpoint = self.endpoint.as_deref().unwrap_or(""), "connection open");
                (None, Vec::new())
            }
            TransportEvent::Message(text) => (Some(text), Vec::new()),
            TransportEvent::Error(detail) => {
                warn!(error = %detail, "connection error");
                self.status = ConnStatus::Error;
                self.last_error = Some(detail);
                (None, Vec::new())
            }
            TransportEvent::Closed => {
                self.live = None;
                // an earlier error stays in `last_error`
                self.status = ConnStatus::Closed;
                if !self.running {
                    self.phase = Phase::Stopped;
                    return (None, Vec::new());
                }
                let delay = self.backoff.next_delay();
                self.phase = Phase::BackoffWait;
                self.timer = Some(self.generation);
                info!(
                    delay_ms = delay.as_millis() as u64,
                    attempt = self.backoff.attempt(),
                    "connection closed, scheduling reconnect"
                );
                (
                    None,
                    vec![Command::ScheduleReconnect {
                        generation: self.generation,
                        delay,
                    }],
                )
            }
        }
    }

    pub fn on_timer(&mut self, generation: u64) -> Vec<Command> {
        if self.timer != Some(generation) || !self.running {
            debug!(generation, "ignoring stale reconnect timer");
            return Vec::new();
        }
        self.timer = None;
        self.connect()
    }

    fn connect(&mut self) -> Vec<Command> {
        let Some(url) = self.endpoint.clone() else {
            warn!("no endpoint configured");
            self.phase = Phase::Idle;
            self.status = ConnStatus::Error;
            self.last_error = Some("no endpoint configured".into());
            return Vec::new();
        };
        self.generation += 1;
        self.live = Some(self.generation);
        self.phase = Phase::Connecting;
        self.status = ConnStatus::Connecting;
        debug!(generation = self.generation, endpoint = %url, "connecting");
        vec![Command::Connect {
            generation: self.generation,
            url,
        }]
    }

    // Cancel any pending timer and close any live attempt; invalidates both.
    fn teardown(&mut self) -> Vec<Command> {
        let mut cmds = Vec::new();
        if self.timer.take().is_some() {
            cmds.push(Command::CancelReconnect);
        }
        if let Some(generation) = self.live.take() {
            cmds.push(Command::Disconnect { generation });
        }
        self.generation += 1;
        cmds
    }
}
