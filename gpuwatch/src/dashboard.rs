//! Single-owner state for one dashboard session.
//!
//! Owns the connection state machine, history, chart sequences, selection and
//! the freshest snapshot. The run loop hands it one event at a time and
//! executes whatever `Command`s it returns; views only read from it.

use std::collections::VecDeque;

use thiserror::Error;
use tracing::{debug, warn};

use crate::align::{ChartRow, ChartStore};
use crate::config::Tuning;
use crate::conn::{Command, ConnStatus, ConnectionManager, Signal};
use crate::history::HistoryStore;
use crate::metrics::MetricKey;
use crate::parse::{parse_snapshot, ParseError};
use crate::selection::Selection;
use crate::types::{HistoryEntry, Snapshot};

#[derive(Debug, Error)]
pub enum Rejected {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("timestamp {timestamp} is older than last accepted {newest}")]
    Regressed { timestamp: f64, newest: f64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub accepted: u64,
    pub rejected: u64,
}

#[derive(Debug)]
pub struct Dashboard {
    conn: ConnectionManager,
    history: HistoryStore,
    charts: ChartStore,
    selection: Selection,
    latest: Option<Snapshot>,
    newest: Option<f64>,
    counters: Counters,
    last_reject: Option<String>,
}

impl Dashboard {
    pub fn new(tuning: &Tuning, endpoint: Option<String>) -> Self {
        Self {
            conn: ConnectionManager::new(endpoint, tuning.backoff()),
            history: HistoryStore::new(tuning.history_len),
            charts: ChartStore::new(tuning.alignment()),
            selection: Selection::default(),
            latest: None,
            newest: None,
            counters: Counters::default(),
            last_reject: None,
        }
    }

    // ---- write API ----

    pub fn start(&mut self) -> Vec<Command> {
        self.conn.start()
    }

    pub fn stop(&mut self) -> Vec<Command> {
        self.conn.stop()
    }

    pub fn set_endpoint(&mut self, url: String) -> Vec<Command> {
        self.conn.set_endpoint(url)
    }

    /// Drop all data and device focus. Running/stopped state is untouched.
    pub fn reset(&mut self) {
        self.history.reset();
        self.charts.reset();
        self.selection.reset();
        self.latest = None;
        self.newest = None;
    }

    pub fn toggle_device(&mut self, index: u32) {
        self.selection.toggle_device(index);
        self.rebuild();
    }

    pub fn set_metrics(&mut self, metrics: impl IntoIterator<Item = MetricKey>) {
        if self.selection.set_metrics(metrics) {
            self.rebuild();
        }
    }

    pub fn set_active_metric(&mut self, key: MetricKey) {
        if self.selection.set_active_metric(key) {
            self.rebuild();
        }
    }

    // ---- event handling ----

    pub fn handle(&mut self, generation: u64, signal: Signal) -> Vec<Command> {
        match signal {
            Signal::ReconnectTimer => self.conn.on_timer(generation),
            Signal::Transport(ev) => {
                let (msg, cmds) = self.conn.on_event(generation, ev);
                if let Some(raw) = msg {
                    if let Err(e) = self.ingest_message(&raw) {
                        warn!(error = %e, "dropping inbound message");
                    }
                }
                cmds
            }
        }
    }

    /// Decode and apply one inbound message. On rejection nothing changes
    /// except the reject counter.
    pub fn ingest_message(&mut self, raw: &str) -> Result<(), Rejected> {
        let res = parse_snapshot(raw)
            .map_err(Rejected::from)
            .and_then(|snap| self.ingest(snap));
        if let Err(e) = &res {
            self.counters.rejected += 1;
            self.last_reject = Some(e.to_string());
        }
        res
    }

    pub fn ingest(&mut self, snap: Snapshot) -> Result<(), Rejected> {
        if let Some(newest) = self.newest {
            if snap.timestamp < newest {
                return Err(Rejected::Regressed {
                    timestamp: snap.timestamp,
                    newest,
                });
            }
        }
        self.history.ingest(&snap);
        self.charts.on_snapshot(&snap, &self.history, &self.selection);
        self.newest = Some(snap.timestamp);
        self.counters.accepted += 1;
        debug!(timestamp = snap.timestamp, devices = snap.gpus.len(), "snapshot accepted");
        self.latest = Some(snap);
        Ok(())
    }

    fn rebuild(&mut self) {
        self.charts.rebuild(&self.history, &self.selection);
    }

    // ---- read API ----

    pub fn latest(&self) -> Option<&Snapshot> {
        self.latest.as_ref()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn device_history(&self, index: u32) -> Option<&VecDeque<HistoryEntry>> {
        self.history.device(index)
    }

    pub fn chart(&self, metric: MetricKey) -> Option<&VecDeque<ChartRow>> {
        self.charts.rows(metric)
    }

    pub fn active_chart(&self) -> Option<(MetricKey, &VecDeque<ChartRow>)> {
        let m = self.selection.active_metric()?;
        self.charts.rows(m).map(|rows| (m, rows))
    }

    pub fn status(&self) -> ConnStatus {
        self.conn.status()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.conn.last_error()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.conn.endpoint()
    }

    pub fn is_running(&self) -> bool {
        self.conn.is_running()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn last_reject(&self) -> Option<&str> {
        self.last_reject.as_deref()
    }
}
