//! Turns per-device sample arrivals into time-aligned chart rows.
//!
//! Two pure entry points share the same lookup rules:
//! - [`incremental_row`] builds the row for a freshly accepted snapshot,
//!   preferring the snapshot's own values over history.
//! - [`rebuild`] re-derives a whole metric sequence from history alone.
//!
//! Ticks are snapshot timestamps rounded to the nearest multiple of `step`.
//! Lookup picks the history entry whose tick is closest to the target,
//! scanning newest to oldest so the latest sample in a tick wins. That keeps
//! a rebuild consistent with what same-tick coalescing produced live.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use crate::history::{push_capped, HistoryStore};
use crate::metrics::MetricKey;
use crate::selection::Selection;
use crate::types::{HistoryEntry, Snapshot};

pub const DEFAULT_CHART_LEN: usize = 120;
pub const DEFAULT_TICK_STEP_SECS: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ChartRow {
    pub tick: f64,
    // device index -> value (None = unknown)
    pub values: BTreeMap<u32, Option<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    pub step: f64,
    pub chart_len: usize,
}

impl Alignment {
    pub fn tick_index(&self, ts: f64) -> i64 {
        (ts / self.step).round() as i64
    }

    pub fn tick_at(&self, idx: i64) -> f64 {
        idx as f64 * self.step
    }

    pub fn quantize(&self, ts: f64) -> f64 {
        self.tick_at(self.tick_index(ts))
    }
}

impl Default for Alignment {
    fn default() -> Self {
        Self {
            step: DEFAULT_TICK_STEP_SECS,
            chart_len: DEFAULT_CHART_LEN,
        }
    }
}

/// Entry closest to tick `target`; ties go to the newest. No distance cutoff.
pub fn nearest<'a>(
    al: &Alignment,
    hist: &'a VecDeque<HistoryEntry>,
    target: i64,
) -> Option<&'a HistoryEntry> {
    let mut best: Option<(&HistoryEntry, u64)> = None;
    for e in hist.iter().rev() {
        let d = al.tick_index(e.timestamp).abs_diff(target);
        match best {
            Some((_, bd)) if d >= bd => {}
            _ => best = Some((e, d)),
        }
        if d == 0 {
            break;
        }
    }
    best.map(|(e, _)| e)
}

fn history_value(
    al: &Alignment,
    history: &HistoryStore,
    device: u32,
    metric: MetricKey,
    target: i64,
) -> Option<f64> {
    history
        .device(device)
        .and_then(|h| nearest(al, h, target))
        .and_then(|e| metric.value(&e.sample))
}

pub fn incremental_row(
    al: &Alignment,
    snap: &Snapshot,
    history: &HistoryStore,
    devices: &BTreeSet<u32>,
    metric: MetricKey,
) -> ChartRow {
    let target = al.tick_index(snap.timestamp);
    let values = devices
        .iter()
        .map(|&d| {
            let v = match snap.device(d) {
                Some(sample) => metric.value(sample),
                None => history_value(al, history, d, metric, target),
            };
            (d, v)
        })
        .collect();
    ChartRow {
        tick: al.tick_at(target),
        values,
    }
}

/// Coalesce into the last row when the tick matches, otherwise append and evict.
/// Rows older than the current tail are dropped. Returns whether `rows` changed.
pub fn apply_row(al: &Alignment, rows: &mut VecDeque<ChartRow>, row: ChartRow) -> bool {
    if let Some(last) = rows.back_mut() {
        let (last_t, t) = (al.tick_index(last.tick), al.tick_index(row.tick));
        if t == last_t {
            *last = row;
            return true;
        }
        if t < last_t {
            debug!(tick = row.tick, last = last.tick, "dropping out-of-order chart row");
            return false;
        }
    }
    push_capped(rows, row, al.chart_len);
    true
}

pub fn rebuild(
    al: &Alignment,
    history: &HistoryStore,
    devices: &BTreeSet<u32>,
    metric: MetricKey,
) -> VecDeque<ChartRow> {
    let ticks: BTreeSet<i64> = devices
        .iter()
        .filter_map(|&d| history.device(d))
        .flat_map(|h| h.iter().map(|e| al.tick_index(e.timestamp)))
        .collect();
    let skip = ticks.len().saturating_sub(al.chart_len);
    ticks
        .into_iter()
        .skip(skip)
        .map(|t| ChartRow {
            tick: al.tick_at(t),
            values: devices
                .iter()
                .map(|&d| (d, history_value(al, history, d, metric, t)))
                .collect(),
        })
        .collect()
}

/// Per-metric chart sequences for the current selection.
#[derive(Debug, Clone, Default)]
pub struct ChartStore {
    al: Alignment,
    series: BTreeMap<MetricKey, VecDeque<ChartRow>>,
}

impl ChartStore {
    pub fn new(al: Alignment) -> Self {
        Self {
            al,
            series: BTreeMap::new(),
        }
    }

    pub fn alignment(&self) -> &Alignment {
        &self.al
    }

    pub fn rows(&self, metric: MetricKey) -> Option<&VecDeque<ChartRow>> {
        self.series.get(&metric)
    }

    fn has_focus(sel: &Selection) -> bool {
        !sel.devices().is_empty() && !sel.metrics().is_empty()
    }

    pub fn on_snapshot(&mut self, snap: &Snapshot, history: &HistoryStore, sel: &Selection) {
        if !Self::has_focus(sel) {
            return;
        }
        for &metric in sel.metrics() {
            let row = incremental_row(&self.al, snap, history, sel.devices(), metric);
            let rows = self.series.entry(metric).or_default();
            apply_row(&self.al, rows, row);
        }
    }

    pub fn rebuild(&mut self, history: &HistoryStore, sel: &Selection) {
        self.series.clear();
        if !Self::has_focus(sel) {
            return;
        }
        for &metric in sel.metrics() {
            self.series
                .insert(metric, rebuild(&self.al, history, sel.devices(), metric));
        }
    }

    pub fn reset(&mut self) {
        self.series.clear();
    }
}
