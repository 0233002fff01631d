//! Which devices and metrics the view is focused on.

use std::collections::BTreeSet;

use crate::metrics::MetricKey;

/// Devices are membership-only; metrics keep insertion order so the fallback
/// active metric is deterministic. `active` is `Some` exactly when `metrics`
/// is non-empty, and always names one of its elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    devices: BTreeSet<u32>,
    metrics: Vec<MetricKey>,
    active: Option<MetricKey>,
}

impl Selection {
    pub fn new(metrics: impl IntoIterator<Item = MetricKey>) -> Self {
        let mut s = Self {
            devices: BTreeSet::new(),
            metrics: Vec::new(),
            active: None,
        };
        s.set_metrics(metrics);
        s
    }

    pub fn devices(&self) -> &BTreeSet<u32> {
        &self.devices
    }

    pub fn metrics(&self) -> &[MetricKey] {
        &self.metrics
    }

    pub fn active_metric(&self) -> Option<MetricKey> {
        self.active
    }

    pub fn is_device_selected(&self, index: u32) -> bool {
        self.devices.contains(&index)
    }

    /// Returns whether the device is selected afterwards.
    pub fn toggle_device(&mut self, index: u32) -> bool {
        if !self.devices.remove(&index) {
            self.devices.insert(index);
            true
        } else {
            false
        }
    }

    /// Replace the metric set (duplicates collapse to their first occurrence).
    /// Returns whether anything changed.
    pub fn set_metrics(&mut self, metrics: impl IntoIterator<Item = MetricKey>) -> bool {
        let mut next: Vec<MetricKey> = Vec::new();
        for m in metrics {
            if !next.contains(&m) {
                next.push(m);
            }
        }
        let active = match self.active {
            Some(a) if next.contains(&a) => Some(a),
            _ => next.first().copied(),
        };
        let changed = next != self.metrics || active != self.active;
        self.metrics = next;
        self.active = active;
        changed
    }

    /// Only metrics already in the selected set can become active.
    pub fn set_active_metric(&mut self, key: MetricKey) -> bool {
        if self.metrics.contains(&key) && self.active != Some(key) {
            self.active = Some(key);
            true
        } else {
            false
        }
    }

    /// Clears device focus; configured metrics survive.
    pub fn reset(&mut self) {
        self.devices.clear();
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::new([MetricKey::GpuUtil, MetricKey::MemUtil, MetricKey::Temperature])
    }
}
