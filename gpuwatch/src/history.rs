//! Small utilities to manage bounded history buffers for charts.

use std::collections::{BTreeMap, VecDeque};

use crate::types::{HistoryEntry, Snapshot};

pub const DEFAULT_HISTORY_LEN: usize = 60;

/// Append at the tail, then evict from the head until `dq` is back at `cap`.
pub fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    dq.push_back(v);
    while dq.len() > cap {
        dq.pop_front();
    }
}

// Keeps a history deque per device index with a fixed capacity
#[derive(Debug, Clone)]
pub struct HistoryStore {
    devices: BTreeMap<u32, VecDeque<HistoryEntry>>,
    cap: usize,
}

impl HistoryStore {
    pub fn new(cap: usize) -> Self {
        Self {
            devices: BTreeMap::new(),
            cap,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    // Devices absent from the snapshot keep their history as-is
    pub fn ingest(&mut self, snap: &Snapshot) {
        let cap = self.cap;
        for sample in &snap.gpus {
            let dq = self
                .devices
                .entry(sample.gpu_index)
                .or_insert_with(|| VecDeque::with_capacity(cap));
            push_capped(
                dq,
                HistoryEntry {
                    timestamp: snap.timestamp,
                    sample: sample.clone(),
                },
                cap,
            );
        }
    }

    pub fn device(&self, index: u32) -> Option<&VecDeque<HistoryEntry>> {
        self.devices.get(&index)
    }

    pub fn device_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.devices.keys().copied()
    }

    /// Newest timestamp across all devices.
    pub fn latest_timestamp(&self) -> Option<f64> {
        self.devices
            .values()
            .filter_map(|d| d.back().map(|e| e.timestamp))
            .reduce(f64::max)
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn reset(&mut self) {
        self.devices.clear();
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceSample;

    fn snap(t: f64, idx: &[u32]) -> Snapshot {
        Snapshot {
            timestamp: t,
            gpus: idx
                .iter()
                .map(|&i| DeviceSample {
                    gpu_index: i,
                    gpu_util: Some(t),
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn push_capped_evicts_fifo() {
        let mut dq = VecDeque::new();
        for i in 0..5 {
            push_capped(&mut dq, i, 3);
        }
        assert_eq!(dq, VecDeque::from(vec![2, 3, 4]));
    }

    #[test]
    fn history_is_bounded_and_ordered() {
        let mut h = HistoryStore::new(60);
        for i in 0..200 {
            h.ingest(&snap(i as f64 * 0.7, &[0, 1]));
        }
        for idx in [0, 1] {
            let d = h.device(idx).unwrap();
            assert_eq!(d.len(), 60);
            assert!(d
                .iter()
                .zip(d.iter().skip(1))
                .all(|(a, b)| a.timestamp <= b.timestamp));
            assert_eq!(d.back().unwrap().timestamp, 199.0 * 0.7);
        }
    }

    #[test]
    fn absent_devices_are_untouched() {
        let mut h = HistoryStore::new(10);
        h.ingest(&snap(1.0, &[0, 1]));
        h.ingest(&snap(2.0, &[0]));
        assert_eq!(h.device(0).unwrap().len(), 2);
        assert_eq!(h.device(1).unwrap().len(), 1);
        assert_eq!(h.device(1).unwrap()[0].timestamp, 1.0);
        assert_eq!(h.latest_timestamp(), Some(2.0));
    }

    #[test]
    fn reset_clears_everything() {
        let mut h = HistoryStore::new(10);
        h.ingest(&snap(1.0, &[0, 1, 2]));
        h.reset();
        assert!(h.is_empty());
        assert!(h.device(0).is_none());
        assert_eq!(h.latest_timestamp(), None);
    }
}
