//! Background sampler: on every tick collects one snapshot and publishes its JSON,
//! so WS handlers just forward cached text. Idles while no client is connected.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, warn};

use crate::state::AppState;
use crate::types::Snapshot;

pub fn collect_snapshot(state: &AppState) -> Snapshot {
    let gpus = match state.source.lock() {
        Ok(mut src) => src.sample(),
        Err(e) => {
            warn!("gpu source lock poisoned: {e}");
            Vec::new()
        }
    };
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Snapshot { timestamp, gpus }
}

pub fn spawn_sampler(state: AppState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            if state.client_count.load(Ordering::Relaxed) == 0 {
                debug!("no clients, sampler idle");
                state.wake_sampler.notified().await;
                ticker.reset_immediately();
                continue;
            }
            ticker.tick().await;
            let snap = collect_snapshot(&state);
            match serde_json::to_string(&snap) {
                Ok(js) => {
                    state.snapshots.send_replace(Some(Arc::from(js)));
                }
                Err(e) => warn!("serializing snapshot failed: {e}"),
            }
        }
    })
}
