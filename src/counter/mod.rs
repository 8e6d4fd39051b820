//! Engagement counter: absorbs page-view traffic in memory and flushes
//! aggregated deltas to the store on a fixed cadence.
//!
//! `record_view` touches nothing but the maps behind one mutex, so the hot
//! path never blocks on I/O. Each visitor counts at most once per object
//! per flush window; the window resets when the flush loop drains the maps.

use crate::domain::{EngagementDelta, ObjectRef, VisitorIdentity};
use crate::port::FeedStore;
use crate::rank::queue::ScoreSender;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Default)]
struct CounterState {
    pending: HashMap<ObjectRef, i64>,
    seen: HashSet<(ObjectRef, VisitorIdentity)>,
}

/// Process-local view buffer. Cheap to clone the handle, one instance per
/// service.
#[derive(Default)]
pub struct ViewCounter {
    state: Mutex<CounterState>,
}

impl ViewCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one view, unless this visitor already viewed the object in the
    /// current window. Infallible and O(1).
    pub fn record_view(&self, object: ObjectRef, visitor: VisitorIdentity) {
        let mut state = self.state.lock().unwrap();
        if state.seen.insert((object, visitor)) {
            *state.pending.entry(object).or_insert(0) += 1;
        }
    }

    /// Swap out and return the pending deltas, resetting the dedup window.
    pub fn drain(&self) -> HashMap<ObjectRef, i64> {
        let mut state = self.state.lock().unwrap();
        state.seen.clear();
        std::mem::take(&mut state.pending)
    }
}

/// Persists drained view deltas and feeds them to the score queue.
pub struct Flusher {
    counter: Arc<ViewCounter>,
    store: Arc<dyn FeedStore>,
    scores: ScoreSender,
}

impl Flusher {
    pub fn new(counter: Arc<ViewCounter>, store: Arc<dyn FeedStore>, scores: ScoreSender) -> Self {
        Self {
            counter,
            store,
            scores,
        }
    }

    /// Drain the counter and persist each object's delta. A failed persist
    /// is logged and dropped, never retried: views are lossy telemetry.
    pub async fn flush(&self) {
        let drained = self.counter.drain();
        if drained.is_empty() {
            return;
        }
        debug!(objects = drained.len(), "flushing view deltas");
        let now = Utc::now();
        for (object, delta) in drained {
            if delta <= 0 {
                continue;
            }
            match self.store.incr_object_views(object, delta, now).await {
                Ok(()) => self.scores.submit(object, EngagementDelta::views(delta)),
                Err(e) => {
                    warn!(%object, delta, error = %e, "dropping view delta after failed persist");
                }
            }
        }
    }

    /// Run `flush` every `interval` until `shutdown` fires, then flush once
    /// more. The loop is the sole caller, so flushes never overlap.
    pub fn spawn(self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            info!(interval_secs = interval.as_secs(), "view flush loop started");
            loop {
                tokio::select! {
                    _ = tick.tick() => self.flush().await,
                    () = shutdown.cancelled() => {
                        info!("view flush loop shutting down, draining pending deltas");
                        self.flush().await;
                        break;
                    }
                }
            }
            info!("view flush loop stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ObjectKind;

    fn topic(id: i64) -> ObjectRef {
        ObjectRef::new(ObjectKind::Topic, id)
    }

    #[test]
    fn repeat_views_from_one_visitor_count_once() {
        let counter = ViewCounter::new();
        for _ in 0..1000 {
            counter.record_view(topic(1), VisitorIdentity::User(42));
        }
        assert_eq!(counter.drain().get(&topic(1)), Some(&1));
    }

    #[test]
    fn distinct_visitors_each_count() {
        let counter = ViewCounter::new();
        for uid in 0..50 {
            counter.record_view(topic(1), VisitorIdentity::User(uid));
        }
        assert_eq!(counter.drain().get(&topic(1)), Some(&50));
    }

    #[test]
    fn dedup_is_per_object() {
        let counter = ViewCounter::new();
        counter.record_view(topic(1), VisitorIdentity::User(7));
        counter.record_view(topic(2), VisitorIdentity::User(7));
        let drained = counter.drain();
        assert_eq!(drained.get(&topic(1)), Some(&1));
        assert_eq!(drained.get(&topic(2)), Some(&1));
    }

    #[test]
    fn drain_resets_the_window() {
        let counter = ViewCounter::new();
        counter.record_view(topic(1), VisitorIdentity::User(7));
        assert_eq!(counter.drain().get(&topic(1)), Some(&1));

        // Same visitor counts again in the next window.
        counter.record_view(topic(1), VisitorIdentity::User(7));
        let drained = counter.drain();
        assert_eq!(drained.get(&topic(1)), Some(&1));
        assert!(counter.drain().is_empty());
    }

    #[test]
    fn concurrent_distinct_visitors_count_exactly() {
        let counter = Arc::new(ViewCounter::new());
        let handles: Vec<_> = (0..50)
            .map(|uid| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    counter.record_view(topic(9), VisitorIdentity::User(uid));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.drain().get(&topic(9)), Some(&50));
    }

    #[test]
    fn concurrent_same_visitor_counts_once() {
        let counter = Arc::new(ViewCounter::new());
        let handles: Vec<_> = (0..50)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    counter.record_view(topic(9), VisitorIdentity::User(1));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.drain().get(&topic(9)), Some(&1));
    }
}
