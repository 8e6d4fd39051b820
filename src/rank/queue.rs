//! Bounded score-update queue.
//!
//! Engagement events from the flush loop and the event endpoints are
//! applied by one worker task, which keeps score writes serialized and
//! makes dropped work an explicit, logged decision instead of a lost
//! fire-and-forget task. A full queue drops the event: ranking is
//! expendable relative to the action that produced the signal.

use crate::domain::{EngagementDelta, ObjectRef};
use crate::rank::engine::ScoreEngine;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct EngagementEvent {
    pub object: ObjectRef,
    pub delta: EngagementDelta,
}

#[derive(Clone)]
pub struct ScoreSender {
    tx: mpsc::Sender<EngagementEvent>,
}

impl ScoreSender {
    /// Enqueue without blocking; never fails visibly.
    pub fn submit(&self, object: ObjectRef, delta: EngagementDelta) {
        if delta.is_empty() {
            return;
        }
        match self.tx.try_send(EngagementEvent { object, delta }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(object = %event.object, "score queue full, dropping engagement event");
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(object = %event.object, "score queue closed, dropping engagement event");
            }
        }
    }
}

/// Spawn the worker and return the submission handle.
pub fn spawn_score_worker(
    engine: Arc<ScoreEngine>,
    capacity: usize,
    shutdown: CancellationToken,
) -> (ScoreSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<EngagementEvent>(capacity);
    let handle = tokio::spawn(async move {
        info!(capacity, "score update worker started");
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => apply(&engine, event).await,
                    None => break,
                },
                () = shutdown.cancelled() => {
                    info!("score update worker shutting down, draining queue");
                    while let Ok(event) = rx.try_recv() {
                        apply(&engine, event).await;
                    }
                    break;
                }
            }
        }
        info!("score update worker stopped");
    });
    (ScoreSender { tx }, handle)
}

async fn apply(engine: &ScoreEngine, event: EngagementEvent) {
    if let Err(e) = engine.apply_engagement(event.object, event.delta).await {
        warn!(object = %event.object, error = %e, "engagement score update failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ObjectKind;

    fn topic(id: i64) -> ObjectRef {
        ObjectRef::new(ObjectKind::Topic, id)
    }

    #[tokio::test]
    async fn empty_deltas_are_not_enqueued() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = ScoreSender { tx };
        sender.submit(topic(1), EngagementDelta::default());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = ScoreSender { tx };
        sender.submit(topic(1), EngagementDelta::views(1));
        // Queue is full now; this must return immediately and drop.
        sender.submit(topic(2), EngagementDelta::views(1));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.object, topic(1));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_queue_is_a_silent_no_op() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = ScoreSender { tx };
        sender.submit(topic(1), EngagementDelta::likes(1));
    }
}
