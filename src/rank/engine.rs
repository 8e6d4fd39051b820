//! Score engine: live incremental updates, the periodic decay sweep, and
//! pin/category overrides.

use crate::cache::PageCache;
use crate::domain::{EngagementDelta, FeedState, ObjectRef};
use crate::error::FeedRankError;
use crate::port::FeedStore;
use crate::rank::score::{self, ScoreWeights};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Entries younger than this are never decayed, even when the recency
/// window is shorter.
const SAME_DAY_GRACE_HOURS: i64 = 24;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub scanned: usize,
    pub decayed: usize,
}

pub struct ScoreEngine {
    store: Arc<dyn FeedStore>,
    cache: Arc<PageCache>,
    weights: ScoreWeights,
    sweep_batch_size: i64,
    pin_ttl_hours: i64,
    /// Serializes every ranking mutation: queue-fed updates and sweep
    /// batches take turns instead of interleaving.
    rank_lock: Mutex<()>,
}

impl ScoreEngine {
    pub fn new(
        store: Arc<dyn FeedStore>,
        cache: Arc<PageCache>,
        weights: ScoreWeights,
        sweep_batch_size: i64,
        pin_ttl_hours: i64,
    ) -> Self {
        Self {
            store,
            cache,
            weights,
            sweep_batch_size,
            pin_ttl_hours,
            rank_lock: Mutex::new(()),
        }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    fn age_hours(&self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>, admin: bool, now: DateTime<Utc>) -> i64 {
        // Admin authors age from their last edit, so periodic edits keep
        // their entries inside the recency window.
        let anchor = if admin { updated_at } else { created_at };
        (now - anchor).num_hours()
    }

    /// Apply coalesced engagement deltas to one entry's score.
    ///
    /// No-ops: unknown objects (wikis never publish to the feed), offline
    /// entries, and entries past the recency window, which only the sweep
    /// touches.
    pub async fn apply_engagement(
        &self,
        object: ObjectRef,
        delta: EngagementDelta,
    ) -> Result<(), FeedRankError> {
        if delta.is_empty() {
            return Ok(());
        }
        let _guard = self.rank_lock.lock().await;
        let Some(entry) = self.store.get_entry(object).await? else {
            debug!(%object, "no feed entry for engagement event");
            return Ok(());
        };
        if entry.state == FeedState::Offline {
            return Ok(());
        }

        let now = Utc::now();
        let age = self.age_hours(entry.created_at, entry.updated_at, entry.author_is_admin, now);
        if age >= self.weights.window_hours() {
            return Ok(());
        }

        let next = if entry.score == 0 {
            score::seed_score(&self.weights, age, entry.comment_count, delta)
        } else {
            score::bump(&self.weights, entry.score, delta)
        };
        self.store.set_score(object, next).await?;
        self.cache.invalidate(crate::domain::ListVariant::Recommended);
        Ok(())
    }

    /// Decay pass over every online, unpinned entry with a positive score.
    ///
    /// Batched by a stable key so no lock or transaction spans the whole
    /// set; each write is independent and idempotent. A failed batch read
    /// aborts the sweep (the next scheduled run retries); a failed entry
    /// write is logged and skipped.
    pub async fn run_recalibration(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<SweepStats, FeedRankError> {
        let mut stats = SweepStats::default();
        let mut offset = 0i64;

        loop {
            if shutdown.is_cancelled() {
                info!(scanned = stats.scanned, "recalibration interrupted by shutdown");
                break;
            }
            let batch = self.store.list_ranked(offset, self.sweep_batch_size).await?;
            if batch.is_empty() {
                break;
            }
            offset += batch.len() as i64;

            let _guard = self.rank_lock.lock().await;
            let now = Utc::now();
            for entry in batch {
                stats.scanned += 1;
                let age =
                    self.age_hours(entry.created_at, entry.updated_at, entry.author_is_admin, now);
                if age < SAME_DAY_GRACE_HOURS {
                    continue;
                }
                if age < self.weights.window_hours() {
                    // Still fresh: the incremental path owns it.
                    continue;
                }

                let hours_since_reply = (now - entry.updated_at).num_hours();
                let hours_since_engagement =
                    entry.last_engaged_at.map(|at| (now - at).num_hours());
                let next = score::decay(
                    &self.weights,
                    entry.score,
                    hours_since_reply,
                    hours_since_engagement,
                );
                if next == entry.score {
                    continue;
                }
                if let Err(e) = self.store.set_score(entry.object, next).await {
                    warn!(object = %entry.object, error = %e, "skipping entry after failed score write");
                    continue;
                }
                stats.decayed += 1;
            }
        }

        if stats.decayed > 0 {
            self.cache.invalidate(crate::domain::ListVariant::Recommended);
        }
        Ok(stats)
    }

    /// Unpin entries whose pin is older than the TTL.
    pub async fn expire_pins(&self) -> Result<usize, FeedRankError> {
        let cutoff = Utc::now() - Duration::hours(self.pin_ttl_hours);
        let expired = self.store.list_pinned_before(cutoff).await?;
        if expired.is_empty() {
            return Ok(0);
        }
        let mut unpinned = 0;
        for object in expired {
            match self.store.set_pinned(object, false, None).await {
                Ok(()) => {
                    info!(%object, "pin expired");
                    unpinned += 1;
                }
                Err(e) => warn!(%object, error = %e, "failed to expire pin"),
            }
        }
        if unpinned > 0 {
            self.cache.invalidate_all();
        }
        Ok(unpinned)
    }

    /// Pin or unpin an entry. The caller authenticates the actor; this
    /// checks ownership: only the entry's author or an admin may pin.
    pub async fn set_pinned(
        &self,
        object: ObjectRef,
        pinned: bool,
        acting_uid: i64,
        acting_is_admin: bool,
    ) -> Result<(), FeedRankError> {
        let Some(entry) = self.store.get_entry(object).await? else {
            return Err(FeedRankError::NotFound(object));
        };
        if entry.state == FeedState::Offline {
            return Err(FeedRankError::NotFound(object));
        }
        if !acting_is_admin && entry.author_uid != acting_uid {
            return Err(FeedRankError::Forbidden { acting_uid, object });
        }

        let at = pinned.then(Utc::now);
        self.store.set_pinned(object, pinned, at).await?;
        self.cache.invalidate_all();
        Ok(())
    }

    /// Move an entry to a new category; an invisible target takes the
    /// entry offline without deleting the underlying content.
    pub async fn reassign_category(
        &self,
        object: ObjectRef,
        category_id: i64,
        visible: bool,
    ) -> Result<(), FeedRankError> {
        let state = (!visible).then_some(FeedState::Offline);
        self.store.set_category(object, category_id, state).await?;
        self.cache.invalidate_all();
        Ok(())
    }
}
