use crate::domain::{FeedEntry, FeedState, ListVariant, ObjectRef};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable store for feed entries and per-kind view counters.
///
/// Every method is a single independent write or read; the store never
/// provides cross-entry atomicity and callers must not rely on it.
#[async_trait]
pub trait FeedStore: Send + Sync {
    async fn insert_entry(&self, entry: &FeedEntry) -> Result<()>;

    async fn get_entry(&self, object: ObjectRef) -> Result<Option<FeedEntry>>;

    /// One page of the given variant, online entries only. `Default` and
    /// `Recommended` exclude pinned entries; `Pinned` returns only them.
    async fn list_page(
        &self,
        variant: ListVariant,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<FeedEntry>>;

    async fn count_online(&self) -> Result<i64>;

    /// Recalibration batch: online, unpinned, `score > 0`, stable id order.
    async fn list_ranked(&self, offset: i64, limit: i64) -> Result<Vec<FeedEntry>>;

    /// Entries pinned earlier than `cutoff`, for pin expiry.
    async fn list_pinned_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<ObjectRef>>;

    /// Add `delta` to the kind's durable view counter and, when a feed
    /// entry exists, mark it engaged at `at`.
    async fn incr_object_views(
        &self,
        object: ObjectRef,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Current durable view count for the object (0 when never viewed).
    async fn object_views(&self, object: ObjectRef) -> Result<i64>;

    /// Reply bookkeeping: bumps `comment_count`, `last_reply_*` and
    /// `updated_at`.
    async fn apply_comment(
        &self,
        object: ObjectRef,
        commenter_uid: i64,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Like bookkeeping: bumps `like_count` and `last_engaged_at` only.
    async fn apply_like(&self, object: ObjectRef, delta: i64, at: DateTime<Utc>) -> Result<()>;

    /// Writes the ranking score without touching `updated_at`.
    async fn set_score(&self, object: ObjectRef, score: i64) -> Result<()>;

    async fn set_pinned(
        &self,
        object: ObjectRef,
        pinned: bool,
        at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn set_state(&self, object: ObjectRef, state: FeedState) -> Result<()>;

    /// Moves the entry to a new category; `state` flips it offline when the
    /// target category is not publicly visible.
    async fn set_category(
        &self,
        object: ObjectRef,
        category_id: i64,
        state: Option<FeedState>,
    ) -> Result<()>;
}
