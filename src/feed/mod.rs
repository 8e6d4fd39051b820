//! Feed service: the one surface the HTTP layer talks to.
//!
//! Write-side policy: events from the content layer must never fail the
//! user action that produced them, so everything here either swallows and
//! logs ranking errors or is infallible by construction. Only pin/unpin
//! surface errors synchronously.

use crate::cache::PageCache;
use crate::counter::ViewCounter;
use crate::domain::{
    EngagementDelta, FeedEntry, FeedState, ListVariant, NewFeedEntry, ObjectRef, VisitorIdentity,
};
use crate::error::FeedRankError;
use crate::port::FeedStore;
use crate::rank::queue::ScoreSender;
use crate::rank::{ScoreEngine, score};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

pub struct FeedPage {
    pub items: Vec<FeedEntry>,
    pub total: i64,
    /// Set when the page came from an expired cache entry because the
    /// store was unavailable.
    pub degraded: bool,
}

pub struct FeedService {
    store: Arc<dyn FeedStore>,
    cache: Arc<PageCache>,
    counter: Arc<ViewCounter>,
    engine: Arc<ScoreEngine>,
    scores: ScoreSender,
    page_size: i64,
}

impl FeedService {
    pub fn new(
        store: Arc<dyn FeedStore>,
        cache: Arc<PageCache>,
        counter: Arc<ViewCounter>,
        engine: Arc<ScoreEngine>,
        scores: ScoreSender,
        page_size: i64,
    ) -> Self {
        Self {
            store,
            cache,
            counter,
            engine,
            scores,
            page_size,
        }
    }

    /// Create the feed entry for newly published content. The initial
    /// score is the recency head start, plus the admin bonus so that
    /// administrator announcements surface immediately.
    pub async fn publish(&self, new: NewFeedEntry) -> Result<(), FeedRankError> {
        let now = Utc::now();
        let score = score::initial_score(self.engine.weights(), 0, new.author_is_admin);
        let entry = FeedEntry {
            object: new.object,
            title: new.title,
            author_uid: new.author_uid,
            author_is_admin: new.author_is_admin,
            category_id: new.category_id,
            tags: new.tags,
            comment_count: new.comment_count,
            like_count: 0,
            last_reply_uid: None,
            last_reply_at: None,
            pinned: false,
            pinned_at: None,
            score,
            state: FeedState::Online,
            updated_at: now,
            last_engaged_at: None,
            created_at: now,
        };
        self.store.insert_entry(&entry).await?;
        self.cache.invalidate_lists();
        info!(object = %entry.object, score, "feed entry published");
        Ok(())
    }

    /// A comment landed on the object. The denormalized row update runs
    /// inline; the score bump goes through the queue.
    pub async fn comment_added(&self, object: ObjectRef, commenter_uid: i64, at: Option<DateTime<Utc>>) {
        let at = at.unwrap_or_else(Utc::now);
        if let Err(e) = self.store.apply_comment(object, commenter_uid, at).await {
            warn!(%object, error = %e, "failed to record comment on feed entry");
        }
        self.scores.submit(object, EngagementDelta::comments(1));
        self.cache.invalidate_lists();
    }

    /// A like was added (`+1`) or withdrawn (`-1`).
    pub async fn like_changed(&self, object: ObjectRef, delta: i64) {
        if let Err(e) = self.store.apply_like(object, delta, Utc::now()).await {
            warn!(%object, error = %e, "failed to record like on feed entry");
        }
        self.scores.submit(object, EngagementDelta::likes(delta));
        self.cache.invalidate_lists();
    }

    pub async fn category_reassigned(
        &self,
        object: ObjectRef,
        category_id: i64,
        visible: bool,
    ) -> Result<(), FeedRankError> {
        self.engine
            .reassign_category(object, category_id, visible)
            .await
    }

    /// Soft delete: the entry leaves every feed but is never removed.
    pub async fn take_offline(&self, object: ObjectRef) -> Result<(), FeedRankError> {
        self.store.set_state(object, FeedState::Offline).await?;
        self.cache.invalidate_all();
        Ok(())
    }

    /// One page of the feed, cache-first. When the store fails on a miss
    /// an expired cache copy is served as a degraded response.
    pub async fn feed_page(
        &self,
        page: u32,
        variant: ListVariant,
    ) -> Result<FeedPage, FeedRankError> {
        let page = page.max(1);
        if let Some((items, total)) = self.cache.get(page, variant) {
            return Ok(FeedPage {
                items,
                total,
                degraded: false,
            });
        }

        let offset = i64::from(page - 1) * self.page_size;
        let built: anyhow::Result<(Vec<FeedEntry>, i64)> = async {
            let items = self.store.list_page(variant, offset, self.page_size).await?;
            let total = self.store.count_online().await?;
            Ok((items, total))
        }
        .await;

        match built {
            Ok((items, total)) => {
                self.cache.insert(page, variant, items.clone(), total);
                Ok(FeedPage {
                    items,
                    total,
                    degraded: false,
                })
            }
            Err(e) => match self.cache.get_stale(page, variant) {
                Some((items, total)) => {
                    warn!(page, ?variant, error = %e, "serving stale feed page after store failure");
                    Ok(FeedPage {
                        items,
                        total,
                        degraded: true,
                    })
                }
                None => Err(e.into()),
            },
        }
    }

    /// Fire-and-forget view. Touches only the in-memory counter.
    pub fn record_view(&self, object: ObjectRef, visitor: VisitorIdentity) {
        self.counter.record_view(object, visitor);
    }

    pub async fn pin(
        &self,
        object: ObjectRef,
        acting_uid: i64,
        acting_is_admin: bool,
    ) -> Result<(), FeedRankError> {
        self.engine
            .set_pinned(object, true, acting_uid, acting_is_admin)
            .await
    }

    pub async fn unpin(
        &self,
        object: ObjectRef,
        acting_uid: i64,
        acting_is_admin: bool,
    ) -> Result<(), FeedRankError> {
        self.engine
            .set_pinned(object, false, acting_uid, acting_is_admin)
            .await
    }
}
