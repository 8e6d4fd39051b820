//! In-memory `FeedStore` used by tests and `FEEDRANK_STORE=memory` runs.
//!
//! Lock discipline mirrors the rest of the crate: plain `RwLock`s, never
//! held across an await point.

use crate::domain::{FeedEntry, FeedState, ListVariant, ObjectRef};
use crate::port::FeedStore;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct MemoryFeedStore {
    entries: RwLock<HashMap<ObjectRef, FeedEntry>>,
    views: RwLock<HashMap<ObjectRef, i64>>,
    /// When set, read paths fail; lets tests drive the degraded-read path.
    fail_reads: AtomicBool,
}

impl MemoryFeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_read_failure(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("injected read failure"));
        }
        Ok(())
    }

    fn with_entry(&self, object: ObjectRef, f: impl FnOnce(&mut FeedEntry)) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.get_mut(&object) {
            f(entry);
        }
        Ok(())
    }
}

#[async_trait]
impl FeedStore for MemoryFeedStore {
    async fn insert_entry(&self, entry: &FeedEntry) -> Result<()> {
        self.entries
            .write()
            .unwrap()
            .insert(entry.object, entry.clone());
        Ok(())
    }

    async fn get_entry(&self, object: ObjectRef) -> Result<Option<FeedEntry>> {
        self.check_reads()?;
        Ok(self.entries.read().unwrap().get(&object).cloned())
    }

    async fn list_page(
        &self,
        variant: ListVariant,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<FeedEntry>> {
        self.check_reads()?;
        let entries = self.entries.read().unwrap();
        let mut rows: Vec<FeedEntry> = entries
            .values()
            .filter(|e| e.state == FeedState::Online)
            .filter(|e| match variant {
                ListVariant::Default | ListVariant::Recommended => !e.pinned,
                ListVariant::Pinned => e.pinned,
            })
            .cloned()
            .collect();
        match variant {
            ListVariant::Default => rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
            ListVariant::Recommended => rows.sort_by(|a, b| {
                b.score
                    .cmp(&a.score)
                    .then(b.updated_at.cmp(&a.updated_at))
            }),
            ListVariant::Pinned => rows.sort_by(|a, b| b.pinned_at.cmp(&a.pinned_at)),
        }
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_online(&self) -> Result<i64> {
        self.check_reads()?;
        let entries = self.entries.read().unwrap();
        Ok(entries
            .values()
            .filter(|e| e.state == FeedState::Online)
            .count() as i64)
    }

    async fn list_ranked(&self, offset: i64, limit: i64) -> Result<Vec<FeedEntry>> {
        self.check_reads()?;
        let entries = self.entries.read().unwrap();
        let mut rows: Vec<FeedEntry> = entries
            .values()
            .filter(|e| e.state == FeedState::Online && !e.pinned && e.score > 0)
            .cloned()
            .collect();
        rows.sort_by_key(|e| (e.object.kind.as_str(), e.object.id));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_pinned_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<ObjectRef>> {
        let entries = self.entries.read().unwrap();
        Ok(entries
            .values()
            .filter(|e| e.pinned && e.pinned_at.is_some_and(|at| at < cutoff))
            .map(|e| e.object)
            .collect())
    }

    async fn incr_object_views(
        &self,
        object: ObjectRef,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        *self.views.write().unwrap().entry(object).or_insert(0) += delta;
        self.with_entry(object, |e| e.last_engaged_at = Some(at))
    }

    async fn object_views(&self, object: ObjectRef) -> Result<i64> {
        Ok(self.views.read().unwrap().get(&object).copied().unwrap_or(0))
    }

    async fn apply_comment(
        &self,
        object: ObjectRef,
        commenter_uid: i64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_entry(object, |e| {
            e.comment_count += 1;
            e.last_reply_uid = Some(commenter_uid);
            e.last_reply_at = Some(at);
            e.updated_at = at;
        })
    }

    async fn apply_like(&self, object: ObjectRef, delta: i64, at: DateTime<Utc>) -> Result<()> {
        self.with_entry(object, |e| {
            e.like_count += delta;
            e.last_engaged_at = Some(at);
        })
    }

    async fn set_score(&self, object: ObjectRef, score: i64) -> Result<()> {
        self.with_entry(object, |e| e.score = score)
    }

    async fn set_pinned(
        &self,
        object: ObjectRef,
        pinned: bool,
        at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.with_entry(object, |e| {
            e.pinned = pinned;
            e.pinned_at = at;
        })
    }

    async fn set_state(&self, object: ObjectRef, state: FeedState) -> Result<()> {
        self.with_entry(object, |e| e.state = state)
    }

    async fn set_category(
        &self,
        object: ObjectRef,
        category_id: i64,
        state: Option<FeedState>,
    ) -> Result<()> {
        self.with_entry(object, |e| {
            e.category_id = category_id;
            if let Some(state) = state {
                e.state = state;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ObjectKind;

    fn entry(id: i64, score: i64) -> FeedEntry {
        let now = Utc::now();
        FeedEntry {
            object: ObjectRef::new(ObjectKind::Topic, id),
            title: format!("topic {id}"),
            author_uid: 1,
            author_is_admin: false,
            category_id: 1,
            tags: String::new(),
            comment_count: 0,
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
        }
    }

    #[tokio::test]
    async fn recommended_orders_by_score() {
        let store = MemoryFeedStore::new();
        store.insert_entry(&entry(1, 10)).await.unwrap();
        store.insert_entry(&entry(2, 30)).await.unwrap();
        store.insert_entry(&entry(3, 20)).await.unwrap();

        let page = store
            .list_page(ListVariant::Recommended, 0, 10)
            .await
            .unwrap();
        let ids: Vec<i64> = page.iter().map(|e| e.object.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn offline_entries_never_listed() {
        let store = MemoryFeedStore::new();
        let mut dead = entry(1, 50);
        dead.state = FeedState::Offline;
        store.insert_entry(&dead).await.unwrap();
        store.insert_entry(&entry(2, 10)).await.unwrap();

        assert_eq!(store.count_online().await.unwrap(), 1);
        let page = store
            .list_page(ListVariant::Recommended, 0, 10)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].object.id, 2);
    }

    #[tokio::test]
    async fn ranked_listing_skips_pinned_and_zero_score() {
        let store = MemoryFeedStore::new();
        let mut pinned = entry(1, 100);
        pinned.pinned = true;
        pinned.pinned_at = Some(Utc::now());
        store.insert_entry(&pinned).await.unwrap();
        store.insert_entry(&entry(2, 0)).await.unwrap();
        store.insert_entry(&entry(3, 40)).await.unwrap();

        let ranked = store.list_ranked(0, 10).await.unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].object.id, 3);
    }

    #[tokio::test]
    async fn view_counters_accumulate_per_object() {
        let store = MemoryFeedStore::new();
        let obj = ObjectRef::new(ObjectKind::Wiki, 9);
        store.incr_object_views(obj, 3, Utc::now()).await.unwrap();
        store.incr_object_views(obj, 2, Utc::now()).await.unwrap();
        assert_eq!(store.object_views(obj).await.unwrap(), 5);
    }
}
