//! Recalibration sweep and pin-expiry properties.

use chrono::{Duration as ChronoDuration, Utc};
use feedrank::adapter::memory::MemoryFeedStore;
use feedrank::cache::PageCache;
use feedrank::domain::{FeedEntry, FeedState, ListVariant, ObjectKind, ObjectRef};
use feedrank::port::FeedStore;
use feedrank::rank::sweep::{MaintenanceDaemon, QuietHours};
use feedrank::rank::{ScoreEngine, ScoreWeights};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct Harness {
    store: Arc<MemoryFeedStore>,
    cache: Arc<PageCache>,
    engine: Arc<ScoreEngine>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryFeedStore::new());
    let store_dyn: Arc<dyn FeedStore> = store.clone();
    let cache = Arc::new(PageCache::new(Duration::from_secs(600), 10));
    let engine = Arc::new(ScoreEngine::new(
        store_dyn,
        cache.clone(),
        ScoreWeights::default(),
        100,
        24,
    ));
    Harness {
        store,
        cache,
        engine,
    }
}

fn topic(id: i64) -> ObjectRef {
    ObjectRef::new(ObjectKind::Topic, id)
}

struct EntryFixture {
    id: i64,
    score: i64,
    age_hours: i64,
    replied_hours_ago: i64,
    engaged_hours_ago: Option<i64>,
}

fn entry(fx: EntryFixture) -> FeedEntry {
    let now = Utc::now();
    let created = now - ChronoDuration::hours(fx.age_hours);
    FeedEntry {
        object: topic(fx.id),
        title: format!("topic {}", fx.id),
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
        score: fx.score,
        state: FeedState::Online,
        updated_at: now - ChronoDuration::hours(fx.replied_hours_ago),
        last_engaged_at: fx
            .engaged_hours_ago
            .map(|h| now - ChronoDuration::hours(h)),
        created_at: created,
    }
}

async fn insert(store: &MemoryFeedStore, e: &FeedEntry) {
    store.insert_entry(e).await.unwrap();
}

async fn score_of(store: &MemoryFeedStore, id: i64) -> i64 {
    store.get_entry(topic(id)).await.unwrap().unwrap().score
}

#[tokio::test]
async fn quiet_stale_entry_is_halved() {
    let h = harness();
    insert(
        &h.store,
        &entry(EntryFixture {
            id: 1,
            score: 100,
            age_hours: 5 * 24,
            replied_hours_ago: 3,
            engaged_hours_ago: Some(3),
        }),
    )
    .await;

    let stats = h
        .engine
        .run_recalibration(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.decayed, 1);
    assert_eq!(score_of(&h.store, 1).await, 50);
}

#[tokio::test]
async fn decay_is_strict_but_floored() {
    let h = harness();
    insert(
        &h.store,
        &entry(EntryFixture {
            id: 1,
            score: 30,
            age_hours: 5 * 24,
            replied_hours_ago: 48,
            engaged_hours_ago: None,
        }),
    )
    .await;

    h.engine
        .run_recalibration(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(score_of(&h.store, 1).await, 20);

    // Already at the floor: the next sweep leaves it alone.
    let stats = h
        .engine
        .run_recalibration(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.decayed, 0);
    assert_eq!(score_of(&h.store, 1).await, 20);
}

#[tokio::test]
async fn recently_replied_entry_takes_the_small_penalty() {
    let h = harness();
    insert(
        &h.store,
        &entry(EntryFixture {
            id: 1,
            score: 100,
            age_hours: 5 * 24,
            replied_hours_ago: 0,
            engaged_hours_ago: None,
        }),
    )
    .await;

    h.engine
        .run_recalibration(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(score_of(&h.store, 1).await, 92);
}

#[tokio::test]
async fn recently_engaged_entry_takes_the_larger_step() {
    let h = harness();
    insert(
        &h.store,
        &entry(EntryFixture {
            id: 1,
            score: 100,
            age_hours: 5 * 24,
            replied_hours_ago: 5,
            engaged_hours_ago: Some(0),
        }),
    )
    .await;

    h.engine
        .run_recalibration(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(score_of(&h.store, 1).await, 50);
}

#[tokio::test]
async fn fresh_and_same_day_entries_are_untouched() {
    let h = harness();
    // Inside the recency window (3 days) but past the same-day grace.
    insert(
        &h.store,
        &entry(EntryFixture {
            id: 1,
            score: 100,
            age_hours: 2 * 24,
            replied_hours_ago: 10,
            engaged_hours_ago: None,
        }),
    )
    .await;
    // Published this morning.
    insert(
        &h.store,
        &entry(EntryFixture {
            id: 2,
            score: 500,
            age_hours: 10,
            replied_hours_ago: 10,
            engaged_hours_ago: None,
        }),
    )
    .await;

    let stats = h
        .engine
        .run_recalibration(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.scanned, 2);
    assert_eq!(stats.decayed, 0);
    assert_eq!(score_of(&h.store, 1).await, 100);
    assert_eq!(score_of(&h.store, 2).await, 500);
}

#[tokio::test]
async fn pinned_entries_are_never_mutated() {
    let h = harness();
    let mut pinned = entry(EntryFixture {
        id: 1,
        score: 100,
        age_hours: 10 * 24,
        replied_hours_ago: 48,
        engaged_hours_ago: None,
    });
    pinned.pinned = true;
    pinned.pinned_at = Some(Utc::now());
    insert(&h.store, &pinned).await;

    let stats = h
        .engine
        .run_recalibration(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.scanned, 0);
    assert_eq!(score_of(&h.store, 1).await, 100);
}

#[tokio::test]
async fn offline_entries_are_never_mutated() {
    let h = harness();
    let mut offline = entry(EntryFixture {
        id: 1,
        score: 100,
        age_hours: 10 * 24,
        replied_hours_ago: 48,
        engaged_hours_ago: None,
    });
    offline.state = FeedState::Offline;
    insert(&h.store, &offline).await;

    let stats = h
        .engine
        .run_recalibration(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.scanned, 0);
    assert_eq!(score_of(&h.store, 1).await, 100);
}

#[tokio::test]
async fn sweep_walks_every_batch() {
    let h = harness();
    for id in 0..250 {
        insert(
            &h.store,
            &entry(EntryFixture {
                id,
                score: 100,
                age_hours: 5 * 24,
                replied_hours_ago: 48,
                engaged_hours_ago: None,
            }),
        )
        .await;
    }

    let stats = h
        .engine
        .run_recalibration(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.scanned, 250);
    assert_eq!(stats.decayed, 250);
    assert_eq!(score_of(&h.store, 123).await, 50);
}

#[tokio::test]
async fn cancelled_sweep_stops_between_batches() {
    let h = harness();
    insert(
        &h.store,
        &entry(EntryFixture {
            id: 1,
            score: 100,
            age_hours: 5 * 24,
            replied_hours_ago: 48,
            engaged_hours_ago: None,
        }),
    )
    .await;

    let token = CancellationToken::new();
    token.cancel();
    let stats = h.engine.run_recalibration(&token).await.unwrap();
    assert_eq!(stats.scanned, 0);
    assert_eq!(score_of(&h.store, 1).await, 100);
}

#[tokio::test]
async fn sweep_invalidates_the_recommended_pages() {
    let h = harness();
    insert(
        &h.store,
        &entry(EntryFixture {
            id: 1,
            score: 100,
            age_hours: 5 * 24,
            replied_hours_ago: 48,
            engaged_hours_ago: None,
        }),
    )
    .await;
    h.cache.insert(1, ListVariant::Recommended, vec![], 1);
    h.cache.insert(1, ListVariant::Default, vec![], 1);

    h.engine
        .run_recalibration(&CancellationToken::new())
        .await
        .unwrap();

    assert!(h.cache.get(1, ListVariant::Recommended).is_none());
    // Score changes do not reorder the activity list.
    assert!(h.cache.get(1, ListVariant::Default).is_some());
}

#[tokio::test]
async fn pins_expire_after_the_ttl() {
    let h = harness();
    let now = Utc::now();

    let mut old = entry(EntryFixture {
        id: 1,
        score: 100,
        age_hours: 5 * 24,
        replied_hours_ago: 48,
        engaged_hours_ago: None,
    });
    old.pinned = true;
    old.pinned_at = Some(now - ChronoDuration::hours(25));
    insert(&h.store, &old).await;

    let mut recent = entry(EntryFixture {
        id: 2,
        score: 100,
        age_hours: 5 * 24,
        replied_hours_ago: 48,
        engaged_hours_ago: None,
    });
    recent.pinned = true;
    recent.pinned_at = Some(now - ChronoDuration::hours(1));
    insert(&h.store, &recent).await;

    let expired = h.engine.expire_pins().await.unwrap();
    assert_eq!(expired, 1);
    assert!(!h.store.get_entry(topic(1)).await.unwrap().unwrap().pinned);
    assert!(h.store.get_entry(topic(2)).await.unwrap().unwrap().pinned);
}

#[tokio::test]
async fn quiet_hours_skip_the_whole_run() {
    let h = harness();
    insert(
        &h.store,
        &entry(EntryFixture {
            id: 1,
            score: 100,
            age_hours: 5 * 24,
            replied_hours_ago: 48,
            engaged_hours_ago: None,
        }),
    )
    .await;

    // end_hour 24 makes every hour quiet, so the run is always skipped.
    let daemon = MaintenanceDaemon::new(
        h.engine.clone(),
        QuietHours::new(0, 24),
        Duration::from_secs(3600),
    );
    daemon.run_once(&CancellationToken::new()).await;
    assert_eq!(score_of(&h.store, 1).await, 100);

    // Outside quiet hours the same run decays the entry.
    let daemon = MaintenanceDaemon::new(
        h.engine.clone(),
        QuietHours::new(0, 0),
        Duration::from_secs(3600),
    );
    daemon.run_once(&CancellationToken::new()).await;
    assert_eq!(score_of(&h.store, 1).await, 50);
}

/// Admin-authored entries age from their last edit, so a fresh edit keeps
/// a long-published entry out of the decay pass.
#[tokio::test]
async fn admin_entries_age_from_last_edit() {
    let h = harness();
    let mut admin = entry(EntryFixture {
        id: 1,
        score: 300,
        age_hours: 30 * 24,
        replied_hours_ago: 5,
        engaged_hours_ago: None,
    });
    admin.author_is_admin = true;
    insert(&h.store, &admin).await;

    let stats = h
        .engine
        .run_recalibration(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.scanned, 1);
    assert_eq!(stats.decayed, 0);
    assert_eq!(score_of(&h.store, 1).await, 300);
}
