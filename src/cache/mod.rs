//! Ranked-page cache: precomputed feed pages, dropped (never patched) on
//! any ordering-relevant write.
//!
//! Pages also expire after a maximum age regardless of invalidation, so a
//! missed invalidation signal bounds staleness instead of lasting forever.
//! The expired copy is kept until the next successful rebuild: the service
//! serves it as a degraded response when the store is down.

use crate::domain::{FeedEntry, ListVariant};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct CachedPage {
    items: Vec<FeedEntry>,
    total: i64,
    built_at: Instant,
}

pub struct PageCache {
    pages: RwLock<HashMap<(u32, ListVariant), CachedPage>>,
    max_age: Duration,
    max_pages: u32,
}

impl PageCache {
    pub fn new(max_age: Duration, max_pages: u32) -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            max_age,
            max_pages,
        }
    }

    /// Fresh lookup: a page older than `max_age` is a miss.
    pub fn get(&self, page: u32, variant: ListVariant) -> Option<(Vec<FeedEntry>, i64)> {
        let pages = self.pages.read().unwrap();
        let cached = pages.get(&(page, variant))?;
        if cached.built_at.elapsed() > self.max_age {
            return None;
        }
        Some((cached.items.clone(), cached.total))
    }

    /// Lookup ignoring the age bound, for degraded reads.
    pub fn get_stale(&self, page: u32, variant: ListVariant) -> Option<(Vec<FeedEntry>, i64)> {
        let pages = self.pages.read().unwrap();
        let cached = pages.get(&(page, variant))?;
        Some((cached.items.clone(), cached.total))
    }

    /// Store a rebuilt page. Pages past `max_pages` are not cached; deep
    /// pagination is rare enough to read through.
    pub fn insert(&self, page: u32, variant: ListVariant, items: Vec<FeedEntry>, total: i64) {
        if page == 0 || page > self.max_pages {
            return;
        }
        self.pages.write().unwrap().insert(
            (page, variant),
            CachedPage {
                items,
                total,
                built_at: Instant::now(),
            },
        );
    }

    /// Drop every page of one variant.
    pub fn invalidate(&self, variant: ListVariant) {
        self.pages
            .write()
            .unwrap()
            .retain(|(_, v), _| *v != variant);
    }

    pub fn invalidate_lists(&self) {
        self.invalidate(ListVariant::Default);
        self.invalidate(ListVariant::Recommended);
    }

    pub fn invalidate_all(&self) {
        self.pages.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max_age: Duration) -> PageCache {
        PageCache::new(max_age, 10)
    }

    #[test]
    fn miss_then_hit() {
        let cache = cache(Duration::from_secs(60));
        assert!(cache.get(1, ListVariant::Default).is_none());
        cache.insert(1, ListVariant::Default, vec![], 0);
        assert!(cache.get(1, ListVariant::Default).is_some());
    }

    #[test]
    fn variants_are_cached_independently() {
        let cache = cache(Duration::from_secs(60));
        cache.insert(1, ListVariant::Default, vec![], 3);
        assert!(cache.get(1, ListVariant::Recommended).is_none());

        cache.insert(1, ListVariant::Recommended, vec![], 3);
        cache.invalidate(ListVariant::Default);
        assert!(cache.get(1, ListVariant::Default).is_none());
        assert!(cache.get(1, ListVariant::Recommended).is_some());
    }

    #[test]
    fn pages_past_the_cap_are_not_stored() {
        let cache = cache(Duration::from_secs(60));
        cache.insert(11, ListVariant::Default, vec![], 0);
        assert!(cache.get_stale(11, ListVariant::Default).is_none());
    }

    #[test]
    fn aged_out_page_is_a_miss_but_still_readable_stale() {
        let cache = cache(Duration::ZERO);
        cache.insert(1, ListVariant::Recommended, vec![], 7);
        assert!(cache.get(1, ListVariant::Recommended).is_none());
        let (items, total) = cache.get_stale(1, ListVariant::Recommended).unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 7);
    }

    #[test]
    fn invalidate_all_clears_everything() {
        let cache = cache(Duration::from_secs(60));
        cache.insert(1, ListVariant::Default, vec![], 0);
        cache.insert(2, ListVariant::Pinned, vec![], 0);
        cache.invalidate_all();
        assert!(cache.get_stale(1, ListVariant::Default).is_none());
        assert!(cache.get_stale(2, ListVariant::Pinned).is_none());
    }
}
