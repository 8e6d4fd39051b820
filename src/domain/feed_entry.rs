use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content kinds eligible for view counting.
///
/// Every kind keeps its own denormalized view counter; dispatch is an
/// exhaustive `match`, so adding a kind is a compile error until each
/// counter path handles it. `Wiki` is view-counted but never published
/// to the feed.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Topic,
    Article,
    Resource,
    Project,
    Wiki,
    Book,
}

impl ObjectKind {
    /// Table holding the kind's durable view counter.
    pub fn stats_table(self) -> &'static str {
        match self {
            ObjectKind::Topic => "topic_stats",
            ObjectKind::Article => "article_stats",
            ObjectKind::Resource => "resource_stats",
            ObjectKind::Project => "project_stats",
            ObjectKind::Wiki => "wiki_stats",
            ObjectKind::Book => "book_stats",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Topic => "topic",
            ObjectKind::Article => "article",
            ObjectKind::Resource => "resource",
            ObjectKind::Project => "project",
            ObjectKind::Wiki => "wiki",
            ObjectKind::Book => "book",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "topic" => Some(ObjectKind::Topic),
            "article" => Some(ObjectKind::Article),
            "resource" => Some(ObjectKind::Resource),
            "project" => Some(ObjectKind::Project),
            "wiki" => Some(ObjectKind::Wiki),
            "book" => Some(ObjectKind::Book),
            _ => None,
        }
    }
}

/// Feed identity: one entry per `(kind, id)`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub id: i64,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.id)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedState {
    Online,
    Offline,
}

/// Which ordering of the feed a page belongs to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ListVariant {
    /// Latest activity first (`updated_at desc`), pinned entries excluded.
    Default,
    /// Score order (`score desc, updated_at desc`), pinned entries excluded.
    Recommended,
    /// Pinned entries only, newest pin first.
    Pinned,
}

impl ListVariant {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(ListVariant::Default),
            "recommended" => Some(ListVariant::Recommended),
            "pinned" => Some(ListVariant::Pinned),
            _ => None,
        }
    }
}

/// One row of the unified feed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FeedEntry {
    pub object: ObjectRef,
    pub title: String,
    pub author_uid: i64,
    /// Captured at publish time; the engine never consults a user store.
    pub author_is_admin: bool,
    pub category_id: i64,
    pub tags: String,
    pub comment_count: i64,
    pub like_count: i64,
    pub last_reply_uid: Option<i64>,
    pub last_reply_at: Option<DateTime<Utc>>,
    pub pinned: bool,
    pub pinned_at: Option<DateTime<Utc>>,
    pub score: i64,
    pub state: FeedState,
    /// Moves on reply or edit. Score writes must not touch it.
    pub updated_at: DateTime<Utc>,
    /// Moves on view/like flushes; recalibration reads it as the most
    /// recent non-reply engagement signal.
    pub last_engaged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Publish event payload from the content layer.
#[derive(Deserialize, Clone, Debug)]
pub struct NewFeedEntry {
    pub object: ObjectRef,
    pub title: String,
    pub author_uid: i64,
    #[serde(default)]
    pub author_is_admin: bool,
    #[serde(default)]
    pub category_id: i64,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub comment_count: i64,
}

/// Coalesced engagement deltas for one entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngagementDelta {
    pub views: i64,
    pub comments: i64,
    pub likes: i64,
}

impl EngagementDelta {
    pub fn views(n: i64) -> Self {
        Self {
            views: n,
            ..Self::default()
        }
    }

    pub fn comments(n: i64) -> Self {
        Self {
            comments: n,
            ..Self::default()
        }
    }

    pub fn likes(n: i64) -> Self {
        Self {
            likes: n,
            ..Self::default()
        }
    }

    pub fn is_empty(self) -> bool {
        self.views == 0 && self.comments == 0 && self.likes == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_parse() {
        for kind in [
            ObjectKind::Topic,
            ObjectKind::Article,
            ObjectKind::Resource,
            ObjectKind::Project,
            ObjectKind::Wiki,
            ObjectKind::Book,
        ] {
            assert_eq!(ObjectKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ObjectKind::parse("comment"), None);
    }

    #[test]
    fn variant_parse_rejects_unknown_tab() {
        assert_eq!(ListVariant::parse("recommended"), Some(ListVariant::Recommended));
        assert_eq!(ListVariant::parse("hot"), None);
    }

    #[test]
    fn object_ref_display_is_kind_slash_id() {
        let obj = ObjectRef::new(ObjectKind::Topic, 42);
        assert_eq!(obj.to_string(), "topic/42");
    }

    #[test]
    fn empty_delta_is_empty() {
        assert!(EngagementDelta::default().is_empty());
        assert!(!EngagementDelta::views(1).is_empty());
    }
}
