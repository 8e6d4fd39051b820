mod feed_entry;
mod visitor;

pub use feed_entry::{
    EngagementDelta, FeedEntry, FeedState, ListVariant, NewFeedEntry, ObjectKind, ObjectRef,
};
pub use visitor::VisitorIdentity;
