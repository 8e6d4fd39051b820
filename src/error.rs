use crate::domain::ObjectRef;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedRankError {
    #[error("Failed to load configuration: {0}")]
    Config(String),

    #[error("Failed to bind to address {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("No online feed entry for {0}")]
    NotFound(ObjectRef),

    #[error("uid {acting_uid} may not modify {object}")]
    Forbidden { acting_uid: i64, object: ObjectRef },
}
