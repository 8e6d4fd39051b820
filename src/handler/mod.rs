pub mod events;
pub mod feed;
pub mod health;
pub mod pin;
pub mod view;

use crate::feed::FeedService;
use std::sync::Arc;

/// State shared by every handler.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<FeedService>,
    pub spider_agents: Arc<[String]>,
}
