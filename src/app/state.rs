use crate::adapter::memory::MemoryFeedStore;
use crate::adapter::postgres::PgFeedStore;
use crate::cache::PageCache;
use crate::config::{Settings, StoreKind};
use crate::counter::{Flusher, ViewCounter};
use crate::error::FeedRankError;
use crate::feed::FeedService;
use crate::handler::ApiState;
use crate::port::FeedStore;
use crate::rank::ScoreEngine;
use crate::rank::queue::spawn_score_worker;
use crate::rank::sweep::{MaintenanceDaemon, QuietHours};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Fully wired application: handler state plus the background task
/// handles, so shutdown can wait for the final flush and queue drain.
pub struct AppState {
    pub api: ApiState,
    pub background: Vec<JoinHandle<()>>,
}

impl AppState {
    /// Build the store, cache, counter, engine and service from settings,
    /// and spawn the three background tasks (score worker, view flush
    /// loop, maintenance daemon) under the shared shutdown token.
    pub async fn from_settings(
        settings: &Settings,
        shutdown_token: CancellationToken,
    ) -> Result<Self, FeedRankError> {
        let store: Arc<dyn FeedStore> = match settings.store {
            StoreKind::Postgres => {
                let dsn = settings.db_dsn.as_deref().unwrap_or_default();
                let pg = PgFeedStore::connect_lazy(dsn)?;
                if let Err(e) = pg.ensure_schema().await {
                    // Connections are lazy; the store keeps trying per
                    // request and reads degrade through the cache.
                    warn!(error = %e, "feed schema check failed at startup");
                }
                Arc::new(pg)
            }
            StoreKind::Memory => Arc::new(MemoryFeedStore::new()),
        };

        let cache = Arc::new(PageCache::new(
            settings.cache_max_age,
            settings.cache_max_pages,
        ));
        let engine = Arc::new(ScoreEngine::new(
            store.clone(),
            cache.clone(),
            settings.weights(),
            settings.sweep_batch_size,
            settings.pin_ttl_hours,
        ));

        let (scores, worker) = spawn_score_worker(
            engine.clone(),
            settings.score_queue_capacity,
            shutdown_token.clone(),
        );

        let counter = Arc::new(ViewCounter::new());
        let flusher = Flusher::new(counter.clone(), store.clone(), scores.clone())
            .spawn(settings.flush_interval, shutdown_token.clone());

        let daemon = MaintenanceDaemon::new(
            engine.clone(),
            QuietHours::new(settings.utc_offset_hours, settings.quiet_end_hour),
            settings.sweep_interval,
        )
        .spawn(shutdown_token);

        let service = Arc::new(FeedService::new(
            store,
            cache,
            counter,
            engine,
            scores,
            settings.page_size,
        ));

        Ok(Self {
            api: ApiState {
                service,
                spider_agents: settings.spider_agents.clone().into(),
            },
            background: vec![worker, flusher, daemon],
        })
    }
}
