//! Maintenance daemon: pin expiry followed by the recalibration sweep,
//! one run per interval, never concurrent with itself.

use crate::rank::engine::ScoreEngine;
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Low-traffic window during which the sweep is skipped, so early-morning
/// readers are not handed a freshly reshuffled feed.
#[derive(Debug, Clone, Copy)]
pub struct QuietHours {
    tz: FixedOffset,
    end_hour: u32,
}

impl QuietHours {
    /// `utc_offset_hours` must be a valid timezone offset and `end_hour`
    /// a clock hour; config validation enforces both.
    pub fn new(utc_offset_hours: i32, end_hour: u32) -> Self {
        let tz = FixedOffset::east_opt(utc_offset_hours * 3600).expect("valid utc offset");
        Self { tz, end_hour }
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        now.with_timezone(&self.tz).hour() < self.end_hour
    }
}

pub struct MaintenanceDaemon {
    engine: Arc<ScoreEngine>,
    quiet: QuietHours,
    interval: Duration,
}

impl MaintenanceDaemon {
    pub fn new(engine: Arc<ScoreEngine>, quiet: QuietHours, interval: Duration) -> Self {
        Self {
            engine,
            quiet,
            interval,
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                "maintenance daemon started"
            );
            let mut tick = tokio::time::interval(self.interval);
            // The immediate first tick would sweep at boot; wait a full
            // interval instead.
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = tick.tick() => self.run_once(&shutdown).await,
                    () = shutdown.cancelled() => break,
                }
            }
            info!("maintenance daemon stopped");
        })
    }

    pub async fn run_once(&self, shutdown: &CancellationToken) {
        if self.quiet.contains(Utc::now()) {
            info!("inside quiet hours, skipping maintenance run");
            return;
        }
        let run_id = Uuid::new_v4();
        match self.engine.expire_pins().await {
            Ok(0) => {}
            Ok(n) => info!(%run_id, unpinned = n, "expired pins"),
            Err(e) => warn!(%run_id, error = %e, "pin expiry failed"),
        }
        match self.engine.run_recalibration(shutdown).await {
            Ok(stats) => {
                info!(%run_id, scanned = stats.scanned, decayed = stats.decayed, "recalibration complete");
            }
            Err(e) => warn!(%run_id, error = %e, "recalibration aborted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::QuietHours;
    use chrono::{DateTime, Utc};

    fn parse_utc(ts: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(ts)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    #[test]
    fn early_morning_is_quiet() {
        let quiet = QuietHours::new(8, 7);
        // 22:30 UTC = 06:30 at +08:00.
        assert!(quiet.contains(parse_utc("2025-11-08T22:30:00Z")));
    }

    #[test]
    fn daytime_is_not_quiet() {
        let quiet = QuietHours::new(8, 7);
        // 04:00 UTC = 12:00 at +08:00.
        assert!(!quiet.contains(parse_utc("2025-11-08T04:00:00Z")));
    }

    #[test]
    fn boundary_hour_is_not_quiet() {
        let quiet = QuietHours::new(8, 7);
        // 23:00 UTC = 07:00 at +08:00, exactly the end of the window.
        assert!(!quiet.contains(parse_utc("2025-11-08T23:00:00Z")));
    }

    #[test]
    fn zero_end_hour_disables_the_window() {
        let quiet = QuietHours::new(0, 0);
        assert!(!quiet.contains(parse_utc("2025-11-08T00:30:00Z")));
    }
}
