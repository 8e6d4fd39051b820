use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::FeedRankError;
use crate::rank::ScoreWeights;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub http_bind: SocketAddr,
    pub store: StoreKind,
    /// Required for the postgres store; unused for `memory`.
    pub db_dsn: Option<String>,

    pub feed_window_days: i64,
    pub comment_weight: i64,
    pub like_weight: i64,
    pub view_weight: i64,
    pub admin_bonus: i64,
    pub score_floor: i64,

    pub flush_interval: Duration,
    pub sweep_interval: Duration,
    pub sweep_batch_size: i64,
    pub quiet_end_hour: u32,
    pub utc_offset_hours: i32,
    pub pin_ttl_hours: i64,

    pub cache_max_age: Duration,
    pub cache_max_pages: u32,
    pub page_size: i64,
    pub score_queue_capacity: usize,

    /// User-Agent fragments identifying crawlers whose views are dropped.
    pub spider_agents: Vec<String>,
}

impl Settings {
    /// Validates the settings and returns an error if invalid.
    pub fn validate(&self) -> Result<(), FeedRankError> {
        if self.store == StoreKind::Postgres && self.db_dsn.as_deref().unwrap_or("").is_empty() {
            return Err(FeedRankError::Config(
                "FEEDRANK_DB_DSN is required for the postgres store".into(),
            ));
        }
        if self.feed_window_days <= 0 {
            return Err(FeedRankError::Config(
                "FEED_WINDOW_DAYS must be positive".into(),
            ));
        }
        if self.page_size <= 0 {
            return Err(FeedRankError::Config("FEED_PAGE_SIZE must be positive".into()));
        }
        if self.sweep_batch_size <= 0 {
            return Err(FeedRankError::Config(
                "SWEEP_BATCH_SIZE must be positive".into(),
            ));
        }
        if self.quiet_end_hour > 23 {
            return Err(FeedRankError::Config(
                "SWEEP_QUIET_END_HOUR must be a clock hour (0-23)".into(),
            ));
        }
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(FeedRankError::Config(
                "SWEEP_UTC_OFFSET_HOURS must be a valid timezone offset".into(),
            ));
        }
        if self.pin_ttl_hours <= 0 {
            return Err(FeedRankError::Config("PIN_TTL_HOURS must be positive".into()));
        }
        Ok(())
    }

    pub fn weights(&self) -> ScoreWeights {
        ScoreWeights {
            window_days: self.feed_window_days,
            comment_weight: self.comment_weight,
            like_weight: self.like_weight,
            view_weight: self.view_weight,
            admin_bonus: self.admin_bonus,
            floor: self.score_floor,
        }
    }
}

pub fn get_configuration() -> Result<Settings, Box<dyn std::error::Error>> {
    let http_bind: SocketAddr = env::var("FEEDRANK_HTTP_BIND")
        .unwrap_or_else(|_| "0.0.0.0:9470".to_string())
        .parse()?;
    let store = match env::var("FEEDRANK_STORE")
        .unwrap_or_else(|_| "postgres".to_string())
        .as_str()
    {
        "postgres" => StoreKind::Postgres,
        "memory" => StoreKind::Memory,
        other => return Err(format!("unknown FEEDRANK_STORE: {other}").into()),
    };
    let db_dsn = env::var("FEEDRANK_DB_DSN").ok();

    let settings = Settings {
        http_bind,
        store,
        db_dsn,
        feed_window_days: parse_i64("FEED_WINDOW_DAYS", 3)?,
        comment_weight: parse_i64("FEED_COMMENT_WEIGHT", 80)?,
        like_weight: parse_i64("FEED_LIKE_WEIGHT", 60)?,
        view_weight: parse_i64("FEED_VIEW_WEIGHT", 5)?,
        admin_bonus: parse_i64("FEED_ADMIN_BONUS", 500)?,
        score_floor: parse_i64("FEED_SCORE_FLOOR", 20)?,
        flush_interval: Duration::from_secs(parse_u64("VIEW_FLUSH_INTERVAL_SECS", 60)?),
        sweep_interval: Duration::from_secs(parse_u64("SWEEP_INTERVAL_SECS", 3600)?),
        sweep_batch_size: parse_i64("SWEEP_BATCH_SIZE", 100)?,
        quiet_end_hour: parse_u64("SWEEP_QUIET_END_HOUR", 7)? as u32,
        utc_offset_hours: parse_i64("SWEEP_UTC_OFFSET_HOURS", 8)? as i32,
        pin_ttl_hours: parse_i64("PIN_TTL_HOURS", 24)?,
        cache_max_age: Duration::from_secs(parse_u64("CACHE_MAX_AGE_SECS", 600)?),
        cache_max_pages: parse_u64("CACHE_MAX_PAGES", 10)? as u32,
        page_size: parse_i64("FEED_PAGE_SIZE", 20)?,
        score_queue_capacity: parse_u64("SCORE_QUEUE_CAPACITY", 1024)? as usize,
        spider_agents: parse_csv(
            "SPIDER_AGENTS",
            "Googlebot,Baiduspider,bingbot,Sosospider,YandexBot",
        ),
    };

    // Validate settings before returning
    settings.validate()?;

    Ok(settings)
}

fn parse_i64(name: &str, default: i64) -> Result<i64, Box<dyn std::error::Error>> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<i64>()
            .map_err(|e| format!("invalid value for {name}: {e}").into()),
        Err(_) => Ok(default),
    }
}

fn parse_u64(name: &str, default: u64) -> Result<u64, Box<dyn std::error::Error>> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| format!("invalid value for {name}: {e}").into()),
        Err(_) => Ok(default),
    }
}

fn parse_csv(name: &str, default: &str) -> Vec<String> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        Settings {
            http_bind: "0.0.0.0:9470".parse().unwrap(),
            store: StoreKind::Memory,
            db_dsn: None,
            feed_window_days: 3,
            comment_weight: 80,
            like_weight: 60,
            view_weight: 5,
            admin_bonus: 500,
            score_floor: 20,
            flush_interval: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(3600),
            sweep_batch_size: 100,
            quiet_end_hour: 7,
            utc_offset_hours: 8,
            pin_ttl_hours: 24,
            cache_max_age: Duration::from_secs(600),
            cache_max_pages: 10,
            page_size: 20,
            score_queue_capacity: 1024,
            spider_agents: vec!["Googlebot".into()],
        }
    }

    #[test]
    fn test_validate_success() {
        assert!(valid_settings().validate().is_ok());
    }

    #[test]
    fn test_validate_postgres_requires_dsn() {
        let mut settings = valid_settings();
        settings.store = StoreKind::Postgres;
        settings.db_dsn = None;
        assert!(settings.validate().is_err());

        settings.db_dsn = Some("postgres://feedrank@localhost/feedrank".into());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_window_fails() {
        let mut settings = valid_settings();
        settings.feed_window_days = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_zero_page_size_fails() {
        let mut settings = valid_settings();
        settings.page_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_quiet_hour_out_of_range_fails() {
        let mut settings = valid_settings();
        settings.quiet_end_hour = 24;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_offset_out_of_range_fails() {
        let mut settings = valid_settings();
        settings.utc_offset_hours = 15;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_weights_mirror_settings() {
        let weights = valid_settings().weights();
        assert_eq!(weights.window_days, 3);
        assert_eq!(weights.comment_weight, 80);
        assert_eq!(weights.like_weight, 60);
        assert_eq!(weights.view_weight, 5);
        assert_eq!(weights.floor, 20);
    }

    #[test]
    fn test_parse_csv_trims_and_drops_empties() {
        let parsed = parse_csv("FEEDRANK_TEST_UNSET_CSV", "Googlebot, bingbot,,YandexBot ");
        assert_eq!(parsed, vec!["Googlebot", "bingbot", "YandexBot"]);
    }
}
