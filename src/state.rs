use std::sync::Arc;
use std::time::{Duration, Instant};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::rate_limit::RateLimiter;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub limits: RateLimits,
    pub started_at: Instant,
}

/// Process-wide rate limiter windows. One limiter for the whole API and a
/// stricter one for the auth endpoints.
#[derive(Clone)]
pub struct RateLimits {
    pub api: Arc<RateLimiter>,
    pub auth: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let window = Duration::from_secs(config.rate_limit.window_secs);
        let limits = RateLimits {
            api: Arc::new(RateLimiter::new(window, config.rate_limit.max_requests)),
            auth: Arc::new(RateLimiter::new(window, config.rate_limit.auth_max_requests)),
        };
        Self {
            db,
            config,
            limits,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}
