//! Fixed-window request counter keyed by client IP.
//!
//! The limiter lives in `AppState` for the lifetime of the process. Expired
//! windows are dropped by [`spawn_sweeper`], which `main` starts at boot and
//! aborts on shutdown.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::HeaderName;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::AppError;

/// Windows are kept this long past their reset before the sweeper drops them.
const SWEEP_GRACE: Duration = Duration::from_secs(60);

static LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
static RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Debug)]
struct Window {
    count: u32,
    reset_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_in: Duration,
}

impl Decision {
    pub fn retry_after_secs(&self) -> u64 {
        self.reset_in.as_secs_f64().ceil() as u64
    }
}

pub struct RateLimiter {
    window: Duration,
    max: u32,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max: u32) -> Self {
        Self {
            window,
            max,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request for `key` at `now`.
    pub async fn check(&self, key: &str, now: Instant) -> Decision {
        let mut windows = self.windows.lock().await;
        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at: now + self.window,
        });

        if now > entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window;
        }

        entry.count = entry.count.saturating_add(1);

        Decision {
            allowed: entry.count <= self.max,
            limit: self.max,
            remaining: self.max.saturating_sub(entry.count),
            reset_in: entry.reset_at.saturating_duration_since(now),
        }
    }

    /// Drop windows that expired more than a grace period ago. Returns how
    /// many were removed.
    pub async fn sweep(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| now <= w.reset_at + SWEEP_GRACE);
        before - windows.len()
    }
}

/// First `X-Forwarded-For` hop (the proxy is trusted), then the socket peer.
pub fn client_key(req: &Request) -> String {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware for `axum::middleware::from_fn_with_state`.
pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let key = client_key(&req);
    let decision = limiter.check(&key, Instant::now()).await;

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        tracing::warn!(client = %key, path = %req.uri().path(), "Rate limit exceeded");
        AppError::TooManyRequests {
            retry_after_secs: decision.retry_after_secs(),
        }
        .into_response()
    };

    apply_headers(response.headers_mut(), &decision);
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(LIMIT_HEADER.clone(), HeaderValue::from(decision.limit));
    headers.insert(
        REMAINING_HEADER.clone(),
        HeaderValue::from(decision.remaining),
    );

    let reset_in = chrono::Duration::from_std(decision.reset_in)
        .unwrap_or_else(|_| chrono::Duration::zero());
    let reset_at = (Utc::now() + reset_in).to_rfc3339_opts(SecondsFormat::Secs, true);
    if let Ok(value) = HeaderValue::from_str(&reset_at) {
        headers.insert(RESET_HEADER.clone(), value);
    }
}

/// Periodically sweep every limiter. The returned handle should be aborted
/// on shutdown.
pub fn spawn_sweeper(limiters: Vec<Arc<RateLimiter>>, every: Duration) -> JoinHandle<()> {
    let every = every.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let now = Instant::now();
            let mut removed = 0;
            for limiter in &limiters {
                removed += limiter.sweep(now).await;
            }
            if removed > 0 {
                tracing::debug!(removed, "Swept expired rate limit windows");
            }
        }
    })
}
