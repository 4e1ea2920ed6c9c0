use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[cfg(not(test))]
use std::time::Instant;
#[cfg(test)]
use mock_instant::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    pub max_requests: u32,
    /// Window length
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
        }
    }
}

impl From<&AppConfig> for RateLimitConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_requests: config.rate_limit_max_requests,
            window: Duration::from_secs(config.rate_limit_window_secs),
        }
    }
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
}

/// Fixed-window request counter keyed by caller.
///
/// State lives in this process only; several server instances each keep their own counts.
pub struct RateLimiter {
    entries: RwLock<HashMap<String, RateLimitEntry>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count one request for `key`, failing once the window's budget is spent.
    pub async fn check(&self, key: &str) -> Result<RateLimitStatus, AppError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        let entry = entries.entry(key.to_string()).or_insert_with(|| RateLimitEntry {
            count: 0,
            window_start: now,
        });

        if entry.window_start.elapsed() >= self.config.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.config.max_requests {
            warn!("Rate limit exceeded for {}", key);
            return Err(AppError::RateLimited(format!(
                "Rate limit exceeded: {} requests per {} seconds",
                self.config.max_requests,
                self.config.window.as_secs()
            )));
        }

        entry.count += 1;
        Ok(RateLimitStatus {
            limit: self.config.max_requests,
            remaining: self.config.max_requests - entry.count,
        })
    }

    pub async fn remaining(&self, key: &str) -> u32 {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.window_start.elapsed() < self.config.window => {
                self.config.max_requests.saturating_sub(entry.count)
            }
            _ => self.config.max_requests,
        }
    }

    /// Drop entries whose window has expired. Returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.window_start.elapsed() < self.config.window);
        before - entries.len()
    }

    pub async fn tracked_keys(&self) -> usize {
        self.entries.read().await.len()
    }

    pub fn spawn_cleanup(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let removed = limiter.cleanup().await;
                if removed > 0 {
                    debug!("Rate limiter cleanup removed {} expired entries", removed);
                }
            }
        })
    }
}

/// Authenticated user id when present, otherwise the first forwarded client address.
pub fn client_key(headers: &HeaderMap, user: Option<&User>) -> String {
    if let Some(user) = user {
        return format!("user:{}", user.id);
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match forwarded.or(real_ip) {
        Some(ip) => format!("ip:{}", ip),
        None => "anonymous".to_string(),
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let key = client_key(request.headers(), request.extensions().get::<User>());
    let status = limiter.check(&key).await?;

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(status.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(status.remaining));

    Ok(response)
}
