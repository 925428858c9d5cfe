//! Login rate limiting keyed by email

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Failed attempts allowed inside one window
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Lockout duration in seconds
    pub ban_duration_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,       // 5 minutes
            ban_duration_seconds: 900, // 15 minutes
        }
    }
}

impl RateLimiterConfig {
    /// Create a new RateLimiterConfig from environment variables
    ///
    /// # Environment Variables
    /// - `LOGIN_MAX_ATTEMPTS` (default: 5)
    /// - `LOGIN_WINDOW_SECONDS` (default: 300)
    /// - `LOGIN_BAN_SECONDS` (default: 900)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: env::var("LOGIN_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_attempts),
            window_seconds: env::var("LOGIN_WINDOW_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.window_seconds),
            ban_duration_seconds: env::var("LOGIN_BAN_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.ban_duration_seconds),
        }
    }
}

#[derive(Debug)]
struct RateLimiterEntry {
    attempts: u32,
    last_attempt: Instant,
    ban_expires: Option<Instant>,
}

/// In-process rate limiter shared by all handler clones
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, RateLimiterEntry>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record an attempt for `key` and report whether it may proceed
    pub async fn is_allowed(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let entry = entries.entry(key.to_string()).or_insert(RateLimiterEntry {
            attempts: 0,
            last_attempt: now,
            ban_expires: None,
        });

        if let Some(ban_expires) = entry.ban_expires {
            if now >= ban_expires {
                entry.attempts = 0;
                entry.ban_expires = None;
            } else {
                return false;
            }
        }

        if now.duration_since(entry.last_attempt) >= Duration::from_secs(self.config.window_seconds)
        {
            entry.attempts = 0;
        }

        if entry.attempts >= self.config.max_attempts {
            entry.ban_expires = Some(now + Duration::from_secs(self.config.ban_duration_seconds));
            warn!(
                "Locked out {} for {} seconds",
                key, self.config.ban_duration_seconds
            );
            return false;
        }

        entry.attempts += 1;
        entry.last_attempt = now;
        true
    }

    /// Forget the attempts for `key` after a successful login
    pub async fn reset(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}
