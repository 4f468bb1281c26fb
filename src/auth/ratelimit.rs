//! Rate limiter for the login endpoint
//!
//! This module provides a fixed-window request counter keyed by client address.
//! Each admitted request records its timestamp; once a key has `max_requests`
//! timestamps inside the window, further requests are refused until the oldest
//! one ages out.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;

use super::clock::Clock;

/// Configuration for the rate limiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum number of admitted requests per key inside the window
    pub max_requests: usize,

    /// Length of the window
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::minutes(5),
        }
    }
}

/// Rate limiter for login attempts
///
/// Thread-safe limiter that tracks admitted request timestamps per key.
/// Keys are never removed by [`RateLimiter::check`]; call
/// [`RateLimiter::sweep`] (or run [`spawn_sweeper`]) to drop idle keys.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Create a new rate limiter with default configuration
    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    /// The limiter's configuration
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit or refuse a request for `key` at `now`
    ///
    /// Returns `true` and records `now` if fewer than `max_requests` requests
    /// were admitted inside the window; returns `false` without recording
    /// anything otherwise.
    pub fn check(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut entries = self.lock();
        let timestamps = entries.entry(key.to_owned()).or_default();

        timestamps.retain(|ts| self.in_window(*ts, now));

        if timestamps.len() >= self.config.max_requests {
            return false;
        }

        timestamps.push_back(now);
        true
    }

    /// Time until `key` is admitted again
    ///
    /// Returns `None` if the key would currently be admitted.
    pub fn retry_after(&self, key: &str, now: DateTime<Utc>) -> Option<std::time::Duration> {
        let entries = self.lock();
        let timestamps = entries.get(key)?;

        let live: Vec<&DateTime<Utc>> = timestamps
            .iter()
            .filter(|ts| self.in_window(**ts, now))
            .collect();
        if live.len() < self.config.max_requests {
            return None;
        }

        // The request that ages out next is the one that frees a slot.
        let oldest = live.into_iter().min()?;
        let wait = (*oldest + self.config.window) - now;
        Some(wait.to_std().unwrap_or_default())
    }

    /// Remove keys that have no timestamps inside the window
    ///
    /// Returns the number of keys removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();

        entries.retain(|_, timestamps| {
            timestamps.retain(|ts| self.in_window(*ts, now));
            !timestamps.is_empty()
        });

        before - entries.len()
    }

    /// Get current number of tracked keys
    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    fn in_window(&self, ts: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - ts < self.config.window
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<DateTime<Utc>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Periodically sweep idle keys from `limiter`
///
/// The task runs until the returned handle is aborted.
pub fn spawn_sweeper(
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = limiter.sweep(clock.now());
            if removed > 0 {
                tracing::debug!(
                    removed,
                    remaining = limiter.tracked_keys(),
                    "Swept idle rate limit entries"
                );
            }
        }
    })
}
