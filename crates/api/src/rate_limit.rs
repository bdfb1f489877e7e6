//! Per-client sliding-window request limits.
//!
//! Requests are counted per source IP inside a sliding window. Memory is
//! bounded two ways: expired entries are swept every `cleanup_interval`
//! requests, and at most `max_tracked_ips` addresses are tracked at once. A
//! new address arriving at the cap is refused after one forced sweep.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    /// Sweep expired entries every N checks.
    pub cleanup_interval: u64,
    pub max_tracked_ips: usize,
}

impl RateLimitConfig {
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

    /// `max_requests` per default window.
    pub fn per_window(max_requests: u32) -> Self {
        Self {
            max_requests,
            ..Self::default()
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Self::DEFAULT_WINDOW,
            cleanup_interval: 100,
            max_tracked_ips: 10_000,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("rate limit exceeded")]
pub struct RateLimited;

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: RwLock<HashMap<IpAddr, Vec<Instant>>>,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: RwLock::new(HashMap::new()),
            checks: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Record one request from `ip`, or refuse it.
    pub fn check(&self, ip: IpAddr) -> Result<(), RateLimited> {
        let now = Instant::now();
        let cutoff = now.checked_sub(self.config.window).unwrap_or(now);

        let count = self.checks.fetch_add(1, Ordering::Relaxed);
        if count > 0 && count % self.config.cleanup_interval.max(1) == 0 {
            self.cleanup();
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !state.contains_key(&ip) && state.len() >= self.config.max_tracked_ips {
            sweep(&mut state, cutoff);
            if state.len() >= self.config.max_tracked_ips {
                tracing::warn!(%ip, tracked = state.len(), "rate limiter full; refusing new client");
                return Err(RateLimited);
            }
        }

        let hits = state.entry(ip).or_default();
        hits.retain(|t| *t > cutoff);
        if hits.len() >= self.config.max_requests as usize {
            tracing::warn!(%ip, requests = hits.len(), max = self.config.max_requests, "rate limit exceeded");
            return Err(RateLimited);
        }
        hits.push(now);
        Ok(())
    }

    /// Drop addresses with no requests inside the window.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let cutoff = now.checked_sub(self.config.window).unwrap_or(now);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        sweep(&mut state, cutoff);
    }

    pub fn tracked_ips(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn sweep(state: &mut HashMap<IpAddr, Vec<Instant>>, cutoff: Instant) {
    state.retain(|_, hits| {
        hits.retain(|t| *t > cutoff);
        !hits.is_empty()
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::thread;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn limiter(max_requests: u32, window: Duration) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window,
            ..RateLimitConfig::default()
        })
    }

    #[test]
    fn refuses_once_the_window_is_full() {
        let limiter = limiter(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check(ip(1)).is_ok());
        }
        assert_eq!(limiter.check(ip(1)), Err(RateLimited));
    }

    #[test]
    fn clients_have_separate_budgets() {
        let limiter = limiter(1, Duration::from_secs(60));
        assert!(limiter.check(ip(1)).is_ok());
        assert!(limiter.check(ip(1)).is_err());
        assert!(limiter.check(ip(2)).is_ok());
    }

    #[test]
    fn budget_returns_after_the_window() {
        let limiter = limiter(1, Duration::from_millis(200));
        assert!(limiter.check(ip(1)).is_ok());
        assert!(limiter.check(ip(1)).is_err());
        thread::sleep(Duration::from_millis(250));
        assert!(limiter.check(ip(1)).is_ok());
    }

    #[test]
    fn tracked_clients_are_capped() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 10,
            window: Duration::from_secs(60),
            cleanup_interval: 1_000,
            max_tracked_ips: 2,
        });
        assert!(limiter.check(ip(1)).is_ok());
        assert!(limiter.check(ip(2)).is_ok());
        assert!(limiter.check(ip(3)).is_err());
        assert_eq!(limiter.tracked_ips(), 2);
        // Known clients keep their budget at the cap.
        assert!(limiter.check(ip(1)).is_ok());
    }

    #[test]
    fn cleanup_forgets_idle_clients() {
        let limiter = limiter(5, Duration::from_millis(100));
        for last in 0..4 {
            limiter.check(ip(last)).unwrap();
        }
        assert_eq!(limiter.tracked_ips(), 4);
        thread::sleep(Duration::from_millis(150));
        limiter.cleanup();
        assert_eq!(limiter.tracked_ips(), 0);
    }
}
