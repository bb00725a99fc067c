//! Sliding-window rate limiter for outbound AI gateway calls.
//!
//! Process-local and best-effort: a multi-instance deployment would need a
//! shared limiter to preserve the quota invariant. The clock is passed in
//! explicitly so tests can drive the window deterministically.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::ai_client::AiError;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct RateLimiter {
    requests_per_minute: usize,
    timestamps: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: usize) -> Self {
        Self {
            requests_per_minute,
            timestamps: VecDeque::new(),
        }
    }

    /// Prunes timestamps outside the 60s window, then fails with
    /// `RateLimited` (carrying the seconds until the oldest request expires)
    /// if the remaining count has reached the quota.
    pub fn check(&mut self, now: Instant) -> Result<(), AiError> {
        while let Some(&oldest) = self.timestamps.front() {
            if now.duration_since(oldest) >= WINDOW {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }

        if self.timestamps.len() >= self.requests_per_minute {
            let oldest = self.timestamps.front().copied().unwrap_or(now);
            let wait = WINDOW.saturating_sub(now.duration_since(oldest));
            return Err(AiError::RateLimited {
                limit: self.requests_per_minute,
                wait_secs: wait.as_secs_f64().ceil() as u64,
            });
        }

        Ok(())
    }

    /// Records a successfully dispatched request. The caller appends only
    /// after the request actually went out.
    pub fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_quota_within_window() {
        let mut limiter = RateLimiter::new(3);
        let t0 = Instant::now();

        for _ in 0..3 {
            limiter.check(t0).unwrap();
            limiter.record(t0);
        }

        let err = limiter.check(t0).unwrap_err();
        match err {
            AiError::RateLimited { limit, wait_secs } => {
                assert_eq!(limit, 3);
                assert!(wait_secs > 0, "wait time must be positive");
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn window_expiry_frees_the_quota() {
        let mut limiter = RateLimiter::new(2);
        let t0 = Instant::now();

        limiter.check(t0).unwrap();
        limiter.record(t0);
        limiter.check(t0).unwrap();
        limiter.record(t0);
        assert!(limiter.check(t0).is_err());

        // Advance past the window: pruning must admit the next call.
        let later = t0 + Duration::from_secs(61);
        limiter.check(later).unwrap();
    }

    #[test]
    fn wait_time_reflects_oldest_timestamp() {
        let mut limiter = RateLimiter::new(1);
        let t0 = Instant::now();
        limiter.check(t0).unwrap();
        limiter.record(t0);

        // 20s into the window: 40s left until the oldest entry expires.
        let err = limiter.check(t0 + Duration::from_secs(20)).unwrap_err();
        match err {
            AiError::RateLimited { wait_secs, .. } => assert_eq!(wait_secs, 40),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }
}
