//! Retry backoff for dispatch attempts
//!
//! `delay(attempt) = base_delay * 2^(attempt - 1)`, attempt counted from 1.

use std::time::Duration;

/// Exponential backoff with no jitter, matching the dispatch queue's
/// documented retry contract exactly.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl ExponentialBackoff {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self { base_delay, max_attempts }
    }

    /// Delay before the given attempt (1-indexed). Returns `None` once
    /// `attempt` exceeds `max_attempts` — the caller should treat the
    /// failure as final.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let exponent = attempt - 1;
        let secs = self.base_delay.as_secs_f64() * 2f64.powi(exponent as i32);
        Some(Duration::from_secs_f64(secs))
    }

    pub fn is_final(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self { base_delay: Duration::from_secs(60), max_attempts: 3 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_progression() {
        let backoff = ExponentialBackoff::new(Duration::from_secs(60), 3);
        assert_eq!(backoff.delay_for(1), Some(Duration::from_secs(60)));
        assert_eq!(backoff.delay_for(2), Some(Duration::from_secs(120)));
        assert_eq!(backoff.delay_for(3), Some(Duration::from_secs(240)));
        assert_eq!(backoff.delay_for(4), None);
    }

    #[test]
    fn test_is_final() {
        let backoff = ExponentialBackoff::new(Duration::from_secs(1), 3);
        assert!(!backoff.is_final(2));
        assert!(backoff.is_final(3));
    }
}
