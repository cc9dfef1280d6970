//! Cron expression validation and next-fire-time computation
//!
//! Thin wrapper over the `cron` crate. The teacher's own scheduler module
//! carried this dependency without ever calling it, approximating "every
//! N minutes" with string slicing; this evaluator actually parses the
//! expression.

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use std::str::FromStr;

use super::JobError;

/// Validates cron expressions and computes their next firing instant.
#[derive(Debug, Clone, Copy, Default)]
pub struct CronEvaluator;

impl CronEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a 5 (or 6, with seconds) field cron expression.
    pub fn validate(&self, expr: &str) -> Result<(), JobError> {
        self.parse(expr).map(|_| ())
    }

    /// Compute the next instant, strictly after `from`, that the expression fires.
    pub fn next(&self, expr: &str, from: DateTime<Utc>) -> Result<DateTime<Utc>, JobError> {
        let schedule = self.parse(expr)?;
        schedule
            .after(&from)
            .next()
            .ok_or_else(|| JobError::UnsatisfiableSchedule(expr.to_string()))
    }

    fn parse(&self, expr: &str) -> Result<CronSchedule, JobError> {
        let normalized = Self::normalize(expr);
        CronSchedule::from_str(&normalized).map_err(|e| JobError::InvalidCron(format!("{}: {}", expr, e)))
    }

    /// The `cron` crate expects a leading seconds field; standard 5-field
    /// expressions get `0` prepended so `"*/5 * * * *"` means "every 5 minutes"
    /// rather than "every 5 seconds".
    fn normalize(expr: &str) -> String {
        let fields = expr.split_whitespace().count();
        if fields == 5 {
            format!("0 {}", expr)
        } else {
            expr.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_validate_accepts_standard_five_field() {
        let evaluator = CronEvaluator::new();
        assert!(evaluator.validate("*/5 * * * *").is_ok());
        assert!(evaluator.validate("0 0 1 1 *").is_ok());
    }

    #[test]
    fn test_validate_rejects_garbage() {
        let evaluator = CronEvaluator::new();
        assert!(evaluator.validate("not a cron expression").is_err());
    }

    #[test]
    fn test_next_every_five_minutes() {
        let evaluator = CronEvaluator::new();
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 12, 2, 30).unwrap();
        let next = evaluator.next("*/5 * * * *", from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 12, 5, 0).unwrap());
    }

    #[test]
    fn test_next_is_strictly_after_from() {
        let evaluator = CronEvaluator::new();
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 12, 5, 0).unwrap();
        let next = evaluator.next("*/5 * * * *", from).unwrap();
        assert!(next > from);
    }
}
