//! Clock & Cron (C1, §4.1).
//!
//! `Clock` abstracts wall time behind a trait so scheduler tests can run
//! deterministically without real sleeps, the same production/test split
//! the teacher uses for its `ScheduleEvaluator` trait.

use crate::error::ScheduleError;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// A source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock for deterministic tests.
#[derive(Clone)]
pub struct TestClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl TestClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut guard = self.now.lock().unwrap();
        *guard += duration;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// A parsed 6-field (seconds-precision) cron expression.
///
/// The `@every <duration>` shorthand mentioned in §4.1 is handled directly
/// by the scheduler's `interval` schedule kind and never reaches this type.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: cron::Schedule,
}

impl CronSchedule {
    /// Parses a 6-field cron expression (`sec min hour day-of-month month
    /// day-of-week`).
    ///
    /// # Errors
    ///
    /// Returns `ScheduleError::InvalidCron` if the expression does not
    /// parse.
    pub fn parse(expression: impl Into<String>) -> Result<Self, ScheduleError> {
        let expression = expression.into();
        let schedule =
            cron::Schedule::from_str(&expression).map_err(|e| ScheduleError::InvalidCron {
                expression: expression.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            expression,
            schedule,
        })
    }

    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Returns the next firing time strictly after `after`.
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn valid_six_field_cron_parses() {
        let schedule = CronSchedule::parse("*/1 * * * * *").expect("parse");
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = schedule.next_after(after).expect("next");
        assert!(next > after);
        assert!(next - after <= chrono::Duration::seconds(1));
    }

    #[test]
    fn invalid_cron_is_rejected() {
        let err = CronSchedule::parse("not a cron expression").unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidCron { .. }));
    }

    #[test]
    fn test_clock_advances_deterministically() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = TestClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(clock.now(), start + chrono::Duration::seconds(30));
    }
}
