//! Failed-login lockout as a pure state machine.
//!
//! The policy never reads the clock; callers pass `now`, which keeps the
//! thresholds testable.

use chrono::{DateTime, Duration, Utc};
use feza_config::LockoutConfig;
use feza_database::{parse_timestamp, LoginAttempt};

/// Counter state for one account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutState {
    pub attempts: i64,
    pub last_attempt_at: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutState {
    /// Rows with unreadable timestamps are treated as stale.
    pub fn from_row(row: &LoginAttempt) -> Option<Self> {
        Some(Self {
            attempts: row.attempts,
            last_attempt_at: parse_timestamp(&row.last_attempt_at)?,
            locked_until: row.locked_until.as_deref().and_then(parse_timestamp),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutStatus {
    /// No failures on record.
    Clear,
    /// Failures recorded but below the threshold.
    Counting { attempts: i64 },
    /// Login refused until the given instant.
    Locked { until: DateTime<Utc> },
    /// A lock or failure streak has aged out; the counter should be reset.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_attempts: i64,
    pub duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::from_config(&LockoutConfig::default())
    }
}

impl LockoutPolicy {
    pub fn from_config(config: &LockoutConfig) -> Self {
        Self {
            max_attempts: i64::from(config.max_attempts.max(1)),
            duration: crate::seconds(config.duration_seconds),
        }
    }

    pub fn evaluate(&self, state: Option<&LockoutState>, now: DateTime<Utc>) -> LockoutStatus {
        let Some(state) = state else {
            return LockoutStatus::Clear;
        };

        match state.locked_until {
            Some(until) if until > now => LockoutStatus::Locked { until },
            Some(_) => LockoutStatus::Expired,
            None if now - state.last_attempt_at >= self.duration => LockoutStatus::Expired,
            None if state.attempts <= 0 => LockoutStatus::Clear,
            None => LockoutStatus::Counting {
                attempts: state.attempts,
            },
        }
    }

    /// State after one more failed attempt at `now`.
    pub fn register_failure(&self, state: Option<&LockoutState>, now: DateTime<Utc>) -> LockoutState {
        let previous = match self.evaluate(state, now) {
            LockoutStatus::Counting { attempts } => attempts,
            LockoutStatus::Locked { .. } => state.map_or(0, |s| s.attempts),
            LockoutStatus::Clear | LockoutStatus::Expired => 0,
        };
        let attempts = previous + 1;
        let locked_until = (attempts >= self.max_attempts).then(|| now + self.duration);

        LockoutState {
            attempts,
            last_attempt_at: now,
            locked_until,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn three_failures_lock_for_a_day() {
        let policy = LockoutPolicy::default();

        let first = policy.register_failure(None, at(9, 0));
        assert_eq!(first.attempts, 1);
        assert_eq!(policy.evaluate(Some(&first), at(9, 1)), LockoutStatus::Counting { attempts: 1 });

        let second = policy.register_failure(Some(&first), at(9, 1));
        assert!(second.locked_until.is_none());

        let third = policy.register_failure(Some(&second), at(9, 2));
        assert_eq!(third.attempts, 3);
        assert_eq!(third.locked_until, Some(at(9, 2) + Duration::hours(24)));
        assert_eq!(
            policy.evaluate(Some(&third), at(20, 0)),
            LockoutStatus::Locked { until: at(9, 2) + Duration::hours(24) }
        );
    }

    #[test]
    fn elapsed_lock_expires_and_counter_restarts() {
        let policy = LockoutPolicy::default();
        let locked = LockoutState {
            attempts: 3,
            last_attempt_at: at(9, 0),
            locked_until: Some(at(9, 0) + Duration::hours(24)),
        };
        let later = at(9, 0) + Duration::hours(24) + Duration::seconds(1);

        assert_eq!(policy.evaluate(Some(&locked), later), LockoutStatus::Expired);
        let next = policy.register_failure(Some(&locked), later);
        assert_eq!(next.attempts, 1);
        assert!(next.locked_until.is_none());
    }

    #[test]
    fn old_failures_age_out() {
        let policy = LockoutPolicy::default();
        let stale = LockoutState {
            attempts: 2,
            last_attempt_at: at(8, 0),
            locked_until: None,
        };
        let next_day = at(8, 0) + Duration::hours(25);
        assert_eq!(policy.evaluate(Some(&stale), next_day), LockoutStatus::Expired);
        assert_eq!(policy.register_failure(Some(&stale), next_day).attempts, 1);
    }

    #[test]
    fn custom_threshold_is_honoured() {
        let policy = LockoutPolicy::from_config(&LockoutConfig {
            max_attempts: 1,
            duration_seconds: 60,
        });
        let locked = policy.register_failure(None, at(10, 0));
        assert_eq!(locked.locked_until, Some(at(10, 1)));
        assert_eq!(policy.evaluate(Some(&locked), at(10, 1)), LockoutStatus::Expired);
    }

    #[test]
    fn unreadable_rows_are_ignored() {
        let row = LoginAttempt {
            id: 1,
            user_id: 1,
            attempts: 2,
            last_attempt_at: "garbage".into(),
            locked_until: None,
            ip_address: None,
        };
        assert!(LockoutState::from_row(&row).is_none());
    }
}
