//! Lockout policy and the password-strength collaborator interface.
//!
//! The lockout decisions are pure functions over counts and timestamps; the
//! accessor that persists the outcome lives in the store layer.

use chrono::{DateTime, Duration, Utc};

/// Consecutive failed attempts that trigger a lockout.
pub const MAX_FAILED_ATTEMPTS: i32 = 5;

/// How long a lockout lasts.
pub const LOCKOUT_MINUTES: i64 = 15;

/// Check whether a lockout window is still in force at `now`. The check is
/// independent of password correctness: a locked account rejects even the
/// right password until the window elapses.
pub fn is_locked(lockout_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    matches!(lockout_until, Some(until) if now < until)
}

/// Lockout timestamp to persist alongside a failed-attempt count of
/// `failed_attempt_count`, if the count has crossed the threshold.
pub fn lockout_after_failure(
    failed_attempt_count: i32,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if failed_attempt_count >= MAX_FAILED_ATTEMPTS {
        Some(now + Duration::minutes(LOCKOUT_MINUTES))
    } else {
        None
    }
}

/// Password strength scoring is owned by a separate service; this subsystem
/// only consumes the pass/fail judgment.
pub trait PasswordStrength: Send + Sync {
    fn check(&self, password: &str) -> Result<(), String>;
}

/// Minimal default used in development and tests.
#[derive(Debug, Clone)]
pub struct MinLengthPolicy {
    pub min_length: usize,
}

impl Default for MinLengthPolicy {
    fn default() -> Self {
        Self { min_length: 8 }
    }
}

impl PasswordStrength for MinLengthPolicy {
    fn check(&self, password: &str) -> Result<(), String> {
        if password.chars().count() < self.min_length {
            return Err(format!(
                "Password must be at least {} characters",
                self.min_length
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_locked_without_timestamp() {
        assert!(!is_locked(None, Utc::now()));
    }

    #[test]
    fn test_locked_while_window_open() {
        let now = Utc::now();
        assert!(is_locked(Some(now + Duration::minutes(5)), now));
    }

    #[test]
    fn test_unlocked_once_window_elapsed() {
        let now = Utc::now();
        assert!(!is_locked(Some(now - Duration::seconds(1)), now));
        assert!(!is_locked(Some(now), now));
    }

    #[test]
    fn test_lockout_starts_at_threshold() {
        let now = Utc::now();
        assert_eq!(lockout_after_failure(MAX_FAILED_ATTEMPTS - 1, now), None);

        let until = lockout_after_failure(MAX_FAILED_ATTEMPTS, now);
        assert_eq!(until, Some(now + Duration::minutes(LOCKOUT_MINUTES)));

        // Failures past the threshold extend the window again
        assert!(lockout_after_failure(MAX_FAILED_ATTEMPTS + 1, now).is_some());
    }

    #[test]
    fn test_min_length_policy() {
        let policy = MinLengthPolicy::default();
        assert!(policy.check("short").is_err());
        assert!(policy.check("long enough").is_ok());
    }
}
