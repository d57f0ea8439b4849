//! Retention Policy
//!
//! The expiry rule, isolated as a pure function so it can be tested
//! exhaustively without standing up the scheduler or the store.
//!
//! An artifact is expired when `now - created_at >= ttl`. A TTL of zero
//! or less means immediate expiry: every artifact is always expired.
//! That is the "clean everything now" configuration, not an error.

use chrono::{DateTime, Duration, Utc};

/// Expiry threshold for session artifacts.
///
/// Holds the TTL only. The scheduler's poll interval determines how
/// promptly expiry is *detected*, never the threshold itself, so the two
/// are deliberately kept in separate types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    ttl: Duration,
}

impl RetentionPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn from_secs(ttl_secs: i64) -> Self {
        Self::new(Duration::seconds(ttl_secs))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether an artifact created at `created_at` is expired at `now`.
    ///
    /// Monotonic in `now`: once true for some `now`, it stays true for
    /// every larger `now`. If the clock has gone backward and `now`
    /// precedes `created_at`, the elapsed duration saturates at zero;
    /// combined with permanent deletion this means an observed expiry can
    /// never be un-observed.
    pub fn is_expired(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if self.ttl <= Duration::zero() {
            return true;
        }
        let elapsed = (now - created_at).max(Duration::zero());
        elapsed >= self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn not_expired_before_ttl() {
        let policy = RetentionPolicy::from_secs(300);
        assert!(!policy.is_expired(t(0), t(0)));
        assert!(!policy.is_expired(t(0), t(299)));
    }

    #[test]
    fn expired_at_exact_ttl() {
        // now - created_at >= ttl: the boundary is inclusive
        let policy = RetentionPolicy::from_secs(300);
        assert!(policy.is_expired(t(0), t(300)));
        assert!(policy.is_expired(t(0), t(301)));
    }

    #[test]
    fn zero_ttl_expires_everything() {
        let policy = RetentionPolicy::from_secs(0);
        assert!(policy.is_expired(t(0), t(0)));
        assert!(policy.is_expired(t(1000), t(0)));
    }

    #[test]
    fn negative_ttl_expires_everything() {
        let policy = RetentionPolicy::from_secs(-5);
        assert!(policy.is_expired(t(0), t(0)));
        assert!(policy.is_expired(t(500), t(0)));
    }

    #[test]
    fn backward_clock_does_not_panic_or_expire() {
        // now before created_at: elapsed saturates at zero
        let policy = RetentionPolicy::from_secs(300);
        assert!(!policy.is_expired(t(100), t(50)));
    }

    proptest! {
        #[test]
        fn matches_duration_comparison(
            created in -100_000i64..100_000,
            now in -100_000i64..100_000,
            ttl in 1i64..100_000,
        ) {
            let policy = RetentionPolicy::from_secs(ttl);
            let expected = (now - created).max(0) >= ttl;
            prop_assert_eq!(policy.is_expired(t(created), t(now)), expected);
        }

        #[test]
        fn monotonic_in_now(
            created in -100_000i64..100_000,
            now in -100_000i64..100_000,
            later in 0i64..100_000,
            ttl in -1_000i64..100_000,
        ) {
            let policy = RetentionPolicy::from_secs(ttl);
            if policy.is_expired(t(created), t(now)) {
                prop_assert!(policy.is_expired(t(created), t(now + later)));
            }
        }
    }
}
