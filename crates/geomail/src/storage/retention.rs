//! Retention window helpers
//!
//! Pure functions so expiry can be tested against a fixed clock.

use chrono::{DateTime, Duration, Utc};

/// Latest creation time a message may have and still count as expired
pub fn expiry_cutoff(now: DateTime<Utc>, max_age_days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(max_age_days))
}

/// Check whether a message created at `created_at` is past the retention window
///
/// A message exactly `max_age_days` old is expired.
pub fn is_expired(created_at: DateTime<Utc>, now: DateTime<Utc>, max_age_days: u32) -> bool {
    created_at <= expiry_cutoff(now, max_age_days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_message_not_expired() {
        let now = Utc::now();
        assert!(!is_expired(now - Duration::days(3), now, 30));
        assert!(!is_expired(now, now, 1));
    }

    #[test]
    fn test_old_message_expired() {
        let now = Utc::now();
        assert!(is_expired(now - Duration::days(31), now, 30));
    }

    #[test]
    fn test_boundary_is_expired() {
        let now = Utc::now();
        assert!(is_expired(now - Duration::days(30), now, 30));
        assert!(!is_expired(now - Duration::days(30) + Duration::seconds(1), now, 30));
    }

    #[test]
    fn test_zero_days_expires_everything_up_to_now() {
        let now = Utc::now();
        assert_eq!(expiry_cutoff(now, 0), now);
        assert!(is_expired(now, now, 0));
        assert!(!is_expired(now + Duration::seconds(1), now, 0));
    }
}
