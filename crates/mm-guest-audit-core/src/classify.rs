//! Inactivity classification.

use chrono::{DateTime, TimeDelta, Utc};

/// Decide whether a guest counts as inactive.
///
/// - `threshold_days <= 0` disables flagging: always `false`.
/// - A guest who never logged in (`last_login == None`) is inactive.
/// - Otherwise the guest is inactive iff the last login is strictly earlier
///   than `now - threshold_days`. A login exactly at the cutoff is active.
///
/// `now` is supplied by the caller; this function never reads a clock.
#[must_use]
pub fn is_inactive(
    last_login: Option<DateTime<Utc>>,
    threshold_days: i64,
    now: DateTime<Utc>,
) -> bool {
    if threshold_days <= 0 {
        return false;
    }
    let Some(last_login) = last_login else {
        return true;
    };

    // A cutoff before the representable range means nothing can be older.
    TimeDelta::try_days(threshold_days)
        .and_then(|window| now.checked_sub_signed(window))
        .is_some_and(|cutoff| last_login < cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    fn days_ago(days: i64) -> Option<DateTime<Utc>> {
        Some(now() - TimeDelta::days(days))
    }

    #[test]
    fn recent_login_is_active() {
        assert!(!is_inactive(days_ago(5), 30, now()));
    }

    #[test]
    fn login_exactly_at_cutoff_is_active() {
        assert!(!is_inactive(days_ago(30), 30, now()));
    }

    #[test]
    fn login_one_second_past_cutoff_is_inactive() {
        let login = days_ago(30).map(|t| t - TimeDelta::seconds(1));
        assert!(is_inactive(login, 30, now()));
    }

    #[test]
    fn login_one_day_over_is_inactive() {
        assert!(is_inactive(days_ago(31), 30, now()));
    }

    #[test]
    fn login_just_under_threshold_is_active() {
        assert!(!is_inactive(days_ago(29), 30, now()));
    }

    #[test]
    fn never_logged_in_is_inactive() {
        assert!(is_inactive(None, 30, now()));
    }

    #[test]
    fn zero_threshold_disables_flagging() {
        assert!(!is_inactive(None, 0, now()));
        assert!(!is_inactive(days_ago(100), 0, now()));
    }

    #[test]
    fn huge_threshold_does_not_overflow() {
        assert!(!is_inactive(days_ago(10), i64::MAX, now()));
        assert!(is_inactive(None, i64::MAX, now()));
    }

    proptest! {
        #[test]
        fn prop_non_positive_threshold_never_flags(
            days in i64::MIN..=0,
            login_offset in proptest::option::of(0i64..100_000),
        ) {
            let login = login_offset.and_then(days_ago);
            prop_assert!(!is_inactive(login, days, now()));
        }

        #[test]
        fn prop_never_logged_in_is_flagged(days in 1i64..1_000_000) {
            prop_assert!(is_inactive(None, days, now()));
        }

        #[test]
        fn prop_cutoff_boundary(days in 1i64..10_000) {
            prop_assert!(!is_inactive(days_ago(days), days, now()));
            let older = days_ago(days).map(|t| t - TimeDelta::seconds(1));
            prop_assert!(is_inactive(older, days, now()));
        }
    }
}
