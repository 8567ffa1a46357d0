//! Notification decision policy.
//!
//! Pure function of the next claim time and the current time. Remaining time
//! is rounded up to whole hours at full precision, so 11h00m00.000000001s
//! counts as 12 hours.

use chrono::{DateTime, Utc};

use stakewatch_common::types::NotificationDecision;

/// Upcoming-reward reminders are sent only inside this many hours.
pub const UPCOMING_WINDOW_HOURS: u32 = 12;

const SECS_PER_HOUR: i64 = 60 * 60;

/// Decide what to tell a subscriber whose next claim opens at `next_claim`.
pub fn decide(next_claim: Option<DateTime<Utc>>, now: DateTime<Utc>) -> NotificationDecision {
    let Some(next_claim) = next_claim else {
        return NotificationDecision::None;
    };

    if next_claim <= now {
        return NotificationDecision::Available;
    }

    let remaining = next_claim - now;
    let secs = remaining.num_seconds();
    let partial_hour = secs.rem_euclid(SECS_PER_HOUR) != 0 || remaining.subsec_nanos() != 0;
    let remaining_hours = secs.div_euclid(SECS_PER_HOUR) + i64::from(partial_hour);

    match u32::try_from(remaining_hours) {
        Ok(hours @ 1..=UPCOMING_WINDOW_HOURS) => NotificationDecision::Upcoming(hours),
        _ => NotificationDecision::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_absent_is_none() {
        assert_eq!(decide(None, now()), NotificationDecision::None);
        assert_eq!(decide(None, DateTime::<Utc>::MIN_UTC), NotificationDecision::None);
    }

    #[test]
    fn test_past_or_now_is_available() {
        assert_eq!(decide(Some(now()), now()), NotificationDecision::Available);
        assert_eq!(
            decide(Some(now() - Duration::hours(1)), now()),
            NotificationDecision::Available
        );
        assert_eq!(
            decide(Some(now() - Duration::days(400)), now()),
            NotificationDecision::Available
        );
    }

    #[test]
    fn test_window_boundaries() {
        let at = |d: Duration| decide(Some(now() + d), now());

        assert_eq!(at(Duration::milliseconds(1)), NotificationDecision::Upcoming(1));
        assert_eq!(at(Duration::hours(1)), NotificationDecision::Upcoming(1));
        assert_eq!(
            at(Duration::hours(1) + Duration::milliseconds(1)),
            NotificationDecision::Upcoming(2)
        );
        assert_eq!(at(Duration::hours(11)), NotificationDecision::Upcoming(11));
        assert_eq!(at(Duration::hours(12)), NotificationDecision::Upcoming(12));
        assert_eq!(
            at(Duration::hours(12) + Duration::milliseconds(1)),
            NotificationDecision::None
        );
        assert_eq!(at(Duration::hours(13)), NotificationDecision::None);
        assert_eq!(at(Duration::hours(23)), NotificationDecision::None);
    }

    #[test]
    fn test_sub_millisecond_remainders_round_up() {
        let at = |d: Duration| decide(Some(now() + d), now());

        assert_eq!(at(Duration::microseconds(500)), NotificationDecision::Upcoming(1));
        assert_eq!(at(Duration::nanoseconds(1)), NotificationDecision::Upcoming(1));
        assert_eq!(
            at(Duration::hours(12) + Duration::microseconds(500)),
            NotificationDecision::None
        );
        assert_eq!(
            at(Duration::hours(12) + Duration::nanoseconds(1)),
            NotificationDecision::None
        );
        assert_eq!(
            at(Duration::hours(11) + Duration::nanoseconds(1)),
            NotificationDecision::Upcoming(12)
        );
    }

    #[test]
    fn test_every_hour_in_window() {
        for h in 1..=24i64 {
            let decision = decide(Some(now() + Duration::hours(h)), now());
            if h <= 12 {
                assert_eq!(decision, NotificationDecision::Upcoming(h as u32));
            } else {
                assert_eq!(decision, NotificationDecision::None);
            }
        }
    }

    #[test]
    fn test_decide_is_idempotent() {
        let next = Some(now() + Duration::minutes(90));
        assert_eq!(decide(next, now()), decide(next, now()));
        assert_eq!(decide(next, now()), NotificationDecision::Upcoming(2));
    }
}
