//! # Week Keys
//!
//! Editions are keyed by a canonical week-start instant: Monday 00:00 in
//! the edition timezone (America/Los_Angeles), expressed as UTC. Any two
//! wall-clock instants that fall in the same local week normalize to the
//! identical key, which is what lets unrelated requests converge on one
//! edition row.
//!
//! No function here reads the clock. Callers pass the instant in, so the
//! computation stays pure and testable with fixed timestamps.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::America::Los_Angeles;
use chrono_tz::Tz;

/// The canonical edition timezone.
pub const EDITION_TZ: Tz = Los_Angeles;

/// Normalize an instant to its week-start key.
///
/// Converts `at` into the edition timezone, steps back to that local
/// day's Monday, takes local midnight, and re-expresses it as UTC.
pub fn week_start(at: DateTime<Utc>) -> DateTime<Utc> {
    let local = at.with_timezone(&EDITION_TZ);
    let days_from_monday = local.weekday().num_days_from_monday() as i64;
    let monday = local.date_naive() - Duration::days(days_from_monday);
    local_midnight(monday).with_timezone(&Utc)
}

/// The "YYYY-MM-DD" label of a week-start key, in the edition timezone.
///
/// Used for derived edition titles ("Week of 2025-09-01").
pub fn week_label(week_start: DateTime<Utc>) -> String {
    week_start
        .with_timezone(&EDITION_TZ)
        .format("%Y-%m-%d")
        .to_string()
}

/// Earliest instant of a local calendar day.
///
/// Midnight can be skipped or doubled around a DST transition (it never
/// is for Los Angeles, which shifts at 02:00, but the mapping must still
/// be total).
fn local_midnight(day: NaiveDate) -> DateTime<Tz> {
    let midnight = day.and_time(NaiveTime::MIN);
    match EDITION_TZ.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            // Skipped by a spring-forward gap; the first valid local
            // instant of the day is within the next hour.
            match EDITION_TZ.from_local_datetime(&(midnight + Duration::hours(1))) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
                LocalResult::None => EDITION_TZ.from_utc_datetime(&midnight),
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
