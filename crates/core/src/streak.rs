//! Daily streak accounting.
//!
//! Day granularity in UTC: two visits on the same calendar day never count twice,
//! regardless of the time of day they happen at.

use chrono::{DateTime, Utc};

/// Which branch the evaluation took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    /// Same-day revisit.
    Unchanged,
    /// Visit on the day after the last one.
    Extended,
    /// Gap of more than one day; today starts a new streak.
    Reset,
    /// `now` is on an earlier day than the last access (device clock moved back).
    ClockSkew,
}

/// The `(streak, last_access_at)` pair to persist, always written together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub streak: u32,
    pub last_access_at: DateTime<Utc>,
    pub change: StreakChange,
}

/// Whole calendar days from `last` to `now`. Negative if `now` is on an earlier day.
#[must_use]
pub fn day_diff(last: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    now.date_naive()
        .signed_duration_since(last.date_naive())
        .num_days()
}

/// Evaluate a visit at `now` against the stored streak.
///
/// `last_access_at` in the result is always `now`, whichever branch was taken.
///
/// ```
/// # use chrono::Duration;
/// # use lingo_core::streak::{evaluate_streak, StreakChange};
/// # use lingo_core::time::fixed_now;
/// let now = fixed_now();
/// let update = evaluate_streak(5, now - Duration::days(1), now);
/// assert_eq!(update.streak, 6);
/// assert_eq!(update.change, StreakChange::Extended);
/// ```
#[must_use]
pub fn evaluate_streak(
    streak: u32,
    last_access_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> StreakUpdate {
    let diff = day_diff(last_access_at, now);
    let (streak, change) = match diff {
        d if d < 0 => (streak, StreakChange::ClockSkew),
        0 => (streak, StreakChange::Unchanged),
        1 => (streak.saturating_add(1), StreakChange::Extended),
        _ => (1, StreakChange::Reset),
    };

    StreakUpdate {
        streak,
        last_access_at: now,
        change,
    }
}
