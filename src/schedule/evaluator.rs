//! Due-time evaluation. Pure: `now` is always supplied by the caller.

use chrono::{DateTime, Datelike, Timelike, Utc};

use super::{Frequency, Schedule};

/// Whether `schedule` should fire at `now`.
///
/// Matching is hourly: the minute part of `time` is stored but ignored.
/// A schedule fires at most once per UTC calendar day. A `monthDate` past the
/// end of a month never matches in that month.
pub fn is_due(schedule: &Schedule, now: DateTime<Utc>) -> bool {
  if !schedule.active {
    return false;
  }
  let Some(hour) = schedule.hour() else {
    return false;
  };
  if hour != now.hour() {
    return false;
  }

  let gate = match schedule.frequency {
    Frequency::Daily => true,
    Frequency::Weekly => {
      now.weekday().num_days_from_sunday() == u32::from(schedule.week_day_or_default())
    }
    Frequency::Monthly => now.day() == u32::from(schedule.month_date_or_default()),
  };
  if !gate {
    return false;
  }

  !schedule
    .last_run
    .is_some_and(|last| last.date_naive() == now.date_naive())
}

/// The due subset of `schedules`, in their original order.
pub fn due_now(schedules: &[Schedule], now: DateTime<Utc>) -> Vec<&Schedule> {
  schedules.iter().filter(|s| is_due(s, now)).collect()
}
