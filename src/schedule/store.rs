use chrono::{DateTime, Utc};
use color_eyre::Result;
use tracing::info;

use super::evaluator::due_now;
use super::Schedule;
use crate::store::KvStore;

/// Key holding the whole schedule collection
pub const SCHEDULES_KEY: &str = "schedules";

/// Ordered schedule collection kept as a single JSON array.
///
/// Last write wins for the whole array.
pub struct ScheduleStore<'a, S: KvStore> {
  store: &'a S,
}

impl<'a, S: KvStore> ScheduleStore<'a, S> {
  pub fn new(store: &'a S) -> Self {
    Self { store }
  }

  pub fn load(&self) -> Result<Vec<Schedule>> {
    Ok(self.store.get(SCHEDULES_KEY)?.unwrap_or_default())
  }

  pub fn save_all(&self, schedules: &[Schedule]) -> Result<()> {
    self.store.set(SCHEDULES_KEY, &schedules)
  }

  /// Insert, or replace every schedule with the same email.
  ///
  /// The replacement takes the first match's position and, when the payload
  /// has none, its id. All other fields come from the payload.
  pub fn upsert(&self, mut schedule: Schedule, now: DateTime<Utc>) -> Result<Schedule> {
    schedule.email = schedule.email.trim().to_string();
    if schedule.created_at.is_none() {
      schedule.created_at = Some(now);
    }

    let mut schedules = self.load()?;
    let position = schedules.iter().position(|s| s.has_email(&schedule.email));
    match position {
      Some(at) => {
        if schedule.id.is_empty() {
          schedule.id = schedules[at].id.clone();
        }
        let before = schedules.len();
        schedules.retain(|s| !s.has_email(&schedule.email));
        schedules.insert(at, schedule.clone());
        info!(
          email = %schedule.email,
          id = %schedule.id,
          replaced = before - schedules.len() + 1,
          "Replaced schedule"
        );
      }
      None => {
        if schedule.id.is_empty() {
          schedule.id = uuid::Uuid::new_v4().to_string();
        }
        schedules.push(schedule.clone());
        info!(email = %schedule.email, id = %schedule.id, "Added schedule");
      }
    }

    self.save_all(&schedules)?;
    Ok(schedule)
  }

  /// Validate, then [`upsert`](Self::upsert).
  pub fn save(&self, schedule: Schedule, now: DateTime<Utc>) -> Result<Schedule> {
    schedule.validate()?;
    self.upsert(schedule, now)
  }

  /// Schedules that would fire at `now`
  pub fn due(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>> {
    let schedules = self.load()?;
    Ok(due_now(&schedules, now).into_iter().cloned().collect())
  }

  pub fn find_by_email(&self, email: &str) -> Result<Option<Schedule>> {
    Ok(self.load()?.into_iter().find(|s| s.has_email(email)))
  }
}
