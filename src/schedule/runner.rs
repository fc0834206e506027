//! Timer entry point: deliver whatever is due, then record the runs.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::Serialize;
use tracing::info;

use super::delivery::DeliveryOrchestrator;
use super::evaluator::due_now;
use super::store::ScheduleStore;
use super::Schedule;
use crate::jira::JiraApi;
use crate::store::KvStore;

/// Result of one due schedule
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
  pub schedule_id: String,
  pub email: String,
  pub ticket: Option<String>,
  pub reason: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
  /// Schedules loaded from the store
  pub checked: usize,
  pub outcomes: Vec<RunOutcome>,
}

impl RunSummary {
  pub fn delivered(&self) -> usize {
    self.outcomes.iter().filter(|o| o.ticket.is_some()).count()
  }

  pub fn failed(&self) -> usize {
    self.outcomes.len() - self.delivered()
  }
}

pub struct ScheduleRunner<'a, J: JiraApi, S: KvStore> {
  schedules: ScheduleStore<'a, S>,
  orchestrator: DeliveryOrchestrator<'a, J>,
}

impl<'a, J: JiraApi, S: KvStore> ScheduleRunner<'a, J, S> {
  pub fn new(store: &'a S, orchestrator: DeliveryOrchestrator<'a, J>) -> Self {
    Self {
      schedules: ScheduleStore::new(store),
      orchestrator,
    }
  }

  pub async fn run(&self) -> Result<RunSummary> {
    self.run_at(Utc::now()).await
  }

  /// Deliver every schedule due at `now`, one at a time.
  ///
  /// Only store errors escape; delivery failures are part of the summary.
  /// Overlapping invocations are not guarded against.
  pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunSummary> {
    let mut schedules = self.schedules.load()?;
    let due: Vec<Schedule> = due_now(&schedules, now).into_iter().cloned().collect();
    info!(checked = schedules.len(), due = due.len(), "Evaluated schedules");

    let mut summary = RunSummary {
      checked: schedules.len(),
      outcomes: Vec::with_capacity(due.len()),
    };
    let mut stamped = 0;

    for schedule in &due {
      let outcome = match self.orchestrator.deliver(schedule, now).await {
        Ok(delivered) => {
          if let Some(stored) = schedules.iter_mut().find(|s| same_schedule(s, schedule)) {
            stored.last_run = Some(now);
            stamped += 1;
          }
          RunOutcome {
            schedule_id: schedule.id.clone(),
            email: schedule.email.clone(),
            ticket: Some(delivered.ticket),
            reason: None,
            warnings: delivered.warnings,
          }
        }
        Err(failure) => RunOutcome {
          schedule_id: schedule.id.clone(),
          email: schedule.email.clone(),
          ticket: None,
          reason: Some(failure.reason),
          warnings: Vec::new(),
        },
      };
      summary.outcomes.push(outcome);
    }

    if stamped > 0 {
      self.schedules.save_all(&schedules)?;
    }

    info!(
      delivered = summary.delivered(),
      failed = summary.failed(),
      "Scheduled run finished"
    );
    Ok(summary)
  }
}

/// Same id, or same email for schedules saved without one
fn same_schedule(a: &Schedule, b: &Schedule) -> bool {
  if a.id.is_empty() || b.id.is_empty() {
    return a.has_email(&b.email);
  }
  a.id == b.id
}
