//! Saved filter presets ("reports") and their visibility rules.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::filters::FilterSet;
use crate::report::sort::SortSpec;
use crate::store::KvStore;

/// Prefix of every report key
pub const REPORT_PREFIX: &str = "report:";

const SCAN_PAGE: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
  #[default]
  Private,
  /// Shared with everyone browsing `projectKey`
  Project,
  Global,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
  pub id: String,
  pub name: String,
  pub owner_account_id: String,
  pub visibility: Visibility,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub project_key: Option<String>,
  #[serde(default)]
  pub filters: FilterSet,
  #[serde(default)]
  pub columns: Vec<String>,
  #[serde(default)]
  pub sort: Option<SortSpec>,
  pub created_at: DateTime<Utc>,
}

impl Report {
  /// Owners always see their reports. Project reports are shared only within
  /// the project being browsed.
  pub fn is_visible_to(&self, caller: &str, project_key: Option<&str>) -> bool {
    if self.owner_account_id == caller {
      return true;
    }
    match self.visibility {
      Visibility::Private => false,
      Visibility::Global => true,
      Visibility::Project => match (self.project_key.as_deref(), project_key) {
        (Some(own), Some(browsing)) => own.eq_ignore_ascii_case(browsing),
        _ => false,
      },
    }
  }

  fn store_key(id: &str) -> String {
    format!("{}{}", REPORT_PREFIX, id)
  }
}

/// Payload for saving a report
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReportRequest {
  pub name: String,
  #[serde(default)]
  pub visibility: Visibility,
  #[serde(default)]
  pub project_key: Option<String>,
  #[serde(default)]
  pub filters: FilterSet,
  #[serde(default)]
  pub columns: Vec<String>,
  #[serde(default)]
  pub sort: Option<SortSpec>,
}

pub fn save_report<S: KvStore>(
  store: &S,
  owner: &str,
  request: SaveReportRequest,
  now: DateTime<Utc>,
) -> Result<Report> {
  let name = request.name.trim();
  if name.is_empty() {
    return Err(eyre!("Report name is required"));
  }
  let project_key = request
    .project_key
    .map(|k| k.trim().to_string())
    .filter(|k| !k.is_empty());
  if request.visibility == Visibility::Project && project_key.is_none() {
    return Err(eyre!("A project key is required for project visibility"));
  }

  let report = Report {
    id: uuid::Uuid::new_v4().to_string(),
    name: name.to_string(),
    owner_account_id: owner.to_string(),
    visibility: request.visibility,
    project_key,
    filters: request.filters,
    columns: request.columns,
    sort: request.sort,
    created_at: now,
  };
  store.set(&Report::store_key(&report.id), &report)?;
  info!(id = %report.id, name = %report.name, "Saved report");
  Ok(report)
}

/// Reports `caller` may see, newest first.
pub fn list_reports<S: KvStore>(
  store: &S,
  caller: &str,
  project_key: Option<&str>,
) -> Result<Vec<Report>> {
  let mut reports = Vec::new();
  let mut cursor: Option<String> = None;

  loop {
    let page = store.scan(cursor.as_deref(), SCAN_PAGE)?;
    for entry in page.entries {
      if !entry.key.starts_with(REPORT_PREFIX) {
        continue;
      }
      match serde_json::from_value::<Report>(entry.value) {
        Ok(report) if report.is_visible_to(caller, project_key) => reports.push(report),
        Ok(_) => {}
        Err(e) => debug!(key = %entry.key, error = %e, "Skipping unreadable report"),
      }
    }
    match page.next_cursor {
      Some(next) => cursor = Some(next),
      None => break,
    }
  }

  reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
  Ok(reports)
}

/// Delete a report owned by `caller`.
pub fn delete_report<S: KvStore>(store: &S, caller: &str, id: &str) -> Result<()> {
  let key = Report::store_key(id);
  let report: Report = store
    .get(&key)?
    .ok_or_else(|| eyre!("Report not found: {}", id))?;
  if report.owner_account_id != caller {
    return Err(eyre!("Permission denied: only the owner can delete this report"));
  }
  store.delete(&key)?;
  info!(id = %id, "Deleted report");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::SqliteStore;
  use chrono::TimeZone;

  fn at(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 12, 0, 0).unwrap()
  }

  fn request(name: &str, visibility: Visibility, project: Option<&str>) -> SaveReportRequest {
    SaveReportRequest {
      name: name.to_string(),
      visibility,
      project_key: project.map(String::from),
      ..Default::default()
    }
  }

  fn names(reports: &[Report]) -> Vec<&str> {
    reports.iter().map(|r| r.name.as_str()).collect()
  }

  #[test]
  fn test_private_and_global_visibility() {
    let store = SqliteStore::open_in_memory().unwrap();
    save_report(&store, "U1", request("mine", Visibility::Private, None), at(1)).unwrap();
    save_report(&store, "U1", request("everyone", Visibility::Global, None), at(2)).unwrap();

    assert_eq!(names(&list_reports(&store, "U1", None).unwrap()), vec!["everyone", "mine"]);
    assert_eq!(names(&list_reports(&store, "U2", None).unwrap()), vec!["everyone"]);
  }

  #[test]
  fn test_project_visibility_needs_matching_project() {
    let store = SqliteStore::open_in_memory().unwrap();
    save_report(&store, "U1", request("ops only", Visibility::Project, Some("OPS")), at(1)).unwrap();

    assert_eq!(names(&list_reports(&store, "U2", Some("OPS")).unwrap()), vec!["ops only"]);
    assert!(list_reports(&store, "U2", Some("WEB")).unwrap().is_empty());
    assert!(list_reports(&store, "U2", None).unwrap().is_empty());
    assert_eq!(list_reports(&store, "U1", None).unwrap().len(), 1);
  }

  #[test]
  fn test_save_validation() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(save_report(&store, "U1", request("  ", Visibility::Private, None), at(1)).is_err());
    let err = save_report(&store, "U1", request("x", Visibility::Project, Some(" ")), at(1))
      .unwrap_err();
    assert!(err.to_string().contains("project key"));
  }

  #[test]
  fn test_listing_skips_other_keys_and_pages_through() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.set("schedules", &Vec::<u32>::new()).unwrap();
    store.set("report:broken", &"not a report").unwrap();
    for day in 1..=3 {
      for n in 0..50 {
        save_report(
          &store,
          "U1",
          request(&format!("r{}-{}", day, n), Visibility::Private, None),
          at(day),
        )
        .unwrap();
      }
    }

    let reports = list_reports(&store, "U1", None).unwrap();
    assert_eq!(reports.len(), 150);
    assert!(reports
      .windows(2)
      .all(|w| w[0].created_at >= w[1].created_at));
  }

  #[test]
  fn test_delete_checks_ownership() {
    let store = SqliteStore::open_in_memory().unwrap();
    let report = save_report(&store, "U1", request("mine", Visibility::Global, None), at(1)).unwrap();

    let err = delete_report(&store, "U2", &report.id).unwrap_err();
    assert!(err.to_string().contains("Permission denied"));

    delete_report(&store, "U1", &report.id).unwrap();
    let err = delete_report(&store, "U1", &report.id).unwrap_err();
    assert!(err.to_string().contains("Report not found"));
  }
}
