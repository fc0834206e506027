use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::jira::types::IssueRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
  Key,
  Summary,
  Assignee,
  Status,
  Priority,
  TimeSpent,
  Estimate,
  Exceeded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
  #[default]
  Asc,
  Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
  pub key: SortKey,
  #[serde(default)]
  pub order: SortOrder,
}

/// Stable sort. Text compares case-insensitively, durations by seconds.
pub fn sort_rows(rows: &mut [IssueRow], spec: SortSpec) {
  rows.sort_by(|a, b| {
    let ord = compare(a, b, spec.key);
    match spec.order {
      SortOrder::Asc => ord,
      SortOrder::Desc => ord.reverse(),
    }
  });
}

fn compare(a: &IssueRow, b: &IssueRow, key: SortKey) -> Ordering {
  let text = |x: &str, y: &str| x.to_lowercase().cmp(&y.to_lowercase());
  match key {
    SortKey::Key => text(&a.key, &b.key),
    SortKey::Summary => text(&a.summary, &b.summary),
    SortKey::Assignee => text(&a.assignee.name, &b.assignee.name),
    SortKey::Status => text(&a.status, &b.status),
    SortKey::Priority => text(
      a.priority.as_deref().unwrap_or_default(),
      b.priority.as_deref().unwrap_or_default(),
    ),
    SortKey::TimeSpent => a.time_spent_seconds.cmp(&b.time_spent_seconds),
    SortKey::Estimate => a.estimate_seconds.cmp(&b.estimate_seconds),
    SortKey::Exceeded => a.exceeded.cmp(&b.exceeded),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::jira::fake::issue;
  use crate::report::extract::issue_row;

  fn row(key: &str, summary: &str, spent: u64) -> IssueRow {
    let mut r = issue_row(issue(key), "");
    r.summary = summary.to_string();
    r.time_spent_seconds = spent;
    r
  }

  fn keys(rows: &[IssueRow]) -> Vec<&str> {
    rows.iter().map(|r| r.key.as_str()).collect()
  }

  #[test]
  fn test_text_sort_ignores_case() {
    let mut rows = vec![row("A-1", "beta", 0), row("A-2", "Alpha", 0), row("A-3", "gamma", 0)];
    sort_rows(
      &mut rows,
      SortSpec {
        key: SortKey::Summary,
        order: SortOrder::Asc,
      },
    );
    assert_eq!(keys(&rows), vec!["A-2", "A-1", "A-3"]);
  }

  #[test]
  fn test_time_sorts_numerically_descending() {
    let mut rows = vec![row("A-1", "", 900), row("A-2", "", 36000), row("A-3", "", 7200)];
    sort_rows(
      &mut rows,
      SortSpec {
        key: SortKey::TimeSpent,
        order: SortOrder::Desc,
      },
    );
    assert_eq!(keys(&rows), vec!["A-2", "A-3", "A-1"]);
  }

  #[test]
  fn test_spec_deserializes_from_ui_shape() {
    let spec: SortSpec = serde_json::from_str(r#"{"key": "timeSpent", "order": "DESC"}"#).unwrap();
    assert_eq!(spec.key, SortKey::TimeSpent);
    assert_eq!(spec.order, SortOrder::Desc);
  }
}
