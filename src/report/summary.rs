use serde::Serialize;

use crate::jira::types::IssueRow;

/// Headline numbers for a set of rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
  pub total_issues: usize,
  pub total_time_spent: String,
  pub total_estimate: String,
  pub exceeded: usize,
  /// Status name and count, in first-seen order
  pub by_status: Vec<(String, usize)>,
}

impl ReportSummary {
  pub fn from_rows(rows: &[IssueRow]) -> Self {
    let mut by_status: Vec<(String, usize)> = Vec::new();
    for row in rows {
      match by_status.iter_mut().find(|(s, _)| *s == row.status) {
        Some((_, n)) => *n += 1,
        None => by_status.push((row.status.clone(), 1)),
      }
    }

    Self {
      total_issues: rows.len(),
      total_time_spent: format_duration(rows.iter().map(|r| r.time_spent_seconds).sum()),
      total_estimate: format_duration(rows.iter().map(|r| r.estimate_seconds).sum()),
      exceeded: rows.iter().filter(|r| r.exceeded).count(),
      by_status,
    }
  }
}

/// `Hh Mm`, or `0h` for nothing
pub fn format_duration(seconds: u64) -> String {
  if seconds == 0 {
    return "0h".to_string();
  }
  format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::jira::fake::issue;
  use crate::report::extract::issue_row;

  #[test]
  fn test_format_duration() {
    assert_eq!(format_duration(0), "0h");
    assert_eq!(format_duration(59), "0h 0m");
    assert_eq!(format_duration(5400), "1h 30m");
    assert_eq!(format_duration(90000), "25h 0m");
  }

  #[test]
  fn test_summary_counts() {
    let mut rows: Vec<IssueRow> = ["A-1", "A-2", "A-3"]
      .iter()
      .map(|k| issue_row(issue(k), ""))
      .collect();
    rows[0].status = "Done".into();
    rows[1].status = "To Do".into();
    rows[2].status = "Done".into();
    rows[2].time_spent_seconds = 3600;
    rows[2].exceeded = true;

    let summary = ReportSummary::from_rows(&rows);
    assert_eq!(summary.total_issues, 3);
    assert_eq!(summary.total_time_spent, "1h 0m");
    assert_eq!(summary.total_estimate, "0h");
    assert_eq!(summary.exceeded, 1);
    assert_eq!(
      summary.by_status,
      vec![("Done".to_string(), 2), ("To Do".to_string(), 1)]
    );
  }
}
