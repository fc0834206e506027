//! Projection of raw search results into [`IssueRow`]s.

use crate::jira::adf;
use crate::jira::api_types::{ApiComment, ApiIssue};
use crate::jira::types::{Assignee, CommentRow, IssueRow};

/// Human duration used when the tracker reports no time
pub const NO_TIME: &str = "0m";

/// Normalize one issue. `site` is the tracker base URL used for browse links;
/// an empty site yields relative `/browse/KEY` links.
pub fn issue_row(issue: ApiIssue, site: &str) -> IssueRow {
  let f = issue.fields;
  let tt = f.timetracking.unwrap_or_default();
  let time_spent_seconds = tt.time_spent_seconds.unwrap_or(0);
  let estimate_seconds = tt.original_estimate_seconds.unwrap_or(0);

  let comments: Vec<CommentRow> = f
    .comment
    .map(|page| page.comments.into_iter().map(comment_row).collect())
    .unwrap_or_default();

  IssueRow {
    url: format!("{}/browse/{}", site.trim_end_matches('/'), issue.key),
    id: issue.id,
    key: issue.key,
    summary: f.summary,
    assignee: f
      .assignee
      .map(|u| Assignee {
        avatar_url: u.avatar_24(),
        account_id: Some(u.account_id).filter(|id| !id.is_empty()),
        name: u.display_name,
      })
      .unwrap_or_else(Assignee::unassigned),
    status_category: f
      .status
      .as_ref()
      .and_then(|s| s.status_category.as_ref())
      .map(|c| c.name.clone())
      .unwrap_or_default(),
    status: f.status.map(|s| s.name).unwrap_or_default(),
    issue_type: f.issue_type.map(|t| t.name).unwrap_or_default(),
    priority: f.priority.map(|p| p.name),
    labels: f.labels,
    parent: f.parent.map(|p| p.key),
    time_spent: tt.time_spent.unwrap_or_else(|| NO_TIME.to_string()),
    estimate: tt.original_estimate.unwrap_or_else(|| NO_TIME.to_string()),
    time_spent_seconds,
    estimate_seconds,
    exceeded: exceeded(time_spent_seconds, estimate_seconds),
    last_comment: comments.last().cloned(),
    comments,
  }
}

pub fn issue_rows(issues: Vec<ApiIssue>, site: &str) -> Vec<IssueRow> {
  issues.into_iter().map(|i| issue_row(i, site)).collect()
}

/// Strictly more time spent than estimated
pub fn exceeded(spent_seconds: u64, estimate_seconds: u64) -> bool {
  spent_seconds > estimate_seconds
}

fn comment_row(comment: ApiComment) -> CommentRow {
  CommentRow {
    author: comment
      .author
      .map(|a| a.display_name)
      .unwrap_or_else(|| "Unknown".to_string()),
    text: comment
      .body
      .as_ref()
      .and_then(adf::first_text)
      .unwrap_or_default(),
    created: comment.created,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::jira::types::UNASSIGNED;

  fn parse(json: &str) -> ApiIssue {
    serde_json::from_str(json).unwrap()
  }

  #[test]
  fn test_sparse_issue_gets_defaults() {
    let row = issue_row(
      parse(r#"{"id": "10", "key": "OPS-1", "fields": {"summary": "Rotate keys"}}"#),
      "",
    );

    assert_eq!(row.assignee.name, UNASSIGNED);
    assert_eq!(row.assignee.avatar_url, "");
    assert_eq!(row.time_spent, "0m");
    assert_eq!(row.estimate, "0m");
    assert_eq!(row.time_spent_seconds, 0);
    assert_eq!(row.estimate_seconds, 0);
    assert!(!row.exceeded);
    assert!(row.comments.is_empty());
    assert!(row.last_comment.is_none());
    assert_eq!(row.url, "/browse/OPS-1");
  }

  #[test]
  fn test_full_issue_projection() {
    let row = issue_row(
      parse(
        r#"{
          "id": "10042",
          "key": "OPS-42",
          "fields": {
            "summary": "Migrate database",
            "status": {"id": "3", "name": "In Progress", "statusCategory": {"key": "indeterminate", "name": "In Progress"}},
            "issuetype": {"id": "1", "name": "Task"},
            "assignee": {"accountId": "acc-1", "displayName": "Ana Lima", "avatarUrls": {"24x24": "https://avatars/ana-24.png"}},
            "priority": {"name": "High"},
            "labels": ["db", "infra"],
            "parent": {"id": "9", "key": "OPS-9"},
            "timetracking": {"timeSpent": "3h", "originalEstimate": "2h", "timeSpentSeconds": 10800, "originalEstimateSeconds": 7200},
            "comment": {"comments": [
              {"author": {"displayName": "Bo"}, "body": {"type": "doc", "version": 1, "content": [{"type": "paragraph", "content": [{"type": "text", "text": "Started"}]}]}, "created": "2024-01-02T10:00:00.000+0000"},
              {"author": {"displayName": "Ana Lima"}, "body": {"type": "doc", "version": 1, "content": [{"type": "paragraph", "content": [{"type": "text", "text": "Blocked on backups"}]}]}}
            ]}
          }
        }"#,
      ),
      "https://acme.atlassian.net/",
    );

    assert_eq!(row.url, "https://acme.atlassian.net/browse/OPS-42");
    assert_eq!(row.assignee.name, "Ana Lima");
    assert_eq!(row.assignee.account_id.as_deref(), Some("acc-1"));
    assert_eq!(row.assignee.avatar_url, "https://avatars/ana-24.png");
    assert_eq!(row.status, "In Progress");
    assert_eq!(row.status_category, "In Progress");
    assert_eq!(row.issue_type, "Task");
    assert_eq!(row.priority.as_deref(), Some("High"));
    assert_eq!(row.labels, vec!["db", "infra"]);
    assert_eq!(row.parent.as_deref(), Some("OPS-9"));
    assert_eq!(row.time_spent, "3h");
    assert!(row.exceeded);
    assert_eq!(row.comments.len(), 2);
    assert_eq!(row.comments[0].text, "Started");
    let last = row.last_comment.unwrap();
    assert_eq!(last.author, "Ana Lima");
    assert_eq!(last.text, "Blocked on backups");
  }

  #[test]
  fn test_exceeded_is_strict() {
    assert!(!exceeded(0, 0));
    assert!(!exceeded(100, 100));
    assert!(!exceeded(50, 100));
    assert!(exceeded(101, 100));
    assert!(exceeded(1, 0));
  }
}
