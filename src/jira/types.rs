use serde::{Deserialize, Serialize};

/// Sentinel shown for issues without an assignee
pub const UNASSIGNED: &str = "Unassigned";

/// Normalized issue used by list output and spreadsheet export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRow {
  pub id: String,
  pub key: String,
  pub url: String,
  pub summary: String,
  pub assignee: Assignee,
  pub status: String,
  pub status_category: String,
  pub issue_type: String,
  pub priority: Option<String>,
  pub labels: Vec<String>,
  pub parent: Option<String>,
  pub time_spent: String,
  pub estimate: String,
  pub time_spent_seconds: u64,
  pub estimate_seconds: u64,
  pub exceeded: bool,
  pub last_comment: Option<CommentRow>,
  pub comments: Vec<CommentRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignee {
  pub account_id: Option<String>,
  pub name: String,
  pub avatar_url: String,
}

impl Assignee {
  pub fn unassigned() -> Self {
    Self {
      account_id: None,
      name: UNASSIGNED.to_string(),
      avatar_url: String::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRow {
  pub author: String,
  /// First text node of the comment body only
  pub text: String,
  pub created: Option<String>,
}

/// Picker option for projects (`{label, value, key}`)
#[derive(Debug, Clone, Serialize)]
pub struct ProjectOption {
  pub label: String,
  pub value: String,
  pub key: String,
}

/// Picker option for users
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOption {
  pub label: String,
  pub value: String,
  pub avatar_url: String,
}

/// Picker option for statuses (label and value are both the name)
#[derive(Debug, Clone, Serialize)]
pub struct StatusOption {
  pub label: String,
  pub value: String,
}

/// Fields for a new issue
#[derive(Debug, Clone)]
pub struct NewIssue {
  pub project_key: String,
  pub issue_type_id: String,
  pub summary: String,
  /// ADF document
  pub description: serde_json::Value,
  pub assignee_account_id: Option<String>,
}
