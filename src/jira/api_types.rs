//! Serde-deserializable types matching Jira API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Common nested field types
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiUser {
  #[serde(rename = "accountId", default)]
  pub account_id: String,
  #[serde(rename = "displayName", default)]
  pub display_name: String,
  /// Hidden when the user's profile visibility forbids it
  #[serde(rename = "emailAddress", default)]
  pub email_address: Option<String>,
  #[serde(rename = "avatarUrls", default)]
  pub avatar_urls: HashMap<String, String>,
  #[serde(default)]
  pub active: Option<bool>,
}

impl ApiUser {
  pub fn avatar_24(&self) -> String {
    self.avatar_urls.get("24x24").cloned().unwrap_or_default()
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiStatusCategory {
  #[serde(default)]
  pub key: String,
  #[serde(default)]
  pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiStatus {
  #[serde(default)]
  pub id: String,
  #[serde(default)]
  pub name: String,
  #[serde(rename = "statusCategory", default)]
  pub status_category: Option<ApiStatusCategory>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiIssueType {
  #[serde(default)]
  pub id: String,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub subtask: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiPriority {
  #[serde(default)]
  pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiTimeTracking {
  #[serde(rename = "timeSpent", default)]
  pub time_spent: Option<String>,
  #[serde(rename = "originalEstimate", default)]
  pub original_estimate: Option<String>,
  #[serde(rename = "timeSpentSeconds", default)]
  pub time_spent_seconds: Option<u64>,
  #[serde(rename = "originalEstimateSeconds", default)]
  pub original_estimate_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiComment {
  #[serde(default)]
  pub author: Option<ApiUser>,
  /// ADF document (API v3) or plain string (API v2)
  #[serde(default)]
  pub body: Option<serde_json::Value>,
  #[serde(default)]
  pub created: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiCommentPage {
  #[serde(default)]
  pub comments: Vec<ApiComment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiIssueRef {
  #[serde(default)]
  pub id: String,
  pub key: String,
}

// ============================================================================
// Issue search
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiIssueFields {
  #[serde(default)]
  pub summary: String,
  pub status: Option<ApiStatus>,
  #[serde(rename = "issuetype")]
  pub issue_type: Option<ApiIssueType>,
  pub assignee: Option<ApiUser>,
  pub priority: Option<ApiPriority>,
  #[serde(default)]
  pub labels: Vec<String>,
  pub timetracking: Option<ApiTimeTracking>,
  pub comment: Option<ApiCommentPage>,
  pub parent: Option<ApiIssueRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiIssue {
  #[serde(default)]
  pub id: String,
  pub key: String,
  #[serde(default)]
  pub fields: ApiIssueFields,
}

/// Response of `POST /rest/api/3/search/jql` (token paginated).
#[derive(Debug, Default, Deserialize)]
pub struct ApiSearchPage {
  #[serde(default)]
  pub issues: Vec<ApiIssue>,
  #[serde(rename = "nextPageToken", default)]
  pub next_page_token: Option<String>,
  #[serde(rename = "isLast", default)]
  pub is_last: bool,
}

// ============================================================================
// Projects and issue creation
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiProject {
  #[serde(default)]
  pub id: String,
  pub key: String,
  #[serde(default)]
  pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiProjectPage {
  #[serde(default)]
  pub values: Vec<ApiProject>,
  #[serde(rename = "isLast", default = "default_true")]
  pub is_last: bool,
}

/// Response of `GET /issue/createmeta/{project}/issuetypes`
#[derive(Debug, Deserialize)]
pub struct ApiCreateMetaIssueTypes {
  #[serde(rename = "issueTypes", alias = "values", default)]
  pub issue_types: Vec<ApiIssueType>,
}

fn default_true() -> bool {
  true
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_search_page_parses_sparse_issue() {
    let page: ApiSearchPage = serde_json::from_str(
      r#"{"issues": [{"id": "1", "key": "OPS-1", "fields": {"summary": "Disk full"}}], "isLast": true}"#,
    )
    .unwrap();
    assert!(page.is_last);
    assert_eq!(page.issues[0].key, "OPS-1");
    assert!(page.issues[0].fields.assignee.is_none());
    assert!(page.issues[0].fields.timetracking.is_none());
  }

  #[test]
  fn test_createmeta_accepts_values_alias() {
    let meta: ApiCreateMetaIssueTypes =
      serde_json::from_str(r#"{"values": [{"id": "3", "name": "Task", "subtask": false}]}"#).unwrap();
    assert_eq!(meta.issue_types[0].name, "Task");
  }
}
