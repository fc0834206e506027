//! Issue search with pagination and error-to-empty normalization.

use tracing::{debug, error};

use super::api_types::ApiIssue;
use super::JiraApi;
use crate::jql::Jql;

/// Fields requested for every report search
pub const SEARCH_FIELDS: &[&str] = &[
  "summary",
  "status",
  "assignee",
  "timetracking",
  "worklog",
  "comment",
  "priority",
  "labels",
  "parent",
  "issuetype",
];

const PAGE_SIZE: u32 = 100;

/// Issues found by a search, or an empty list plus the reason the search failed.
#[derive(Debug, Default)]
pub struct FetchResult {
  pub issues: Vec<ApiIssue>,
  pub error: Option<String>,
}

impl FetchResult {
  pub fn is_empty(&self) -> bool {
    self.issues.is_empty()
  }
}

/// Run `jql` through the search endpoint, collecting at most `limit` issues.
///
/// Never fails: an upstream error is logged and returned as an empty result
/// with `error` set.
pub async fn fetch_issues<J: JiraApi>(api: &J, jql: &Jql, limit: usize) -> FetchResult {
  let limit = limit.max(1);
  let mut issues: Vec<ApiIssue> = Vec::new();
  let mut next_page_token: Option<String> = None;

  loop {
    let remaining = limit - issues.len();
    let page_size = PAGE_SIZE.min(u32::try_from(remaining).unwrap_or(PAGE_SIZE));

    let page = match api
      .search_page(
        jql.as_str(),
        SEARCH_FIELDS,
        page_size,
        next_page_token.as_deref(),
      )
      .await
    {
      Ok(page) => page,
      Err(e) => {
        error!(jql = %jql, error = %e, "Issue search failed");
        return FetchResult {
          issues: Vec::new(),
          error: Some(e.to_string()),
        };
      }
    };

    let count = page.issues.len();
    issues.extend(page.issues);

    if issues.len() >= limit {
      issues.truncate(limit);
      break;
    }
    match page.next_page_token {
      Some(token) if !page.is_last && count > 0 => next_page_token = Some(token),
      _ => break,
    }
  }

  debug!(jql = %jql, count = issues.len(), "Fetched issues");
  FetchResult {
    issues,
    error: None,
  }
}
