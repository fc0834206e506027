//! Tracker access: wire types, the HTTP client and the operations the rest of
//! the crate needs from it.

pub mod adf;
pub mod api_types;
pub mod client;
pub mod fetch;
pub mod types;

#[cfg(test)]
pub mod fake;

use color_eyre::Result;
use serde_json::Value;
use std::future::Future;

use api_types::{ApiIssueRef, ApiIssueType, ApiProject, ApiSearchPage, ApiStatus, ApiUser};
use types::NewIssue;

/// Who a request is made as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
  /// The interactively logged-in user
  User,
  /// App-level credential for scheduled work
  Service,
}

/// Tracker operations used by reports and deliveries.
///
/// Every non-2xx response is an `Err` carrying the status and response body.
pub trait JiraApi: Send + Sync {
  fn search_page(
    &self,
    jql: &str,
    fields: &[&str],
    max_results: u32,
    next_page_token: Option<&str>,
  ) -> impl Future<Output = Result<ApiSearchPage>> + Send;

  fn myself(&self) -> impl Future<Output = Result<ApiUser>> + Send;

  /// All projects visible to the caller
  fn projects(&self) -> impl Future<Output = Result<Vec<ApiProject>>> + Send;

  fn statuses(&self) -> impl Future<Output = Result<Vec<ApiStatus>>> + Send;

  fn search_users(&self, query: &str) -> impl Future<Output = Result<Vec<ApiUser>>> + Send;

  fn get_issue(&self, key: &str) -> impl Future<Output = Result<ApiIssueRef>> + Send;

  /// Issue types allowed when creating issues in a project
  fn create_issue_types(
    &self,
    project_key: &str,
  ) -> impl Future<Output = Result<Vec<ApiIssueType>>> + Send;

  fn create_issue(&self, issue: &NewIssue) -> impl Future<Output = Result<ApiIssueRef>> + Send;

  fn add_attachment(
    &self,
    issue_key: &str,
    file_name: &str,
    content: Vec<u8>,
  ) -> impl Future<Output = Result<()>> + Send;

  /// Post a comment whose body is an ADF document
  fn add_comment(&self, issue_key: &str, body: &Value) -> impl Future<Output = Result<()>> + Send;

  fn add_watcher(&self, issue_key: &str, account_id: &str)
    -> impl Future<Output = Result<()>> + Send;
}
