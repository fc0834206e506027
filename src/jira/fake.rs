//! In-memory [`JiraApi`] for tests.

use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::api_types::{
  ApiIssue, ApiIssueFields, ApiIssueRef, ApiIssueType, ApiProject, ApiSearchPage, ApiStatus,
  ApiUser,
};
use super::types::NewIssue;
use super::JiraApi;

/// A recorded call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
  Search { jql: String, fields: Vec<String> },
  Myself,
  Projects,
  Statuses,
  SearchUsers(String),
  GetIssue(String),
  CreateIssueTypes(String),
  CreateIssue {
    project_key: String,
    issue_type_id: String,
    summary: String,
    description: Value,
    assignee: Option<String>,
  },
  Attach { issue_key: String, file_name: String, size: usize },
  Comment { issue_key: String, body: Value },
  Watch { issue_key: String, account_id: String },
}

#[derive(Default)]
struct State {
  me: ApiUser,
  issues: Vec<ApiIssue>,
  projects: Vec<ApiProject>,
  statuses: Vec<ApiStatus>,
  issue_types: HashMap<String, Vec<ApiIssueType>>,
  users: Vec<ApiUser>,
  existing: HashSet<String>,
  failures: HashMap<String, String>,
  panics: HashSet<String>,
  calls: Vec<Call>,
  next_issue: u32,
}

#[derive(Default)]
pub struct FakeJira {
  state: Mutex<State>,
}

pub fn issue(key: &str) -> ApiIssue {
  ApiIssue {
    id: key.trim_start_matches(|c: char| !c.is_ascii_digit()).to_string(),
    key: key.to_string(),
    fields: ApiIssueFields {
      summary: format!("Summary of {}", key),
      ..Default::default()
    },
  }
}

pub fn user(account_id: &str, name: &str, email: Option<&str>) -> ApiUser {
  ApiUser {
    account_id: account_id.to_string(),
    display_name: name.to_string(),
    email_address: email.map(String::from),
    ..Default::default()
  }
}

pub fn issue_type(id: &str, name: &str, subtask: bool) -> ApiIssueType {
  ApiIssueType {
    id: id.to_string(),
    name: name.to_string(),
    subtask,
  }
}

impl FakeJira {
  fn lock(&self) -> std::sync::MutexGuard<'_, State> {
    self.state.lock().unwrap()
  }

  pub fn set_me(&self, me: ApiUser) {
    self.lock().me = me;
  }

  pub fn set_issues(&self, issues: Vec<ApiIssue>) {
    self.lock().issues = issues;
  }

  pub fn add_project(&self, key: &str) {
    self.lock().projects.push(ApiProject {
      id: format!("1000{}", key.len()),
      key: key.to_string(),
      name: format!("{} project", key),
    });
  }

  pub fn add_status(&self, name: &str) {
    self.lock().statuses.push(ApiStatus {
      id: name.to_lowercase(),
      name: name.to_string(),
      status_category: None,
    });
  }

  pub fn set_issue_types(&self, project_key: &str, types: Vec<ApiIssueType>) {
    self.lock().issue_types.insert(project_key.to_string(), types);
  }

  pub fn add_user(&self, user: ApiUser) {
    self.lock().users.push(user);
  }

  pub fn add_existing_issue(&self, key: &str) {
    self.lock().existing.insert(key.to_string());
  }

  /// Make `op` return an error with `message`
  pub fn fail(&self, op: &str, message: &str) {
    self.lock().failures.insert(op.to_string(), message.to_string());
  }

  pub fn panic_on(&self, op: &str) {
    self.lock().panics.insert(op.to_string());
  }

  pub fn calls(&self) -> Vec<Call> {
    self.lock().calls.clone()
  }

  pub fn search_calls(&self) -> usize {
    self
      .calls()
      .iter()
      .filter(|c| matches!(c, Call::Search { .. }))
      .count()
  }

  pub fn last_search(&self) -> Option<(String, Vec<String>)> {
    self.calls().into_iter().rev().find_map(|c| match c {
      Call::Search { jql, fields } => Some((jql, fields)),
      _ => None,
    })
  }

  fn record(&self, op: &str, call: Call) -> Result<()> {
    let mut state = self.lock();
    state.calls.push(call);
    if state.panics.contains(op) {
      drop(state);
      panic!("fake {} exploded", op);
    }
    match state.failures.get(op) {
      Some(message) => Err(eyre!("{}", message)),
      None => Ok(()),
    }
  }
}

impl JiraApi for FakeJira {
  async fn search_page(
    &self,
    jql: &str,
    fields: &[&str],
    max_results: u32,
    next_page_token: Option<&str>,
  ) -> Result<ApiSearchPage> {
    self.record(
      "search",
      Call::Search {
        jql: jql.to_string(),
        fields: fields.iter().map(|f| f.to_string()).collect(),
      },
    )?;

    let state = self.lock();
    let start: usize = next_page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
    let end = (start + max_results as usize).min(state.issues.len());
    let issues = state.issues[start.min(end)..end].to_vec();
    let is_last = end >= state.issues.len();

    Ok(ApiSearchPage {
      issues,
      next_page_token: (!is_last).then(|| end.to_string()),
      is_last,
    })
  }

  async fn myself(&self) -> Result<ApiUser> {
    self.record("myself", Call::Myself)?;
    Ok(self.lock().me.clone())
  }

  async fn projects(&self) -> Result<Vec<ApiProject>> {
    self.record("projects", Call::Projects)?;
    Ok(self.lock().projects.clone())
  }

  async fn statuses(&self) -> Result<Vec<ApiStatus>> {
    self.record("statuses", Call::Statuses)?;
    Ok(self.lock().statuses.clone())
  }

  async fn search_users(&self, query: &str) -> Result<Vec<ApiUser>> {
    self.record("search_users", Call::SearchUsers(query.to_string()))?;
    let q = query.to_lowercase();
    Ok(
      self
        .lock()
        .users
        .iter()
        .filter(|u| {
          u.display_name.to_lowercase().contains(&q)
            || u
              .email_address
              .as_deref()
              .map(|e| e.to_lowercase().contains(&q))
              .unwrap_or(false)
            // The real endpoint also matches on hidden email addresses
            || q.contains('@')
        })
        .cloned()
        .collect(),
    )
  }

  async fn get_issue(&self, key: &str) -> Result<ApiIssueRef> {
    self.record("get_issue", Call::GetIssue(key.to_string()))?;
    if self.lock().existing.contains(key) {
      Ok(ApiIssueRef {
        id: "1".to_string(),
        key: key.to_string(),
      })
    } else {
      Err(eyre!("404 Not Found: Issue does not exist or you do not have permission to see it."))
    }
  }

  async fn create_issue_types(&self, project_key: &str) -> Result<Vec<ApiIssueType>> {
    self.record(
      "create_issue_types",
      Call::CreateIssueTypes(project_key.to_string()),
    )?;
    Ok(
      self
        .lock()
        .issue_types
        .get(project_key)
        .cloned()
        .unwrap_or_default(),
    )
  }

  async fn create_issue(&self, issue: &NewIssue) -> Result<ApiIssueRef> {
    self.record(
      "create_issue",
      Call::CreateIssue {
        project_key: issue.project_key.clone(),
        issue_type_id: issue.issue_type_id.clone(),
        summary: issue.summary.clone(),
        description: issue.description.clone(),
        assignee: issue.assignee_account_id.clone(),
      },
    )?;
    let mut state = self.lock();
    state.next_issue += 1;
    let key = format!("{}-{}", issue.project_key, 100 + state.next_issue);
    state.existing.insert(key.clone());
    Ok(ApiIssueRef {
      id: state.next_issue.to_string(),
      key,
    })
  }

  async fn add_attachment(&self, issue_key: &str, file_name: &str, content: Vec<u8>) -> Result<()> {
    self.record(
      "add_attachment",
      Call::Attach {
        issue_key: issue_key.to_string(),
        file_name: file_name.to_string(),
        size: content.len(),
      },
    )
  }

  async fn add_comment(&self, issue_key: &str, body: &Value) -> Result<()> {
    self.record(
      "add_comment",
      Call::Comment {
        issue_key: issue_key.to_string(),
        body: body.clone(),
      },
    )
  }

  async fn add_watcher(&self, issue_key: &str, account_id: &str) -> Result<()> {
    self.record(
      "add_watcher",
      Call::Watch {
        issue_key: issue_key.to_string(),
        account_id: account_id.to_string(),
      },
    )
  }
}
