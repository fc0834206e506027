//! The delivery pipeline for one schedule.
//!
//! Search, export, destination and issue creation are fatal steps.
//! Attachment, comment and watcher calls only add warnings.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tracing::{error, info, warn};

use super::{Destination, Schedule};
use crate::jira::adf;
use crate::jira::api_types::{ApiIssueType, ApiUser};
use crate::jira::fetch::fetch_issues;
use crate::jira::types::NewIssue;
use crate::jira::JiraApi;
use crate::jql;
use crate::report::export::{resolve_fields, Table};
use crate::report::extract::issue_rows;

/// Issue type names tried in order before falling back to any non-subtask
const PREFERRED_ISSUE_TYPES: &[&str] = &["Task", "Story"];

/// A finished delivery
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivered {
  /// Key of the issue the report landed on
  pub ticket: String,
  /// Whether `ticket` was created by this delivery
  pub created: bool,
  pub issue_count: usize,
  /// Non-fatal step failures
  pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
  pub reason: String,
}

impl DeliveryFailure {
  fn new(reason: impl Into<String>) -> Self {
    Self {
      reason: reason.into(),
    }
  }
}

impl fmt::Display for DeliveryFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.reason)
  }
}

/// Account notified about a delivery
#[derive(Debug, Clone, PartialEq, Eq)]
struct Recipient {
  account_id: String,
  display_name: String,
}

enum Target {
  Existing(String),
  New {
    project_key: String,
    issue_type_id: String,
  },
}

pub struct DeliveryOrchestrator<'a, J: JiraApi> {
  jira: &'a J,
  site: &'a str,
  default_message: &'a str,
  max_issues: usize,
}

impl<'a, J: JiraApi> DeliveryOrchestrator<'a, J> {
  /// `jira` should act as the service identity.
  pub fn new(jira: &'a J, site: &'a str, default_message: &'a str, max_issues: usize) -> Self {
    Self {
      jira,
      site,
      default_message,
      max_issues,
    }
  }

  /// Deliver one schedule's report.
  ///
  /// Never panics or propagates errors: every failure, including a panic
  /// inside the pipeline, comes back as a [`DeliveryFailure`].
  pub async fn deliver(
    &self,
    schedule: &Schedule,
    now: DateTime<Utc>,
  ) -> Result<Delivered, DeliveryFailure> {
    if let Err(e) = schedule.validate() {
      warn!(email = %schedule.email, error = %e, "Invalid schedule");
      return Err(DeliveryFailure::new(e.to_string()));
    }

    match AssertUnwindSafe(self.pipeline(schedule, now))
      .catch_unwind()
      .await
    {
      Ok(Ok(delivered)) => {
        info!(
          email = %schedule.email,
          ticket = %delivered.ticket,
          issues = delivered.issue_count,
          warnings = delivered.warnings.len(),
          "Delivered scheduled report"
        );
        Ok(delivered)
      }
      Ok(Err(failure)) => {
        warn!(email = %schedule.email, reason = %failure.reason, "Scheduled report not delivered");
        Err(failure)
      }
      Err(panic) => {
        let reason = format!("Unexpected error: {}", panic_message(panic.as_ref()));
        error!(email = %schedule.email, reason = %reason, "Delivery panicked");
        Err(DeliveryFailure::new(reason))
      }
    }
  }

  async fn pipeline(
    &self,
    schedule: &Schedule,
    now: DateTime<Utc>,
  ) -> Result<Delivered, DeliveryFailure> {
    let query = jql::build(&schedule.filters);
    let result = fetch_issues(self.jira, &query, self.max_issues).await;
    if let Some(reason) = result.error {
      return Err(DeliveryFailure::new(format!("Issue search failed: {}", reason)));
    }
    if result.is_empty() {
      return Err(DeliveryFailure::new("No issues found matching the criteria"));
    }

    let issue_count = result.issues.len();
    let rows = issue_rows(result.issues, self.site);
    let fields = resolve_fields(&schedule.selected_fields);
    let spreadsheet = Table::build(&rows, &fields, schedule.comment_mode)
      .to_xlsx()
      .map_err(|e| DeliveryFailure::new(format!("Failed to build spreadsheet: {}", e)))?;

    let target = self.resolve_target(schedule).await?;

    let mut warnings = Vec::new();
    let recipient = self.resolve_recipient(schedule, &mut warnings).await;
    let message = schedule
      .message
      .as_deref()
      .map(str::trim)
      .filter(|m| !m.is_empty())
      .unwrap_or(self.default_message);
    let date = now.format("%Y-%m-%d").to_string();

    let (ticket, created) = match target {
      Target::Existing(key) => (key, false),
      Target::New {
        project_key,
        issue_type_id,
      } => {
        let issue = NewIssue {
          summary: format!("Scheduled Jira report ({})", date),
          description: adf::plain_document(message),
          assignee_account_id: recipient.as_ref().map(|r| r.account_id.clone()),
          project_key,
          issue_type_id,
        };
        let created = self.jira.create_issue(&issue).await.map_err(|e| {
          DeliveryFailure::new(format!(
            "Failed to create issue in {}: {}",
            issue.project_key, e
          ))
        })?;
        info!(ticket = %created.key, project = %issue.project_key, "Created report issue");
        (created.key, true)
      }
    };

    let file_name = format!("jira_report_{}.xlsx", date);
    if let Err(e) = self
      .jira
      .add_attachment(&ticket, &file_name, spreadsheet)
      .await
    {
      warn!(issue_key = %ticket, error = %e, "Attachment upload failed");
      warnings.push(format!("Attachment upload failed: {}", e));
    }

    let body = comment_body(message, recipient.as_ref());
    if let Err(e) = self.jira.add_comment(&ticket, &body).await {
      warn!(issue_key = %ticket, error = %e, "Notification comment failed");
      warnings.push(format!("Comment failed: {}", e));
    }

    if let Some(r) = &recipient {
      if let Err(e) = self.jira.add_watcher(&ticket, &r.account_id).await {
        warn!(issue_key = %ticket, account_id = %r.account_id, error = %e, "Adding watcher failed");
        warnings.push(format!("Adding watcher failed: {}", e));
      }
    }

    Ok(Delivered {
      ticket,
      created,
      issue_count,
      warnings,
    })
  }

  async fn resolve_target(&self, schedule: &Schedule) -> Result<Target, DeliveryFailure> {
    if schedule.destination == Destination::CommentOnIssue {
      let key = schedule.target_key().unwrap_or_default();
      let issue = self.jira.get_issue(key).await.map_err(|e| {
        DeliveryFailure::new(format!(
          "Target issue {} not found or not accessible: {}",
          key, e
        ))
      })?;
      return Ok(Target::Existing(issue.key));
    }

    let project_key = match schedule.filters.first_project_key() {
      Some(key) => key.to_string(),
      None => self
        .jira
        .projects()
        .await
        .map_err(|e| DeliveryFailure::new(format!("Failed to list projects: {}", e)))?
        .into_iter()
        .next()
        .map(|p| p.key)
        .ok_or_else(|| DeliveryFailure::new("No project available to create the report issue"))?,
    };

    let types = self
      .jira
      .create_issue_types(&project_key)
      .await
      .map_err(|e| {
        DeliveryFailure::new(format!(
          "Failed to load issue types for {}: {}",
          project_key, e
        ))
      })?;
    let issue_type = pick_issue_type(&types).ok_or_else(|| {
      DeliveryFailure::new(format!("No usable issue type in project {}", project_key))
    })?;

    Ok(Target::New {
      issue_type_id: issue_type.id.clone(),
      project_key,
    })
  }

  /// The schedule's account, else a user search by email. Lookup failures
  /// only cost the notification.
  async fn resolve_recipient(
    &self,
    schedule: &Schedule,
    warnings: &mut Vec<String>,
  ) -> Option<Recipient> {
    let email = schedule.email.trim();
    if let Some(id) = schedule.account_id.as_deref().filter(|id| !id.is_empty()) {
      return Some(Recipient {
        account_id: id.to_string(),
        display_name: email.to_string(),
      });
    }

    match self.jira.search_users(email).await {
      Ok(users) => pick_recipient(users, email),
      Err(e) => {
        warn!(email = %email, error = %e, "Recipient lookup failed");
        warnings.push(format!("Recipient lookup failed: {}", e));
        None
      }
    }
  }
}

/// Task, then Story, then the first non-subtask type, then anything.
fn pick_issue_type(types: &[ApiIssueType]) -> Option<&ApiIssueType> {
  PREFERRED_ISSUE_TYPES
    .iter()
    .find_map(|name| types.iter().find(|t| t.name.eq_ignore_ascii_case(name)))
    .or_else(|| types.iter().find(|t| !t.subtask))
    .or_else(|| types.first())
}

/// Exact email match if the tracker exposes emails, else the first hit.
fn pick_recipient(users: Vec<ApiUser>, email: &str) -> Option<Recipient> {
  let exact = users.iter().position(|u| {
    u.email_address
      .as_deref()
      .is_some_and(|e| e.trim().eq_ignore_ascii_case(email))
  });
  let user = users.into_iter().nth(exact.unwrap_or(0))?;
  if user.account_id.is_empty() {
    return None;
  }
  Some(Recipient {
    account_id: user.account_id,
    display_name: user.display_name,
  })
}

fn comment_body(message: &str, recipient: Option<&Recipient>) -> Value {
  let mut content = vec![adf::paragraph(vec![adf::text(message)])];
  if let Some(cc) =
    adf::cc_paragraph(recipient.map(|r| (r.account_id.as_str(), r.display_name.as_str())))
  {
    content.push(cc);
  }
  adf::doc(content)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    s.to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "panic".to_string()
  }
}
