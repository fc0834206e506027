//! Named operations behind the CLI, each run as the right identity.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::filters::FilterSet;
use crate::jira::adf;
use crate::jira::fetch::fetch_issues;
use crate::jira::types::{IssueRow, ProjectOption, StatusOption, UserOption};
use crate::jira::{Identity, JiraApi};
use crate::jql;
use crate::report::export::{resolve_fields, CommentMode, ExportFormat, Table};
use crate::report::pdf;
use crate::report::extract::issue_rows;
use crate::report::sort::{sort_rows, SortSpec};
use crate::report::summary::ReportSummary;
use crate::reports::{self, Report, SaveReportRequest};
use crate::schedule::delivery::DeliveryOrchestrator;
use crate::schedule::runner::{RunSummary, ScheduleRunner};
use crate::schedule::store::ScheduleStore;
use crate::store::KvStore;

/// A user to mention, as the pickers send it (`value` is the account id)
#[derive(Debug, Clone, Deserialize)]
pub struct Mention {
  pub value: String,
  pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
  Success,
  Failed,
}

/// Per-issue outcome of a bulk comment
#[derive(Debug, Clone, Serialize)]
pub struct CommentResult {
  pub key: String,
  pub status: CommentStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuccessResult {
  pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerResult {
  pub success: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ticket: Option<String>,
}

pub struct ReportService<J: JiraApi, S: KvStore> {
  config: Config,
  user: J,
  service: J,
  store: S,
}

impl<J: JiraApi, S: KvStore> ReportService<J, S> {
  pub fn new(config: Config, user: J, service: J, store: S) -> Self {
    Self {
      config,
      user,
      service,
      store,
    }
  }

  pub fn act_as(&self, identity: Identity) -> &J {
    match identity {
      Identity::User => &self.user,
      Identity::Service => &self.service,
    }
  }

  fn orchestrator(&self) -> DeliveryOrchestrator<'_, J> {
    DeliveryOrchestrator::new(
      self.act_as(Identity::Service),
      &self.config.jira.url,
      &self.config.delivery.default_message,
      self.config.delivery.max_issues,
    )
  }

  // ============================================================================
  // Issues
  // ============================================================================

  /// Search as the user and normalize the results.
  pub async fn build_and_fetch_issues(
    &self,
    filters: &FilterSet,
    sort: Option<SortSpec>,
  ) -> Result<Vec<IssueRow>> {
    let query = jql::build(filters);
    let result = fetch_issues(
      self.act_as(Identity::User),
      &query,
      self.config.delivery.max_issues,
    )
    .await;
    if let Some(reason) = result.error {
      return Err(eyre!("Issue search failed: {}", reason));
    }

    let mut rows = issue_rows(result.issues, &self.config.jira.url);
    if let Some(spec) = sort {
      sort_rows(&mut rows, spec);
    }
    Ok(rows)
  }

  /// The matching issues encoded as `format`
  pub async fn export_issues(
    &self,
    filters: &FilterSet,
    format: ExportFormat,
    comment_mode: CommentMode,
    fields: &[String],
    sort: Option<SortSpec>,
  ) -> Result<Vec<u8>> {
    let rows = self.build_and_fetch_issues(filters, sort).await?;
    let table = Table::build(&rows, &resolve_fields(fields), comment_mode);
    info!(rows = rows.len(), format = ?format, "Exporting issues");
    match format {
      ExportFormat::Xlsx => table.to_xlsx(),
      ExportFormat::Csv => table.to_csv(),
      ExportFormat::Pdf => pdf::render(&table, &ReportSummary::from_rows(&rows), Utc::now()),
    }
  }

  /// Post the same comment on every issue. One failure does not stop the rest.
  pub async fn bulk_add_comment(
    &self,
    keys: &[String],
    text: &str,
    mentions: &[Mention],
  ) -> Vec<CommentResult> {
    let mut content = vec![adf::paragraph(vec![adf::text(text)])];
    if let Some(cc) = adf::cc_paragraph(
      mentions
        .iter()
        .map(|m| (m.value.as_str(), m.label.as_str())),
    ) {
      content.push(cc);
    }
    let body = adf::doc(content);

    let jira = self.act_as(Identity::User);
    let mut results = Vec::with_capacity(keys.len());
    for key in keys {
      let result = match jira.add_comment(key, &body).await {
        Ok(()) => CommentResult {
          key: key.clone(),
          status: CommentStatus::Success,
          error: None,
        },
        Err(e) => {
          warn!(issue_key = %key, error = %e, "Comment failed");
          CommentResult {
            key: key.clone(),
            status: CommentStatus::Failed,
            error: Some(e.to_string()),
          }
        }
      };
      results.push(result);
    }
    results
  }

  // ============================================================================
  // Schedules
  // ============================================================================

  /// Deliver one schedule immediately. `lastRun` is left alone, so the
  /// regular run still fires.
  pub async fn trigger_schedule_now(&self, email: &str) -> Result<TriggerResult> {
    self.trigger_schedule_at(email, Utc::now()).await
  }

  async fn trigger_schedule_at(&self, email: &str, now: DateTime<Utc>) -> Result<TriggerResult> {
    let Some(schedule) = ScheduleStore::new(&self.store).find_by_email(email)? else {
      return Ok(TriggerResult {
        success: false,
        message: format!("No schedule found for {}", email.trim()),
        ticket: None,
      });
    };

    info!(email = %schedule.email, "Manual delivery requested");
    Ok(match self.orchestrator().deliver(&schedule, now).await {
      Ok(delivered) => TriggerResult {
        success: true,
        message: format!("Report delivered to {}", delivered.ticket),
        ticket: Some(delivered.ticket),
      },
      Err(failure) => TriggerResult {
        success: false,
        message: failure.reason,
        ticket: None,
      },
    })
  }

  /// Timer entry point
  pub async fn run_schedules(&self) -> Result<RunSummary> {
    ScheduleRunner::new(&self.store, self.orchestrator()).run().await
  }

  // ============================================================================
  // Saved reports
  // ============================================================================

  async fn caller(&self) -> Result<String> {
    let me = self
      .act_as(Identity::User)
      .myself()
      .await
      .map_err(|e| eyre!("Failed to resolve current user: {}", e))?;
    if me.account_id.is_empty() {
      return Err(eyre!("Current user has no account id"));
    }
    Ok(me.account_id)
  }

  pub async fn save_report(&self, request: SaveReportRequest) -> Result<Report> {
    let owner = self.caller().await?;
    reports::save_report(&self.store, &owner, request, Utc::now())
  }

  pub async fn list_reports(&self, project_key: Option<&str>) -> Result<Vec<Report>> {
    let caller = self.caller().await?;
    reports::list_reports(&self.store, &caller, project_key)
  }

  pub async fn delete_report(&self, id: &str) -> Result<SuccessResult> {
    let caller = self.caller().await?;
    reports::delete_report(&self.store, &caller, id)?;
    Ok(SuccessResult { success: true })
  }

  // ============================================================================
  // Pickers
  // ============================================================================

  pub async fn projects(&self) -> Result<Vec<ProjectOption>> {
    let projects = self.act_as(Identity::User).projects().await?;
    Ok(
      projects
        .into_iter()
        .map(|p| ProjectOption {
          label: p.name,
          value: p.id,
          key: p.key,
        })
        .collect(),
    )
  }

  pub async fn users(&self, query: &str) -> Result<Vec<UserOption>> {
    let users = self.act_as(Identity::User).search_users(query).await?;
    Ok(
      users
        .into_iter()
        .filter(|u| !u.account_id.is_empty())
        .map(|u| UserOption {
          avatar_url: u.avatar_24(),
          label: u.display_name,
          value: u.account_id,
        })
        .collect(),
    )
  }

  /// Status names, deduplicated across projects
  pub async fn statuses(&self) -> Result<Vec<StatusOption>> {
    let statuses = self.act_as(Identity::User).statuses().await?;
    let mut options: Vec<StatusOption> = Vec::new();
    for status in statuses {
      if !options.iter().any(|o| o.value == status.name) {
        options.push(StatusOption {
          label: status.name.clone(),
          value: status.name,
        });
      }
    }
    Ok(options)
  }

  /// Email of the user, when the tracker exposes it
  pub async fn current_user_email(&self) -> Result<Option<String>> {
    let me = self.act_as(Identity::User).myself().await?;
    Ok(me.email_address.filter(|e| !e.is_empty()))
  }
}
