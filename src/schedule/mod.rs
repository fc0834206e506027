//! Recurring report deliveries: the schedule model, its store, due-time
//! evaluation, the delivery pipeline and the timer entry point.

pub mod delivery;
pub mod evaluator;
pub mod runner;
pub mod store;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};

use crate::filters::FilterSet;
use crate::report::export::CommentMode;

/// Monday, in the Sunday = 0 numbering used by `weekDay`
pub const DEFAULT_WEEK_DAY: u8 = 1;
pub const DEFAULT_MONTH_DATE: u8 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
  #[default]
  Daily,
  Weekly,
  Monthly,
}

/// Where a delivery lands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Destination {
  #[default]
  CreateIssue,
  CommentOnIssue,
  /// Materialized as a new issue, like `CreateIssue`
  Email,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
  #[serde(default)]
  pub id: String,
  pub email: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub account_id: Option<String>,
  #[serde(default = "default_active")]
  pub active: bool,
  #[serde(default)]
  pub frequency: Frequency,
  /// `HH:MM`, UTC
  #[serde(default)]
  pub time: Option<String>,
  /// 0-6, Sunday = 0
  #[serde(default)]
  pub week_day: Option<u8>,
  /// 1-31
  #[serde(default)]
  pub month_date: Option<u8>,
  #[serde(default)]
  pub destination: Destination,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target_issue_key: Option<String>,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub filters: FilterSet,
  #[serde(default)]
  pub selected_fields: Vec<String>,
  #[serde(default)]
  pub comment_mode: CommentMode,
  #[serde(default)]
  pub last_run: Option<DateTime<Utc>>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
  true
}

impl Schedule {
  /// A daily schedule with defaults for everything but the recipient
  pub fn new(email: impl Into<String>) -> Self {
    Self {
      id: String::new(),
      email: email.into(),
      account_id: None,
      active: true,
      frequency: Frequency::Daily,
      time: None,
      week_day: None,
      month_date: None,
      destination: Destination::CreateIssue,
      target_issue_key: None,
      message: None,
      filters: FilterSet::default(),
      selected_fields: Vec::new(),
      comment_mode: CommentMode::Last,
      last_run: None,
      created_at: None,
    }
  }

  /// Hour of `time`, or `None` when unset or unparseable
  pub fn hour(&self) -> Option<u32> {
    let time = self.time.as_deref()?.trim();
    NaiveTime::parse_from_str(time, "%H:%M").ok().map(|t| t.hour())
  }

  pub fn week_day_or_default(&self) -> u8 {
    self.week_day.unwrap_or(DEFAULT_WEEK_DAY)
  }

  pub fn month_date_or_default(&self) -> u8 {
    self.month_date.unwrap_or(DEFAULT_MONTH_DATE)
  }

  /// Target issue key for comment deliveries, trimmed
  pub fn target_key(&self) -> Option<&str> {
    self
      .target_issue_key
      .as_deref()
      .map(str::trim)
      .filter(|k| !k.is_empty())
  }

  /// Emails compare trimmed and case-insensitive
  pub fn has_email(&self, email: &str) -> bool {
    self.email.trim().eq_ignore_ascii_case(email.trim())
  }

  /// Checks that need no tracker access.
  pub fn validate(&self) -> Result<()> {
    if self.email.trim().is_empty() {
      return Err(eyre!("Schedule has no recipient email"));
    }
    if self.destination == Destination::CommentOnIssue && self.target_key().is_none() {
      return Err(eyre!("Target issue key is required for comment-on-issue delivery"));
    }
    if let Some(day) = self.week_day {
      if day > 6 {
        return Err(eyre!("weekDay must be between 0 (Sunday) and 6, got {}", day));
      }
    }
    if let Some(date) = self.month_date {
      if !(1..=31).contains(&date) {
        return Err(eyre!("monthDate must be between 1 and 31, got {}", date));
      }
    }
    Ok(())
  }
}
