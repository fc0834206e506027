//! Structured filter state shared by interactive queries, saved reports and schedules.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One selected option of a multi-select filter.
///
/// Mirrors the `{label, value, key}` shape the filter pickers emit. `value`
/// and `key` may arrive as JSON strings or numbers (project and sprint ids).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOption {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  #[serde(
    default,
    deserialize_with = "lenient_string",
    skip_serializing_if = "Option::is_none"
  )]
  pub value: Option<String>,
  #[serde(
    default,
    deserialize_with = "lenient_string",
    skip_serializing_if = "Option::is_none"
  )]
  pub key: Option<String>,
}

impl FilterOption {
  pub fn value(value: impl Into<String>) -> Self {
    Self {
      value: Some(value.into()),
      ..Self::default()
    }
  }

  pub fn keyed(key: impl Into<String>) -> Self {
    Self {
      key: Some(key.into()),
      ..Self::default()
    }
  }
}

/// User-editable query intent.
///
/// An empty list or a missing bound means "no constraint on that dimension".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSet {
  #[serde(deserialize_with = "lenient_options")]
  pub project: Vec<FilterOption>,
  #[serde(deserialize_with = "lenient_options")]
  pub assignee: Vec<FilterOption>,
  #[serde(deserialize_with = "lenient_options")]
  pub status: Vec<FilterOption>,
  #[serde(deserialize_with = "lenient_options")]
  pub issue_type: Vec<FilterOption>,
  #[serde(deserialize_with = "lenient_options")]
  pub priority: Vec<FilterOption>,
  #[serde(deserialize_with = "lenient_options")]
  pub labels: Vec<FilterOption>,
  #[serde(deserialize_with = "lenient_options")]
  pub parent: Vec<FilterOption>,
  #[serde(deserialize_with = "lenient_options")]
  pub sprint: Vec<FilterOption>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub start_date: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub end_date: Option<String>,
  pub exceeded_only: bool,
}

impl FilterSet {
  /// First selected project, resolved the way the query resolves it. Used as
  /// the default destination project.
  pub fn first_project_key(&self) -> Option<&str> {
    self.project.iter().find_map(crate::jql::key_literal)
  }
}

/// Accept a string or a number; anything else becomes `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let v = Option::<Value>::deserialize(deserializer)?;
  Ok(match v {
    Some(Value::String(s)) => Some(s),
    Some(Value::Number(n)) => Some(n.to_string()),
    _ => None,
  })
}

/// Deserialize a list of options, dropping null or malformed entries.
/// A `null` list is treated as empty.
fn lenient_options<'de, D>(deserializer: D) -> Result<Vec<FilterOption>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = Option::<Vec<Value>>::deserialize(deserializer)?;
  Ok(
    raw
      .unwrap_or_default()
      .into_iter()
      .filter_map(|v| match v {
        Value::Object(_) => serde_json::from_value(v).ok(),
        // Bare strings show up when a payload is written by hand
        Value::String(s) => Some(FilterOption::value(s)),
        _ => None,
      })
      .collect(),
  )
}
