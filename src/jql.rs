//! JQL construction from a [`FilterSet`].
//!
//! The tracker offers no parameterized queries, so values are embedded as
//! double-quoted literals. All quoting goes through [`quote`]; values that
//! contain a double quote are rejected as malformed rather than escaped.

use std::fmt;

use crate::filters::{FilterOption, FilterSet};

/// Deterministic ordering appended to every query.
pub const ORDER_BY: &str = "order by created DESC";

/// Always-true predicate used when no filter applies. The search endpoint
/// rejects a query that is only an ordering clause.
pub const MATCH_ALL: &str = "created is not empty";

/// An immutable, syntactically valid JQL string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jql(String);

impl Jql {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Jql {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl AsRef<str> for Jql {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

/// Which part of a [`FilterOption`] carries the JQL value.
#[derive(Clone, Copy)]
enum Source {
  /// `key`, falling back to `value` (projects, parent issues)
  Key,
  Value,
}

/// Multi-select dimensions, in emission order.
fn multi_select(filters: &FilterSet) -> [(&'static str, Source, &[FilterOption]); 7] {
  [
    ("project", Source::Key, filters.project.as_slice()),
    ("status", Source::Value, filters.status.as_slice()),
    ("issuetype", Source::Value, filters.issue_type.as_slice()),
    ("priority", Source::Value, filters.priority.as_slice()),
    ("labels", Source::Value, filters.labels.as_slice()),
    ("parent", Source::Key, filters.parent.as_slice()),
    ("assignee", Source::Value, filters.assignee.as_slice()),
  ]
}

/// Build the query for a filter set. Total over any input.
pub fn build(filters: &FilterSet) -> Jql {
  let mut clauses: Vec<String> = Vec::new();

  for (field, source, options) in multi_select(filters) {
    let values: Vec<String> = options
      .iter()
      .filter_map(|opt| option_value(opt, source))
      .map(quote)
      .collect();
    if let Some(clause) = in_clause(field, &values) {
      clauses.push(clause);
    }
  }

  if let (Some(start), Some(end)) = (
    date_bound(filters.start_date.as_deref()),
    date_bound(filters.end_date.as_deref()),
  ) {
    clauses.push(format!(
      "updated >= {} AND updated <= {}",
      quote(start),
      quote(end)
    ));
  }

  if filters.exceeded_only {
    clauses.push("workRatio > 100".to_string());
  }

  let sprints: Vec<String> = filters
    .sprint
    .iter()
    .filter_map(|opt| option_value(opt, Source::Value))
    .map(sprint_literal)
    .collect();
  if let Some(clause) = in_clause("sprint", &sprints) {
    clauses.push(clause);
  }

  let predicate = if clauses.is_empty() {
    MATCH_ALL.to_string()
  } else {
    clauses.join(" AND ")
  };

  Jql(format!("{} {}", predicate, ORDER_BY))
}

fn in_clause(field: &str, literals: &[String]) -> Option<String> {
  if literals.is_empty() {
    return None;
  }
  Some(format!("{} in ({})", field, literals.join(", ")))
}

/// `key` when it is a usable literal, else `value`. Shared with callers that
/// need the same project a query searches.
pub fn key_literal(opt: &FilterOption) -> Option<&str> {
  option_value(opt, Source::Key)
}

fn option_value(opt: &FilterOption, source: Source) -> Option<&str> {
  let raw = match source {
    Source::Key => opt
      .key
      .as_deref()
      .filter(|k| is_literal(k))
      .or(opt.value.as_deref()),
    Source::Value => opt.value.as_deref(),
  };
  raw.filter(|v| is_literal(v))
}

fn date_bound(value: Option<&str>) -> Option<&str> {
  value.filter(|v| is_literal(v))
}

/// A value can be embedded when it is non-blank and cannot close its quotes.
fn is_literal(value: &str) -> bool {
  !value.trim().is_empty() && !value.contains('"')
}

/// Sprint ids are numeric and go unquoted; anything else is a sprint name.
fn sprint_literal(value: &str) -> String {
  if value.bytes().all(|b| b.is_ascii_digit()) {
    value.to_string()
  } else {
    quote(value)
  }
}

/// The single quoting routine. Callers must pass values accepted by [`is_literal`].
fn quote(value: &str) -> String {
  format!("\"{}\"", value)
}
