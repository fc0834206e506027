//! Tabular export: column projection, comment rendering and the xlsx and CSV
//! encodings. PDF lives in [`super::pdf`].

use color_eyre::{eyre::eyre, Result};
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::jira::types::{CommentRow, IssueRow};

/// Comment text shown when the first text node is missing (mentions, media, …)
const NO_TEXT: &str = "Content";

/// Output encoding of an export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
  #[default]
  Xlsx,
  Csv,
  Pdf,
}

/// How comments are rendered into the Comments column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentMode {
  None,
  #[default]
  Last,
  Full,
}

impl FromStr for CommentMode {
  type Err = color_eyre::Report;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_lowercase().as_str() {
      "none" => Ok(Self::None),
      "last" => Ok(Self::Last),
      "full" => Ok(Self::Full),
      other => Err(eyre!("Unknown comment mode {:?} (expected none, last or full)", other)),
    }
  }
}

/// An exportable column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportField {
  Key,
  Summary,
  Assignee,
  Status,
  StatusCategory,
  Priority,
  Labels,
  TimeSpent,
  Estimate,
  Exceeded,
  Comments,
}

impl ExportField {
  pub const ALL: &'static [ExportField] = &[
    ExportField::Key,
    ExportField::Summary,
    ExportField::Assignee,
    ExportField::Status,
    ExportField::StatusCategory,
    ExportField::Priority,
    ExportField::Labels,
    ExportField::TimeSpent,
    ExportField::Estimate,
    ExportField::Exceeded,
    ExportField::Comments,
  ];

  /// Column header, also the name used in `selectedFields`
  pub fn name(&self) -> &'static str {
    match self {
      ExportField::Key => "Key",
      ExportField::Summary => "Summary",
      ExportField::Assignee => "Assignee",
      ExportField::Status => "Status",
      ExportField::StatusCategory => "StatusCategory",
      ExportField::Priority => "Priority",
      ExportField::Labels => "Labels",
      ExportField::TimeSpent => "TimeSpent",
      ExportField::Estimate => "Estimate",
      ExportField::Exceeded => "Exceeded",
      ExportField::Comments => "Comments",
    }
  }

  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL
      .iter()
      .copied()
      .find(|f| f.name().eq_ignore_ascii_case(name.trim()))
  }

  pub fn width(&self) -> f64 {
    match self {
      ExportField::Summary => 40.0,
      ExportField::Comments => 50.0,
      _ => 15.0,
    }
  }

  fn cell(&self, row: &IssueRow, mode: CommentMode) -> String {
    match self {
      ExportField::Key => row.key.clone(),
      ExportField::Summary => row.summary.clone(),
      ExportField::Assignee => row.assignee.name.clone(),
      ExportField::Status => row.status.clone(),
      ExportField::StatusCategory => row.status_category.clone(),
      ExportField::Priority => row.priority.clone().unwrap_or_default(),
      ExportField::Labels => row.labels.join(", "),
      ExportField::TimeSpent => row.time_spent.clone(),
      ExportField::Estimate => row.estimate.clone(),
      ExportField::Exceeded => (if row.exceeded { "Yes" } else { "No" }).to_string(),
      ExportField::Comments => format_comments(&row.comments, mode),
    }
  }
}

/// Resolve selected column names in their given order.
///
/// Unknown names are ignored; nothing usable selected means every column.
pub fn resolve_fields(selected: &[String]) -> Vec<ExportField> {
  let mut fields: Vec<ExportField> = Vec::new();
  for f in selected.iter().filter_map(|name| ExportField::from_name(name)) {
    if !fields.contains(&f) {
      fields.push(f);
    }
  }
  if fields.is_empty() {
    return ExportField::ALL.to_vec();
  }
  fields
}

pub fn format_comments(comments: &[CommentRow], mode: CommentMode) -> String {
  match mode {
    CommentMode::None => String::new(),
    CommentMode::Last => comments.last().map(format_comment).unwrap_or_default(),
    CommentMode::Full => comments
      .iter()
      .map(format_comment)
      .collect::<Vec<_>>()
      .join("\n"),
  }
}

fn format_comment(comment: &CommentRow) -> String {
  let text = if comment.text.is_empty() {
    NO_TEXT
  } else {
    &comment.text
  };
  format!("[{}]: {}", comment.author, text)
}

/// Rows projected to string cells, ready to encode
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
  pub headers: Vec<&'static str>,
  pub rows: Vec<Vec<String>>,
  pub fields: Vec<ExportField>,
}

impl Table {
  pub fn build(rows: &[IssueRow], fields: &[ExportField], mode: CommentMode) -> Self {
    Self {
      headers: fields.iter().map(|f| f.name()).collect(),
      rows: rows
        .iter()
        .map(|row| fields.iter().map(|f| f.cell(row, mode)).collect())
        .collect(),
      fields: fields.to_vec(),
    }
  }

  /// Encode as a single-sheet xlsx workbook
  pub fn to_xlsx(&self) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet
      .set_name("Report")
      .map_err(|e| eyre!("Failed to name worksheet: {}", e))?;

    for (col, field) in self.fields.iter().enumerate() {
      let col = u16::try_from(col).map_err(|_| eyre!("Too many columns"))?;
      sheet
        .set_column_width(col, field.width())
        .map_err(|e| eyre!("Failed to size column: {}", e))?;
      sheet
        .write_string_with_format(0, col, field.name(), &header)
        .map_err(|e| eyre!("Failed to write header: {}", e))?;
    }

    for (r, cells) in self.rows.iter().enumerate() {
      let row = u32::try_from(r + 1).map_err(|_| eyre!("Too many rows"))?;
      for (c, value) in cells.iter().enumerate() {
        let col = u16::try_from(c).map_err(|_| eyre!("Too many columns"))?;
        sheet
          .write_string(row, col, value)
          .map_err(|e| eyre!("Failed to write cell: {}", e))?;
      }
    }

    workbook
      .save_to_buffer()
      .map_err(|e| eyre!("Failed to encode spreadsheet: {}", e))
  }

  /// Header line plus one record per row, quoted where needed
  pub fn to_csv(&self) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&self.headers)?;
    for cells in &self.rows {
      writer.write_record(cells)?;
    }
    writer
      .into_inner()
      .map_err(|e| eyre!("Failed to finish CSV: {}", e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::jira::types::Assignee;

  fn comment(author: &str, text: &str) -> CommentRow {
    CommentRow {
      author: author.to_string(),
      text: text.to_string(),
      created: None,
    }
  }

  fn row() -> IssueRow {
    IssueRow {
      id: "1".into(),
      key: "OPS-1".into(),
      url: "/browse/OPS-1".into(),
      summary: "Rotate keys".into(),
      assignee: Assignee::unassigned(),
      status: "Done".into(),
      status_category: "Done".into(),
      issue_type: "Task".into(),
      priority: Some("High".into()),
      labels: vec!["sec".into(), "ops".into()],
      parent: None,
      time_spent: "3h".into(),
      estimate: "2h".into(),
      time_spent_seconds: 10800,
      estimate_seconds: 7200,
      exceeded: true,
      last_comment: None,
      comments: vec![comment("Ana", "first"), comment("Bo", "")],
    }
  }

  #[test]
  fn test_comment_modes() {
    let comments = row().comments;
    assert_eq!(format_comments(&comments, CommentMode::None), "");
    assert_eq!(format_comments(&comments, CommentMode::Last), "[Bo]: Content");
    assert_eq!(
      format_comments(&comments, CommentMode::Full),
      "[Ana]: first\n[Bo]: Content"
    );
    assert_eq!(format_comments(&[], CommentMode::Full), "");
  }

  #[test]
  fn test_resolve_fields_keeps_order_and_ignores_unknown() {
    let selected = vec![
      "Status".to_string(),
      "bogus".to_string(),
      "key".to_string(),
      "Status".to_string(),
    ];
    assert_eq!(
      resolve_fields(&selected),
      vec![ExportField::Status, ExportField::Key]
    );
    assert_eq!(resolve_fields(&[]), ExportField::ALL.to_vec());
    assert_eq!(
      resolve_fields(&["nope".to_string()]),
      ExportField::ALL.to_vec()
    );
  }

  #[test]
  fn test_table_projection() {
    let fields = [
      ExportField::Key,
      ExportField::Assignee,
      ExportField::Labels,
      ExportField::Exceeded,
      ExportField::Comments,
    ];
    let table = Table::build(&[row()], &fields, CommentMode::Last);
    assert_eq!(
      table.headers,
      vec!["Key", "Assignee", "Labels", "Exceeded", "Comments"]
    );
    assert_eq!(
      table.rows[0],
      vec!["OPS-1", "Unassigned", "sec, ops", "Yes", "[Bo]: Content"]
    );
  }

  #[test]
  fn test_xlsx_is_a_zip_container() {
    let table = Table::build(&[row()], ExportField::ALL, CommentMode::Full);
    let bytes = table.to_xlsx().unwrap();
    assert!(bytes.starts_with(b"PK"));
  }

  #[test]
  fn test_csv_quotes_commas_and_newlines() {
    let mut r = row();
    r.summary = "Rotate keys, then certs".into();
    let fields = [ExportField::Key, ExportField::Summary, ExportField::Comments];
    let csv = Table::build(&[r], &fields, CommentMode::Full).to_csv().unwrap();
    assert_eq!(
      String::from_utf8(csv).unwrap(),
      "Key,Summary,Comments\nOPS-1,\"Rotate keys, then certs\",\"[Ana]: first\n[Bo]: Content\"\n"
    );
  }

  #[test]
  fn test_csv_without_rows_is_just_the_header() {
    let csv = Table::build(&[], &[ExportField::Key], CommentMode::None)
      .to_csv()
      .unwrap();
    assert_eq!(csv, b"Key\n");
  }

  #[test]
  fn test_comment_mode_parse() {
    assert_eq!("FULL".parse::<CommentMode>().unwrap(), CommentMode::Full);
    assert!("everything".parse::<CommentMode>().is_err());
  }
}
