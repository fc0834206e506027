//! Landscape A4 report: headline totals, a status breakdown bar and the
//! issue table in a fixed-width font, paginated.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use super::export::{ExportField, Table};
use super::summary::ReportSummary;

const PAGE_WIDTH: f32 = 842.0;
const PAGE_HEIGHT: f32 = 595.0;
const MARGIN: f32 = 36.0;

const TABLE_FONT_SIZE: f32 = 7.0;
const ROW_HEIGHT: f32 = 10.0;
/// Courier advances every glyph by 0.6 em
const CHAR_WIDTH: f32 = TABLE_FONT_SIZE * 0.6;
const BAR_HEIGHT: f32 = 10.0;
const LEGEND_STEP: f32 = 120.0;

const REGULAR: &str = "F1";
const BOLD: &str = "F2";
const MONO: &str = "F3";

const STATUS_COLORS: [(u8, u8, u8); 6] = [
  (54, 179, 126),
  (0, 82, 204),
  (255, 171, 0),
  (255, 86, 48),
  (101, 84, 192),
  (9, 30, 66),
];

/// Render `table` with the totals of `summary`
pub fn render(table: &Table, summary: &ReportSummary, generated: DateTime<Utc>) -> Result<Vec<u8>> {
  let mut pages = PageWriter::new();

  pages.text(MARGIN, 18.0, BOLD, "Project Developer Report");
  pages.advance(20.0);
  pages.text(
    MARGIN,
    10.0,
    REGULAR,
    &format!("Generated on: {}", generated.format("%Y-%m-%d")),
  );
  pages.advance(13.0);
  pages.text(
    MARGIN,
    10.0,
    REGULAR,
    &format!(
      "Total Issues: {}    Total Time Spent: {}    Total Estimate: {}    Exceeded: {}",
      summary.total_issues, summary.total_time_spent, summary.total_estimate, summary.exceeded
    ),
  );
  pages.advance(18.0);

  if summary.total_issues > 0 {
    status_breakdown(&mut pages, summary);
  }

  if !table.rows.is_empty() {
    let widths = column_chars(&table.fields);
    pages.table_header(&table.headers, &widths);
    for cells in &table.rows {
      if pages.y < MARGIN + ROW_HEIGHT {
        pages.new_page();
        pages.table_header(&table.headers, &widths);
      }
      pages.table_row(&table.fields, cells, &widths);
    }
  }

  assemble(pages.finish())
}

fn status_breakdown(pages: &mut PageWriter, summary: &ReportSummary) {
  pages.text(MARGIN, 8.0, REGULAR, "Status Breakdown:");
  pages.advance(4.0 + BAR_HEIGHT);

  let total_width = PAGE_WIDTH - 2.0 * MARGIN;
  let mut x = MARGIN;
  for (i, (_, count)) in summary.by_status.iter().enumerate() {
    let width = *count as f32 / summary.total_issues as f32 * total_width;
    pages.rect(x, BAR_HEIGHT, width, STATUS_COLORS[i % STATUS_COLORS.len()]);
    x += width;
  }
  pages.advance(12.0);

  let mut x = MARGIN;
  for (i, (status, count)) in summary.by_status.iter().enumerate() {
    if x + LEGEND_STEP > PAGE_WIDTH - MARGIN {
      x = MARGIN;
      pages.advance(10.0);
    }
    pages.rect(x, 6.0, 6.0, STATUS_COLORS[i % STATUS_COLORS.len()]);
    pages.text(x + 9.0, 8.0, REGULAR, &format!("{} ({})", status, count));
    x += LEGEND_STEP;
  }
  pages.advance(20.0);
}

/// Characters per column, from the spreadsheet widths scaled to the page
fn column_chars(fields: &[ExportField]) -> Vec<usize> {
  let available = ((PAGE_WIDTH - 2.0 * MARGIN) / CHAR_WIDTH) as usize;
  let total: f64 = fields.iter().map(|f| f.width()).sum();
  fields
    .iter()
    .map(|f| ((f.width() / total) * available as f64) as usize)
    .map(|w| w.max(4))
    .collect()
}

/// Fit a cell into `width` characters: one line, printable ASCII only.
fn fit(value: &str, width: usize) -> String {
  let flat: String = value
    .chars()
    .map(|c| match c {
      '\n' | '\r' | '\t' => ' ',
      c if c.is_ascii() && !c.is_ascii_control() => c,
      _ => '?',
    })
    .collect();
  // Leave one column of spacing
  let room = width.saturating_sub(1);
  if flat.len() <= room {
    return flat;
  }
  let mut cut: String = flat.chars().take(room.saturating_sub(2)).collect();
  cut.push_str("..");
  cut
}

/// Accumulates content-stream operations page by page, top to bottom
struct PageWriter {
  done: Vec<Vec<Operation>>,
  current: Vec<Operation>,
  /// Baseline of the next line
  y: f32,
}

impl PageWriter {
  fn new() -> Self {
    Self {
      done: Vec::new(),
      current: Vec::new(),
      y: PAGE_HEIGHT - MARGIN,
    }
  }

  fn advance(&mut self, by: f32) {
    self.y -= by;
  }

  fn new_page(&mut self) {
    self.done.push(std::mem::take(&mut self.current));
    self.y = PAGE_HEIGHT - MARGIN;
  }

  fn text(&mut self, x: f32, size: f32, font: &str, text: &str) {
    let text = fit(text, text.len() + 1);
    self.current.extend([
      Operation::new("BT", vec![]),
      Operation::new("Tf", vec![font.into(), size.into()]),
      Operation::new("Td", vec![x.into(), self.y.into()]),
      Operation::new("Tj", vec![Object::string_literal(text)]),
      Operation::new("ET", vec![]),
    ]);
  }

  fn fill_color(&mut self, (r, g, b): (u8, u8, u8)) {
    self.current.push(Operation::new(
      "rg",
      vec![
        (r as f32 / 255.0).into(),
        (g as f32 / 255.0).into(),
        (b as f32 / 255.0).into(),
      ],
    ));
  }

  /// Filled rectangle whose bottom edge sits on the current baseline
  fn rect(&mut self, x: f32, height: f32, width: f32, color: (u8, u8, u8)) {
    self.fill_color(color);
    self.current.extend([
      Operation::new(
        "re",
        vec![x.into(), self.y.into(), width.into(), height.into()],
      ),
      Operation::new("f", vec![]),
    ]);
    self.fill_color((0, 0, 0));
  }

  fn table_header(&mut self, headers: &[&str], widths: &[usize]) {
    let line = headers
      .iter()
      .zip(widths)
      .map(|(h, w)| format!("{:<w$}", fit(h, *w), w = *w))
      .collect::<String>();
    self.text(MARGIN, TABLE_FONT_SIZE, MONO, &line);
    self.advance(ROW_HEIGHT);
  }

  /// Cells are drawn one by one so an exceeded flag can stand out in red.
  fn table_row(&mut self, fields: &[ExportField], cells: &[String], widths: &[usize]) {
    let mut x = MARGIN;
    for ((field, cell), width) in fields.iter().zip(cells).zip(widths) {
      let flagged = *field == ExportField::Exceeded && cell == "Yes";
      if flagged {
        self.fill_color((255, 0, 0));
      }
      self.text(x, TABLE_FONT_SIZE, MONO, &fit(cell, *width));
      if flagged {
        self.fill_color((0, 0, 0));
      }
      x += *width as f32 * CHAR_WIDTH;
    }
    self.advance(ROW_HEIGHT);
  }

  fn finish(mut self) -> Vec<Vec<Operation>> {
    self.done.push(self.current);
    self.done
  }
}

fn assemble(pages: Vec<Vec<Operation>>) -> Result<Vec<u8>> {
  let mut doc = Document::with_version("1.5");
  let pages_id = doc.new_object_id();

  let font = |doc: &mut Document, name: &str| {
    doc.add_object(dictionary! {
      "Type" => "Font",
      "Subtype" => "Type1",
      "BaseFont" => Object::Name(name.as_bytes().to_vec()),
    })
  };
  let regular = font(&mut doc, "Helvetica");
  let bold = font(&mut doc, "Helvetica-Bold");
  let mono = font(&mut doc, "Courier");
  let resources_id = doc.add_object(dictionary! {
    "Font" => dictionary! {
      REGULAR => regular,
      BOLD => bold,
      MONO => mono,
    },
  });

  let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
  for operations in pages {
    let content = Content { operations }
      .encode()
      .map_err(|e| eyre!("Failed to encode page: {}", e))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    let page_id = doc.add_object(dictionary! {
      "Type" => "Page",
      "Parent" => pages_id,
      "Contents" => content_id,
    });
    kids.push(page_id.into());
  }

  let count = kids.len() as i64;
  doc.objects.insert(
    pages_id,
    Object::Dictionary(dictionary! {
      "Type" => "Pages",
      "Kids" => kids,
      "Count" => count,
      "Resources" => resources_id,
      "MediaBox" => vec![
        Object::from(0.0f32),
        Object::from(0.0f32),
        Object::from(PAGE_WIDTH),
        Object::from(PAGE_HEIGHT),
      ],
    }),
  );
  let catalog_id = doc.add_object(dictionary! {
    "Type" => "Catalog",
    "Pages" => pages_id,
  });
  doc.trailer.set("Root", catalog_id);

  let mut out = Vec::new();
  doc
    .save_to(&mut out)
    .map_err(|e| eyre!("Failed to write PDF: {}", e))?;
  Ok(out)
}
