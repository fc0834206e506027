//! Minimal Atlassian Document Format support: build simple documents and
//! pull plain text back out.
//!
//! Extraction is deliberately lossy. Only the first paragraph's first text
//! node is read; there is no full document renderer.

use serde_json::{json, Value};

pub fn doc(content: Vec<Value>) -> Value {
  json!({
    "type": "doc",
    "version": 1,
    "content": content,
  })
}

pub fn paragraph(nodes: Vec<Value>) -> Value {
  json!({
    "type": "paragraph",
    "content": nodes,
  })
}

pub fn text(text: &str) -> Value {
  // Empty text nodes are rejected by the API
  let text = if text.is_empty() { " " } else { text };
  json!({
    "type": "text",
    "text": text,
  })
}

pub fn mention(account_id: &str, display_name: &str) -> Value {
  json!({
    "type": "mention",
    "attrs": {
      "id": account_id,
      "text": format!("@{}", display_name),
      "accessLevel": "",
    },
  })
}

/// A document with one paragraph per line of `message`.
pub fn plain_document(message: &str) -> Value {
  let paragraphs = message
    .lines()
    .map(|line| paragraph(vec![text(line)]))
    .collect::<Vec<_>>();
  if paragraphs.is_empty() {
    return doc(vec![paragraph(vec![text(" ")])]);
  }
  doc(paragraphs)
}

/// A `CC:` paragraph mentioning each `(account_id, display_name)` pair.
pub fn cc_paragraph<'a>(mentions: impl IntoIterator<Item = (&'a str, &'a str)>) -> Option<Value> {
  let mut nodes = vec![text("CC: ")];
  for (i, (id, name)) in mentions.into_iter().enumerate() {
    if i > 0 {
      nodes.push(text(" "));
    }
    nodes.push(mention(id, name));
  }
  if nodes.len() == 1 {
    return None;
  }
  Some(paragraph(nodes))
}

/// Text of the first paragraph's first text node.
///
/// Plain string bodies (API v2) are returned as-is.
pub fn first_text(body: &Value) -> Option<String> {
  if let Some(s) = body.as_str() {
    return Some(s.to_string());
  }
  body
    .get("content")?
    .get(0)?
    .get("content")?
    .get(0)?
    .get("text")?
    .as_str()
    .map(String::from)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_first_text_reads_first_node_only() {
    let body = json!({
      "type": "doc",
      "version": 1,
      "content": [
        {"type": "paragraph", "content": [
          {"type": "text", "text": "Looks good"},
          {"type": "text", "text": " but check logs"}
        ]},
        {"type": "paragraph", "content": [{"type": "text", "text": "second"}]}
      ]
    });
    assert_eq!(first_text(&body).as_deref(), Some("Looks good"));
  }

  #[test]
  fn test_first_text_handles_plain_and_non_text() {
    assert_eq!(first_text(&json!("plain")).as_deref(), Some("plain"));
    let mention_first = doc(vec![paragraph(vec![mention("abc", "Ana")])]);
    assert_eq!(first_text(&mention_first), None);
    assert_eq!(first_text(&json!({})), None);
  }

  #[test]
  fn test_cc_paragraph() {
    assert!(cc_paragraph(Vec::<(&str, &str)>::new()).is_none());

    let p = cc_paragraph(vec![("a1", "Ana"), ("b2", "Bo")]).unwrap();
    let nodes = p["content"].as_array().unwrap();
    assert_eq!(nodes.len(), 4);
    assert_eq!(nodes[1]["attrs"]["text"], "@Ana");
    assert_eq!(nodes[3]["attrs"]["id"], "b2");
  }

  #[test]
  fn test_plain_document_never_empty() {
    let d = plain_document("");
    assert_eq!(d["content"][0]["content"][0]["text"], " ");
    let d = plain_document("line one\nline two");
    assert_eq!(d["content"].as_array().unwrap().len(), 2);
  }
}
