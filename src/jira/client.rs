use crate::config::{AuthType, Credentials, JiraConfig};
use crate::jira::api_types::{
  ApiCreateMetaIssueTypes, ApiIssueRef, ApiIssueType, ApiProject, ApiProjectPage, ApiSearchPage,
  ApiStatus, ApiUser,
};
use crate::jira::types::NewIssue;
use crate::jira::JiraApi;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Clone)]
enum Auth {
  Basic { user: String, token: String },
  Bearer(String),
}

/// Jira API client wrapper.
///
/// Metadata reads go through gouqi. Searches and writes that carry ADF
/// bodies or multipart uploads go to `/rest/api/3` directly.
#[derive(Clone)]
pub struct JiraClient {
  client: gouqi::r#async::Jira,
  http: reqwest::Client,
  base: Url,
  auth: Auth,
}

impl JiraClient {
  pub fn new(jira: &JiraConfig, credentials: &Credentials, timeout: Duration) -> Result<Self> {
    let (gouqi_credentials, auth) = match jira.resolved_auth_type() {
      AuthType::Onpremise => (
        gouqi::Credentials::Bearer(credentials.token.clone()),
        Auth::Bearer(credentials.token.clone()),
      ),
      _ => (
        gouqi::Credentials::Basic(credentials.email.clone(), credentials.token.clone()),
        Auth::Basic {
          user: credentials.email.clone(),
          token: credentials.token.clone(),
        },
      ),
    };

    let client = gouqi::r#async::Jira::new(&jira.url, gouqi_credentials)
      .map_err(|e| eyre!("Failed to create Jira client: {}", e))?;

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    let base =
      Url::parse(&jira.url).map_err(|e| eyre!("Invalid Jira URL {}: {}", jira.url, e))?;

    Ok(Self {
      client,
      http,
      base,
      auth,
    })
  }

  fn v3_url(&self, segments: &[&str]) -> Result<Url> {
    v3_url(&self.base, segments)
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    let builder = self
      .http
      .request(method, url)
      .header(ACCEPT, "application/json");
    match &self.auth {
      Auth::Basic { user, token } => builder.basic_auth(user, Some(token)),
      Auth::Bearer(token) => builder.bearer_auth(token),
    }
  }
}

/// `{base}/rest/api/3/{segments...}`, each segment percent-encoded
fn v3_url(base: &Url, segments: &[&str]) -> Result<Url> {
  let mut url = base.clone();
  url
    .path_segments_mut()
    .map_err(|_| eyre!("Jira URL cannot be used as a base: {}", base))?
    .pop_if_empty()
    .extend(["rest", "api", "3"])
    .extend(segments);
  Ok(url)
}

/// Send and turn any non-2xx status into an error carrying the body.
async fn send(request: RequestBuilder, action: &str) -> Result<Response> {
  let response = request
    .send()
    .await
    .map_err(|e| eyre!("Failed to {}: {}", action, e))?;

  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  let body = response.text().await.unwrap_or_default();
  Err(eyre!("Failed to {}: {} {}", action, status, body))
}

/// Reject values that would escape a gouqi endpoint path segment.
fn path_segment(value: &str) -> Result<&str> {
  if value.is_empty() || value.contains(['/', '?', '#', '%']) || value.contains(char::is_whitespace) {
    return Err(eyre!("Invalid issue or project key: {:?}", value));
  }
  Ok(value)
}

impl JiraApi for JiraClient {
  async fn search_page(
    &self,
    jql: &str,
    fields: &[&str],
    max_results: u32,
    next_page_token: Option<&str>,
  ) -> Result<ApiSearchPage> {
    let mut body = json!({
      "jql": jql,
      "fields": fields,
      "maxResults": max_results,
    });
    if let Some(token) = next_page_token {
      body["nextPageToken"] = json!(token);
    }

    let url = self.v3_url(&["search", "jql"])?;
    let response = send(self.request(Method::POST, url).json(&body), "search issues").await?;

    response
      .json::<ApiSearchPage>()
      .await
      .map_err(|e| eyre!("Failed to parse search response: {}", e))
  }

  async fn myself(&self) -> Result<ApiUser> {
    self
      .client
      .get("api", "/myself")
      .await
      .map_err(|e| eyre!("Failed to get current user: {}", e))
  }

  async fn projects(&self) -> Result<Vec<ApiProject>> {
    let mut all_projects = Vec::new();
    let mut start_at = 0u64;
    let max_results = 50u64;

    loop {
      let endpoint = format!(
        "/project/search?startAt={}&maxResults={}",
        start_at, max_results
      );

      let page: ApiProjectPage = self
        .client
        .get("api", &endpoint)
        .await
        .map_err(|e| eyre!("Failed to get projects: {}", e))?;

      let count = page.values.len();
      all_projects.extend(page.values);

      if page.is_last || count == 0 {
        break;
      }
      start_at += max_results;
    }

    Ok(all_projects)
  }

  async fn statuses(&self) -> Result<Vec<ApiStatus>> {
    self
      .client
      .get("api", "/status")
      .await
      .map_err(|e| eyre!("Failed to get statuses: {}", e))
  }

  async fn search_users(&self, query: &str) -> Result<Vec<ApiUser>> {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    let endpoint = format!("/user/search?query={}", encoded);

    self
      .client
      .get("api", &endpoint)
      .await
      .map_err(|e| eyre!("Failed to search users: {}", e))
  }

  async fn get_issue(&self, key: &str) -> Result<ApiIssueRef> {
    let endpoint = format!("/issue/{}?fields=summary", path_segment(key)?);

    self
      .client
      .get("api", &endpoint)
      .await
      .map_err(|e| eyre!("Failed to get issue {}: {}", key, e))
  }

  async fn create_issue_types(&self, project_key: &str) -> Result<Vec<ApiIssueType>> {
    let endpoint = format!(
      "/issue/createmeta/{}/issuetypes",
      path_segment(project_key)?
    );

    let meta: ApiCreateMetaIssueTypes = self
      .client
      .get("api", &endpoint)
      .await
      .map_err(|e| eyre!("Failed to get issue types for {}: {}", project_key, e))?;

    Ok(meta.issue_types)
  }

  async fn create_issue(&self, issue: &NewIssue) -> Result<ApiIssueRef> {
    let mut fields = json!({
      "project": { "key": issue.project_key },
      "summary": issue.summary,
      "description": issue.description,
      "issuetype": { "id": issue.issue_type_id },
    });
    if let Some(account_id) = &issue.assignee_account_id {
      fields["assignee"] = json!({ "id": account_id });
    }

    let url = self.v3_url(&["issue"])?;
    let action = format!("create issue in {}", issue.project_key);
    let response = send(
      self
        .request(Method::POST, url)
        .json(&json!({ "fields": fields })),
      &action,
    )
    .await?;

    response
      .json::<ApiIssueRef>()
      .await
      .map_err(|e| eyre!("Failed to parse created issue: {}", e))
  }

  async fn add_attachment(&self, issue_key: &str, file_name: &str, content: Vec<u8>) -> Result<()> {
    let mime = if file_name.ends_with(".xlsx") {
      XLSX_MIME
    } else {
      "application/octet-stream"
    };
    let part = Part::bytes(content)
      .file_name(file_name.to_string())
      .mime_str(mime)
      .map_err(|e| eyre!("Failed to build attachment: {}", e))?;

    let url = self.v3_url(&["issue", issue_key, "attachments"])?;
    let action = format!("attach {} to {}", file_name, issue_key);
    send(
      self
        .request(Method::POST, url)
        .header("X-Atlassian-Token", "no-check")
        .multipart(Form::new().part("file", part)),
      &action,
    )
    .await?;

    Ok(())
  }

  async fn add_comment(&self, issue_key: &str, body: &Value) -> Result<()> {
    let url = self.v3_url(&["issue", issue_key, "comment"])?;
    let action = format!("comment on {}", issue_key);
    send(
      self
        .request(Method::POST, url)
        .json(&json!({ "body": body })),
      &action,
    )
    .await?;

    Ok(())
  }

  async fn add_watcher(&self, issue_key: &str, account_id: &str) -> Result<()> {
    let url = self.v3_url(&["issue", issue_key, "watchers"])?;
    let action = format!("add watcher to {}", issue_key);
    // The endpoint takes a bare JSON string
    send(self.request(Method::POST, url).json(&account_id), &action).await?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn base(url: &str) -> Url {
    Url::parse(url).unwrap()
  }

  #[test]
  fn test_v3_url_encodes_segments() {
    let b = base("https://acme.atlassian.net");
    assert_eq!(
      v3_url(&b, &["issue", "OPS-1", "comment"]).unwrap().as_str(),
      "https://acme.atlassian.net/rest/api/3/issue/OPS-1/comment"
    );
    assert_eq!(
      v3_url(&b, &["issue", "a b"]).unwrap().as_str(),
      "https://acme.atlassian.net/rest/api/3/issue/a%20b"
    );
  }

  #[test]
  fn test_v3_url_keeps_context_path() {
    let b = base("https://jira.example.com/jira/");
    assert_eq!(
      v3_url(&b, &["search", "jql"]).unwrap().as_str(),
      "https://jira.example.com/jira/rest/api/3/search/jql"
    );
  }

  #[test]
  fn test_path_segment_rejects_traversal() {
    assert!(path_segment("OPS-12").is_ok());
    assert!(path_segment("OPS/../x").is_err());
    assert!(path_segment("").is_err());
    assert!(path_segment("A B").is_err());
  }
}
