use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub jira: JiraConfig,
  /// Non-interactive identity used by scheduled deliveries
  pub service: Option<ServiceConfig>,
  #[serde(default)]
  pub store: StoreConfig,
  #[serde(default)]
  pub delivery: DeliveryConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
  /// Auto-detect based on URL: .atlassian.net = cloud, else on-premise
  #[default]
  Auto,
  /// Jira Cloud - uses Basic auth (email + API token as password)
  Cloud,
  /// Jira On-premise - uses Bearer auth (PAT)
  Onpremise,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfig {
  pub url: String,
  pub email: String,
  /// Authentication type: auto, cloud, or onpremise
  #[serde(default)]
  pub auth_type: AuthType,
}

impl JiraConfig {
  pub fn resolved_auth_type(&self) -> AuthType {
    match self.auth_type {
      AuthType::Auto if self.url.contains(".atlassian.net") => AuthType::Cloud,
      AuthType::Auto => AuthType::Onpremise,
      other => other,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
  /// SQLite file (default: $XDG_DATA_HOME/jira-reports/store.db)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
  /// Comment text used when a schedule has no message
  pub default_message: String,
  /// Upper bound on issues fetched per report
  pub max_issues: usize,
  pub timeout_secs: u64,
}

impl Default for DeliveryConfig {
  fn default() -> Self {
    Self {
      default_message: "Here is your scheduled Jira report.".to_string(),
      max_issues: 1000,
      timeout_secs: 30,
    }
  }
}

impl DeliveryConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Default filter when RUST_LOG is unset
  pub level: String,
  /// Write daily rolling log files here instead of stderr
  pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      directory: None,
    }
  }
}

/// Login name plus secret for one identity
#[derive(Clone)]
pub struct Credentials {
  pub email: String,
  pub token: String,
}

impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Credentials")
      .field("email", &self.email)
      .finish_non_exhaustive()
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./jira-reports.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/jira-reports/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/jira-reports/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("jira-reports.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("jira-reports").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Credentials of the interactive user.
  ///
  /// Checks JIRA_REPORTS_TOKEN first, then JIRA_API_TOKEN as fallback.
  pub fn user_credentials(&self) -> Result<Credentials> {
    let token = std::env::var("JIRA_REPORTS_TOKEN")
      .or_else(|_| std::env::var("JIRA_API_TOKEN"))
      .map_err(|_| {
        eyre!("Jira API token not found. Set JIRA_REPORTS_TOKEN or JIRA_API_TOKEN environment variable.")
      })?;
    Ok(Credentials {
      email: self.jira.email.clone(),
      token,
    })
  }

  /// Credentials of the service identity.
  ///
  /// Without a `service` section the user's credentials are reused.
  pub fn service_credentials(&self) -> Result<Credentials> {
    match &self.service {
      Some(service) => {
        let token = std::env::var("JIRA_REPORTS_SERVICE_TOKEN").map_err(|_| {
          eyre!("Service token not found. Set JIRA_REPORTS_SERVICE_TOKEN environment variable.")
        })?;
        Ok(Credentials {
          email: service.email.clone(),
          token,
        })
      }
      None => {
        tracing::warn!("No service identity configured; scheduled runs use the user's credentials");
        self.user_credentials()
      }
    }
  }

  /// SQLite store location
  pub fn store_path(&self) -> Result<PathBuf> {
    if let Some(p) = &self.store.path {
      return Ok(p.clone());
    }
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("jira-reports").join("store.db"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse(
      r#"
jira:
  url: https://acme.atlassian.net
  email: me@acme.com
"#,
    )
    .unwrap();

    assert!(config.service.is_none());
    assert_eq!(config.delivery.max_issues, 1000);
    assert_eq!(config.delivery.timeout(), Duration::from_secs(30));
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.jira.resolved_auth_type(), AuthType::Cloud);
  }

  #[test]
  fn test_full_config() {
    let config = Config::parse(
      r#"
jira:
  url: https://jira.internal.example
  email: me@example.com
service:
  email: reports-bot@example.com
store:
  path: /var/lib/jira-reports/store.db
delivery:
  default_message: Weekly numbers
  max_issues: 250
logging:
  level: debug
  directory: /var/log/jira-reports
"#,
    )
    .unwrap();

    assert_eq!(config.jira.resolved_auth_type(), AuthType::Onpremise);
    assert_eq!(config.service.as_ref().unwrap().email, "reports-bot@example.com");
    assert_eq!(
      config.store_path().unwrap(),
      PathBuf::from("/var/lib/jira-reports/store.db")
    );
    assert_eq!(config.delivery.default_message, "Weekly numbers");
    assert_eq!(config.delivery.max_issues, 250);
    assert_eq!(config.delivery.timeout_secs, 30);
    assert_eq!(
      config.logging.directory,
      Some(PathBuf::from("/var/log/jira-reports"))
    );
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let err = Config::load(Some(Path::new("/nonexistent/jira-reports.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
