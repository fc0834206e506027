mod config;
mod filters;
mod jira;
mod jql;
mod logging;
mod report;
mod reports;
mod schedule;
mod service;
mod store;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::filters::FilterSet;
use crate::jira::client::JiraClient;
use crate::report::export::{CommentMode, ExportFormat};
use crate::report::sort::{SortKey, SortOrder, SortSpec};
use crate::report::summary::ReportSummary;
use crate::schedule::store::ScheduleStore;
use crate::service::{Mention, ReportService, SuccessResult};
use crate::store::SqliteStore;

#[derive(Parser, Debug)]
#[command(name = "jira-reports")]
#[command(about = "Filter, export and schedule Jira issue reports")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/jira-reports/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch issues matching a filter set
  Issues {
    /// FilterSet JSON file, or - for stdin
    filters: PathBuf,
    #[arg(long, value_parser = parse_sort_key)]
    sort_by: Option<SortKey>,
    #[arg(long, requires = "sort_by")]
    desc: bool,
    /// Print totals instead of rows
    #[arg(long)]
    summary: bool,
  },
  /// Export matching issues to a file
  Export {
    filters: PathBuf,
    #[arg(short, long)]
    output: PathBuf,
    #[arg(long, value_enum, default_value_t = FormatArg::Xlsx)]
    format: FormatArg,
    /// none, last or full
    #[arg(long, default_value = "last", value_parser = parse_comment_mode)]
    comments: CommentMode,
    /// Columns in order, e.g. Key,Summary,Status (default: all)
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,
    #[arg(long, value_parser = parse_sort_key)]
    sort_by: Option<SortKey>,
    #[arg(long, requires = "sort_by")]
    desc: bool,
  },
  /// Add the same comment to several issues
  Comment {
    #[arg(long, value_delimiter = ',', required = true)]
    keys: Vec<String>,
    #[arg(long)]
    text: String,
    /// ACCOUNT_ID=Display Name, repeatable
    #[arg(long = "mention", value_parser = parse_mention)]
    mentions: Vec<Mention>,
  },
  #[command(subcommand)]
  Schedules(SchedulesCommand),
  /// Deliver every due schedule (run hourly from cron or a systemd timer)
  RunSchedules,
  #[command(subcommand)]
  Reports(ReportsCommand),
  /// Projects visible to you
  Projects,
  /// Search users by name or email
  Users { query: String },
  Statuses,
  /// Email of the configured user
  Whoami,
}

#[derive(Subcommand, Debug)]
enum SchedulesCommand {
  /// Save a schedule JSON file (replaces any schedule for the same email)
  Save { schedule: PathBuf },
  List,
  /// Deliver the schedule for EMAIL now
  Trigger { email: String },
  /// Show schedules due at a time (default: now)
  Due {
    #[arg(long)]
    at: Option<DateTime<Utc>>,
  },
}

#[derive(Subcommand, Debug)]
enum ReportsCommand {
  /// Save a report JSON file
  Save { report: PathBuf },
  List {
    /// Project being browsed, for project-visible reports
    #[arg(long)]
    project: Option<String>,
  },
  Delete { id: String },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum FormatArg {
  Xlsx,
  Csv,
  Pdf,
}

impl From<FormatArg> for ExportFormat {
  fn from(arg: FormatArg) -> Self {
    match arg {
      FormatArg::Xlsx => ExportFormat::Xlsx,
      FormatArg::Csv => ExportFormat::Csv,
      FormatArg::Pdf => ExportFormat::Pdf,
    }
  }
}

/// Which credentials a command runs with
#[derive(Debug, Clone, Copy)]
enum Identities {
  User,
  Service,
}

impl Command {
  fn identities(&self) -> Identities {
    match self {
      Command::RunSchedules => Identities::Service,
      _ => Identities::User,
    }
  }
}

fn parse_sort_key(s: &str) -> Result<SortKey, String> {
  serde_json::from_value(serde_json::Value::String(s.to_string()))
    .map_err(|_| format!("unknown sort key {:?}", s))
}

fn parse_comment_mode(s: &str) -> Result<CommentMode, String> {
  s.parse().map_err(|e: color_eyre::Report| e.to_string())
}

fn parse_mention(s: &str) -> Result<Mention, String> {
  let (id, name) = s
    .split_once('=')
    .ok_or_else(|| "expected ACCOUNT_ID=Display Name".to_string())?;
  Ok(Mention {
    value: id.trim().to_string(),
    label: name.trim().to_string(),
  })
}

fn sort_spec(key: Option<SortKey>, desc: bool) -> Option<SortSpec> {
  key.map(|key| SortSpec {
    key,
    order: if desc { SortOrder::Desc } else { SortOrder::Asc },
  })
}

/// Read a JSON payload from a file, or stdin for `-`
fn read_payload<T: DeserializeOwned>(path: &Path) -> Result<T> {
  let contents = if path == Path::new("-") {
    let mut buf = String::new();
    std::io::stdin()
      .read_to_string(&mut buf)
      .map_err(|e| eyre!("Failed to read stdin: {}", e))?;
    buf
  } else {
    std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?
  };
  serde_json::from_str(&contents).map_err(|e| eyre!("Invalid JSON in {}: {}", path.display(), e))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  let out = serde_json::to_string_pretty(value)?;
  println!("{}", out);
  Ok(())
}

/// One client serves both identities; the unused side is never called.
fn build_service(
  config: Config,
  store: SqliteStore,
  identities: Identities,
) -> Result<ReportService<JiraClient, SqliteStore>> {
  let timeout = config.delivery.timeout();
  let credentials = match identities {
    Identities::User => config.user_credentials()?,
    Identities::Service => config.service_credentials()?,
  };
  let client = JiraClient::new(&config.jira, &credentials, timeout)?;
  Ok(ReportService::new(config, client.clone(), client, store))
}

/// Schedule subcommands. Only `trigger` talks to the tracker.
async fn schedules_command(config: Config, store: SqliteStore, cmd: SchedulesCommand) -> Result<()> {
  match cmd {
    SchedulesCommand::Save { schedule } => {
      ScheduleStore::new(&store).save(read_payload(&schedule)?, Utc::now())?;
      print_json(&SuccessResult { success: true })
    }
    SchedulesCommand::List => print_json(&ScheduleStore::new(&store).load()?),
    SchedulesCommand::Due { at } => {
      print_json(&ScheduleStore::new(&store).due(at.unwrap_or_else(Utc::now))?)
    }
    SchedulesCommand::Trigger { email } => {
      let service = build_service(config, store, Identities::Service)?;
      print_json(&service.trigger_schedule_now(&email).await?)
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.logging)?;

  let store = SqliteStore::open(&config.store_path()?)?;

  let command = match args.command {
    Command::Schedules(cmd) => return schedules_command(config, store, cmd).await,
    command => command,
  };
  let identities = command.identities();
  let service = build_service(config, store, identities)?;

  match command {
    Command::Issues {
      filters,
      sort_by,
      desc,
      summary,
    } => {
      let filters: FilterSet = read_payload(&filters)?;
      let rows = service
        .build_and_fetch_issues(&filters, sort_spec(sort_by, desc))
        .await?;
      if summary {
        print_json(&ReportSummary::from_rows(&rows))?;
      } else {
        print_json(&rows)?;
      }
    }
    Command::Export {
      filters,
      output,
      format,
      comments,
      fields,
      sort_by,
      desc,
    } => {
      let filters: FilterSet = read_payload(&filters)?;
      let bytes = service
        .export_issues(
          &filters,
          format.into(),
          comments,
          &fields,
          sort_spec(sort_by, desc),
        )
        .await?;
      std::fs::write(&output, &bytes)
        .map_err(|e| eyre!("Failed to write {}: {}", output.display(), e))?;
      print_json(&serde_json::json!({
        "file": output.display().to_string(),
        "bytes": bytes.len(),
      }))?;
    }
    Command::Comment {
      keys,
      text,
      mentions,
    } => {
      let results = service.bulk_add_comment(&keys, &text, &mentions).await;
      print_json(&results)?;
    }
    // Dispatched before any client is built
    Command::Schedules(_) => {}
    Command::RunSchedules => print_json(&service.run_schedules().await?)?,
    Command::Reports(cmd) => match cmd {
      ReportsCommand::Save { report } => {
        print_json(&service.save_report(read_payload(&report)?).await?)?;
      }
      ReportsCommand::List { project } => {
        print_json(&service.list_reports(project.as_deref()).await?)?;
      }
      ReportsCommand::Delete { id } => print_json(&service.delete_report(&id).await?)?,
    },
    Command::Projects => print_json(&service.projects().await?)?,
    Command::Users { query } => print_json(&service.users(&query).await?)?,
    Command::Statuses => print_json(&service.statuses().await?)?,
    Command::Whoami => print_json(&service.current_user_email().await?)?,
  }

  Ok(())
}
