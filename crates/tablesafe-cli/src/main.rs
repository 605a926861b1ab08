//! `tablesafe`: admin tool for a tablesafe SQLite store.
//!
//! Reads `tablesafe.toml` (or the path given with `--config`), overlays
//! `TABLESAFE_*` environment variables, opens the store and runs one
//! command. Results are printed to stdout as JSON.
//!
//! # Usage
//!
//! ```text
//! tablesafe account register --first-name Ada --last-name Lovelace \
//!   --user-name ada --email ada@example.com --password-hash '$argon2id$...'
//! tablesafe subject list --diet vegan
//! tablesafe report status 5b0e... reviewing
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tablesafe_core::{
  Coordinator, CoordinatorConfig,
  account::{NewAccount, Role},
  feedback::NewFeedback,
  report::{NewReport, ReportStatus, Severity},
  store::{AccountStore, FeedbackStore, ReportStore, SubjectStore},
  subject::{DietFilter, NewSubject, RatingSample},
};
use tablesafe_store_sqlite::{
  SqliteAccounts, SqliteFeedback, SqliteReports, SqliteStore, SqliteSubjects,
};
use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

type SqliteCoordinator =
  Coordinator<SqliteAccounts, SqliteSubjects, SqliteFeedback, SqliteReports>;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct AdminConfig {
  #[serde(default = "default_store_path")]
  store_path:  PathBuf,
  #[serde(default)]
  coordinator: CoordinatorConfig,
}

fn default_store_path() -> PathBuf { PathBuf::from("tablesafe.db") }

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "tablesafe", version, about = "Admin tool for the tablesafe record store")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "tablesafe.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Manage accounts.
  #[command(subcommand)]
  Account(AccountCommand),
  /// Manage rateable subjects.
  #[command(subcommand)]
  Subject(SubjectCommand),
  /// Submit or list feedback.
  #[command(subcommand)]
  Feedback(FeedbackCommand),
  /// File, review or list safety reports.
  #[command(subcommand)]
  Report(ReportCommand),
}

#[derive(Subcommand)]
enum AccountCommand {
  /// Register a new active account.
  Register(RegisterArgs),
  /// List active accounts, or the restricted ones with `--restricted`.
  List {
    #[arg(long)]
    restricted: bool,
  },
  /// Move an account into the restricted store.
  Restrict {
    account_id: Uuid,
    /// The administrator performing the restriction.
    #[arg(long)]
    actor:      Uuid,
  },
  /// Move a restricted account back to the active store.
  Unrestrict { account_id: Uuid },
}

#[derive(Args)]
struct RegisterArgs {
  #[arg(long)]
  first_name:    String,
  #[arg(long)]
  last_name:     String,
  #[arg(long)]
  user_name:     String,
  #[arg(long)]
  email:         String,
  /// An already-hashed password (PHC string).
  #[arg(long)]
  password_hash: String,
  #[arg(long)]
  admin:         bool,
}

#[derive(Subcommand)]
enum SubjectCommand {
  /// Register a subject.
  Add {
    #[arg(long)]
    name:     String,
    #[arg(long)]
    address:  String,
    #[arg(long)]
    category: String,
    /// Diet tag; repeat for several.
    #[arg(long = "diet")]
    diet:     Vec<String>,
  },
  /// List subjects, optionally only those carrying a diet tag.
  List {
    #[arg(long)]
    diet: Option<String>,
  },
  /// Submit one rating per dimension, each in [1, 5].
  Rate {
    subject_id:    Uuid,
    #[arg(long)]
    quality:       f64,
    #[arg(long)]
    safety:        f64,
    #[arg(long)]
    accessibility: f64,
  },
}

#[derive(Subcommand)]
enum FeedbackCommand {
  /// Record a comment about a subject.
  Submit {
    subject_id: Uuid,
    #[arg(long)]
    author:     Uuid,
    comment:    String,
  },
  /// List feedback, optionally for one subject or author.
  List {
    #[arg(long, conflicts_with = "author")]
    subject: Option<Uuid>,
    #[arg(long)]
    author:  Option<Uuid>,
  },
}

#[derive(Subcommand)]
enum ReportCommand {
  /// File a safety report.
  File {
    #[arg(long)]
    reporter:    Uuid,
    #[arg(long)]
    subject:     Option<Uuid>,
    #[arg(long)]
    location:    String,
    #[arg(long)]
    description: String,
    /// low, medium, high or critical.
    #[arg(long)]
    severity:    Severity,
  },
  /// Move a report forward: reviewing or resolved.
  Status { report_id: Uuid, status: ReportStatus },
  /// List reports, optionally for one subject or reporter.
  List {
    #[arg(long, conflicts_with = "reporter")]
    subject:  Option<Uuid>,
    #[arg(long)]
    reporter: Option<Uuid>,
  },
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("TABLESAFE")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let admin_cfg: AdminConfig = settings
    .try_deserialize()
    .context("failed to deserialise AdminConfig")?;

  let store_path = expand_tilde(&admin_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let coordinator = Coordinator::new(
    store.accounts(),
    store.subjects(),
    store.feedback(),
    store.reports(),
  )
  .with_config(admin_cfg.coordinator);

  let result = run(&coordinator, cli.command).await;
  if let Err(e) = &result
    && let Some(failure) = e
      .downcast_ref::<tablesafe_core::Error>()
      .and_then(tablesafe_core::Error::as_partial_write)
  {
    let pending = serde_json::to_string(&failure.pending).unwrap_or_default();
    warn!(
      operation = %failure.operation(),
      failed = %failure.failed,
      %pending,
      "operation left partially written; rerun or repair by hand"
    );
  }
  result
}

async fn run(c: &SqliteCoordinator, command: Command) -> anyhow::Result<()> {
  match command {
    Command::Account(cmd) => account(c, cmd).await,
    Command::Subject(cmd) => subject(c, cmd).await,
    Command::Feedback(cmd) => feedback(c, cmd).await,
    Command::Report(cmd) => report(c, cmd).await,
  }
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn account(c: &SqliteCoordinator, cmd: AccountCommand) -> anyhow::Result<()> {
  match cmd {
    AccountCommand::Register(args) => {
      let input = NewAccount {
        first_name:    args.first_name,
        last_name:     args.last_name,
        user_name:     args.user_name,
        email:         args.email,
        password_hash: args.password_hash,
        role:          if args.admin { Role::Admin } else { Role::User },
        restrictions:  Default::default(),
      };
      let account = c.accounts().create(input).await.context("register failed")?;
      print_json(&account)
    }
    AccountCommand::List { restricted: false } => print_json(&c.accounts().list().await?),
    AccountCommand::List { restricted: true } => {
      print_json(&c.accounts().list_restricted().await?)
    }
    AccountCommand::Restrict { account_id, actor } => {
      let account = c
        .restrict_account(actor, account_id)
        .await
        .with_context(|| format!("failed to restrict {account_id}"))?;
      print_json(&account)
    }
    AccountCommand::Unrestrict { account_id } => {
      let account = c
        .unrestrict_account(account_id)
        .await
        .with_context(|| format!("failed to unrestrict {account_id}"))?;
      print_json(&account)
    }
  }
}

async fn subject(c: &SqliteCoordinator, cmd: SubjectCommand) -> anyhow::Result<()> {
  match cmd {
    SubjectCommand::Add { name, address, category, diet } => {
      let input = NewSubject {
        name,
        address,
        category,
        diet_tags: diet.into_iter().collect(),
      };
      print_json(&c.subjects().create(input).await?)
    }
    SubjectCommand::List { diet } => {
      let filter = DietFilter::new(diet.as_deref());
      print_json(&c.subjects().find_all(filter).await?)
    }
    SubjectCommand::Rate { subject_id, quality, safety, accessibility } => {
      let sample = RatingSample { quality, safety, accessibility };
      let means = c
        .submit_rating(subject_id, sample)
        .await
        .with_context(|| format!("failed to rate {subject_id}"))?;
      print_json(&means)
    }
  }
}

async fn feedback(c: &SqliteCoordinator, cmd: FeedbackCommand) -> anyhow::Result<()> {
  match cmd {
    FeedbackCommand::Submit { subject_id, author, comment } => {
      let entry = c
        .submit_feedback(NewFeedback { author_id: author, subject_id, comment })
        .await?;
      print_json(&entry)
    }
    FeedbackCommand::List { subject: Some(id), .. } => {
      print_json(&c.feedback().find_by_subject(id).await?)
    }
    FeedbackCommand::List { author: Some(id), .. } => {
      print_json(&c.feedback().find_by_author(id).await?)
    }
    FeedbackCommand::List { .. } => print_json(&c.feedback().find_all().await?),
  }
}

async fn report(c: &SqliteCoordinator, cmd: ReportCommand) -> anyhow::Result<()> {
  match cmd {
    ReportCommand::File { reporter, subject, location, description, severity } => {
      let input = NewReport {
        reporter_id: reporter,
        subject_id: subject,
        location,
        description,
        severity,
      };
      print_json(&c.submit_report(input).await?)
    }
    ReportCommand::Status { report_id, status } => {
      let report = c
        .reports()
        .update_status(report_id, status)
        .await
        .with_context(|| format!("failed to move {report_id} to {status}"))?;
      if report.status.is_terminal() {
        tracing::info!(%report_id, "report closed");
      }
      print_json(&report)
    }
    ReportCommand::List { subject: Some(id), .. } => {
      print_json(&c.reports().find_by_subject(id).await?)
    }
    ReportCommand::List { reporter: Some(id), .. } => {
      print_json(&c.reports().find_by_reporter(id).await?)
    }
    ReportCommand::List { .. } => print_json(&c.reports().find_all().await?),
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
