//! [`Coordinator`]: the entry point for operations that span stores.
//!
//! Every operation runs in two phases:
//!
//! 1. **Pre-flight.** All referenced records are looked up. A missing record
//!    fails the operation before anything is written.
//! 2. **Writes.** An ordered list of single-record writes (see
//!    [`crate::plan`]). Primary records get their ids before the first
//!    write. A domain error from the first write is returned as-is, since
//!    nothing was stored. A timeout or storage error from the first write,
//!    or any failure of a later write, becomes
//!    [`Error::PartialWriteFailure`], which [`Coordinator::resume`] accepts
//!    to finish the job.
//!
//! There is no cross-store transaction, no locking and no automatic retry.
//! Each step is idempotent on recheck, which is what makes resuming safe.

use std::{future::Future, time::Duration};

use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  account::Account,
  error::RecordKind,
  feedback::{FeedbackEntry, NewFeedback},
  plan::{PartialWriteFailure, PendingWrite, WriteStep},
  report::{NewReport, Report},
  store::{AccountStore, FeedbackStore, ReportStore, SubjectStore},
  subject::{RatingMeans, RatingSample, Subject},
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoordinatorConfig {
  /// Upper bound for each individual store call, in milliseconds. Unset
  /// means calls are not bounded here.
  #[serde(default)]
  pub step_timeout_ms: Option<u64>,
}

impl CoordinatorConfig {
  pub fn step_timeout(&self) -> Option<Duration> {
    self.step_timeout_ms.map(Duration::from_millis)
  }
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

pub struct Coordinator<A, S, F, R> {
  accounts: A,
  subjects: S,
  feedback: F,
  reports:  R,
  config:   CoordinatorConfig,
}

impl<A, S, F, R> Coordinator<A, S, F, R>
where
  A: AccountStore,
  S: SubjectStore,
  F: FeedbackStore,
  R: ReportStore,
{
  pub fn new(accounts: A, subjects: S, feedback: F, reports: R) -> Self {
    Self {
      accounts,
      subjects,
      feedback,
      reports,
      config: CoordinatorConfig::default(),
    }
  }

  pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
    self.config = config;
    self
  }

  pub fn accounts(&self) -> &A { &self.accounts }

  pub fn subjects(&self) -> &S { &self.subjects }

  pub fn feedback(&self) -> &F { &self.feedback }

  pub fn reports(&self) -> &R { &self.reports }

  // ── Operations ────────────────────────────────────────────────────────

  /// Record a comment by `author_id` about `subject_id`, then copy it into
  /// the subject's feedback text and the author's feedback ids.
  pub async fn submit_feedback(&self, input: NewFeedback) -> Result<FeedbackEntry> {
    self.require_account(input.author_id).await?;
    self.require_subject(input.subject_id).await?;

    let entry = FeedbackEntry::from_new(input);
    let pending = PendingWrite::Feedback { entry: entry.clone() };
    self.run(&pending, pending.plan(), Vec::new()).await?;

    info!(
      feedback_id = %entry.feedback_id,
      subject_id = %entry.subject_id,
      "feedback submitted"
    );
    Ok(entry)
  }

  /// File a safety report. A report bound to a subject is copied into the
  /// subject's incident list, which recomputes its incident count.
  pub async fn submit_report(&self, input: NewReport) -> Result<Report> {
    self.require_account(input.reporter_id).await?;
    if let Some(subject_id) = input.subject_id {
      self.require_subject(subject_id).await?;
    }

    let report = Report::from_new(input);
    let pending = PendingWrite::Report { report: report.clone() };
    self.run(&pending, pending.plan(), Vec::new()).await?;

    info!(
      report_id = %report.report_id,
      severity = report.severity.as_str(),
      "report submitted"
    );
    Ok(report)
  }

  /// Append one rating per dimension and return the recomputed means.
  ///
  /// The sample is validated before any write; an out-of-range value leaves
  /// the subject unchanged.
  pub async fn submit_rating(&self, subject_id: Uuid, sample: RatingSample) -> Result<RatingMeans> {
    self.require_subject(subject_id).await?;
    sample.validate()?;

    let means = self
      .bounded(self.subjects.append_rating_sample(subject_id, sample))
      .await?;

    debug!(%subject_id, ?means, "rating recorded");
    Ok(means)
  }

  /// Move `account_id` into the restricted store on behalf of `actor_id`.
  ///
  /// An account cannot restrict itself. Restricting an account that is
  /// already restricted returns the restricted record unchanged.
  pub async fn restrict_account(&self, actor_id: Uuid, account_id: Uuid) -> Result<Account> {
    if actor_id == account_id {
      return Err(Error::SelfRestriction(actor_id));
    }

    let Some(account) = self.bounded(self.accounts.find_by_id(account_id)).await? else {
      return self
        .bounded(self.accounts.find_restricted_by_id(account_id))
        .await?
        .ok_or(Error::not_found(RecordKind::Account, account_id));
    };

    let pending = PendingWrite::Restrict { account: account.clone() };
    self.run(&pending, pending.plan(), Vec::new()).await?;

    info!(%account_id, %actor_id, "account restricted");
    Ok(account)
  }

  /// Move `account_id` back into the active store.
  ///
  /// Fails with [`Error::Conflict`] if its email or user name was taken
  /// while it was restricted; nothing is written in that case.
  pub async fn unrestrict_account(&self, account_id: Uuid) -> Result<Account> {
    let Some(account) = self
      .bounded(self.accounts.find_restricted_by_id(account_id))
      .await?
    else {
      return self
        .bounded(self.accounts.find_by_id(account_id))
        .await?
        .ok_or(Error::not_found(RecordKind::RestrictedAccount, account_id));
    };

    self.require_keys_free(&account).await?;

    let pending = PendingWrite::Unrestrict { account: account.clone() };
    self.run(&pending, pending.plan(), Vec::new()).await?;

    info!(%account_id, "account unrestricted");
    Ok(account)
  }

  /// Run the remaining steps of a partially written operation, starting at
  /// the step that failed.
  ///
  /// Steps that already took effect are detected and skipped by the stores,
  /// so resuming never appends an id or a text entry twice. A failure during
  /// the resume is reported as a new [`PartialWriteFailure`].
  pub async fn resume(&self, failure: &PartialWriteFailure) -> Result<()> {
    let steps = failure
      .pending
      .steps_from(failure.failed)
      .ok_or(Error::InvalidResume(failure.failed))?;

    info!(
      operation = %failure.operation(),
      record_id = %failure.pending.record_id(),
      from = %failure.failed,
      "resuming partial write"
    );
    self
      .run(&failure.pending, steps, failure.completed.clone())
      .await
  }

  // ── Pre-flight ────────────────────────────────────────────────────────

  async fn require_account(&self, id: Uuid) -> Result<Account> {
    self
      .bounded(self.accounts.find_by_id(id))
      .await?
      .ok_or(Error::not_found(RecordKind::Account, id))
  }

  async fn require_subject(&self, id: Uuid) -> Result<Subject> {
    self
      .bounded(self.subjects.find_by_id(id))
      .await?
      .ok_or(Error::not_found(RecordKind::Subject, id))
  }

  /// Check that no other active account holds the email or user name of a
  /// restricted account about to be restored.
  async fn require_keys_free(&self, account: &Account) -> Result<()> {
    let by_email = self
      .bounded(self.accounts.find_by_email(account.email.clone()))
      .await?;
    if let Some(other) = by_email
      && other.account_id != account.account_id
    {
      return Err(Error::Conflict {
        kind:  RecordKind::RestrictedAccount,
        id:    account.account_id,
        field: "email",
        value: account.email.clone(),
      });
    }

    let by_user_name = self
      .bounded(self.accounts.find_by_user_name(account.user_name.clone()))
      .await?;
    if let Some(other) = by_user_name
      && other.account_id != account.account_id
    {
      return Err(Error::Conflict {
        kind:  RecordKind::RestrictedAccount,
        id:    account.account_id,
        field: "user_name",
        value: account.user_name.clone(),
      });
    }
    Ok(())
  }

  // ── Write plan execution ──────────────────────────────────────────────

  async fn run(
    &self,
    pending: &PendingWrite,
    steps: &[WriteStep],
    mut completed: Vec<WriteStep>,
  ) -> Result<()> {
    for &step in steps {
      match self.apply(pending, step).await {
        Ok(()) => {
          debug!(%step, record_id = %pending.record_id(), "write step completed");
          completed.push(step);
        }
        // A rejected first write stored nothing. A transient one may have
        // been committed anyway, so it stays resumable.
        Err(source) if completed.is_empty() && !source.is_transient() => return Err(source),
        Err(source) => {
          warn!(
            operation = %pending.operation(),
            record_id = %pending.record_id(),
            %step,
            error = %source,
            "partial write"
          );
          return Err(Error::PartialWriteFailure(Box::new(PartialWriteFailure {
            completed,
            failed: step,
            pending: pending.clone(),
            source,
          })));
        }
      }
    }
    Ok(())
  }

  /// Perform one step. Each arm tolerates its own effect already being in
  /// place.
  async fn apply(&self, pending: &PendingWrite, step: WriteStep) -> Result<()> {
    use WriteStep::*;

    match (pending, step) {
      (PendingWrite::Feedback { entry }, CreateFeedback) => {
        self.bounded(self.feedback.create(entry.clone())).await?;
      }
      (PendingWrite::Feedback { entry }, AppendFeedbackText) => {
        self
          .bounded(self.subjects.append_feedback_text(
            entry.subject_id,
            entry.feedback_id,
            entry.comment.clone(),
          ))
          .await?;
      }
      (PendingWrite::Feedback { entry }, LinkFeedbackToAccount) => {
        self
          .bounded(self.accounts.append_feedback_id(entry.author_id, entry.feedback_id))
          .await?;
      }
      (PendingWrite::Report { report }, CreateReport) => {
        self.bounded(self.reports.create(report.clone())).await?;
      }
      (PendingWrite::Report { report }, AppendIncident) => {
        let subject_id = report
          .subject_id
          .ok_or(Error::InvalidResume(AppendIncident))?;
        let count = self
          .bounded(self.subjects.increment_incident(
            subject_id,
            report.report_id,
            report.description.clone(),
          ))
          .await?;
        debug!(%subject_id, incident_count = count, "incident count recomputed");
      }
      (PendingWrite::Report { report }, LinkReportToAccount) => {
        self
          .bounded(self.accounts.append_report_id(report.reporter_id, report.report_id))
          .await?;
      }
      (PendingWrite::Restrict { account }, CopyToRestricted) => {
        self
          .bounded(self.accounts.insert_restricted(account.clone()))
          .await?;
      }
      (PendingWrite::Restrict { account }, RemoveFromActive) => {
        match self.bounded(self.accounts.delete(account.account_id)).await {
          Ok(_) | Err(Error::NotFound { .. }) => {}
          Err(e) => return Err(e),
        }
      }
      (PendingWrite::Unrestrict { account }, RestoreToActive) => {
        self
          .bounded(self.accounts.insert_active(account.clone()))
          .await?;
      }
      (PendingWrite::Unrestrict { account }, RemoveFromRestricted) => {
        self
          .bounded(self.accounts.delete_restricted(account.account_id))
          .await?;
      }
      (_, step) => return Err(Error::InvalidResume(step)),
    }
    Ok(())
  }

  /// Await a store call, bounded by the configured step timeout.
  async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
    match self.config.step_timeout() {
      Some(limit) => tokio::time::timeout(limit, call)
        .await
        .map_err(|_| Error::Timeout(limit))?,
      None => call.await,
    }
  }
}
