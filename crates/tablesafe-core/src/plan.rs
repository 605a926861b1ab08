//! Ordered write plans for multi-store operations.
//!
//! Every coordinator operation that touches more than one record is a fixed
//! sequence of [`WriteStep`]s. When a step fails after an earlier one has
//! been made durable, the coordinator returns a [`PartialWriteFailure`]
//! holding a [`PendingWrite`]: enough state to run the remaining steps again
//! with [`Coordinator::resume`](crate::coordinator::Coordinator::resume).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{account::Account, feedback::FeedbackEntry, report::Report};

/// A coordinator operation that runs a write plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
  SubmitFeedback,
  SubmitReport,
  RestrictAccount,
  UnrestrictAccount,
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::SubmitFeedback => "submit_feedback",
      Self::SubmitReport => "submit_report",
      Self::RestrictAccount => "restrict_account",
      Self::UnrestrictAccount => "unrestrict_account",
    })
  }
}

/// One single-record write inside a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStep {
  CreateFeedback,
  AppendFeedbackText,
  LinkFeedbackToAccount,
  CreateReport,
  AppendIncident,
  LinkReportToAccount,
  CopyToRestricted,
  RemoveFromActive,
  RestoreToActive,
  RemoveFromRestricted,
}

impl fmt::Display for WriteStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::CreateFeedback => "create_feedback",
      Self::AppendFeedbackText => "append_feedback_text",
      Self::LinkFeedbackToAccount => "link_feedback_to_account",
      Self::CreateReport => "create_report",
      Self::AppendIncident => "append_incident",
      Self::LinkReportToAccount => "link_report_to_account",
      Self::CopyToRestricted => "copy_to_restricted",
      Self::RemoveFromActive => "remove_from_active",
      Self::RestoreToActive => "restore_to_active",
      Self::RemoveFromRestricted => "remove_from_restricted",
    })
  }
}

/// The state an unfinished operation needs to carry on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum PendingWrite {
  /// A feedback entry that exists but may lack its back-references.
  Feedback { entry: FeedbackEntry },
  /// A report that exists but may lack its back-references.
  Report { report: Report },
  /// An account snapshot being moved into the restricted key space.
  Restrict { account: Account },
  /// An account snapshot being moved back into the active key space.
  Unrestrict { account: Account },
}

impl PendingWrite {
  pub fn operation(&self) -> Operation {
    match self {
      Self::Feedback { .. } => Operation::SubmitFeedback,
      Self::Report { .. } => Operation::SubmitReport,
      Self::Restrict { .. } => Operation::RestrictAccount,
      Self::Unrestrict { .. } => Operation::UnrestrictAccount,
    }
  }

  /// The full ordered step list for this operation.
  pub fn plan(&self) -> &'static [WriteStep] {
    use WriteStep::*;
    match self {
      Self::Feedback { .. } => &[CreateFeedback, AppendFeedbackText, LinkFeedbackToAccount],
      Self::Report { report } if report.subject_id.is_some() => {
        &[CreateReport, AppendIncident, LinkReportToAccount]
      }
      Self::Report { .. } => &[CreateReport, LinkReportToAccount],
      Self::Restrict { .. } => &[CopyToRestricted, RemoveFromActive],
      Self::Unrestrict { .. } => &[RestoreToActive, RemoveFromRestricted],
    }
  }

  /// The steps from `step` (inclusive) to the end of the plan, or `None` if
  /// `step` is not part of it.
  pub fn steps_from(&self, step: WriteStep) -> Option<&'static [WriteStep]> {
    let plan = self.plan();
    plan.iter().position(|s| *s == step).map(|i| &plan[i..])
  }

  /// Id of the primary record the operation is about.
  pub fn record_id(&self) -> Uuid {
    match self {
      Self::Feedback { entry } => entry.feedback_id,
      Self::Report { report } => report.report_id,
      Self::Restrict { account } | Self::Unrestrict { account } => account.account_id,
    }
  }
}

/// A multi-store operation stopped after a write that may have taken effect.
/// `completed` is empty when the first write itself timed out or failed in
/// storage.
#[derive(Debug, Error)]
#[error(
  "{} stopped at step {} ({failed}): {source}",
  .pending.operation(),
  .completed.len()
)]
pub struct PartialWriteFailure {
  /// Steps that completed, in order.
  pub completed: Vec<WriteStep>,
  /// The step that failed. Resuming starts here.
  pub failed:    WriteStep,
  pub pending:   PendingWrite,
  #[source]
  pub source:    crate::Error,
}

impl PartialWriteFailure {
  pub fn operation(&self) -> Operation { self.pending.operation() }

  /// Zero-based position of the failed step in the plan.
  pub fn step_index(&self) -> usize { self.completed.len() }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::report::{ReportStatus, Severity};

  fn report(subject_id: Option<Uuid>) -> Report {
    Report {
      report_id: Uuid::new_v4(),
      reporter_id: Uuid::new_v4(),
      subject_id,
      location: "kitchen".into(),
      description: "leak".into(),
      severity: Severity::High,
      status: ReportStatus::Reported,
      created_at: Utc::now(),
    }
  }

  #[test]
  fn unbound_report_skips_incident_step() {
    let bound = PendingWrite::Report { report: report(Some(Uuid::new_v4())) };
    let unbound = PendingWrite::Report { report: report(None) };
    assert!(bound.plan().contains(&WriteStep::AppendIncident));
    assert!(!unbound.plan().contains(&WriteStep::AppendIncident));
  }

  #[test]
  fn steps_from_slices_plan_tail() {
    let pending = PendingWrite::Report { report: report(Some(Uuid::new_v4())) };
    assert_eq!(
      pending.steps_from(WriteStep::AppendIncident),
      Some(&[WriteStep::AppendIncident, WriteStep::LinkReportToAccount][..])
    );
    assert_eq!(pending.steps_from(WriteStep::RemoveFromActive), None);
  }
}
