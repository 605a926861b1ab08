//! Error types for `tablesafe-core`.

use std::{fmt, time::Duration};

use thiserror::Error;
use uuid::Uuid;

use crate::{
  plan::{PartialWriteFailure, WriteStep},
  report::ReportStatus,
};

/// The record type an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
  Account,
  RestrictedAccount,
  Subject,
  Feedback,
  Report,
}

impl fmt::Display for RecordKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Account => "account",
      Self::RestrictedAccount => "restricted account",
      Self::Subject => "subject",
      Self::Feedback => "feedback entry",
      Self::Report => "report",
    })
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("{kind} not found: {id}")]
  NotFound { kind: RecordKind, id: Uuid },

  #[error("{kind} with {field} {value:?} already exists")]
  DuplicateKey {
    kind:  RecordKind,
    field: &'static str,
    value: String,
  },

  /// A move or update collided with a different, competing record.
  #[error("{kind} {id}: {field} {value:?} is held by another record")]
  Conflict {
    kind:  RecordKind,
    id:    Uuid,
    field: &'static str,
    value: String,
  },

  #[error("{dimension} rating {value} is outside [1, 5]")]
  InvalidRange { dimension: &'static str, value: f64 },

  #[error("report {id} cannot move from {from} to {to}")]
  InvalidTransition {
    id:   Uuid,
    from: ReportStatus,
    to:   ReportStatus,
  },

  #[error("account {0} cannot restrict itself")]
  SelfRestriction(Uuid),

  #[error(transparent)]
  PartialWriteFailure(Box<PartialWriteFailure>),

  /// A resume was requested for a step that is not part of the pending
  /// operation's plan.
  #[error("step {0} cannot be resumed for this operation")]
  InvalidResume(WriteStep),

  #[error("store call timed out after {0:?}")]
  Timeout(Duration),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn not_found(kind: RecordKind, id: Uuid) -> Self { Self::NotFound { kind, id } }

  /// Whether the failure came from the environment rather than the data, so
  /// that repeating the same call may succeed.
  pub fn is_transient(&self) -> bool {
    matches!(self, Self::Timeout(_) | Self::Storage(_))
  }

  pub fn as_partial_write(&self) -> Option<&PartialWriteFailure> {
    match self {
      Self::PartialWriteFailure(failure) => Some(failure),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
