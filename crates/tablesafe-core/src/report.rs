//! Safety reports and their forward-only status lifecycle.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Low,
  Medium,
  High,
  Critical,
}

impl Severity {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Low => "low",
      Self::Medium => "medium",
      Self::High => "high",
      Self::Critical => "critical",
    }
  }
}

impl FromStr for Severity {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "low" => Ok(Self::Low),
      "medium" => Ok(Self::Medium),
      "high" => Ok(Self::High),
      "critical" => Ok(Self::Critical),
      other => Err(format!("unknown severity: {other:?}")),
    }
  }
}

/// Report status. Variants are declared in lifecycle order; a report only
/// ever moves to a later variant.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum ReportStatus {
  #[default]
  Reported,
  Reviewing,
  Resolved,
}

impl ReportStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Reported => "Reported",
      Self::Reviewing => "Reviewing",
      Self::Resolved => "Resolved",
    }
  }

  /// Whether `next` is strictly later in the lifecycle. `Resolved` accepts
  /// nothing.
  pub fn can_transition_to(self, next: Self) -> bool { next > self }

  pub fn is_terminal(self) -> bool { self == Self::Resolved }
}

impl fmt::Display for ReportStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ReportStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "reported" => Ok(Self::Reported),
      "reviewing" => Ok(Self::Reviewing),
      "resolved" => Ok(Self::Resolved),
      other => Err(format!("unknown report status: {other:?}")),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
  pub report_id:   Uuid,
  pub reporter_id: Uuid,
  /// The subject the incident happened at, if known.
  pub subject_id:  Option<Uuid>,
  pub location:    String,
  pub description: String,
  pub severity:    Severity,
  pub status:      ReportStatus,
  pub created_at:  DateTime<Utc>,
}

impl Report {
  /// A new report in status [`ReportStatus::Reported`], with its id and
  /// timestamp already assigned.
  pub fn from_new(input: NewReport) -> Self {
    Self {
      report_id:   Uuid::new_v4(),
      reporter_id: input.reporter_id,
      subject_id:  input.subject_id,
      location:    input.location,
      description: input.description,
      severity:    input.severity,
      status:      ReportStatus::Reported,
      created_at:  Utc::now(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReport {
  pub reporter_id: Uuid,
  pub subject_id:  Option<Uuid>,
  pub location:    String,
  pub description: String,
  pub severity:    Severity,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn transitions_only_move_forward() {
    use ReportStatus::*;
    assert!(Reported.can_transition_to(Reviewing));
    assert!(Reported.can_transition_to(Resolved));
    assert!(Reviewing.can_transition_to(Resolved));

    assert!(!Reported.can_transition_to(Reported));
    assert!(!Reviewing.can_transition_to(Reported));
    assert!(!Resolved.can_transition_to(Reviewing));
    assert!(!Resolved.can_transition_to(Resolved));
    assert!(Resolved.is_terminal());
  }

  #[test]
  fn parse_status_and_severity() {
    assert_eq!("reviewing".parse::<ReportStatus>().unwrap(), ReportStatus::Reviewing);
    assert_eq!("Resolved".parse::<ReportStatus>().unwrap(), ReportStatus::Resolved);
    assert!("closed".parse::<ReportStatus>().is_err());
    assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
    assert!("urgent".parse::<Severity>().is_err());
  }
}
