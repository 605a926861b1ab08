//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings.
//! Sets, lists and rating dimensions are compact JSON.

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tablesafe_core::{
  account::{Account, Role},
  feedback::FeedbackEntry,
  report::{Report, ReportStatus, Severity},
  subject::Subject,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_json<T: Serialize>(value: &T) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

pub fn decode_json<T: DeserializeOwned>(s: &str) -> Result<T> { Ok(serde_json::from_str(s)?) }

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn encode_role(r: Role) -> &'static str {
  match r {
    Role::User => "user",
    Role::Admin => "admin",
  }
}

pub fn decode_role(s: &str) -> Result<Role> {
  match s {
    "user" => Ok(Role::User),
    "admin" => Ok(Role::Admin),
    other => Err(Error::UnknownValue { column: "role", value: other.to_owned() }),
  }
}

pub fn decode_severity(s: &str) -> Result<Severity> {
  s.parse()
    .map_err(|_| Error::UnknownValue { column: "severity", value: s.to_owned() })
}

pub fn decode_status(s: &str) -> Result<ReportStatus> {
  s.parse()
    .map_err(|_| Error::UnknownValue { column: "status", value: s.to_owned() })
}

// ─── Accounts ────────────────────────────────────────────────────────────────

pub const ACCOUNT_COLUMNS: &str = "account_id, first_name, last_name, user_name, email, \
                                   password_hash, role, restrictions, feedback_ids, report_ids";

/// An account row as stored, in both directions.
pub struct RawAccount {
  pub account_id:    String,
  pub first_name:    String,
  pub last_name:     String,
  pub user_name:     String,
  pub email:         String,
  pub password_hash: String,
  pub role:          String,
  pub restrictions:  String,
  pub feedback_ids:  String,
  pub report_ids:    String,
}

impl RawAccount {
  pub fn from_account(a: &Account) -> Result<Self> {
    Ok(Self {
      account_id:    encode_uuid(a.account_id),
      first_name:    a.first_name.clone(),
      last_name:     a.last_name.clone(),
      user_name:     a.user_name.clone(),
      email:         a.email.clone(),
      password_hash: a.password_hash.clone(),
      role:          encode_role(a.role).to_owned(),
      restrictions:  encode_json(&a.restrictions)?,
      feedback_ids:  encode_json(&a.feedback_ids)?,
      report_ids:    encode_json(&a.report_ids)?,
    })
  }

  /// Map a row selected with [`ACCOUNT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      account_id:    row.get(0)?,
      first_name:    row.get(1)?,
      last_name:     row.get(2)?,
      user_name:     row.get(3)?,
      email:         row.get(4)?,
      password_hash: row.get(5)?,
      role:          row.get(6)?,
      restrictions:  row.get(7)?,
      feedback_ids:  row.get(8)?,
      report_ids:    row.get(9)?,
    })
  }

  pub fn into_account(self) -> Result<Account> {
    Ok(Account {
      account_id:    decode_uuid(&self.account_id)?,
      first_name:    self.first_name,
      last_name:     self.last_name,
      user_name:     self.user_name,
      email:         self.email,
      password_hash: self.password_hash,
      role:          decode_role(&self.role)?,
      restrictions:  decode_json(&self.restrictions)?,
      feedback_ids:  decode_json(&self.feedback_ids)?,
      report_ids:    decode_json(&self.report_ids)?,
    })
  }
}

// ─── Subjects ────────────────────────────────────────────────────────────────

pub const SUBJECT_COLUMNS: &str = "subject_id, name, address, category, diet_tags, ratings, \
                                   incident_count, feedback_text, incident_text";

pub struct RawSubject {
  pub subject_id:     String,
  pub name:           String,
  pub address:        String,
  pub category:       String,
  pub diet_tags:      String,
  pub ratings:        String,
  pub incident_count: i64,
  pub feedback_text:  String,
  pub incident_text:  String,
}

impl RawSubject {
  pub fn from_subject(s: &Subject) -> Result<Self> {
    Ok(Self {
      subject_id:     encode_uuid(s.subject_id),
      name:           s.name.clone(),
      address:        s.address.clone(),
      category:       s.category.clone(),
      diet_tags:      encode_json(&s.diet_tags)?,
      ratings:        encode_json(&s.ratings)?,
      incident_count: s.incident_count as i64,
      feedback_text:  encode_json(&s.feedback_text)?,
      incident_text:  encode_json(&s.incident_text)?,
    })
  }

  /// Map a row selected with [`SUBJECT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id:     row.get(0)?,
      name:           row.get(1)?,
      address:        row.get(2)?,
      category:       row.get(3)?,
      diet_tags:      row.get(4)?,
      ratings:        row.get(5)?,
      incident_count: row.get(6)?,
      feedback_text:  row.get(7)?,
      incident_text:  row.get(8)?,
    })
  }

  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id:     decode_uuid(&self.subject_id)?,
      name:           self.name,
      address:        self.address,
      category:       self.category,
      diet_tags:      decode_json(&self.diet_tags)?,
      ratings:        decode_json(&self.ratings)?,
      incident_count: self.incident_count.max(0) as u64,
      feedback_text:  decode_json(&self.feedback_text)?,
      incident_text:  decode_json(&self.incident_text)?,
    })
  }
}

// ─── Feedback ────────────────────────────────────────────────────────────────

pub const FEEDBACK_COLUMNS: &str = "feedback_id, author_id, subject_id, comment, created_at";

pub struct RawFeedback {
  pub feedback_id: String,
  pub author_id:   String,
  pub subject_id:  String,
  pub comment:     String,
  pub created_at:  String,
}

impl RawFeedback {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      feedback_id: row.get(0)?,
      author_id:   row.get(1)?,
      subject_id:  row.get(2)?,
      comment:     row.get(3)?,
      created_at:  row.get(4)?,
    })
  }

  pub fn into_entry(self) -> Result<FeedbackEntry> {
    Ok(FeedbackEntry {
      feedback_id: decode_uuid(&self.feedback_id)?,
      author_id:   decode_uuid(&self.author_id)?,
      subject_id:  decode_uuid(&self.subject_id)?,
      comment:     self.comment,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

// ─── Reports ─────────────────────────────────────────────────────────────────

pub const REPORT_COLUMNS: &str =
  "report_id, reporter_id, subject_id, location, description, severity, status, created_at";

pub struct RawReport {
  pub report_id:   String,
  pub reporter_id: String,
  pub subject_id:  Option<String>,
  pub location:    String,
  pub description: String,
  pub severity:    String,
  pub status:      String,
  pub created_at:  String,
}

impl RawReport {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      report_id:   row.get(0)?,
      reporter_id: row.get(1)?,
      subject_id:  row.get(2)?,
      location:    row.get(3)?,
      description: row.get(4)?,
      severity:    row.get(5)?,
      status:      row.get(6)?,
      created_at:  row.get(7)?,
    })
  }

  pub fn into_report(self) -> Result<Report> {
    Ok(Report {
      report_id:   decode_uuid(&self.report_id)?,
      reporter_id: decode_uuid(&self.reporter_id)?,
      subject_id:  self.subject_id.as_deref().map(decode_uuid).transpose()?,
      location:    self.location,
      description: self.description,
      severity:    decode_severity(&self.severity)?,
      status:      decode_status(&self.status)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn role_round_trips_and_rejects_unknown() {
    assert_eq!(decode_role(encode_role(Role::Admin)).unwrap(), Role::Admin);
    assert!(matches!(
      decode_role("root"),
      Err(Error::UnknownValue { column: "role", .. })
    ));
  }

  #[test]
  fn status_column_uses_lifecycle_names() {
    assert_eq!(decode_status("Reviewing").unwrap(), ReportStatus::Reviewing);
    assert!(decode_status("Closed").is_err());
  }
}
