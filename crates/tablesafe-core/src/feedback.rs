//! Feedback entries: free-text comments by one account about one subject.
//! Immutable once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
  pub feedback_id: Uuid,
  pub author_id:   Uuid,
  pub subject_id:  Uuid,
  pub comment:     String,
  pub created_at:  DateTime<Utc>,
}

impl FeedbackEntry {
  /// Assign the id and timestamp of a new entry before it is written, so
  /// that every attempt to store it refers to the same record.
  pub fn from_new(input: NewFeedback) -> Self {
    Self {
      feedback_id: Uuid::new_v4(),
      author_id:   input.author_id,
      subject_id:  input.subject_id,
      comment:     input.comment,
      created_at:  Utc::now(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFeedback {
  pub author_id:  Uuid,
  pub subject_id: Uuid,
  pub comment:    String,
}
