//! [`SqliteFeedback`]: append-only feedback entries.

use rusqlite::OptionalExtension as _;
use tablesafe_core::{feedback::FeedbackEntry, store::FeedbackStore};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{FEEDBACK_COLUMNS, RawFeedback, encode_dt, encode_uuid},
};

#[derive(Clone)]
pub struct SqliteFeedback {
  conn: tokio_rusqlite::Connection,
}

impl SqliteFeedback {
  pub(crate) fn new(conn: tokio_rusqlite::Connection) -> Self { Self { conn } }

  /// Select entries whose `column` equals `value`, oldest first. `None`
  /// selects everything.
  async fn select(&self, filter: Option<(&'static str, String)>) -> Result<Vec<FeedbackEntry>> {
    let raws = self
      .conn
      .call(move |conn| {
        let rows = match filter {
          Some((column, value)) => {
            let mut stmt = conn.prepare(&format!(
              "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE {column} = ?1 ORDER BY rowid"
            ))?;
            stmt
              .query_map(rusqlite::params![value], RawFeedback::from_row)?
              .collect::<rusqlite::Result<Vec<_>>>()?
          }
          None => {
            let mut stmt = conn
              .prepare(&format!("SELECT {FEEDBACK_COLUMNS} FROM feedback ORDER BY rowid"))?;
            stmt
              .query_map([], RawFeedback::from_row)?
              .collect::<rusqlite::Result<Vec<_>>>()?
          }
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFeedback::into_entry).collect()
  }
}

impl FeedbackStore for SqliteFeedback {
  async fn create(&self, entry: FeedbackEntry) -> tablesafe_core::Result<FeedbackEntry> {
    let id_str      = encode_uuid(entry.feedback_id);
    let author_str  = encode_uuid(entry.author_id);
    let subject_str = encode_uuid(entry.subject_id);
    let at_str      = encode_dt(entry.created_at);

    let (inserted, raw) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = tx.execute(
          "INSERT OR IGNORE INTO feedback (feedback_id, author_id, subject_id, comment, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, author_str, subject_str, entry.comment, at_str],
        )?;
        let raw = tx.query_row(
          &format!("SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE feedback_id = ?1"),
          rusqlite::params![id_str],
          RawFeedback::from_row,
        )?;
        tx.commit()?;
        Ok((inserted, raw))
      })
      .await
      .map_err(Error::from)?;

    if inserted == 0 {
      debug!(feedback_id = %raw.feedback_id, "feedback entry already stored");
    }
    Ok(raw.into_entry()?)
  }

  async fn find_by_id(&self, id: Uuid) -> tablesafe_core::Result<Option<FeedbackEntry>> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE feedback_id = ?1"),
              rusqlite::params![id_str],
              RawFeedback::from_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::from)?;

    Ok(raw.map(RawFeedback::into_entry).transpose()?)
  }

  async fn find_by_subject(
    &self,
    subject_id: Uuid,
  ) -> tablesafe_core::Result<Vec<FeedbackEntry>> {
    Ok(self.select(Some(("subject_id", encode_uuid(subject_id)))).await?)
  }

  async fn find_by_author(&self, author_id: Uuid) -> tablesafe_core::Result<Vec<FeedbackEntry>> {
    Ok(self.select(Some(("author_id", encode_uuid(author_id)))).await?)
  }

  async fn find_all(&self) -> tablesafe_core::Result<Vec<FeedbackEntry>> {
    Ok(self.select(None).await?)
  }
}
