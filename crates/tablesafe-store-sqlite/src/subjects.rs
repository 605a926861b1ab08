//! [`SqliteSubjects`]: rateable subjects and their derived fields.
//!
//! Every mutation of derived state loads the row, applies the domain method
//! from `tablesafe_core::subject`, and writes the recomputed columns back
//! in the same transaction. Concurrent submissions therefore each see the
//! other's samples, and the stored mean always matches the stored list.

use rusqlite::OptionalExtension as _;
use tablesafe_core::{
  Error as DomainError, RecordKind,
  store::SubjectStore,
  subject::{DietFilter, NewSubject, RatingMeans, RatingSample, Subject, SubjectUpdate},
};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{RawSubject, SUBJECT_COLUMNS, encode_uuid},
  error::in_call,
};

enum Guarded<T> {
  Done(T),
  /// The name + address pair is taken; carries the pair for the error.
  Held(String),
  Missing,
}

fn pair_label(name: &str, address: &str) -> String { format!("{name} / {address}") }

#[derive(Clone)]
pub struct SqliteSubjects {
  conn: tokio_rusqlite::Connection,
}

impl SqliteSubjects {
  pub(crate) fn new(conn: tokio_rusqlite::Connection) -> Self { Self { conn } }

  /// Load a subject, apply `change`, and persist its derived columns.
  ///
  /// Returns `None` if the subject does not exist.
  async fn modify<T, F>(&self, id: Uuid, change: F) -> Result<Option<T>>
  where
    F: FnOnce(&mut Subject) -> T + Send + 'static,
    T: Send + 'static,
  {
    let id_str = encode_uuid(id);

    let out = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(raw) = select_one(&tx, &id_str)? else {
          return Ok(None);
        };
        let mut subject = raw.into_subject().map_err(in_call)?;
        let out = change(&mut subject);

        let raw = RawSubject::from_subject(&subject).map_err(in_call)?;
        tx.execute(
          "UPDATE subjects
           SET ratings = ?2, incident_count = ?3, feedback_text = ?4, incident_text = ?5
           WHERE subject_id = ?1",
          rusqlite::params![
            raw.subject_id,
            raw.ratings,
            raw.incident_count,
            raw.feedback_text,
            raw.incident_text,
          ],
        )?;
        tx.commit()?;
        Ok(Some(out))
      })
      .await?;

    Ok(out)
  }
}

fn select_one(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<RawSubject>> {
  conn
    .query_row(
      &format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE subject_id = ?1"),
      rusqlite::params![id],
      RawSubject::from_row,
    )
    .optional()
}

/// Whether a subject other than `except` already uses `name` + `address`.
fn pair_held(
  conn: &rusqlite::Connection,
  name: &str,
  address: &str,
  except: Option<&str>,
) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM subjects
         WHERE name = ?1 AND address = ?2 AND (?3 IS NULL OR subject_id <> ?3)",
        rusqlite::params![name, address, except],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

// ─── SubjectStore impl ───────────────────────────────────────────────────────

impl SubjectStore for SqliteSubjects {
  async fn create(&self, input: NewSubject) -> tablesafe_core::Result<Subject> {
    let subject = Subject::from_new(input);
    let raw = RawSubject::from_subject(&subject)?;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if pair_held(&tx, &raw.name, &raw.address, None)? {
          return Ok(Guarded::Held(pair_label(&raw.name, &raw.address)));
        }
        tx.execute(
          &format!(
            "INSERT INTO subjects ({SUBJECT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
          ),
          rusqlite::params![
            raw.subject_id,
            raw.name,
            raw.address,
            raw.category,
            raw.diet_tags,
            raw.ratings,
            raw.incident_count,
            raw.feedback_text,
            raw.incident_text,
          ],
        )?;
        tx.commit()?;
        Ok(Guarded::Done(()))
      })
      .await
      .map_err(Error::from)?;

    match outcome {
      Guarded::Done(()) => Ok(subject),
      Guarded::Held(value) => Err(DomainError::DuplicateKey {
        kind: RecordKind::Subject,
        field: "name+address",
        value,
      }),
      Guarded::Missing => Err(DomainError::not_found(RecordKind::Subject, subject.subject_id)),
    }
  }

  async fn find_by_id(&self, id: Uuid) -> tablesafe_core::Result<Option<Subject>> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| Ok(select_one(conn, &id_str)?))
      .await
      .map_err(Error::from)?;

    Ok(raw.map(RawSubject::into_subject).transpose()?)
  }

  async fn find_all(&self, filter: DietFilter) -> tablesafe_core::Result<Vec<Subject>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {SUBJECT_COLUMNS} FROM subjects ORDER BY rowid"))?;
        let rows = stmt
          .query_map([], RawSubject::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::from)?;

    let mut subjects = Vec::with_capacity(raws.len());
    for raw in raws {
      let subject = raw.into_subject()?;
      if filter.matches(&subject) {
        subjects.push(subject);
      }
    }
    Ok(subjects)
  }

  async fn update(&self, id: Uuid, update: SubjectUpdate) -> tablesafe_core::Result<Subject> {
    let id_str = encode_uuid(id);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(raw) = select_one(&tx, &id_str)? else {
          return Ok(Guarded::Missing);
        };
        let mut subject = raw.into_subject().map_err(in_call)?;
        subject.apply(update);
        if pair_held(&tx, &subject.name, &subject.address, Some(id_str.as_str()))? {
          return Ok(Guarded::Held(pair_label(&subject.name, &subject.address)));
        }

        let raw = RawSubject::from_subject(&subject).map_err(in_call)?;
        tx.execute(
          "UPDATE subjects SET name = ?2, address = ?3, category = ?4, diet_tags = ?5
           WHERE subject_id = ?1",
          rusqlite::params![raw.subject_id, raw.name, raw.address, raw.category, raw.diet_tags],
        )?;
        tx.commit()?;
        Ok(Guarded::Done(subject))
      })
      .await
      .map_err(Error::from)?;

    match outcome {
      Guarded::Done(subject) => Ok(subject),
      Guarded::Held(value) => Err(DomainError::Conflict {
        kind: RecordKind::Subject,
        id,
        field: "name+address",
        value,
      }),
      Guarded::Missing => Err(DomainError::not_found(RecordKind::Subject, id)),
    }
  }

  async fn delete(&self, id: Uuid) -> tablesafe_core::Result<Subject> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(raw) = select_one(&tx, &id_str)? else {
          return Ok(None);
        };
        tx.execute("DELETE FROM subjects WHERE subject_id = ?1", rusqlite::params![id_str])?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await
      .map_err(Error::from)?;

    match raw {
      Some(raw) => Ok(raw.into_subject()?),
      None => Err(DomainError::not_found(RecordKind::Subject, id)),
    }
  }

  async fn append_rating_sample(
    &self,
    id: Uuid,
    sample: RatingSample,
  ) -> tablesafe_core::Result<RatingMeans> {
    // Validate before touching the row so a bad sample never reaches storage.
    sample.validate()?;

    self
      .modify(id, move |subject| subject.ratings.push(sample))
      .await?
      .ok_or(DomainError::not_found(RecordKind::Subject, id))?
  }

  async fn append_feedback_text(
    &self,
    id: Uuid,
    source_id: Uuid,
    text: String,
  ) -> tablesafe_core::Result<bool> {
    self
      .modify(id, move |subject| subject.push_feedback_text(source_id, text))
      .await?
      .ok_or(DomainError::not_found(RecordKind::Subject, id))
  }

  async fn increment_incident(
    &self,
    id: Uuid,
    source_id: Uuid,
    description: String,
  ) -> tablesafe_core::Result<u64> {
    self
      .modify(id, move |subject| {
        subject.push_incident(source_id, description);
        subject.incident_count
      })
      .await?
      .ok_or(DomainError::not_found(RecordKind::Subject, id))
  }
}
