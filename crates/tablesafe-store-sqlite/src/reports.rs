//! [`SqliteReports`]: safety reports and their status lifecycle.

use rusqlite::OptionalExtension as _;
use tablesafe_core::{
  Error as DomainError, RecordKind,
  report::{Report, ReportStatus},
  store::ReportStore,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{REPORT_COLUMNS, RawReport, decode_status, encode_dt, encode_uuid},
  error::in_call,
};

/// Outcome of a guarded status change.
enum StatusChange {
  Applied(RawReport),
  Rejected(ReportStatus),
  Missing,
}

#[derive(Clone)]
pub struct SqliteReports {
  conn: tokio_rusqlite::Connection,
}

impl SqliteReports {
  pub(crate) fn new(conn: tokio_rusqlite::Connection) -> Self { Self { conn } }

  async fn select(&self, filter: Option<(&'static str, String)>) -> Result<Vec<Report>> {
    let raws = self
      .conn
      .call(move |conn| {
        let rows = match filter {
          Some((column, value)) => {
            let mut stmt = conn.prepare(&format!(
              "SELECT {REPORT_COLUMNS} FROM reports WHERE {column} = ?1 ORDER BY rowid"
            ))?;
            stmt
              .query_map(rusqlite::params![value], RawReport::from_row)?
              .collect::<rusqlite::Result<Vec<_>>>()?
          }
          None => {
            let mut stmt = conn
              .prepare(&format!("SELECT {REPORT_COLUMNS} FROM reports ORDER BY rowid"))?;
            stmt
              .query_map([], RawReport::from_row)?
              .collect::<rusqlite::Result<Vec<_>>>()?
          }
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReport::into_report).collect()
  }
}

fn select_one(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<RawReport>> {
  conn
    .query_row(
      &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE report_id = ?1"),
      rusqlite::params![id],
      RawReport::from_row,
    )
    .optional()
}

impl ReportStore for SqliteReports {
  async fn create(&self, report: Report) -> tablesafe_core::Result<Report> {
    let id_str       = encode_uuid(report.report_id);
    let reporter_str = encode_uuid(report.reporter_id);
    let subject_str  = report.subject_id.map(encode_uuid);
    let severity     = report.severity.as_str();
    let status       = report.status.as_str();
    let at_str       = encode_dt(report.created_at);

    let (inserted, raw) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = tx.execute(
          &format!(
            "INSERT OR IGNORE INTO reports ({REPORT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
          ),
          rusqlite::params![
            id_str,
            reporter_str,
            subject_str,
            report.location,
            report.description,
            severity,
            status,
            at_str,
          ],
        )?;
        let raw = select_one(&tx, &id_str)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok((inserted, raw))
      })
      .await
      .map_err(Error::from)?;

    if inserted == 0 {
      debug!(report_id = %raw.report_id, "report already stored");
    }
    Ok(raw.into_report()?)
  }

  async fn find_by_id(&self, id: Uuid) -> tablesafe_core::Result<Option<Report>> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| Ok(select_one(conn, &id_str)?))
      .await
      .map_err(Error::from)?;

    Ok(raw.map(RawReport::into_report).transpose()?)
  }

  async fn find_by_subject(&self, subject_id: Uuid) -> tablesafe_core::Result<Vec<Report>> {
    Ok(self.select(Some(("subject_id", encode_uuid(subject_id)))).await?)
  }

  async fn find_by_reporter(&self, reporter_id: Uuid) -> tablesafe_core::Result<Vec<Report>> {
    Ok(self.select(Some(("reporter_id", encode_uuid(reporter_id)))).await?)
  }

  async fn find_all(&self) -> tablesafe_core::Result<Vec<Report>> {
    Ok(self.select(None).await?)
  }

  async fn update_status(
    &self,
    id: Uuid,
    status: ReportStatus,
  ) -> tablesafe_core::Result<Report> {
    let id_str = encode_uuid(id);

    let change = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(mut raw) = select_one(&tx, &id_str)? else {
          return Ok(StatusChange::Missing);
        };
        let current = decode_status(&raw.status).map_err(in_call)?;
        if !current.can_transition_to(status) {
          return Ok(StatusChange::Rejected(current));
        }
        tx.execute(
          "UPDATE reports SET status = ?2 WHERE report_id = ?1",
          rusqlite::params![id_str, status.as_str()],
        )?;
        tx.commit()?;
        raw.status = status.as_str().to_owned();
        Ok(StatusChange::Applied(raw))
      })
      .await
      .map_err(Error::from)?;

    match change {
      StatusChange::Applied(raw) => {
        debug!(report_id = %id, %status, "report status updated");
        Ok(raw.into_report()?)
      }
      StatusChange::Rejected(from) => Err(DomainError::InvalidTransition { id, from, to: status }),
      StatusChange::Missing => Err(DomainError::not_found(RecordKind::Report, id)),
    }
  }
}
