//! [`SqliteStore`]: one SQLite file backing every tablesafe store.

use std::path::Path;

use tracing::debug;

use crate::{
  Result, accounts::SqliteAccounts, feedback::SqliteFeedback, reports::SqliteReports,
  schema::SCHEMA, subjects::SqliteSubjects,
};

/// A tablesafe database backed by a single SQLite file.
///
/// The per-record-type stores handed out by [`accounts`](Self::accounts),
/// [`subjects`](Self::subjects), [`feedback`](Self::feedback) and
/// [`reports`](Self::reports) share the connection but never read each
/// other's tables.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by the tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    debug!("schema initialised");
    Ok(())
  }

  pub fn accounts(&self) -> SqliteAccounts { SqliteAccounts::new(self.conn.clone()) }

  pub fn subjects(&self) -> SqliteSubjects { SqliteSubjects::new(self.conn.clone()) }

  pub fn feedback(&self) -> SqliteFeedback { SqliteFeedback::new(self.conn.clone()) }

  pub fn reports(&self) -> SqliteReports { SqliteReports::new(self.conn.clone()) }
}
