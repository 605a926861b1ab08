//! SQLite backend for the tablesafe record stores.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. One [`SqliteStore`] hands out a handle
//! per record type; each handle implements the matching trait from
//! `tablesafe_core::store`.

mod accounts;
mod encode;
mod feedback;
mod reports;
mod schema;
mod store;
mod subjects;

pub mod error;

pub use accounts::SqliteAccounts;
pub use error::{Error, Result};
pub use feedback::SqliteFeedback;
pub use reports::SqliteReports;
pub use store::SqliteStore;
pub use subjects::SqliteSubjects;

#[cfg(test)]
mod tests;
