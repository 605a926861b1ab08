//! Core types, store traits and the cross-store coordinator for tablesafe.
//!
//! This crate has no database or CLI dependencies. Storage
//! backends implement the traits in [`store`]; collaborators drive
//! everything that spans more than one store through
//! [`coordinator::Coordinator`].

pub mod account;
pub mod aggregate;
pub mod coordinator;
pub mod error;
pub mod feedback;
pub mod plan;
pub mod report;
pub mod store;
pub mod subject;

pub use coordinator::{Coordinator, CoordinatorConfig};
pub use error::{Error, RecordKind, Result};
