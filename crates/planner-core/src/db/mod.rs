//! Database layer for the planner document store

mod connection;
mod document_store;
mod migrations;

pub use connection::Database;
pub use document_store::{DocumentStore, SqliteDocumentStore, WriteOutcome};
