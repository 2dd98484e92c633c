//! planner-core - Core library for the planner sync backend
//!
//! This crate contains the collection schemas, the `SQLite` document store and
//! the checkpoint-based pull/push replication protocol shared by every planner
//! collection (folders, items, plannerdata, semesters).

pub mod db;
pub mod error;
pub mod models;
pub mod sync;

pub use error::{Error, Result};
pub use models::{Collection, Document, Folder, Item, PlannerData, Schema, Semester, Term};
pub use sync::{Checkpoint, ServerTimestamp, SyncLimits};
