//! Data models for the planner collections

mod collection;
mod document;
mod folder;
mod item;
mod planner_data;
mod semester;

pub use collection::{Collection, Schema};
pub(crate) use collection::validate_key;
pub use document::{Document, DELETED_FIELD, SERVER_TIMESTAMP_FIELD};
pub use folder::Folder;
pub use item::Item;
pub use planner_data::PlannerData;
pub use semester::{Semester, Term};
