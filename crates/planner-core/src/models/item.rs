//! Planner item model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::collection::{validate_credits, validate_key, Collection, Schema};
use crate::error::{Error, Result};

/// A course placed in a planner folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Item {
    /// Client-generated UUID
    pub uuid: String,
    pub folder_id: String,
    pub course_code: String,
    pub title: String,
    #[serde(default)]
    pub credits: f64,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl Schema for Item {
    const COLLECTION: Collection = Collection::Items;

    fn primary_key(&self) -> &str {
        &self.uuid
    }

    fn validate(&self) -> Result<()> {
        validate_key(Self::COLLECTION, &self.uuid)?;
        Uuid::parse_str(&self.uuid)
            .map_err(|_| Error::invalid_input(format!("items: `uuid` is not a UUID: {}", self.uuid)))?;
        validate_credits(Self::COLLECTION, "credits", self.credits)
    }
}
