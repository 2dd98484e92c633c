//! Planner metadata model

use serde::{Deserialize, Serialize};

use super::collection::{Collection, Schema};

/// Per-planner settings and degree metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlannerData {
    pub id: String,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub start_year: Option<i32>,
    #[serde(default)]
    pub expected_graduation: Option<String>,
    #[serde(default)]
    pub active_folder_id: Option<String>,
    #[serde(default)]
    pub show_completed: bool,
}

impl Schema for PlannerData {
    const COLLECTION: Collection = Collection::PlannerData;

    fn primary_key(&self) -> &str {
        &self.id
    }
}
