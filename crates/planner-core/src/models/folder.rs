//! Planner folder model

use serde::{Deserialize, Serialize};

use super::collection::{Collection, Schema};

/// A folder grouping planner items, optionally pinned to a semester
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Folder {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub semester_id: Option<String>,
    /// Position among sibling folders
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub collapsed: bool,
}

impl Schema for Folder {
    const COLLECTION: Collection = Collection::Folders;

    fn primary_key(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn optional_fields_default() {
        let folder: Folder = serde_json::from_value(json!({"id": "f1", "title": "Year 1"})).unwrap();
        assert_eq!(folder.order, 0);
        assert!(folder.semester_id.is_none());
        assert!(!folder.collapsed);
        assert!(folder.validate().is_ok());
    }

    #[test]
    fn title_is_required() {
        assert!(serde_json::from_value::<Folder>(json!({"id": "f1"})).is_err());
    }
}
