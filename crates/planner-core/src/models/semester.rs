//! Semester model

use serde::{Deserialize, Serialize};

use super::collection::{validate_credits, validate_key, Collection, Schema};
use crate::error::Result;

/// Academic term of a semester
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    Fall,
    Winter,
    Spring,
    Summer,
}

/// A semester record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Semester {
    pub id: String,
    pub name: String,
    pub term: Term,
    pub year: i32,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub target_credits: Option<f64>,
}

impl Schema for Semester {
    const COLLECTION: Collection = Collection::Semesters;

    fn primary_key(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<()> {
        validate_key(Self::COLLECTION, &self.id)?;
        if let Some(target) = self.target_credits {
            validate_credits(Self::COLLECTION, "targetCredits", target)?;
        }
        Ok(())
    }
}
