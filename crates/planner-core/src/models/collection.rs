//! Replicated collections and the schema contract every document type meets

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Longest primary key accepted from clients
const MAX_KEY_LEN: usize = 128;

/// A replicated planner collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Folders,
    Items,
    PlannerData,
    Semesters,
}

impl Collection {
    pub const ALL: [Self; 4] = [Self::Folders, Self::Items, Self::PlannerData, Self::Semesters];

    /// Route segment and table name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Folders => "folders",
            Self::Items => "items",
            Self::PlannerData => "plannerdata",
            Self::Semesters => "semesters",
        }
    }

    /// Wire name of the primary key field
    pub const fn primary_key_field(self) -> &'static str {
        match self {
            Self::Items => "uuid",
            Self::Folders | Self::PlannerData | Self::Semesters => "id",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|collection| collection.as_str() == s)
            .ok_or_else(|| Error::UnknownCollection(s.to_string()))
    }
}

/// Closed document schema for one collection.
///
/// Implementors deserialize with `deny_unknown_fields`, so a payload carrying
/// fields outside the schema is rejected instead of being stored.
pub trait Schema:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    const COLLECTION: Collection;

    fn primary_key(&self) -> &str;

    /// Field-level checks beyond what serde enforces
    fn validate(&self) -> Result<()> {
        validate_key(Self::COLLECTION, self.primary_key())
    }
}

pub(crate) fn validate_key(collection: Collection, key: &str) -> Result<()> {
    let field = collection.primary_key_field();
    if key.is_empty() {
        return Err(Error::invalid_input(format!(
            "{collection}: `{field}` must not be empty"
        )));
    }
    if key.chars().count() > MAX_KEY_LEN {
        return Err(Error::invalid_input(format!(
            "{collection}: `{field}` exceeds {MAX_KEY_LEN} characters"
        )));
    }
    if key.trim() != key {
        return Err(Error::invalid_input(format!(
            "{collection}: `{field}` must not have surrounding whitespace"
        )));
    }
    Ok(())
}

pub(crate) fn validate_credits(collection: Collection, field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_input(format!(
            "{collection}: `{field}` must be a finite, non-negative number"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_round_trips_through_route_names() {
        for collection in Collection::ALL {
            let parsed: Collection = collection.as_str().parse().unwrap();
            assert_eq!(parsed, collection);
        }
    }

    #[test]
    fn unknown_collection_is_rejected() {
        let err = "courses".parse::<Collection>().unwrap_err();
        assert!(matches!(err, Error::UnknownCollection(name) if name == "courses"));
    }

    #[test]
    fn items_are_keyed_by_uuid() {
        assert_eq!(Collection::Items.primary_key_field(), "uuid");
        assert_eq!(Collection::Folders.primary_key_field(), "id");
    }

    #[test]
    fn key_validation() {
        assert!(validate_key(Collection::Folders, "f1").is_ok());
        assert!(validate_key(Collection::Folders, "").is_err());
        assert!(validate_key(Collection::Folders, " f1").is_err());
        assert!(validate_key(Collection::Folders, &"x".repeat(129)).is_err());
    }

    #[test]
    fn key_length_counts_characters() {
        // 128 two-byte characters is 256 bytes but still within the limit
        assert!(validate_key(Collection::Semesters, &"é".repeat(128)).is_ok());
        assert!(validate_key(Collection::Semesters, &"é".repeat(129)).is_err());
    }
}
