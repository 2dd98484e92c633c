//! Optimistic-concurrency conflict resolution
//!
//! The server never merges. A push is applied only when the client's view of
//! the prior authoritative state was current; otherwise the edit is rejected
//! wholesale and the client receives the truth to reconcile against.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::models::{Document, Schema};

/// What the client believed the authoritative state was before its edit
#[derive(Debug, Clone, PartialEq)]
pub enum AssumedMasterState<T> {
    /// Field missing: the client expresses no prior state
    Omitted,
    /// Explicit `null`: the client believes no document exists
    Absent,
    /// The document state the client last observed
    Present(Document<T>),
}

impl<T> AssumedMasterState<T> {
    pub const fn as_document(&self) -> Option<&Document<T>> {
        match self {
            Self::Present(document) => Some(document),
            Self::Omitted | Self::Absent => None,
        }
    }
}

impl<T> Default for AssumedMasterState<T> {
    fn default() -> Self {
        Self::Omitted
    }
}

impl<T: DeserializeOwned> AssumedMasterState<T> {
    /// `deserialize_with` target: only invoked when the field is present, so a
    /// missing field stays at the `Omitted` default.
    pub fn deserialize_present<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        Ok(Option::<Document<T>>::deserialize(deserializer)?
            .map_or(Self::Absent, Self::Present))
    }
}

/// Why an edit was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// The client assumed no document, but one exists
    UnexpectedDocument,
    /// The client assumed a document that does not exist
    MissingDocument,
    /// The stored document differs from the client's assumed state
    StaleState,
}

impl ConflictReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::UnexpectedDocument => "unexpected_document",
            Self::MissingDocument => "missing_document",
            Self::StaleState => "stale_state",
        }
    }
}

/// Decision for one push edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Apply,
    Conflict(ConflictReason),
}

/// Compare the client's assumed prior state with the current stored document.
///
/// Omitted and explicit-absent assumptions resolve the same way; both only
/// allow the write when nothing is stored yet.
pub fn resolve<T: Schema>(
    current: Option<&Document<T>>,
    assumed: &AssumedMasterState<T>,
) -> Resolution {
    match (current, assumed) {
        (None, AssumedMasterState::Omitted | AssumedMasterState::Absent) => Resolution::Apply,
        (Some(_), AssumedMasterState::Omitted | AssumedMasterState::Absent) => {
            Resolution::Conflict(ConflictReason::UnexpectedDocument)
        }
        (None, AssumedMasterState::Present(_)) => {
            Resolution::Conflict(ConflictReason::MissingDocument)
        }
        (Some(stored), AssumedMasterState::Present(assumed)) => {
            if stored.same_state(assumed) {
                Resolution::Apply
            } else {
                Resolution::Conflict(ConflictReason::StaleState)
            }
        }
    }
}
