//! Push handler: per-edit optimistic writes with authoritative answers

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;

use super::{AssumedMasterState, SyncLimits};
use crate::db::{DocumentStore, WriteOutcome};
use crate::error::{Error, Result};
use crate::models::{Document, Schema};

/// One client edit: the state it wants plus the state it started from
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(
    rename_all = "camelCase",
    deny_unknown_fields,
    bound(deserialize = "T: Schema")
)]
pub struct PushEdit<T> {
    pub new_document_state: Document<T>,
    #[serde(default, deserialize_with = "AssumedMasterState::deserialize_present")]
    pub assumed_master_state: AssumedMasterState<T>,
}

impl<T: Schema> PushEdit<T> {
    pub const fn new(
        new_document_state: Document<T>,
        assumed_master_state: AssumedMasterState<T>,
    ) -> Self {
        Self {
            new_document_state,
            assumed_master_state,
        }
    }

    fn validate(&self) -> Result<()> {
        self.new_document_state.data.validate()?;
        if let Some(assumed) = self.assumed_master_state.as_document() {
            if assumed.primary_key() != self.new_document_state.primary_key() {
                return Err(Error::invalid_input(format!(
                    "`assumedMasterState` key `{}` does not match `newDocumentState` key `{}`",
                    assumed.primary_key(),
                    self.new_document_state.primary_key()
                )));
            }
        }
        Ok(())
    }
}

/// Apply a batch of edits in order.
///
/// The whole batch is validated before anything is written, so a malformed
/// batch has no effect. After that each edit is independent: the result
/// holds, at the edit's index, the stored document when the edit was
/// accepted, or the current authoritative document when it conflicted
/// (`None` if the client assumed a document that does not exist).
pub fn push<T: Schema, S: DocumentStore>(
    store: &S,
    edits: &[PushEdit<T>],
    limits: &SyncLimits,
) -> Result<Vec<Option<Document<T>>>> {
    push_cancellable(store, edits, limits, &AtomicBool::new(false))
}

/// `push` that stops before the next edit once `cancelled` is set.
///
/// Edits committed before that point stay committed; the call then fails
/// with `Error::Cancelled` and the caller is expected to retry the batch.
pub fn push_cancellable<T: Schema, S: DocumentStore>(
    store: &S,
    edits: &[PushEdit<T>],
    limits: &SyncLimits,
    cancelled: &AtomicBool,
) -> Result<Vec<Option<Document<T>>>> {
    if edits.len() > limits.max_push_batch {
        return Err(Error::invalid_input(format!(
            "push batch of {} edits exceeds the limit of {}",
            edits.len(),
            limits.max_push_batch
        )));
    }
    for (index, edit) in edits.iter().enumerate() {
        edit.validate().map_err(|err| match err {
            Error::InvalidInput(message) => Error::InvalidInput(format!("edit {index}: {message}")),
            other => other,
        })?;
    }

    let mut results = Vec::with_capacity(edits.len());
    let mut conflicts = 0_usize;
    for edit in edits {
        if cancelled.load(Ordering::Acquire) {
            tracing::info!(
                collection = %T::COLLECTION,
                applied = results.len(),
                remaining = edits.len() - results.len(),
                "Push cancelled"
            );
            return Err(Error::Cancelled);
        }
        match store.compare_and_write(&edit.new_document_state, &edit.assumed_master_state)? {
            WriteOutcome::Written(stored) => results.push(Some(stored)),
            WriteOutcome::Conflict { current, reason } => {
                conflicts += 1;
                tracing::debug!(
                    collection = %T::COLLECTION,
                    primary_key = edit.new_document_state.primary_key(),
                    reason = reason.label(),
                    "Rejected conflicting edit"
                );
                results.push(current);
            }
        }
    }

    tracing::info!(
        collection = %T::COLLECTION,
        edits = edits.len(),
        accepted = edits.len() - conflicts,
        conflicts,
        "Applied push batch"
    );

    Ok(results)
}
