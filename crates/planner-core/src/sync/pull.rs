//! Pull handler: bounded, ordered delivery of changes after a checkpoint

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::{Checkpoint, ServerTimestamp, SyncLimits, SERVER_TIMESTAMP_PARAM};
use crate::db::DocumentStore;
use crate::error::{Error, Result};
use crate::models::{validate_key, Collection, Document, Schema};

/// Query parameter carrying the advisory batch size
pub const BATCH_SIZE_PARAM: &str = "batchSize";

/// A pull request for one collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequest {
    /// Exclusive lower bound; `None` means full resync from the beginning
    pub checkpoint: Option<Checkpoint>,
    /// Advisory batch size, clamped by `SyncLimits`
    pub batch_size: Option<usize>,
}

impl PullRequest {
    pub const fn new(checkpoint: Option<Checkpoint>, batch_size: Option<usize>) -> Self {
        Self {
            checkpoint,
            batch_size,
        }
    }

    /// Parse `?<primaryKeyField>=..&serverTimestamp=..&batchSize=..`.
    ///
    /// All parameters are optional, but a checkpoint needs both halves. Empty
    /// values count as absent. Unrelated parameters are ignored.
    pub fn from_query(collection: Collection, params: &HashMap<String, String>) -> Result<Self> {
        let key_field = collection.primary_key_field();
        let value = |name: &str| {
            params
                .get(name)
                .map(String::as_str)
                .filter(|value| !value.is_empty())
        };

        let checkpoint = match (value(key_field), value(SERVER_TIMESTAMP_PARAM)) {
            (None, None) => None,
            (Some(primary_key), Some(server_timestamp)) => {
                validate_key(collection, primary_key)?;
                let server_timestamp: ServerTimestamp = server_timestamp.parse()?;
                Some(Checkpoint::new(primary_key, server_timestamp))
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(Error::invalid_input(format!(
                    "checkpoint requires both `{key_field}` and `{SERVER_TIMESTAMP_PARAM}`"
                )));
            }
        };

        let batch_size = value(BATCH_SIZE_PARAM)
            .map(|raw| {
                raw.trim().parse::<usize>().map_err(|_| {
                    Error::invalid_input(format!(
                        "`{BATCH_SIZE_PARAM}` must be a non-negative integer: {raw}"
                    ))
                })
            })
            .transpose()?;

        Ok(Self {
            checkpoint,
            batch_size,
        })
    }
}

/// One pull batch plus the checkpoint to resume from
#[derive(Debug, Clone, PartialEq)]
pub struct PullResponse<T> {
    /// Last document of the batch, or the request checkpoint when caught up
    pub checkpoint: Option<Checkpoint>,
    pub documents: Vec<Document<T>>,
}

impl<T: Schema> Serialize for PullResponse<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let key_field = T::COLLECTION.primary_key_field();
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(
            "checkpoint",
            &self.checkpoint.as_ref().map(|checkpoint| checkpoint.wire(key_field)),
        )?;
        map.serialize_entry("documents", &self.documents)?;
        map.end()
    }
}

/// Return the next batch of documents changed after the request checkpoint.
///
/// Read-only. Tombstones are included. An empty batch echoes the input
/// checkpoint back, telling the client it is fully caught up.
pub fn pull<T: Schema, S: DocumentStore>(
    store: &S,
    request: &PullRequest,
    limits: &SyncLimits,
) -> Result<PullResponse<T>> {
    let batch_size = limits.clamp_pull_batch(request.batch_size);
    let documents = store.query_after::<T>(request.checkpoint.as_ref(), batch_size)?;
    let checkpoint = documents
        .last()
        .and_then(Document::checkpoint)
        .or_else(|| request.checkpoint.clone());

    tracing::debug!(
        collection = %T::COLLECTION,
        batch_size,
        returned = documents.len(),
        "Served pull batch"
    );

    Ok(PullResponse {
        checkpoint,
        documents,
    })
}
