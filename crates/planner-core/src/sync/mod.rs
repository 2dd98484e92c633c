//! Checkpoint-based pull/push replication protocol
//!
//! Every collection speaks the same protocol:
//! - `pull` returns the next ordered, bounded batch of documents changed after
//!   a checkpoint, plus the checkpoint to resume from
//! - `push` applies client edits through an optimistic compare-and-write and
//!   answers with one authoritative document per edit

mod checkpoint;
mod conflict;
mod pull;
mod push;

pub use checkpoint::{Checkpoint, ServerTimestamp, SERVER_TIMESTAMP_PARAM};
pub use conflict::{resolve, AssumedMasterState, ConflictReason, Resolution};
pub use pull::{pull, PullRequest, PullResponse, BATCH_SIZE_PARAM};
pub use push::{push, push_cancellable, PushEdit};

/// Batch bounds shared by the pull and push handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncLimits {
    /// Pull batch size used when the client does not ask for one
    pub default_pull_batch: usize,
    /// Upper bound a requested pull batch size is clamped to
    pub max_pull_batch: usize,
    /// Longest push batch accepted in one request
    pub max_push_batch: usize,
}

impl SyncLimits {
    /// Effective pull batch size for an advisory client request.
    ///
    /// The request is reduced, never exceeded, and never drops below one
    /// document so an empty batch always means "caught up".
    pub fn clamp_pull_batch(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_pull_batch)
            .clamp(1, self.max_pull_batch.max(1))
    }
}

impl Default for SyncLimits {
    fn default() -> Self {
        Self {
            default_pull_batch: 100,
            max_pull_batch: 1_000,
            max_push_batch: 200,
        }
    }
}
