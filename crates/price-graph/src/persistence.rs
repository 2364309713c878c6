//! Persistence gateway contract and an in-memory reference implementation.

use std::sync::Mutex;

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::debug;

use crate::types::{ChangeSet, PersistenceError, PriceUpdate, TokenId};

/// Downstream mirror of the engine's price cache, typically a document store
/// doing bulk upserts keyed by token id. Implementations may batch writes but
/// must not reorder across changeset sequences; durability is not assumed to
/// be synchronous, and a failure never rolls back in-memory engine state.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Apply every entry of the changeset, returning how many were written.
    async fn apply_changeset(&self, changeset: &ChangeSet) -> Result<usize, PersistenceError>;
}

/// In-memory gateway used in tests and as a reference implementation: keeps
/// the latest row per token plus the order in which sequences arrived.
#[derive(Default)]
pub struct MemoryGateway {
    rows: Mutex<IndexMap<TokenId, PriceUpdate>>,
    applied_sequences: Mutex<Vec<u64>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(&self, token: &TokenId) -> Option<PriceUpdate> {
        self.rows.lock().unwrap().get(token).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn applied_sequences(&self) -> Vec<u64> {
        self.applied_sequences.lock().unwrap().clone()
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn apply_changeset(&self, changeset: &ChangeSet) -> Result<usize, PersistenceError> {
        let mut rows = self.rows.lock().unwrap();
        for entry in &changeset.entries {
            rows.insert(entry.token.clone(), entry.clone());
        }
        self.applied_sequences.lock().unwrap().push(changeset.sequence);
        debug!(
            sequence = changeset.sequence,
            written = changeset.len(),
            "applied changeset"
        );
        Ok(changeset.len())
    }
}
