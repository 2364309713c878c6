//! Dirty-set propagation: reverse-dependency closure over active pairs.

use std::collections::VecDeque;

use indexmap::IndexSet;
use tracing::debug;

use crate::graph::LiquidityGraph;
use crate::types::{EngineError, PairAddress, TokenId};

/// Transitive closure of tokens whose derived price may have moved after the
/// given pairs changed. Seeded with both sides of every changed pair, then
/// propagated across *active* pairs only: if a token's price moved, every
/// token whose price could have been derived through it must be re-examined.
///
/// Terminates because each token is enqueued at most once. Returned in FIFO
/// discovery order so the recompute queue is deterministic.
pub fn affected_tokens(
    graph: &LiquidityGraph,
    changed: &[PairAddress],
) -> Result<IndexSet<TokenId>, EngineError> {
    let mut affected: IndexSet<TokenId> = IndexSet::new();
    let mut queue: VecDeque<TokenId> = VecDeque::new();

    for address in changed {
        let pair = graph
            .pair(address)
            .ok_or_else(|| EngineError::UnknownPair { pair: address.clone() })?;
        for token in [&pair.first_token, &pair.second_token] {
            if affected.insert(token.clone()) {
                queue.push_back(token.clone());
            }
        }
    }

    while let Some(token) = queue.pop_front() {
        for pair in graph.pairs_of(&token) {
            if !pair.is_active() {
                continue;
            }
            let Some(other) = pair.other_token(&token) else { continue };
            if affected.insert(other.clone()) {
                queue.push_back(other.clone());
            }
        }
    }

    debug!(
        changed_pairs = changed.len(),
        affected = affected.len(),
        "propagated dirty set"
    );
    Ok(affected)
}
