//! Incremental recomputation: orchestrates dirty propagation and the price
//! oracle, diffs against the cached prices and emits a minimal changeset.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::graph::LiquidityGraph;
use crate::oracle::PriceOracle;
use crate::persistence::PersistenceGateway;
use crate::propagation;
use crate::types::{
    ChangeSet, EngineError, Pair, PairAddress, PersistenceError, PriceUpdate, Token, TokenId,
};

/// Single-writer price engine owning the liquidity graph and the price cache.
/// Lifecycle: `new -> build -> {patch, recompute}*`. The cached prices here,
/// not the persisted store, are the values the next pass diffs against, so a
/// failed downstream write is naturally retried once the price moves again.
pub struct PriceEngine {
    config: EngineConfig,
    graph: LiquidityGraph,
    prices: IndexMap<TokenId, Decimal>,
    usd_prices: IndexMap<TokenId, Decimal>,
    sequence: u64,
}

impl PriceEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            graph: LiquidityGraph::new(),
            prices: IndexMap::new(),
            usd_prices: IndexMap::new(),
            sequence: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> &LiquidityGraph {
        &self.graph
    }

    /// Rebuild the graph from a full snapshot. Cached prices are retained;
    /// the next recompute diffs new derivations against them as usual.
    pub fn build(&mut self, tokens: &[Token], pairs: Vec<Pair>) {
        self.graph.build(tokens, pairs);
    }

    /// Apply reserve/state updates for pairs already in the graph.
    pub fn patch(&mut self, changed: Vec<Pair>) -> Result<(), EngineError> {
        self.graph.patch(changed)
    }

    /// Last derived price (reference-asset units) the engine computed.
    pub fn cached_price(&self, token: &TokenId) -> Option<Decimal> {
        self.prices.get(token).copied()
    }

    /// Last derived USD price the engine computed.
    pub fn cached_usd_price(&self, token: &TokenId) -> Option<Decimal> {
        self.usd_prices.get(token).copied()
    }

    /// Recompute the tokens transitively affected by `changed` pairs and
    /// return the changeset of prices that actually moved. An empty changed
    /// list short-circuits without touching the graph.
    pub fn recompute(&mut self, changed: &[PairAddress]) -> Result<ChangeSet, EngineError> {
        if changed.is_empty() {
            return Ok(ChangeSet::empty(self.next_sequence()));
        }

        let reference_usd = self.reference_usd_price()?;
        let dirty = propagation::affected_tokens(&self.graph, changed)?;

        let mut oracle = PriceOracle::new(&self.graph, &self.config, reference_usd);
        let mut queue: VecDeque<TokenId> = dirty.iter().cloned().collect();
        let mut seen: HashSet<TokenId> = dirty.into_iter().collect();
        let mut entries: Vec<PriceUpdate> = Vec::new();

        while let Some(token) = queue.pop_front() {
            let derived = oracle.derived_price(&token);
            if self.prices.get(&token) == Some(&derived) {
                continue;
            }
            let usd = (derived * reference_usd).normalize();
            self.prices.insert(token.clone(), derived);
            self.usd_prices.insert(token.clone(), usd);
            entries.push(PriceUpdate {
                token: token.clone(),
                derived_price: derived,
                usd_price: usd,
            });
            // A changed value ripples outward beyond the initial closure; the
            // seen-set guarantees convergence.
            for pair in self.graph.pairs_of(&token) {
                if !pair.is_active() {
                    continue;
                }
                let Some(other) = pair.other_token(&token) else { continue };
                if seen.insert(other.clone()) {
                    queue.push_back(other.clone());
                }
            }
        }

        let sequence = self.next_sequence();
        info!(
            sequence,
            changed_pairs = changed.len(),
            recomputed = seen.len(),
            updates = entries.len(),
            "completed recompute pass"
        );
        Ok(ChangeSet { sequence, entries })
    }

    /// Periodic full refresh: treat every known pair as changed. Same diffing
    /// and changeset semantics as an incremental pass.
    pub fn recompute_all(&mut self) -> Result<ChangeSet, EngineError> {
        let all: Vec<PairAddress> = self.graph.pair_addresses().cloned().collect();
        self.recompute(&all)
    }

    /// Price of one reference-asset unit in fiat units, read off the anchor
    /// pair. The pass is fatally misconfigured without it.
    fn reference_usd_price(&self) -> Result<Decimal, EngineError> {
        let pair = self.graph.pair(&self.config.anchor_pair).ok_or_else(|| {
            EngineError::MissingAnchorPair { pair: self.config.anchor_pair.clone() }
        })?;
        pair.price_of(&self.config.reference_token).ok_or_else(|| {
            // Present but not a reference/fiat pair: same failure mode.
            EngineError::MissingAnchorPair { pair: self.config.anchor_pair.clone() }
        })
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

/// Output of one serialized recompute-and-persist cycle.
#[derive(Debug)]
pub struct PassOutcome {
    pub changeset: ChangeSet,
    /// Write count on success; the failure carries how much did not persist.
    /// Either way the in-memory cache already reflects the changeset.
    pub persisted: Result<usize, PersistenceError>,
}

/// Clonable handle serializing all engine access behind one async mutex, so
/// an event-driven update overlapping a periodic full refresh cannot
/// interleave, and changesets reach the gateway in pass order.
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<tokio::sync::Mutex<PriceEngine>>,
}

impl SharedEngine {
    pub fn new(engine: PriceEngine) -> Self {
        Self { inner: Arc::new(tokio::sync::Mutex::new(engine)) }
    }

    pub async fn build(&self, tokens: &[Token], pairs: Vec<Pair>) {
        self.inner.lock().await.build(tokens, pairs);
    }

    pub async fn patch(&self, changed: Vec<Pair>) -> Result<(), EngineError> {
        self.inner.lock().await.patch(changed)
    }

    pub async fn recompute(&self, changed: &[PairAddress]) -> Result<ChangeSet, EngineError> {
        self.inner.lock().await.recompute(changed)
    }

    pub async fn recompute_all(&self) -> Result<ChangeSet, EngineError> {
        self.inner.lock().await.recompute_all()
    }

    pub async fn cached_price(&self, token: &TokenId) -> Option<Decimal> {
        self.inner.lock().await.cached_price(token)
    }

    /// Run one pass and hand the changeset to the gateway while still holding
    /// the critical section, preserving the cross-pass ordering guarantee.
    pub async fn recompute_and_persist<G: PersistenceGateway>(
        &self,
        changed: &[PairAddress],
        gateway: &G,
    ) -> Result<PassOutcome, EngineError> {
        let mut engine = self.inner.lock().await;
        let changeset = engine.recompute(changed)?;
        let persisted = if changeset.is_empty() {
            Ok(0)
        } else {
            gateway.apply_changeset(&changeset).await
        };
        if let Err(err) = &persisted {
            warn!(sequence = changeset.sequence, %err, "changeset write failed; in-memory cache retained");
        }
        Ok(PassOutcome { changeset, persisted })
    }
}
