//! Token/pair liquidity graph: node/edge management, snapshot builds, patches.

use indexmap::IndexMap;
use num_traits::Zero;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use rust_decimal::Decimal;
use tracing::debug;

use crate::num::big_ratio_to_decimal;
use crate::types::{EngineError, Pair, PairAddress, Token, TokenId};

const DEFAULT_DECIMALS: u32 = 18;

/// A token node in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenNode {
    pub id: TokenId,
    pub decimals: u32,
}

/// In-memory token/pair graph, rebuilt from a pair snapshot and patched in
/// place as reserves change. Undirected multigraph: several pairs may connect
/// the same two tokens, each as its own edge.
pub struct LiquidityGraph {
    graph: UnGraph<TokenNode, Pair>,
    token_indices: IndexMap<TokenId, NodeIndex>,
    pair_edges: IndexMap<PairAddress, EdgeIndex>,
}

impl LiquidityGraph {
    /// Create an empty graph. A graph must be built from a full snapshot at
    /// least once before it accepts incremental patches.
    pub fn new() -> Self {
        Self {
            graph: UnGraph::new_undirected(),
            token_indices: IndexMap::new(),
            pair_edges: IndexMap::new(),
        }
    }

    /// Rebuild the graph from a consistent snapshot in O(pairs). Tokens
    /// referenced by a pair but absent from `tokens` fall back to 18 decimals.
    pub fn build(&mut self, tokens: &[Token], pairs: Vec<Pair>) {
        self.graph = UnGraph::new_undirected();
        self.token_indices.clear();
        self.pair_edges.clear();

        let decimals_by_id: IndexMap<&TokenId, u32> =
            tokens.iter().map(|t| (&t.id, t.decimals)).collect();

        for mut pair in pairs {
            let first = self.ensure_node(
                &pair.first_token,
                decimals_by_id.get(&pair.first_token).copied(),
            );
            let second = self.ensure_node(
                &pair.second_token,
                decimals_by_id.get(&pair.second_token).copied(),
            );
            let (dec_first, dec_second) = (self.graph[first].decimals, self.graph[second].decimals);
            Self::refresh_side_prices(&mut pair, dec_first, dec_second);
            let address = pair.address.clone();
            let edge = self.graph.add_edge(first, second, pair);
            self.pair_edges.insert(address, edge);
        }
        debug!(
            tokens = self.token_count(),
            pairs = self.pair_count(),
            "rebuilt liquidity graph from snapshot"
        );
    }

    /// Replace reserve/supply/state fields for pairs already present. Unknown
    /// addresses abort the whole patch before anything is mutated, so the
    /// caller can retry with corrected input. Patching a never-built (empty)
    /// graph fails the same way.
    pub fn patch(&mut self, changed: Vec<Pair>) -> Result<(), EngineError> {
        for pair in &changed {
            if !self.pair_edges.contains_key(&pair.address) {
                return Err(EngineError::UnknownPair { pair: pair.address.clone() });
            }
        }
        for incoming in changed {
            let edge = self.pair_edges[&incoming.address];
            let (first, second) = self
                .graph
                .edge_endpoints(edge)
                .expect("pair edge index is tracked, endpoints must exist");
            let (dec_first, dec_second) = (self.graph[first].decimals, self.graph[second].decimals);
            let pair = self
                .graph
                .edge_weight_mut(edge)
                .expect("pair edge index is tracked, weight must exist");
            pair.first_reserve = incoming.first_reserve;
            pair.second_reserve = incoming.second_reserve;
            pair.total_supply = incoming.total_supply;
            pair.state = incoming.state;
            Self::refresh_side_prices(pair, dec_first, dec_second);
        }
        Ok(())
    }

    fn ensure_node(&mut self, id: &TokenId, decimals: Option<u32>) -> NodeIndex {
        if let Some(&idx) = self.token_indices.get(id) {
            return idx;
        }
        let decimals = decimals.unwrap_or_else(|| {
            debug!(token = %id, "token missing from snapshot metadata, assuming {} decimals", DEFAULT_DECIMALS);
            DEFAULT_DECIMALS
        });
        let idx = self.graph.add_node(TokenNode { id: id.clone(), decimals });
        self.token_indices.insert(id.clone(), idx);
        idx
    }

    /// Recompute both unit prices from reserves, decimals-adjusted. Undefined
    /// (zero) while the pair has no liquidity-token supply.
    fn refresh_side_prices(pair: &mut Pair, dec_first: u32, dec_second: u32) {
        if pair.total_supply.is_zero() {
            pair.first_token_price = Decimal::ZERO;
            pair.second_token_price = Decimal::ZERO;
            return;
        }
        let pow = |d: u32| num_bigint::BigUint::from(10u32).pow(d);
        pair.first_token_price = big_ratio_to_decimal(
            &(&pair.second_reserve * pow(dec_first)),
            &(&pair.first_reserve * pow(dec_second)),
        );
        pair.second_token_price = big_ratio_to_decimal(
            &(&pair.first_reserve * pow(dec_second)),
            &(&pair.second_reserve * pow(dec_first)),
        );
    }

    pub fn pair(&self, address: &PairAddress) -> Option<&Pair> {
        let edge = self.pair_edges.get(address)?;
        self.graph.edge_weight(*edge)
    }

    /// All pairs the token participates in, in incidence order.
    pub fn pairs_of(&self, token: &TokenId) -> Vec<&Pair> {
        match self.token_indices.get(token) {
            Some(&idx) => self.graph.edges(idx).map(|e| e.weight()).collect(),
            None => Vec::new(),
        }
    }

    pub fn contains_token(&self, token: &TokenId) -> bool {
        self.token_indices.contains_key(token)
    }

    pub fn decimals_of(&self, token: &TokenId) -> u32 {
        self.token_indices
            .get(token)
            .map(|&idx| self.graph[idx].decimals)
            .unwrap_or(DEFAULT_DECIMALS)
    }

    pub fn token_ids(&self) -> impl Iterator<Item = &TokenId> {
        self.token_indices.keys()
    }

    pub fn pair_addresses(&self) -> impl Iterator<Item = &PairAddress> {
        self.pair_edges.keys()
    }

    pub fn token_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn pair_count(&self) -> usize {
        self.graph.edge_count()
    }
}

impl Default for LiquidityGraph {
    fn default() -> Self {
        Self::new()
    }
}
