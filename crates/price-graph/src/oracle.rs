//! Derived-price oracle: memoized depth-first traversal of the liquidity
//! graph, picking at every token the pricing path backed by the largest
//! reference-asset-equivalent liquidity.

use std::collections::{HashMap, HashSet};

use num_bigint::BigUint;
use num_traits::Zero;
use rust_decimal::Decimal;
use tracing::trace;

use crate::config::EngineConfig;
use crate::graph::LiquidityGraph;
use crate::num::reference_equivalent_liquidity;
use crate::types::{Pair, PairAddress, TokenId};

/// Prices tokens against the configured reference asset. Holds a memo of
/// results for one recompute pass; construct a fresh oracle per pass so the
/// memo never outlives the graph state it was computed from.
pub struct PriceOracle<'a> {
    graph: &'a LiquidityGraph,
    config: &'a EngineConfig,
    /// Price of one reference-asset unit in fiat units, taken from the anchor
    /// pair before the pass starts.
    reference_usd_price: Decimal,
    memo: HashMap<TokenId, Decimal>,
}

impl<'a> PriceOracle<'a> {
    pub fn new(
        graph: &'a LiquidityGraph,
        config: &'a EngineConfig,
        reference_usd_price: Decimal,
    ) -> Self {
        Self { graph, config, reference_usd_price, memo: HashMap::new() }
    }

    pub fn reference_usd_price(&self) -> Decimal {
        self.reference_usd_price
    }

    /// Derived price of `token` in reference-asset units. Zero is a valid
    /// terminal value for tokens with no qualifying liquidity.
    pub fn derived_price(&mut self, token: &TokenId) -> Decimal {
        if let Some(&price) = self.memo.get(token) {
            return price;
        }
        // Do-not-revisit set of pair addresses, scoped to this top-level call.
        let mut visited: HashSet<PairAddress> = HashSet::new();
        let price = self.price_inner(token, &mut visited).normalize();
        self.memo.insert(token.clone(), price);
        price
    }

    fn price_inner(&mut self, token: &TokenId, visited: &mut HashSet<PairAddress>) -> Decimal {
        if token == &self.config.reference_token {
            return Decimal::ONE;
        }
        if token == &self.config.fiat_token {
            // Base case, not graph-derived: the fiat anchor's reference-asset
            // price is the reciprocal of the reference/fiat price.
            if self.reference_usd_price.is_zero() {
                return Decimal::ZERO;
            }
            return (Decimal::ONE / self.reference_usd_price).normalize();
        }
        // Results memoized by earlier top-level calls are complete (computed
        // under an empty visited set) and safe to reuse mid-traversal.
        if let Some(&price) = self.memo.get(token) {
            return price;
        }

        let mut best: Option<(BigUint, Decimal)> = None;
        for pair in self.candidate_pairs(token) {
            if visited.contains(&pair.address) {
                continue;
            }
            if pair.total_supply.is_zero() {
                continue;
            }
            visited.insert(pair.address.clone());

            let other = match pair.other_token(token) {
                Some(o) => o.clone(),
                None => continue,
            };
            let other_price = self.price_inner(&other, visited);
            let other_reserve = pair.reserve_of(&other).cloned().unwrap_or_default();
            let liquidity = reference_equivalent_liquidity(
                &other_reserve,
                self.graph.decimals_of(&other),
                other_price,
                self.config.reference_decimals,
            );
            let own_price = pair.price_of(token).unwrap_or(Decimal::ZERO) * other_price;
            trace!(
                token = %token,
                pair = %pair.address,
                via = %other,
                %own_price,
                liquidity = %liquidity,
                "evaluated pricing candidate"
            );
            match &best {
                Some((best_liquidity, _)) if *best_liquidity >= liquidity => {}
                _ => best = Some((liquidity, own_price)),
            }
        }

        best.map(|(_, price)| price).unwrap_or(Decimal::ZERO)
    }

    /// Pairs eligible to price `token`: prefer live markets, but fall back to
    /// every known pair when none are active so a token whose sole pair went
    /// inactive keeps its last derivable price.
    fn candidate_pairs(&self, token: &TokenId) -> Vec<&'a Pair> {
        let pairs = self.graph.pairs_of(token);
        if pairs.len() > 1 && pairs.iter().any(|p| p.is_active()) {
            pairs.into_iter().filter(|p| p.is_active()).collect()
        } else {
            pairs
        }
    }
}
