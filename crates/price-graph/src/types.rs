//! Common types, error taxonomy, changeset data models.

use std::fmt;

use num_bigint::BigUint;
use num_traits::Zero;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Globally unique token identifier, as issued by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub String);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TokenId {
    fn from(s: &str) -> Self {
        TokenId(s.to_string())
    }
}

/// Unique on-chain address of a liquidity pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairAddress(pub String);

impl fmt::Display for PairAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PairAddress {
    fn from(s: &str) -> Self {
        PairAddress(s.to_string())
    }
}

/// Token metadata as supplied by the snapshot source. Derived prices are not
/// stored here; the engine's price cache is the in-memory source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub decimals: u32,
}

impl Token {
    pub fn new(id: impl Into<TokenId>, decimals: u32) -> Self {
        Self { id: id.into(), decimals }
    }
}

/// Lifecycle state of a pair. Pairs are never deleted, only marked inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairState {
    Active,
    Inactive,
}

/// One liquidity pair: two tokens, their pool reserves, and the last-derived
/// unit price of each side in terms of the other.
#[derive(Debug, Clone)]
pub struct Pair {
    pub address: PairAddress,
    pub first_token: TokenId,
    pub second_token: TokenId,
    pub first_reserve: BigUint,
    pub second_reserve: BigUint,
    pub total_supply: BigUint,
    pub state: PairState,
    /// Price of the first token in second-token units, decimals-adjusted.
    /// Zero while `total_supply` is zero.
    pub first_token_price: Decimal,
    /// Price of the second token in first-token units, decimals-adjusted.
    pub second_token_price: Decimal,
}

impl Pair {
    pub fn new(
        address: impl Into<PairAddress>,
        first_token: impl Into<TokenId>,
        second_token: impl Into<TokenId>,
    ) -> Self {
        Self {
            address: address.into(),
            first_token: first_token.into(),
            second_token: second_token.into(),
            first_reserve: BigUint::zero(),
            second_reserve: BigUint::zero(),
            total_supply: BigUint::zero(),
            state: PairState::Active,
            first_token_price: Decimal::ZERO,
            second_token_price: Decimal::ZERO,
        }
    }

    pub fn with_reserves(
        mut self,
        first_reserve: BigUint,
        second_reserve: BigUint,
        total_supply: BigUint,
    ) -> Self {
        self.first_reserve = first_reserve;
        self.second_reserve = second_reserve;
        self.total_supply = total_supply;
        self
    }

    pub fn with_state(mut self, state: PairState) -> Self {
        self.state = state;
        self
    }

    pub fn is_active(&self) -> bool {
        self.state == PairState::Active
    }

    pub fn contains(&self, token: &TokenId) -> bool {
        &self.first_token == token || &self.second_token == token
    }

    /// The opposite side of the pair, if `token` is one of its sides.
    pub fn other_token(&self, token: &TokenId) -> Option<&TokenId> {
        if &self.first_token == token {
            Some(&self.second_token)
        } else if &self.second_token == token {
            Some(&self.first_token)
        } else {
            None
        }
    }

    /// Reserve held for `token` on this pair.
    pub fn reserve_of(&self, token: &TokenId) -> Option<&BigUint> {
        if &self.first_token == token {
            Some(&self.first_reserve)
        } else if &self.second_token == token {
            Some(&self.second_reserve)
        } else {
            None
        }
    }

    /// Last-derived unit price of `token` in terms of the other side.
    pub fn price_of(&self, token: &TokenId) -> Option<Decimal> {
        if &self.first_token == token {
            Some(self.first_token_price)
        } else if &self.second_token == token {
            Some(self.second_token_price)
        } else {
            None
        }
    }
}

/// A single upsert produced by one recompute pass. Prices serialize as
/// decimal strings, never as binary floating point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub token: TokenId,
    pub derived_price: Decimal,
    pub usd_price: Decimal,
}

impl PriceUpdate {
    /// USD price at the fixed 2-decimal output precision used for display.
    pub fn usd_display(&self) -> Decimal {
        self.usd_price.round_dp(2)
    }
}

/// The minimal set of persistence writes produced by one recompute pass.
/// Contains at most one entry per token; empty iff no derived price differs
/// from its previously cached value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Monotonically increasing per completed pass. Downstream consumers may
    /// batch but must not reorder across sequences.
    pub sequence: u64,
    pub entries: Vec<PriceUpdate>,
}

impl ChangeSet {
    pub fn empty(sequence: u64) -> Self {
        Self { sequence, entries: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Errors fatal to a graph mutation or recompute pass. A zero-liquidity token
/// is not represented here: it resolves to derived price zero, a valid
/// terminal value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The configured reference/fiat anchor pair is absent from the snapshot.
    /// The pass aborts and previously cached prices are retained.
    #[error("anchor pair {pair} missing from graph snapshot")]
    MissingAnchorPair { pair: PairAddress },

    /// The caller supplied a pair address the graph has never seen. New-pair
    /// discovery is a collaborator responsibility, so this is a caller bug or
    /// stale data; the call aborts without mutating the graph.
    #[error("pair {pair} is not present in the graph")]
    UnknownPair { pair: PairAddress },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors reported by the persistence collaborator. A failed write does not
/// roll back the engine's in-memory state; the next pass re-derives and
/// re-attempts any token whose price still differs from what is stored.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("persisted only {written} of {total} changeset entries")]
    PartialWrite { written: usize, total: usize },

    #[error("persistence backend error: {0}")]
    Backend(String),
}
