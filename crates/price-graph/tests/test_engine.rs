//! Recompute-pass tests: short-circuits, diff suppression, ripple, anchors.

use num_bigint::BigUint;
use rust_decimal::Decimal;
use std::str::FromStr;

use price_graph::config::EngineConfig;
use price_graph::engine::PriceEngine;
use price_graph::types::{EngineError, Pair, PairState, Token, TokenId};

fn units(n: u64, decimals: u32) -> BigUint {
    BigUint::from(n) * BigUint::from(10u32).pow(decimals)
}

fn config() -> EngineConfig {
    EngineConfig::new("WEGLD", "USDC", "erd1anchor", 18)
}

fn tokens() -> Vec<Token> {
    vec![
        Token::new("WEGLD", 18),
        Token::new("USDC", 6),
        Token::new("MEX", 18),
        Token::new("RIDE", 18),
    ]
}

fn anchor_pair() -> Pair {
    // 1 WEGLD = 20 USDC.
    Pair::new("erd1anchor", "WEGLD", "USDC").with_reserves(
        units(100, 18),
        units(2000, 6),
        units(1, 18),
    )
}

fn mex_pair() -> Pair {
    // 1 MEX = 3 WEGLD.
    Pair::new("erd1mex", "MEX", "WEGLD").with_reserves(
        units(100, 18),
        units(300, 18),
        units(1, 18),
    )
}

fn ride_pair() -> Pair {
    // 1 RIDE = 2 MEX.
    Pair::new("erd1ride", "RIDE", "MEX").with_reserves(
        units(100, 18),
        units(200, 18),
        units(1, 18),
    )
}

fn engine_with(pairs: Vec<Pair>) -> PriceEngine {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut engine = PriceEngine::new(config());
    engine.build(&tokens(), pairs);
    engine
}

fn update_tokens(changeset: &price_graph::types::ChangeSet) -> Vec<TokenId> {
    changeset.entries.iter().map(|e| e.token.clone()).collect()
}

#[test]
fn test_empty_changed_list_short_circuits() {
    let mut engine = engine_with(vec![anchor_pair(), mex_pair()]);
    let changeset = engine.recompute(&[]).unwrap();
    assert!(changeset.is_empty());
    assert!(engine.cached_price(&"MEX".into()).is_none());
}

#[test]
fn test_first_full_pass_emits_every_affected_price() {
    let mut engine = engine_with(vec![anchor_pair(), mex_pair()]);
    let changeset = engine.recompute_all().unwrap();

    let updated = update_tokens(&changeset);
    assert!(updated.contains(&"WEGLD".into()));
    assert!(updated.contains(&"USDC".into()));
    assert!(updated.contains(&"MEX".into()));

    assert_eq!(engine.cached_price(&"WEGLD".into()), Some(Decimal::ONE));
    assert_eq!(
        engine.cached_price(&"USDC".into()),
        Some(Decimal::from_str("0.05").unwrap())
    );
    assert_eq!(engine.cached_price(&"MEX".into()), Some(Decimal::from(3)));
}

#[test]
fn test_usd_prices_scale_by_the_reference_usd_price() {
    let mut engine = engine_with(vec![anchor_pair(), mex_pair()]);
    engine.recompute_all().unwrap();
    assert_eq!(engine.cached_usd_price(&"MEX".into()), Some(Decimal::from(60)));
    assert_eq!(engine.cached_usd_price(&"WEGLD".into()), Some(Decimal::from(20)));
    assert_eq!(engine.cached_usd_price(&"USDC".into()), Some(Decimal::ONE));
}

#[test]
fn test_identical_inputs_yield_an_empty_second_changeset() {
    let mut engine = engine_with(vec![anchor_pair(), mex_pair(), ride_pair()]);
    assert!(!engine.recompute_all().unwrap().is_empty());
    assert!(engine.recompute_all().unwrap().is_empty());
}

#[test]
fn test_reserve_change_that_keeps_the_price_writes_nothing() {
    let mut engine = engine_with(vec![anchor_pair(), mex_pair()]);
    engine.recompute_all().unwrap();

    // Double both reserves: more liquidity, same 1-MEX-for-3-WEGLD price.
    let update = Pair::new("erd1mex", "MEX", "WEGLD").with_reserves(
        units(200, 18),
        units(600, 18),
        units(2, 18),
    );
    engine.patch(vec![update]).unwrap();
    let changeset = engine.recompute(&["erd1mex".into()]).unwrap();
    assert!(changeset.is_empty());
}

#[test]
fn test_price_move_ripples_to_dependent_tokens() {
    let mut engine = engine_with(vec![anchor_pair(), mex_pair(), ride_pair()]);
    engine.recompute_all().unwrap();
    assert_eq!(engine.cached_price(&"RIDE".into()), Some(Decimal::from(6)));

    // MEX doubles against WEGLD; RIDE's derived price follows through MEX.
    let update = Pair::new("erd1mex", "MEX", "WEGLD").with_reserves(
        units(100, 18),
        units(600, 18),
        units(1, 18),
    );
    engine.patch(vec![update]).unwrap();
    let changeset = engine.recompute(&["erd1mex".into()]).unwrap();

    let updated = update_tokens(&changeset);
    assert!(updated.contains(&"MEX".into()));
    assert!(updated.contains(&"RIDE".into()));
    assert_eq!(engine.cached_price(&"MEX".into()), Some(Decimal::from(6)));
    assert_eq!(engine.cached_price(&"RIDE".into()), Some(Decimal::from(12)));
    // One entry per token, nothing duplicated.
    let mut deduped = updated.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), updated.len());
}

#[test]
fn test_inactive_pairs_do_not_propagate_dirtiness() {
    let stale_ride = ride_pair().with_state(PairState::Inactive);
    let mut engine = engine_with(vec![anchor_pair(), mex_pair(), stale_ride]);
    engine.recompute_all().unwrap();
    // RIDE still priced through its sole (inactive) pair.
    assert_eq!(engine.cached_price(&"RIDE".into()), Some(Decimal::from(6)));

    let update = Pair::new("erd1mex", "MEX", "WEGLD").with_reserves(
        units(100, 18),
        units(600, 18),
        units(1, 18),
    );
    engine.patch(vec![update]).unwrap();
    let changeset = engine.recompute(&["erd1mex".into()]).unwrap();

    let updated = update_tokens(&changeset);
    assert!(updated.contains(&"MEX".into()));
    // Dirtiness does not cross the inactive pair; RIDE keeps its old value.
    assert!(!updated.contains(&"RIDE".into()));
    assert_eq!(engine.cached_price(&"RIDE".into()), Some(Decimal::from(6)));
}

#[test]
fn test_sole_pair_turning_inactive_keeps_the_token_priced() {
    let mut engine = engine_with(vec![anchor_pair(), mex_pair()]);
    engine.recompute_all().unwrap();

    let update = Pair::new("erd1mex", "MEX", "WEGLD")
        .with_reserves(units(100, 18), units(300, 18), units(1, 18))
        .with_state(PairState::Inactive);
    engine.patch(vec![update]).unwrap();
    let changeset = engine.recompute(&["erd1mex".into()]).unwrap();

    // Fallback pricing still derives 3, so nothing actually moved.
    assert!(changeset.is_empty());
    assert_eq!(engine.cached_price(&"MEX".into()), Some(Decimal::from(3)));
}

#[test]
fn test_missing_anchor_pair_aborts_and_retains_cached_prices() {
    let mut engine = engine_with(vec![anchor_pair(), mex_pair()]);
    engine.recompute_all().unwrap();

    // A broken upstream refresh ships a snapshot without the anchor pair.
    engine.build(&tokens(), vec![mex_pair()]);
    let err = engine.recompute_all().unwrap_err();
    assert_eq!(err, EngineError::MissingAnchorPair { pair: "erd1anchor".into() });
    assert_eq!(engine.cached_price(&"MEX".into()), Some(Decimal::from(3)));
}

#[test]
fn test_unknown_changed_pair_is_rejected() {
    let mut engine = engine_with(vec![anchor_pair(), mex_pair()]);
    let err = engine.recompute(&["erd1ghost".into()]).unwrap_err();
    assert_eq!(err, EngineError::UnknownPair { pair: "erd1ghost".into() });
}

#[test]
fn test_sequences_increase_across_passes() {
    let mut engine = engine_with(vec![anchor_pair(), mex_pair()]);
    let first = engine.recompute_all().unwrap();
    let second = engine.recompute_all().unwrap();
    assert!(second.sequence > first.sequence);
}

#[test]
fn test_changeset_serializes_prices_as_decimal_strings() {
    let mut engine = engine_with(vec![anchor_pair(), mex_pair()]);
    let changeset = engine.recompute_all().unwrap();
    let value = serde_json::to_value(&changeset).unwrap();

    let mex = value["entries"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["token"] == "MEX")
        .unwrap();
    assert!(mex["derived_price"].is_string());
    assert_eq!(mex["derived_price"], "3");
    assert_eq!(mex["usd_price"], "60");
}

#[test]
fn test_usd_display_rounds_to_two_decimals() {
    let update = price_graph::types::PriceUpdate {
        token: "MEX".into(),
        derived_price: Decimal::from_str("0.0512345").unwrap(),
        usd_price: Decimal::from_str("1.024690").unwrap(),
    };
    assert_eq!(update.usd_display(), Decimal::from_str("1.02").unwrap());
}
