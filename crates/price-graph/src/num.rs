//! Exact numeric conversions between big-integer reserves and decimal prices.

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use rust_decimal::Decimal;

/// Quotient of two non-negative big integers as a `Decimal`, keeping up to 28
/// significant digits (truncated, not rounded). Zero denominator yields zero,
/// matching the undefined-price convention for empty pools.
pub fn big_ratio_to_decimal(num: &BigUint, den: &BigUint) -> Decimal {
    if den.is_zero() || num.is_zero() {
        return Decimal::ZERO;
    }
    let int_digits = (num / den).to_string().len() as u32;
    let scale = 28u32.saturating_sub(int_digits);
    let q = num * BigUint::from(10u32).pow(scale) / den;
    match q.to_i128() {
        Some(v) => Decimal::try_from_i128_with_scale(v, scale)
            .map(|d| d.normalize())
            .unwrap_or(Decimal::MAX),
        // Quotient beyond 28 integer digits, far outside any realistic price.
        None => Decimal::MAX,
    }
}

/// Scales a raw reserve of the *other* token into reference-asset-equivalent
/// liquidity: `reserve_other x 10^-dec_other x price_other x 10^dec_reference`,
/// evaluated exactly on integers and truncated. This is the widest-path
/// comparison key.
pub fn reference_equivalent_liquidity(
    reserve_other: &BigUint,
    dec_other: u32,
    price_other: Decimal,
    dec_reference: u32,
) -> BigUint {
    if price_other.is_zero() || reserve_other.is_zero() {
        return BigUint::zero();
    }
    let mantissa = price_other.mantissa();
    if mantissa <= 0 {
        return BigUint::zero();
    }
    let scale = price_other.scale();
    let num = reserve_other
        * BigUint::from(mantissa as u128)
        * BigUint::from(10u32).pow(dec_reference);
    let den = BigUint::from(10u32).pow(dec_other + scale);
    num / den
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn big(s: &str) -> BigUint {
        BigUint::from_str(s).unwrap()
    }

    #[test]
    fn test_ratio_of_exact_multiples_is_exact() {
        let d = big_ratio_to_decimal(&big("300"), &big("100"));
        assert_eq!(d, Decimal::from(3));
    }

    #[test]
    fn test_ratio_below_one_keeps_precision() {
        let d = big_ratio_to_decimal(&big("1"), &big("20"));
        assert_eq!(d, Decimal::from_str("0.05").unwrap());
    }

    #[test]
    fn test_ratio_with_zero_denominator_is_zero() {
        assert_eq!(big_ratio_to_decimal(&big("5"), &BigUint::zero()), Decimal::ZERO);
    }

    #[test]
    fn test_ratio_survives_wei_scale_reserves() {
        // 2000e18 / 1000e18 = 2
        let d = big_ratio_to_decimal(
            &big("2000000000000000000000"),
            &big("1000000000000000000000"),
        );
        assert_eq!(d, Decimal::from(2));
    }

    #[test]
    fn test_liquidity_is_decimal_adjusted() {
        // 5 whole tokens (6 decimals) priced at 2, reference has 18 decimals:
        // 5 x 2 = 10 whole reference units.
        let liq = reference_equivalent_liquidity(&big("5000000"), 6, Decimal::from(2), 18);
        assert_eq!(liq, big("10000000000000000000"));
    }

    #[test]
    fn test_liquidity_with_zero_price_is_zero() {
        let liq = reference_equivalent_liquidity(&big("5000000"), 6, Decimal::ZERO, 18);
        assert!(liq.is_zero());
    }

    #[test]
    fn test_liquidity_truncates_toward_zero() {
        // 1 raw unit at price 0.4 with equal decimals truncates to 0.
        let liq = reference_equivalent_liquidity(&big("1"), 18, Decimal::from_str("0.4").unwrap(), 18);
        assert!(liq.is_zero());
    }
}
