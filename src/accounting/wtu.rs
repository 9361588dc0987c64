//! WTU (Weighted Token Unit) conversion.
//!
//! WTU is the product's budget currency: token counts normalized by
//! per-model input/output weights so that a premium-model call costs
//! proportionally more budget than a light-model call.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// `ceil(in_tokens/1000 * in_mult + out_tokens/1000 * out_mult)`, floor 1.
///
/// The baseline tier reference model carries multipliers (1.0, 1.0), so
/// 1500 input + 500 output tokens cost exactly 2 WTU there.
pub fn wtu_from_tokens(
    input_tokens: i64,
    output_tokens: i64,
    input_multiplier: Decimal,
    output_multiplier: Decimal,
) -> i64 {
    let thousand = Decimal::from(1000);
    let input_wtu = Decimal::from(input_tokens.max(0)) / thousand * input_multiplier;
    let output_wtu = Decimal::from(output_tokens.max(0)) / thousand * output_multiplier;

    let total = (input_wtu + output_wtu).ceil().to_i64().unwrap_or(1);
    total.max(1)
}

/// Embedding calls are weighted with a single multiplier on input tokens.
pub fn wtu_from_embedding_tokens(input_tokens: i64, multiplier: Decimal) -> i64 {
    wtu_from_tokens(input_tokens, 0, multiplier, Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_baseline_model() {
        // 1.5 + 0.5 = 2.0 -> 2
        assert_eq!(wtu_from_tokens(1500, 500, dec!(1.0), dec!(1.0)), 2);
    }

    #[test]
    fn test_weighted_model() {
        // (1.5 + 0.5) * 3.0 = 6.0 -> 6
        assert_eq!(wtu_from_tokens(1500, 500, dec!(3.0), dec!(3.0)), 6);
    }

    #[test]
    fn test_minimum_one_wtu() {
        assert_eq!(wtu_from_tokens(0, 0, dec!(1.0), dec!(1.0)), 1);
        assert_eq!(wtu_from_tokens(1, 1, dec!(1.0), dec!(1.0)), 1);
    }

    #[test]
    fn test_ceil_behavior() {
        // 1.001 -> 2
        assert_eq!(wtu_from_tokens(1001, 0, dec!(1.0), dec!(1.0)), 2);
    }

    #[test]
    fn test_embedding_single_multiplier() {
        assert_eq!(wtu_from_embedding_tokens(2500, dec!(1.0)), 3);
    }

    proptest! {
        #[test]
        fn prop_wtu_at_least_one(input in 0i64..5_000_000, output in 0i64..5_000_000) {
            prop_assert!(wtu_from_tokens(input, output, dec!(1.0), dec!(1.0)) >= 1);
        }

        #[test]
        fn prop_wtu_monotone_in_tokens(
            input in 0i64..1_000_000,
            output in 0i64..1_000_000,
            extra in 0i64..1_000_000,
        ) {
            let base = wtu_from_tokens(input, output, dec!(2.0), dec!(4.0));
            let more = wtu_from_tokens(input + extra, output, dec!(2.0), dec!(4.0));
            prop_assert!(more >= base);
        }

        #[test]
        fn prop_wtu_matches_formula(input in 0i64..1_000_000, output in 0i64..1_000_000) {
            let wtu = wtu_from_tokens(input, output, dec!(1.5), dec!(2.5));
            let expected = ((input as f64 / 1000.0) * 1.5 + (output as f64 / 1000.0) * 2.5).ceil() as i64;
            prop_assert_eq!(wtu, expected.max(1));
        }
    }
}
