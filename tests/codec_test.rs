//! Property tests for the fixed-point codec.

use depthsync::fixed::{format_scaled, parse_scaled, places_of};
use proptest::prelude::*;

proptest! {
    /// Formatting then re-parsing at the same scale is lossless.
    #[test]
    fn format_parse_round_trip(value in any::<u64>(), exponent in 0u32..=9) {
        let scale = 10u64.pow(exponent);
        let text = format_scaled(value, scale);
        prop_assert_eq!(parse_scaled(&text, scale), Some(value));
    }

    /// The parser rejects or accepts, but never panics, whatever the input.
    #[test]
    fn parse_never_panics(text in "\\PC*", scale in any::<u64>()) {
        let _ = parse_scaled(&text, scale);
    }

    /// Excess fractional digits truncate rather than round.
    #[test]
    fn excess_precision_truncates(whole in 0u64..1_000_000, frac in 0u64..=9999) {
        let text = format!("{whole}.{frac:04}");
        let parsed = parse_scaled(&text, 100).unwrap();
        prop_assert_eq!(parsed, whole * 100 + frac / 100);
    }

    /// Every power of ten round-trips through places_of.
    #[test]
    fn places_of_powers(exponent in 0u32..=19) {
        prop_assert_eq!(places_of(10u64.pow(exponent)), Some(exponent));
    }
}
