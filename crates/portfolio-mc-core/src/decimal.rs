//! Fixed-point quantization applied where f64 results leave the numeric core.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

use crate::types::Symbol;

/// Quantizes floats to a fixed number of decimal places, half-up.
///
/// The float is read through its shortest round-trip representation, so
/// `0.145` rounds to `0.15` at two places. Non-finite inputs, and values
/// outside the `Decimal` range, become the configured default (zero unless
/// overridden).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantizer {
    places: u32,
    default: Decimal,
}

impl Quantizer {
    pub fn new(places: u32) -> Self {
        Quantizer {
            places,
            default: Decimal::ZERO,
        }
    }

    pub fn with_default(mut self, default: Decimal) -> Self {
        self.default = default;
        self
    }

    pub fn places(&self) -> u32 {
        self.places
    }

    /// Quantize `value`; `field` only names the value in the clamp warning.
    pub fn quantize(&self, field: &str, value: f64) -> Decimal {
        let raw = if value.is_finite() {
            Decimal::from_str(&value.to_string())
                .ok()
                .or_else(|| Decimal::from_f64(value))
        } else {
            None
        };
        let d = match raw {
            Some(d) => d,
            None => {
                warn!(field, value, "Clamping unrepresentable value to default");
                self.default
            }
        };
        d.round_dp_with_strategy(self.places, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Replace a non-finite `value` with the default, leaving finite values
    /// untouched.
    pub fn clamp(&self, field: &str, value: f64) -> f64 {
        if value.is_finite() {
            return value;
        }
        warn!(field, value, "Clamping non-finite value to default");
        self.default.to_f64().unwrap_or(0.0)
    }

    pub fn quantize_weights<'a>(
        &self,
        weights: impl IntoIterator<Item = (&'a Symbol, f64)>,
    ) -> BTreeMap<Symbol, Decimal> {
        weights
            .into_iter()
            .map(|(s, w)| (s.clone(), self.quantize(s, w)))
            .collect()
    }
}

impl Default for Quantizer {
    fn default() -> Self {
        Quantizer::new(8)
    }
}
