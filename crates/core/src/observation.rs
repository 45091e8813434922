//! Price observations and percent-change math.

use crate::Symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Percent change of `current` relative to `reference`:
/// `(current - reference) / reference * 100`.
///
/// Returns None when the reference is zero or either input is not finite.
pub fn percent_change(current: f64, reference: f64) -> Option<f64> {
    if reference == 0.0 || !reference.is_finite() || !current.is_finite() {
        return None;
    }
    Some((current - reference) / reference * 100.0)
}

/// One timestamped quote for a symbol.
///
/// Observations are keyed by (symbol, observed_at). The latest one per
/// symbol is the symbol's current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub symbol: Symbol,
    /// Current price.
    pub price: f64,
    /// Reference price the change is measured against (previous close).
    pub previous_close: f64,
    /// Percent change vs previous close. Named "weekly" in the API for
    /// compatibility, but it is a same-session delta.
    pub change_percent: f64,
    /// Traded volume, 0 when the source does not report one.
    pub volume: i64,
    pub observed_at: DateTime<Utc>,
}

impl PriceObservation {
    /// Build an observation from a current price and previous close.
    ///
    /// Returns None if either price is zero, negative or not finite, so a
    /// returned observation always has a well-defined percent change.
    pub fn new(
        symbol: Symbol,
        price: f64,
        previous_close: f64,
        volume: i64,
        observed_at: DateTime<Utc>,
    ) -> Option<Self> {
        if !(price > 0.0) || !(previous_close > 0.0) {
            return None;
        }
        let change_percent = percent_change(price, previous_close)?;
        Some(Self {
            symbol,
            price,
            previous_close,
            change_percent,
            volume,
            observed_at,
        })
    }
}

/// Percent change at or below which a drop is alert-worthy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertThreshold(pub f64);

impl Default for AlertThreshold {
    fn default() -> Self {
        Self(-20.0)
    }
}

impl AlertThreshold {
    /// Inclusive: a change exactly equal to the threshold triggers.
    pub fn is_triggered(&self, change_percent: f64) -> bool {
        change_percent <= self.0
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(80.0, 100.0), Some(-20.0));
        assert_eq!(percent_change(150.0, 100.0), Some(50.0));
        assert_eq!(percent_change(100.0, 100.0), Some(0.0));
    }

    #[test]
    fn test_percent_change_zero_reference() {
        assert_eq!(percent_change(10.0, 0.0), None);
        assert_eq!(percent_change(f64::NAN, 10.0), None);
    }

    #[test]
    fn test_observation_rejects_zero_prices() {
        let now = Utc::now();
        assert!(PriceObservation::new(sym("XYZ"), 0.0, 100.0, 0, now).is_none());
        assert!(PriceObservation::new(sym("XYZ"), 80.0, 0.0, 0, now).is_none());
        assert!(PriceObservation::new(sym("XYZ"), -1.0, 100.0, 0, now).is_none());
    }

    #[test]
    fn test_observation_computes_change() {
        let obs = PriceObservation::new(sym("XYZ"), 80.0, 100.0, 1200, Utc::now()).unwrap();
        assert_eq!(obs.change_percent, -20.0);
        assert_eq!(obs.volume, 1200);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let threshold = AlertThreshold::default();
        assert!(threshold.is_triggered(-20.0));
        assert!(threshold.is_triggered(-35.2));
        assert!(!threshold.is_triggered(-19.99));
        assert!(!threshold.is_triggered(5.0));
    }

    #[test]
    fn test_threshold_boundary_scenario() {
        let obs = PriceObservation::new(sym("XYZ"), 80.0, 100.0, 0, Utc::now()).unwrap();
        assert!(AlertThreshold(-20.0).is_triggered(obs.change_percent));
        assert!(!AlertThreshold(-21.0).is_triggered(obs.change_percent));
    }

    #[test]
    fn test_threshold_boundary_with_fractional_prices() {
        // Exactly 20% down, but not a round pair.
        assert_eq!(percent_change(1.80, 2.25), Some(-20.0));
        let obs = PriceObservation::new(sym("XYZ"), 1.80, 2.25, 0, Utc::now()).unwrap();
        assert!(AlertThreshold(-20.0).is_triggered(obs.change_percent));
    }
}
