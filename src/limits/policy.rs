//! Immutable risk-limit policy.
//!
//! Loaded once per session and never mutated afterwards. The validator
//! holds a copy; the only way to change limits mid-session is to rebuild
//! the whole guardrail stack.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric risk limits. All fields are non-negative; the exposure caps
/// may be `f64::INFINITY` for unbounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitPolicy {
    /// Maximum realised daily loss in dollars (inclusive breach).
    pub max_daily_loss: f64,
    /// Maximum absolute position size per instrument, in dollars.
    pub max_position_size: f64,
    /// Maximum account leverage.
    pub max_leverage: f64,
    /// Consecutive losses before the circuit breaker trips.
    pub circuit_breaker_losses: u32,
    /// Maximum pairwise correlation allowed between open positions.
    pub max_correlation: f64,
    /// Maximum number of concurrently open positions.
    pub max_concurrent_positions: u32,
    /// Maximum gross exposure in dollars (may be infinite).
    pub max_gross_exposure: f64,
    /// Maximum absolute net exposure in dollars (may be infinite).
    pub max_net_exposure: f64,
}

impl Default for LimitPolicy {
    fn default() -> Self {
        Self {
            max_daily_loss: 500.0,
            max_position_size: 5_000.0,
            max_leverage: 3.0,
            circuit_breaker_losses: 3,
            max_correlation: 0.7,
            max_concurrent_positions: 5,
            max_gross_exposure: f64::INFINITY,
            max_net_exposure: f64::INFINITY,
        }
    }
}

impl fmt::Display for LimitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "daily_loss<=${:.0} pos<=${:.0} lev<={:.1}x corr<={:.2} concurrent<={} gross<=${} net<=${}",
            self.max_daily_loss,
            self.max_position_size,
            self.max_leverage,
            self.max_correlation,
            self.max_concurrent_positions,
            fmt_cap(self.max_gross_exposure),
            fmt_cap(self.max_net_exposure),
        )
    }
}

fn fmt_cap(v: f64) -> String {
    if v.is_infinite() {
        "inf".to_string()
    } else {
        format!("{v:.0}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_bounded_where_it_matters() {
        let policy = LimitPolicy::default();
        assert!(policy.max_daily_loss > 0.0);
        assert!(policy.max_position_size > 0.0);
        assert!(policy.max_leverage > 0.0);
        assert!(policy.max_concurrent_positions > 0);
        assert!(policy.max_gross_exposure.is_infinite());
        assert!(policy.max_net_exposure.is_infinite());
    }

    #[test]
    fn test_policy_display() {
        let policy = LimitPolicy::default();
        let display = format!("{policy}");
        assert!(display.contains("daily_loss<=$500"));
        assert!(display.contains("gross<=$inf"));
    }

    #[test]
    fn test_policy_serialization_roundtrip() {
        let policy = LimitPolicy {
            max_gross_exposure: 100_000.0,
            ..Default::default()
        };
        let json = serde_json::to_string(&policy).unwrap();
        let parsed: LimitPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.max_concurrent_positions, 5);
        assert!((parsed.max_gross_exposure - 100_000.0).abs() < 1e-10);
    }
}
