//! Eligibility state machine over per-ticker trade history.
//!
//! Three states: `active` → `monitored` → `ejected`, with recovery from
//! `monitored` back to `active` but no automatic exit from `ejected`.
//! The ejection check runs before the monitor check, so a ticker can jump
//! straight from `active` to `ejected` on the trade that gives it the
//! minimum count with a low win rate.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Thresholds governing the state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EligibilityConfig {
    /// Minimum recorded trades before a ticker can be ejected.
    pub min_trades_for_ejection: u64,
    /// Win rate below this (with enough trades) ejects the ticker.
    pub ejection_win_rate_threshold: f64,
    /// Win rate below this (with at least 2 trades) moves an active
    /// ticker to monitored.
    pub monitor_win_rate_threshold: f64,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            min_trades_for_ejection: 4,
            ejection_win_rate_threshold: 0.35,
            monitor_win_rate_threshold: 0.45,
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Admission status of a ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickerStatus {
    Active,
    Monitored,
    Ejected,
}

impl TickerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TickerStatus::Active => "active",
            TickerStatus::Monitored => "monitored",
            TickerStatus::Ejected => "ejected",
        }
    }

    /// Parse the stored column value. Unknown values are corruption, not
    /// a default.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(TickerStatus::Active),
            "monitored" => Some(TickerStatus::Monitored),
            "ejected" => Some(TickerStatus::Ejected),
            _ => None,
        }
    }
}

impl fmt::Display for TickerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Stats & gate
// ---------------------------------------------------------------------------

/// Derived per-ticker statistics exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerStats {
    pub ticker: String,
    pub total_trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub total_pnl: f64,
    pub win_rate: f64,
    /// Mean winning trade P&L (0 when no wins).
    pub avg_win: f64,
    /// Mean losing trade magnitude (0 when no losses).
    pub avg_loss: f64,
    /// Gross wins over gross losses (infinite when lossless).
    pub profit_factor: f64,
    pub status: TickerStatus,
}

impl fmt::Display for TickerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}W/{}L win_rate={:.0}% pnl={:.2} pf={:.2}",
            self.ticker,
            self.status,
            self.wins,
            self.losses,
            self.win_rate * 100.0,
            self.total_pnl,
            self.profit_factor,
        )
    }
}

/// Admission verdict for one ticker.
#[derive(Debug, Clone)]
pub struct TradeGate {
    pub allowed: bool,
    pub reason: String,
    pub stats: Option<TickerStats>,
}

impl fmt::Display for TradeGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.allowed { "ALLOW" } else { "DENY" };
        write!(f, "{verdict}: {}", self.reason)
    }
}

// ---------------------------------------------------------------------------
// Transition evaluation
// ---------------------------------------------------------------------------

/// Re-evaluate status from updated counters. Returns the new status and,
/// on a fresh ejection, the reason to persist.
///
/// `ejected` is terminal: no branch below leaves it.
pub fn evaluate_status(
    config: &EligibilityConfig,
    current: TickerStatus,
    total_trades: u64,
    wins: u64,
) -> (TickerStatus, Option<String>) {
    let win_rate = if total_trades > 0 {
        wins as f64 / total_trades as f64
    } else {
        0.0
    };

    // Ejection has priority over monitoring: fast-fail on the trade that
    // reaches the minimum count with a bad record.
    if total_trades >= config.min_trades_for_ejection
        && win_rate < config.ejection_win_rate_threshold
        && current != TickerStatus::Ejected
    {
        let reason = format!(
            "win rate {:.0}% below {:.0}% after {total_trades} trades",
            win_rate * 100.0,
            config.ejection_win_rate_threshold * 100.0,
        );
        return (TickerStatus::Ejected, Some(reason));
    }

    if total_trades >= 2
        && win_rate < config.monitor_win_rate_threshold
        && current == TickerStatus::Active
    {
        return (TickerStatus::Monitored, None);
    }

    if current == TickerStatus::Monitored && win_rate >= config.monitor_win_rate_threshold {
        return (TickerStatus::Active, None);
    }

    (current, None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
