//! Shared types for the SENTINEL admission-control layer.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that the limits, guardrail,
//! and ledger modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Tool dispatch
// ---------------------------------------------------------------------------

/// Known guarded tools. Anything else is logged without tool-specific
/// validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolName {
    PretradeChecklist,
    ExecutionPlanner,
    Other,
}

impl ToolName {
    /// Classify a raw tool-name string from the caller.
    pub fn classify(name: &str) -> Self {
        match name {
            "pretrade_checklist" => ToolName::PretradeChecklist,
            "execution_planner" => ToolName::ExecutionPlanner,
            _ => ToolName::Other,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolName::PretradeChecklist => write!(f, "pretrade_checklist"),
            ToolName::ExecutionPlanner => write!(f, "execution_planner"),
            ToolName::Other => write!(f, "other"),
        }
    }
}

// ---------------------------------------------------------------------------
// Portfolio state snapshot
// ---------------------------------------------------------------------------

/// The slice of live portfolio state the guardrail needs to evaluate an
/// execution action. Supplied by the orchestrator on every call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct CurrentState {
    /// Realised loss so far today, as a positive number of dollars.
    pub daily_loss: f64,
    /// Number of currently open positions.
    pub num_positions: u32,
}

impl fmt::Display for CurrentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "daily_loss=${:.2} positions={}",
            self.daily_loss, self.num_positions,
        )
    }
}

// ---------------------------------------------------------------------------
// Backtest seeding
// ---------------------------------------------------------------------------

/// One historical trade result, used to bootstrap the eligibility ledger
/// before live use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRecord {
    pub ticker: String,
    pub pnl: f64,
    pub entry_time: DateTime<Utc>,
}

impl fmt::Display for BacktestRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.pnl >= 0.0 { "+" } else { "" };
        write!(
            f,
            "{} {sign}{:.2} @ {}",
            self.ticker,
            self.pnl,
            self.entry_time.format("%Y-%m-%d %H:%M"),
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for SENTINEL.
///
/// Note: guardrail rule breaches are *not* errors at this level — they are
/// represented by [`crate::guardrail::decision::GuardrailViolation`] and
/// consumed inside the coordinator, which never fails outward.
#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    /// The eligibility ledger could not be read or written. Callers must
    /// treat this as a denial: if eligibility cannot be determined, the
    /// instrument does not trade.
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("Ledger corrupt: {0}")]
    LedgerCorrupt(String),

    #[error("Audit log error: {0}")]
    Audit(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for SentinelError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => {
                SentinelError::LedgerCorrupt(e.to_string())
            }
            other => SentinelError::LedgerUnavailable(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
