//! Per-call limit checks with violation accounting.
//!
//! Every check returns a plain bool — `false` means the limit was breached
//! and the matching counter was incremented exactly once. Checks never
//! panic and never error; the coordinator turns accumulated violations
//! into audit records.

use std::collections::HashMap;
use std::fmt;

use tracing::warn;

use super::policy::LimitPolicy;

// ---------------------------------------------------------------------------
// Violation kinds
// ---------------------------------------------------------------------------

/// The category of limit a failing check breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    DailyLoss,
    PositionSize,
    Leverage,
    ConcurrentPositions,
    Correlation,
    Exposure,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::DailyLoss => write!(f, "daily_loss"),
            ViolationKind::PositionSize => write!(f, "position_size"),
            ViolationKind::Leverage => write!(f, "leverage"),
            ViolationKind::ConcurrentPositions => write!(f, "concurrent_positions"),
            ViolationKind::Correlation => write!(f, "correlation"),
            ViolationKind::Exposure => write!(f, "exposure"),
        }
    }
}

/// Snapshot of accumulated violations since the validator was created.
#[derive(Debug, Clone)]
pub struct ViolationStats {
    pub total: u64,
    pub by_kind: HashMap<ViolationKind, u64>,
}

impl ViolationStats {
    /// Count for one kind (0 if never breached).
    pub fn count(&self, kind: ViolationKind) -> u64 {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Stateless per-call checks against a [`LimitPolicy`], plus violation
/// counters whose lifetime is the validator's. Counters reset only by
/// recreating the validator.
pub struct LimitValidator {
    policy: LimitPolicy,
    counters: HashMap<ViolationKind, u64>,
    total: u64,
}

impl LimitValidator {
    pub fn new(policy: LimitPolicy) -> Self {
        Self {
            policy,
            counters: HashMap::new(),
            total: 0,
        }
    }

    /// The policy this validator enforces.
    pub fn policy(&self) -> &LimitPolicy {
        &self.policy
    }

    /// Daily loss breach is inclusive: hitting the cap exactly is already
    /// a violation.
    pub fn check_daily_loss(&mut self, loss: f64) -> bool {
        if loss >= self.policy.max_daily_loss {
            self.record_violation(
                ViolationKind::DailyLoss,
                format!("daily loss {loss:.2} >= limit {:.2}", self.policy.max_daily_loss),
            );
            false
        } else {
            true
        }
    }

    pub fn check_position_size(&mut self, symbol: &str, size: f64) -> bool {
        if size.abs() > self.policy.max_position_size {
            self.record_violation(
                ViolationKind::PositionSize,
                format!(
                    "{symbol}: position size {size:.2} exceeds limit {:.2}",
                    self.policy.max_position_size
                ),
            );
            false
        } else {
            true
        }
    }

    pub fn check_leverage(&mut self, leverage: f64) -> bool {
        if leverage > self.policy.max_leverage {
            self.record_violation(
                ViolationKind::Leverage,
                format!("leverage {leverage:.2}x exceeds limit {:.2}x", self.policy.max_leverage),
            );
            false
        } else {
            true
        }
    }

    /// Callers pass the *prospective* count (current + 1) when asking
    /// "would adding one more breach the cap".
    pub fn check_concurrent_positions(&mut self, count: u32) -> bool {
        if count >= self.policy.max_concurrent_positions {
            self.record_violation(
                ViolationKind::ConcurrentPositions,
                format!(
                    "{count} concurrent positions reaches cap {}",
                    self.policy.max_concurrent_positions
                ),
            );
            false
        } else {
            true
        }
    }

    pub fn check_correlation(&mut self, correlation: f64) -> bool {
        if correlation > self.policy.max_correlation {
            self.record_violation(
                ViolationKind::Correlation,
                format!(
                    "correlation {correlation:.3} exceeds limit {:.3}",
                    self.policy.max_correlation
                ),
            );
            false
        } else {
            true
        }
    }

    /// One check covers both exposure caps; either breach counts once.
    pub fn check_exposure(&mut self, gross: f64, net: f64) -> bool {
        if gross > self.policy.max_gross_exposure || net.abs() > self.policy.max_net_exposure {
            self.record_violation(
                ViolationKind::Exposure,
                format!(
                    "gross {gross:.2}/net {net:.2} exceeds caps {}/{}",
                    self.policy.max_gross_exposure, self.policy.max_net_exposure
                ),
            );
            false
        } else {
            true
        }
    }

    /// Total violations plus a per-kind breakdown.
    pub fn violation_stats(&self) -> ViolationStats {
        ViolationStats {
            total: self.total,
            by_kind: self.counters.clone(),
        }
    }

    fn record_violation(&mut self, kind: ViolationKind, detail: String) {
        *self.counters.entry(kind).or_insert(0) += 1;
        self.total += 1;
        warn!(kind = %kind, detail = %detail, "Hard limit violated");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
