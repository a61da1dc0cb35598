//! Guardrail stack — decision rules, latency tracking, audit logging, and
//! the fail-safe coordinator that ties them together.

pub mod audit;
pub mod coordinator;
pub mod decision;
pub mod latency;

pub use audit::{AuditEntry, AuditLogger, ViolationSummary};
pub use coordinator::{GuardrailCoordinator, SharedCoordinator};
pub use decision::GuardrailViolation;
pub use latency::{LatencyMonitor, LatencyStats};
