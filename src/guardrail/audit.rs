//! Append-only, hash-addressed audit trail.
//!
//! Every gated interaction becomes an immutable [`AuditEntry`] held
//! in-process and, when a log path is configured, mirrored as one JSON
//! line per entry. Inputs are canonicalized (serde_json objects keep
//! stable, sorted key order) and content-addressed with a truncated
//! SHA-256 hash, so identical inputs always map to the same hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

/// Hex characters kept from the SHA-256 digest of the canonical input.
const INPUT_HASH_LEN: usize = 16;

/// One gated interaction. Never mutated or deleted after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub tool_name: String,
    /// First 16 hex chars of the SHA-256 of the canonicalized inputs.
    pub input_hash: String,
    pub output_snapshot: Value,
    pub validation_passed: bool,
    pub action_taken: String,
    pub override_attempted: bool,
    pub violations: Vec<String>,
    pub latency_ms: f64,
}

/// Aggregate view over the in-process audit trail.
#[derive(Debug, Clone, Default)]
pub struct ViolationSummary {
    pub total_interactions: u64,
    pub validation_failures: u64,
    pub override_attempts: u64,
    /// Individual violation strings counted per tool name.
    pub violations_by_tool: HashMap<String, u64>,
}

/// Append-only audit logger with an optional durable JSONL mirror.
pub struct AuditLogger {
    entries: Vec<AuditEntry>,
    log_path: Option<PathBuf>,
}

impl AuditLogger {
    /// In-process only; nothing touches disk.
    pub fn in_memory() -> Self {
        Self { entries: Vec::new(), log_path: None }
    }

    /// Mirror every entry to `path` as line-delimited JSON. The parent
    /// directory is created here so the hot path only appends.
    pub fn with_log_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    error!(path = %parent.display(), error = %e, "Failed to create audit log directory");
                }
            }
        }
        Self { entries: Vec::new(), log_path: Some(path) }
    }

    /// Record one gated interaction. Disk failures are logged and
    /// swallowed — the in-process trail is the source of truth and the
    /// gating path must not fail because the mirror did.
    #[allow(clippy::too_many_arguments)]
    pub fn log_interaction(
        &mut self,
        tool_name: &str,
        inputs: &Value,
        output: &Value,
        validation_passed: bool,
        action_taken: &str,
        override_attempted: bool,
        violations: Vec<String>,
        latency_ms: f64,
    ) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            tool_name: tool_name.to_string(),
            input_hash: input_hash(inputs),
            output_snapshot: output.clone(),
            validation_passed,
            action_taken: action_taken.to_string(),
            override_attempted,
            violations,
            latency_ms,
        };

        debug!(
            tool = %entry.tool_name,
            hash = %entry.input_hash,
            passed = entry.validation_passed,
            action = %entry.action_taken,
            "Audit entry recorded"
        );

        if let Some(path) = &self.log_path {
            if let Err(e) = append_line(path, &entry) {
                error!(path = %path.display(), error = %e, "Failed to mirror audit entry");
            }
        }

        self.entries.push(entry);
    }

    /// All entries recorded so far, oldest first.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Totals across the in-process trail.
    pub fn violation_summary(&self) -> ViolationSummary {
        let mut summary = ViolationSummary::default();
        for entry in &self.entries {
            summary.total_interactions += 1;
            if !entry.validation_passed {
                summary.validation_failures += 1;
            }
            if entry.override_attempted {
                summary.override_attempts += 1;
            }
            if !entry.violations.is_empty() {
                *summary
                    .violations_by_tool
                    .entry(entry.tool_name.clone())
                    .or_insert(0) += entry.violations.len() as u64;
            }
        }
        summary
    }
}

/// Content hash of the canonical form of `inputs`.
///
/// serde_json's default object representation is a BTreeMap, so nested
/// keys serialize in sorted order and the hash is stable across callers
/// that built the map in different insertion orders.
pub fn input_hash(inputs: &Value) -> String {
    let canonical = inputs.to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(digest)[..INPUT_HASH_LEN].to_string()
}

fn append_line(path: &Path, entry: &AuditEntry) -> anyhow::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(entry)?;
    writeln!(file, "{line}")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log_one(logger: &mut AuditLogger, tool: &str, passed: bool, violations: Vec<String>) {
        logger.log_interaction(
            tool,
            &json!({"symbol": "BTCUSDT"}),
            &json!({"decision": "PROCEED"}),
            passed,
            if passed { "PROCEED" } else { "REJECTED" },
            !passed,
            violations,
            12.5,
        );
    }

    #[test]
    fn test_input_hash_is_16_hex_chars() {
        let h = input_hash(&json!({"a": 1, "b": [1, 2, 3]}));
        assert_eq!(h.len(), 16);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_input_hash_stable_under_key_order() {
        // serde_json sorts object keys, so construction order is irrelevant.
        let a: Value = serde_json::from_str(r#"{"x": 1, "y": {"b": 2, "a": 3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y": {"a": 3, "b": 2}, "x": 1}"#).unwrap();
        assert_eq!(input_hash(&a), input_hash(&b));
    }

    #[test]
    fn test_input_hash_differs_on_content() {
        assert_ne!(input_hash(&json!({"a": 1})), input_hash(&json!({"a": 2})));
    }

    #[test]
    fn test_entries_accumulate() {
        let mut logger = AuditLogger::in_memory();
        log_one(&mut logger, "pretrade_checklist", true, vec![]);
        log_one(&mut logger, "pretrade_checklist", false, vec!["halt required".into()]);
        assert_eq!(logger.len(), 2);
        assert!(logger.entries()[0].validation_passed);
        assert!(!logger.entries()[1].validation_passed);
    }

    #[test]
    fn test_violation_summary() {
        let mut logger = AuditLogger::in_memory();
        log_one(&mut logger, "pretrade_checklist", true, vec![]);
        log_one(&mut logger, "pretrade_checklist", false, vec!["a".into(), "b".into()]);
        log_one(&mut logger, "execution_planner", false, vec!["c".into()]);

        let summary = logger.violation_summary();
        assert_eq!(summary.total_interactions, 3);
        assert_eq!(summary.validation_failures, 2);
        assert_eq!(summary.override_attempts, 2);
        assert_eq!(summary.violations_by_tool["pretrade_checklist"], 2);
        assert_eq!(summary.violations_by_tool["execution_planner"], 1);
    }

    #[test]
    fn test_durable_mirror_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("trail.jsonl");
        let mut logger = AuditLogger::with_log_file(&path);

        log_one(&mut logger, "pretrade_checklist", true, vec![]);
        log_one(&mut logger, "execution_planner", false, vec!["x".into()]);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: AuditEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.tool_name, "pretrade_checklist");
        assert!(first.validation_passed);
        assert_eq!(first.input_hash.len(), 16);

        let second: AuditEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.violations, vec!["x".to_string()]);
    }

    #[test]
    fn test_mirror_failure_does_not_panic() {
        // Path under a file (not a directory) — every append will fail.
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        let mut logger = AuditLogger::with_log_file(blocker.join("trail.jsonl"));

        log_one(&mut logger, "pretrade_checklist", true, vec![]);
        // In-process trail still records.
        assert_eq!(logger.len(), 1);
    }
}
