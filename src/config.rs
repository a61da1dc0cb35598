//! Configuration loading from TOML.
//!
//! Reads `sentinel.toml` and deserializes into strongly-typed structs.
//! Every section and field carries a serde default matching the component
//! defaults, so a partial (or absent) file yields a usable conservative
//! configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use crate::ledger::EligibilityConfig;
use crate::limits::LimitPolicy;

/// Default configuration file path.
pub const DEFAULT_CONFIG_FILE: &str = "sentinel.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub latency: LatencyConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_daily_loss: f64,
    pub max_position_size: f64,
    pub max_leverage: f64,
    pub circuit_breaker_losses: u32,
    pub max_correlation: f64,
    pub max_concurrent_positions: u32,
    /// Omit (or set negative) for unbounded.
    pub max_gross_exposure: Option<f64>,
    pub max_net_exposure: Option<f64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let p = LimitPolicy::default();
        Self {
            max_daily_loss: p.max_daily_loss,
            max_position_size: p.max_position_size,
            max_leverage: p.max_leverage,
            circuit_breaker_losses: p.circuit_breaker_losses,
            max_correlation: p.max_correlation,
            max_concurrent_positions: p.max_concurrent_positions,
            max_gross_exposure: None,
            max_net_exposure: None,
        }
    }
}

impl LimitsConfig {
    /// Build the immutable policy the validator enforces.
    pub fn to_policy(&self) -> LimitPolicy {
        LimitPolicy {
            max_daily_loss: self.max_daily_loss,
            max_position_size: self.max_position_size,
            max_leverage: self.max_leverage,
            circuit_breaker_losses: self.circuit_breaker_losses,
            max_correlation: self.max_correlation,
            max_concurrent_positions: self.max_concurrent_positions,
            max_gross_exposure: cap_or_infinite(self.max_gross_exposure),
            max_net_exposure: cap_or_infinite(self.max_net_exposure),
        }
    }
}

fn cap_or_infinite(cap: Option<f64>) -> f64 {
    match cap {
        Some(v) if v >= 0.0 => v,
        _ => f64::INFINITY,
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LatencyConfig {
    pub timeout_ms: f64,
    pub alert_threshold_ms: f64,
    pub window_size: usize,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1000.0,
            alert_threshold_ms: 500.0,
            window_size: crate::guardrail::latency::DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AuditConfig {
    /// JSONL mirror path; in-process only when unset.
    pub log_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LedgerConfig {
    pub db_path: String,
    pub min_trades_for_ejection: u64,
    pub ejection_win_rate_threshold: f64,
    pub monitor_win_rate_threshold: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let e = EligibilityConfig::default();
        Self {
            db_path: "sentinel_ledger.db".to_string(),
            min_trades_for_ejection: e.min_trades_for_ejection,
            ejection_win_rate_threshold: e.ejection_win_rate_threshold,
            monitor_win_rate_threshold: e.monitor_win_rate_threshold,
        }
    }
}

impl LedgerConfig {
    pub fn to_eligibility(&self) -> EligibilityConfig {
        EligibilityConfig {
            min_trades_for_ejection: self.min_trades_for_ejection,
            ejection_win_rate_threshold: self.ejection_win_rate_threshold,
            monitor_win_rate_threshold: self.monitor_win_rate_threshold,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load from the default path, falling back to defaults when the file
    /// does not exist.
    pub fn load_or_default() -> Result<Self> {
        if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::load(DEFAULT_CONFIG_FILE)
        } else {
            Ok(Self::default())
        }
    }
}
