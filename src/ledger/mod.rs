//! Ticker eligibility ledger.
//!
//! Durable per-instrument win/loss accounting backing the admission state
//! machine. The orchestrator consults [`TickerLedger::should_trade_ticker`]
//! *before* building a candidate action; chronically unprofitable tickers
//! are ejected automatically and stay out until an administrative reset.
//!
//! Every `record_trade_outcome` runs its read-modify-write cycle inside a
//! single SQLite transaction, so concurrent outcomes for the same ticker
//! cannot lose updates. Storage failures surface as
//! [`SentinelError::LedgerUnavailable`] — when eligibility cannot be
//! determined the caller must deny, never assume "new ticker".

pub mod eligibility;

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use tracing::{info, warn};

use crate::types::{BacktestRecord, SentinelError};
pub use eligibility::{EligibilityConfig, TickerStats, TickerStatus, TradeGate};

// ---------------------------------------------------------------------------
// Row model
// ---------------------------------------------------------------------------

/// One ledger row as stored. Accumulators only ever grow.
#[derive(Debug, Clone)]
pub struct TickerRecord {
    pub ticker: String,
    pub total_trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub total_pnl: f64,
    /// Gross winning P&L (absolute magnitudes).
    pub sum_wins: f64,
    /// Gross losing P&L (absolute magnitudes).
    pub sum_losses: f64,
    pub last_trade_date: Option<NaiveDate>,
    pub status: TickerStatus,
    pub ejection_reason: Option<String>,
}

impl TickerRecord {
    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            0.0
        } else {
            self.wins as f64 / self.total_trades as f64
        }
    }

    fn stats(&self) -> TickerStats {
        TickerStats {
            ticker: self.ticker.clone(),
            total_trades: self.total_trades,
            wins: self.wins,
            losses: self.losses,
            total_pnl: self.total_pnl,
            win_rate: self.win_rate(),
            avg_win: if self.wins > 0 { self.sum_wins / self.wins as f64 } else { 0.0 },
            avg_loss: if self.losses > 0 { self.sum_losses / self.losses as f64 } else { 0.0 },
            profit_factor: if self.sum_losses > 0.0 {
                self.sum_wins / self.sum_losses
            } else {
                f64::INFINITY
            },
            status: self.status,
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ticker_records (
    ticker          TEXT PRIMARY KEY,
    total_trades    INTEGER NOT NULL DEFAULT 0,
    wins            INTEGER NOT NULL DEFAULT 0,
    losses          INTEGER NOT NULL DEFAULT 0,
    total_pnl       REAL    NOT NULL DEFAULT 0,
    sum_wins        REAL    NOT NULL DEFAULT 0,
    sum_losses      REAL    NOT NULL DEFAULT 0,
    last_trade_date TEXT,
    status          TEXT    NOT NULL DEFAULT 'active',
    ejection_reason TEXT,
    created_at      TEXT    NOT NULL,
    updated_at      TEXT    NOT NULL
);
";

/// Durable eligibility ledger over a SQLite database.
pub struct TickerLedger {
    conn: Connection,
    config: EligibilityConfig,
}

impl TickerLedger {
    /// Open (or create) the ledger at `path`.
    pub fn open(path: impl AsRef<Path>, config: EligibilityConfig) -> Result<Self, SentinelError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, config })
    }

    /// Fully in-memory ledger (tests, dry runs).
    pub fn open_in_memory(config: EligibilityConfig) -> Result<Self, SentinelError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, config })
    }

    pub fn config(&self) -> &EligibilityConfig {
        &self.config
    }

    /// Record one resolved trade and re-evaluate the ticker's status on
    /// the updated counters. The whole read-modify-write cycle is one
    /// transaction. Returns the post-update status.
    pub fn record_trade_outcome(
        &mut self,
        ticker: &str,
        won: bool,
        pnl: f64,
        trade_date: NaiveDate,
    ) -> Result<TickerStatus, SentinelError> {
        let tx = self.conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let existing = fetch_record(&tx, ticker)?;
        let mut record = existing.unwrap_or_else(|| TickerRecord {
            ticker: ticker.to_string(),
            total_trades: 0,
            wins: 0,
            losses: 0,
            total_pnl: 0.0,
            sum_wins: 0.0,
            sum_losses: 0.0,
            last_trade_date: None,
            status: TickerStatus::Active,
            ejection_reason: None,
        });

        record.total_trades += 1;
        record.total_pnl += pnl;
        if won {
            record.wins += 1;
            record.sum_wins += pnl.abs();
        } else {
            record.losses += 1;
            record.sum_losses += pnl.abs();
        }
        record.last_trade_date = Some(trade_date);

        let (new_status, ejection_reason) = eligibility::evaluate_status(
            &self.config,
            record.status,
            record.total_trades,
            record.wins,
        );
        if new_status != record.status {
            match new_status {
                TickerStatus::Ejected => warn!(
                    ticker,
                    win_rate = format!("{:.0}%", record.win_rate() * 100.0),
                    trades = record.total_trades,
                    "Ticker ejected from trading"
                ),
                _ => info!(ticker, from = %record.status, to = %new_status, "Ticker status changed"),
            }
            record.status = new_status;
            if let Some(reason) = ejection_reason {
                record.ejection_reason = Some(reason);
            }
        }

        tx.execute(
            "INSERT INTO ticker_records
                (ticker, total_trades, wins, losses, total_pnl, sum_wins, sum_losses,
                 last_trade_date, status, ejection_reason, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
             ON CONFLICT(ticker) DO UPDATE SET
                total_trades = excluded.total_trades,
                wins = excluded.wins,
                losses = excluded.losses,
                total_pnl = excluded.total_pnl,
                sum_wins = excluded.sum_wins,
                sum_losses = excluded.sum_losses,
                last_trade_date = excluded.last_trade_date,
                status = excluded.status,
                ejection_reason = excluded.ejection_reason,
                updated_at = excluded.updated_at",
            params![
                record.ticker,
                record.total_trades as i64,
                record.wins as i64,
                record.losses as i64,
                record.total_pnl,
                record.sum_wins,
                record.sum_losses,
                record.last_trade_date.map(|d| d.to_string()),
                record.status.as_str(),
                record.ejection_reason,
                now,
            ],
        )?;
        tx.commit()?;

        Ok(record.status)
    }

    /// May this instrument even be considered for a candidate action?
    ///
    /// Storage failures propagate — the caller must treat `Err` as a
    /// denial rather than defaulting to the new-ticker path.
    pub fn should_trade_ticker(&self, ticker: &str) -> Result<TradeGate, SentinelError> {
        let record = fetch_record(&self.conn, ticker)?;

        let gate = match record {
            None => TradeGate {
                allowed: true,
                reason: "new ticker, no history".to_string(),
                stats: None,
            },
            Some(record) => match record.status {
                TickerStatus::Ejected => TradeGate {
                    allowed: false,
                    reason: record
                        .ejection_reason
                        .clone()
                        .unwrap_or_else(|| "ejected".to_string()),
                    stats: Some(record.stats()),
                },
                TickerStatus::Monitored => TradeGate {
                    allowed: true,
                    reason: format!(
                        "monitored: win rate {:.0}% below {:.0}%, trade with caution",
                        record.win_rate() * 100.0,
                        self.config.monitor_win_rate_threshold * 100.0,
                    ),
                    stats: Some(record.stats()),
                },
                TickerStatus::Active => TradeGate {
                    allowed: true,
                    reason: "active".to_string(),
                    stats: Some(record.stats()),
                },
            },
        };
        Ok(gate)
    }

    /// Replay historical backtest results to bootstrap the ledger before
    /// live use. Zero-P&L trades count as losses.
    pub fn seed_from_backtest(&mut self, results: &[BacktestRecord]) -> Result<(), SentinelError> {
        for rec in results {
            self.record_trade_outcome(
                &rec.ticker,
                rec.pnl > 0.0,
                rec.pnl,
                rec.entry_time.date_naive(),
            )?;
        }
        info!(records = results.len(), "Ledger seeded from backtest results");
        Ok(())
    }

    /// Derived stats for one ticker, if present.
    pub fn ticker_stats(&self, ticker: &str) -> Result<Option<TickerStats>, SentinelError> {
        Ok(fetch_record(&self.conn, ticker)?.map(|r| r.stats()))
    }

    /// Every ledger row, for reporting. Sorted by ticker.
    pub fn all_records(&self) -> Result<Vec<TickerRecord>, SentinelError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM ticker_records ORDER BY ticker")?;
        let rows = stmt.query_map([], row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(SentinelError::from)?);
        }
        Ok(records)
    }

    /// Administrative wipe — the only path that un-ejects a ticker.
    pub fn reset_database(&mut self) -> Result<(), SentinelError> {
        let deleted = self.conn.execute("DELETE FROM ticker_records", [])?;
        warn!(rows = deleted, "Eligibility ledger reset");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn fetch_record(conn: &Connection, ticker: &str) -> Result<Option<TickerRecord>, SentinelError> {
    conn.query_row(
        "SELECT * FROM ticker_records WHERE ticker = ?1",
        params![ticker],
        row_to_record,
    )
    .optional()
    .map_err(SentinelError::from)
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<TickerRecord> {
    let status_raw: String = row.get("status")?;
    let status = TickerStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown ticker status: {status_raw}").into(),
        )
    })?;
    let date_raw: Option<String> = row.get("last_trade_date")?;
    let last_trade_date = match date_raw {
        Some(s) => Some(s.parse::<NaiveDate>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?),
        None => None,
    };

    Ok(TickerRecord {
        ticker: row.get("ticker")?,
        total_trades: row.get::<_, i64>("total_trades")? as u64,
        wins: row.get::<_, i64>("wins")? as u64,
        losses: row.get::<_, i64>("losses")? as u64,
        total_pnl: row.get("total_pnl")?,
        sum_wins: row.get("sum_wins")?,
        sum_losses: row.get("sum_losses")?,
        last_trade_date,
        status,
        ejection_reason: row.get("ejection_reason")?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ledger() -> TickerLedger {
        TickerLedger::open_in_memory(EligibilityConfig::default()).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
    }

    #[test]
    fn test_new_ticker_is_allowed() {
        let l = ledger();
        let gate = l.should_trade_ticker("BTCUSDT").unwrap();
        assert!(gate.allowed);
        assert_eq!(gate.reason, "new ticker, no history");
        assert!(gate.stats.is_none());
    }

    #[test]
    fn test_first_trade_creates_record() {
        let mut l = ledger();
        let status = l.record_trade_outcome("BTCUSDT", true, 50.0, day(1)).unwrap();
        assert_eq!(status, TickerStatus::Active);

        let stats = l.ticker_stats("BTCUSDT").unwrap().unwrap();
        assert_eq!(stats.total_trades, 1);
        assert_eq!(stats.wins, 1);
        assert!((stats.total_pnl - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_win_rate_invariant() {
        let mut l = ledger();
        let outcomes = [true, false, true, true, false, true, false];
        for (i, &won) in outcomes.iter().enumerate() {
            l.record_trade_outcome("ETHUSDT", won, if won { 10.0 } else { -8.0 }, day(1 + i as u32))
                .unwrap();
        }
        let stats = l.ticker_stats("ETHUSDT").unwrap().unwrap();
        assert_eq!(stats.total_trades, stats.wins + stats.losses);
        assert!((stats.win_rate - stats.wins as f64 / stats.total_trades as f64).abs() < 1e-9);
    }

    #[test]
    fn test_four_losses_ejects() {
        let mut l = ledger();
        for i in 0..4 {
            l.record_trade_outcome("XYZ", false, -25.0, day(1 + i)).unwrap();
        }
        let gate = l.should_trade_ticker("XYZ").unwrap();
        assert!(!gate.allowed);
        assert!(gate.reason.contains("0%"));
        assert_eq!(gate.stats.unwrap().status, TickerStatus::Ejected);
    }

    #[test]
    fn test_two_losses_one_win_monitored_but_allowed() {
        // 33% over 3 trades: below the monitor threshold, below the
        // ejection trade minimum.
        let mut l = ledger();
        l.record_trade_outcome("ABC", false, -10.0, day(1)).unwrap();
        l.record_trade_outcome("ABC", false, -10.0, day(2)).unwrap();
        let status = l.record_trade_outcome("ABC", true, 15.0, day(3)).unwrap();
        assert_eq!(status, TickerStatus::Monitored);

        let gate = l.should_trade_ticker("ABC").unwrap();
        assert!(gate.allowed);
        assert!(gate.reason.contains("caution"));
    }

    #[test]
    fn test_monitored_recovers_to_active() {
        let mut l = ledger();
        l.record_trade_outcome("REC", false, -5.0, day(1)).unwrap();
        l.record_trade_outcome("REC", false, -5.0, day(2)).unwrap(); // monitored at 0%
        l.record_trade_outcome("REC", true, 9.0, day(3)).unwrap();
        let status = l.record_trade_outcome("REC", true, 9.0, day(4)).unwrap(); // 50%
        assert_eq!(status, TickerStatus::Active);
    }

    #[test]
    fn test_ejection_is_monotonic() {
        let mut l = ledger();
        for i in 0..4 {
            l.record_trade_outcome("DOOM", false, -10.0, day(1 + i)).unwrap();
        }
        // A long winning streak afterwards changes nothing.
        for i in 0..20 {
            let status = l.record_trade_outcome("DOOM", true, 10.0, day(5 + i)).unwrap();
            assert_eq!(status, TickerStatus::Ejected);
        }
        assert!(!l.should_trade_ticker("DOOM").unwrap().allowed);
    }

    #[test]
    fn test_ejection_reason_persisted() {
        let mut l = ledger();
        l.record_trade_outcome("BAD", false, -1.0, day(1)).unwrap();
        l.record_trade_outcome("BAD", false, -1.0, day(2)).unwrap();
        l.record_trade_outcome("BAD", true, 1.0, day(3)).unwrap();
        l.record_trade_outcome("BAD", false, -1.0, day(4)).unwrap(); // 25% over 4
        let gate = l.should_trade_ticker("BAD").unwrap();
        assert!(!gate.allowed);
        assert!(gate.reason.contains("below 35%"));
        assert!(gate.reason.contains("4 trades"));
    }

    #[test]
    fn test_reset_unejects() {
        let mut l = ledger();
        for i in 0..4 {
            l.record_trade_outcome("XYZ", false, -25.0, day(1 + i)).unwrap();
        }
        assert!(!l.should_trade_ticker("XYZ").unwrap().allowed);

        l.reset_database().unwrap();
        let gate = l.should_trade_ticker("XYZ").unwrap();
        assert!(gate.allowed);
        assert!(gate.stats.is_none());
    }

    #[test]
    fn test_seed_from_backtest() {
        let mut l = ledger();
        let t = |d: u32| Utc.with_ymd_and_hms(2026, 7, d, 10, 0, 0).unwrap();
        let results = vec![
            BacktestRecord { ticker: "GOOD".into(), pnl: 12.0, entry_time: t(1) },
            BacktestRecord { ticker: "GOOD".into(), pnl: 8.0, entry_time: t(2) },
            BacktestRecord { ticker: "BAD".into(), pnl: -5.0, entry_time: t(1) },
            BacktestRecord { ticker: "BAD".into(), pnl: -6.0, entry_time: t(2) },
            BacktestRecord { ticker: "BAD".into(), pnl: -7.0, entry_time: t(3) },
            BacktestRecord { ticker: "BAD".into(), pnl: -8.0, entry_time: t(4) },
        ];
        l.seed_from_backtest(&results).unwrap();

        assert!(l.should_trade_ticker("GOOD").unwrap().allowed);
        assert!(!l.should_trade_ticker("BAD").unwrap().allowed);
    }

    #[test]
    fn test_derived_stats() {
        let mut l = ledger();
        l.record_trade_outcome("PF", true, 30.0, day(1)).unwrap();
        l.record_trade_outcome("PF", true, 10.0, day(2)).unwrap();
        l.record_trade_outcome("PF", false, -20.0, day(3)).unwrap();
        let stats = l.ticker_stats("PF").unwrap().unwrap();
        assert!((stats.avg_win - 20.0).abs() < 1e-9);
        assert!((stats.avg_loss - 20.0).abs() < 1e-9);
        assert!((stats.profit_factor - 2.0).abs() < 1e-9);
        assert!((stats.total_pnl - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_records_sorted() {
        let mut l = ledger();
        l.record_trade_outcome("ZZZ", true, 1.0, day(1)).unwrap();
        l.record_trade_outcome("AAA", true, 1.0, day(1)).unwrap();
        let records = l.all_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ticker, "AAA");
        assert_eq!(records[1].ticker, "ZZZ");
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        {
            let mut l = TickerLedger::open(&path, EligibilityConfig::default()).unwrap();
            for i in 0..4 {
                l.record_trade_outcome("XYZ", false, -25.0, day(1 + i)).unwrap();
            }
        }
        // Ejection survives the session boundary.
        let l = TickerLedger::open(&path, EligibilityConfig::default()).unwrap();
        assert!(!l.should_trade_ticker("XYZ").unwrap().allowed);
    }

    #[test]
    fn test_corrupt_status_surfaces_error() {
        let mut l = ledger();
        l.record_trade_outcome("OK", true, 1.0, day(1)).unwrap();
        l.conn
            .execute("UPDATE ticker_records SET status = 'banned' WHERE ticker = 'OK'", [])
            .unwrap();
        // Deny-by-default: the caller sees an error, not "new ticker".
        assert!(l.should_trade_ticker("OK").is_err());
    }
}
