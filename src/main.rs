//! SENTINEL — Trade Admission Control & Guardrail Layer
//!
//! Operational entry point for the eligibility ledger. The guardrail
//! coordinator itself is a library embedded in the trading orchestrator;
//! this binary covers the ledger's administrative surface: seeding from
//! backtest results, checking a ticker, printing the full report, and
//! the reset that un-ejects everything.

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sentinel::config::AppConfig;
use sentinel::ledger::TickerLedger;
use sentinel::types::BacktestRecord;

const BANNER: &str = r#"
 ____  _____ _   _ _____ ___ _   _ _____ _
/ ___|| ____| \ | |_   _|_ _| \ | | ____| |
\___ \|  _| |  \| | | |  | ||  \| |  _| | |
 ___) | |___| |\  | | |  | || |\  | |___| |___
|____/|_____|_| \_| |_| |___|_| \_|_____|_____|

  Trade Admission Control & Guardrail Layer
  v0.1.0
"#;

const USAGE: &str = "usage: sentinel <seed <results.json> | check <TICKER> | report | reset>";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("{BANNER}");

    let cfg = AppConfig::load_or_default()?;
    let mut ledger = TickerLedger::open(&cfg.ledger.db_path, cfg.ledger.to_eligibility())
        .with_context(|| format!("Failed to open ledger at {}", cfg.ledger.db_path))?;
    info!(db = %cfg.ledger.db_path, "Ledger opened");

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("seed") => {
            let path = args.get(1).map(String::as_str).context(USAGE)?;
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read results file: {path}"))?;
            let results: Vec<BacktestRecord> = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse results file: {path}"))?;
            ledger.seed_from_backtest(&results)?;
            println!("Seeded {} historical trades from {path}", results.len());
        }
        Some("check") => {
            let ticker = args.get(1).map(String::as_str).context(USAGE)?;
            // Deny-by-default: a ledger failure prints as a denial, it
            // never falls through to the new-ticker path.
            match ledger.should_trade_ticker(ticker) {
                Ok(gate) => {
                    println!("{ticker}: {gate}");
                    if let Some(stats) = gate.stats {
                        println!("  {stats}");
                    }
                }
                Err(e) => println!("{ticker}: DENY: {e}"),
            }
        }
        Some("report") => {
            let records = ledger.all_records()?;
            if records.is_empty() {
                println!("Ledger is empty.");
            }
            for record in records {
                println!(
                    "{:<12} {:<9} {:>3} trades {:>3}W/{:<3}L win_rate={:>3.0}% pnl={:>10.2}{}",
                    record.ticker,
                    record.status.to_string(),
                    record.total_trades,
                    record.wins,
                    record.losses,
                    record.win_rate() * 100.0,
                    record.total_pnl,
                    record
                        .ejection_reason
                        .as_deref()
                        .map(|r| format!("  ({r})"))
                        .unwrap_or_default(),
                );
            }
        }
        Some("reset") => {
            ledger.reset_database()?;
            println!("Ledger reset — all tickers eligible again.");
        }
        _ => bail!(USAGE),
    }

    Ok(())
}
