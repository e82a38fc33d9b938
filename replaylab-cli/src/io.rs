//! CSV bar loading and CSV export of replay output.
//!
//! Input columns: `timestamp, open, high, low, close, volume`. The timestamp
//! is the bar's open time as RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC), a plain
//! date, or Unix epoch seconds or milliseconds.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use replaylab_core::domain::{Bar, TradeRecord};
use replaylab_core::engine::EquityPoint;

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Read bars from a CSV file. Ordering and sanity are checked later by
/// `BaseSeries::new`.
pub fn load_bars_csv(path: &Path) -> Result<Vec<Bar>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut bars = Vec::new();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        // Header is line 1.
        let line = i + 2;
        let row = row.with_context(|| format!("{}:{line}: malformed row", path.display()))?;
        let open_time = parse_timestamp(&row.timestamp)
            .with_context(|| format!("{}:{line}: bad timestamp", path.display()))?;
        bars.push(Bar {
            open_time,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    if bars.is_empty() {
        bail!("{} contains no bars", path.display());
    }
    Ok(bars)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(n) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&n));
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(n) = d.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&n));
        }
    }
    if let Ok(epoch) = s.parse::<i64>() {
        // Anything past year 5138 in seconds is taken as milliseconds.
        let parsed = if epoch.abs() >= 100_000_000_000 {
            Utc.timestamp_millis_opt(epoch).single()
        } else {
            Utc.timestamp_opt(epoch, 0).single()
        };
        return parsed.ok_or_else(|| anyhow!("epoch {epoch} out of range"));
    }
    bail!("unrecognized timestamp '{s}'")
}

/// Trade ledger as CSV, one row per exit slice.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "direction",
        "entry_index",
        "entry_time",
        "entry_price",
        "exit_index",
        "exit_time",
        "exit_price",
        "reason",
        "fraction",
        "quantity",
        "r_multiple",
        "gross_pnl",
        "commission",
        "pnl",
    ])?;
    for t in trades {
        wtr.write_record([
            &t.symbol,
            &format!("{:?}", t.direction).to_lowercase(),
            &t.entry_index.to_string(),
            &t.entry_time.to_rfc3339(),
            &format!("{:.6}", t.entry_price),
            &t.exit_index.to_string(),
            &t.exit_time.to_rfc3339(),
            &format!("{:.6}", t.exit_price),
            t.reason.as_str(),
            &format!("{:.4}", t.fraction),
            &format!("{:.6}", t.quantity),
            &format!("{:.4}", t.r_multiple),
            &format!("{:.2}", t.gross_pnl),
            &format!("{:.2}", t.commission),
            &format!("{:.2}", t.pnl),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_equity_csv(curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["time", "equity"])?;
    for p in curve {
        wtr.write_record([&p.time.to_rfc3339(), &format!("{:.2}", p.equity)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}
