//! Fixed-duration timeframes aligned to their own epoch.
//!
//! Bucket `k` of a timeframe with duration Δ covers `[k·Δ, (k+1)·Δ)` measured
//! from the timeframe's anchor. Intraday and daily buckets anchor at the Unix
//! epoch; weekly buckets anchor at Monday 1970-01-05 00:00 UTC.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const WEEK_ANCHOR_SECS: i64 = 4 * 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
        Timeframe::W1,
    ];

    pub fn duration_secs(self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::M30 => 1_800,
            Timeframe::H1 => 3_600,
            Timeframe::H4 => 14_400,
            Timeframe::D1 => 86_400,
            Timeframe::W1 => 604_800,
        }
    }

    pub fn from_minutes(minutes: i64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tf| tf.duration_secs() == minutes * 60)
    }

    pub fn duration(self) -> Duration {
        Duration::seconds(self.duration_secs())
    }

    fn anchor_secs(self) -> i64 {
        match self {
            Timeframe::W1 => WEEK_ANCHOR_SECS,
            _ => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }

    /// Index of the bucket containing `ts`.
    pub fn bucket_index(self, ts: DateTime<Utc>) -> i64 {
        (ts.timestamp() - self.anchor_secs()).div_euclid(self.duration_secs())
    }

    /// Inclusive start of the bucket containing `ts`.
    pub fn bucket_start(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let secs = self.bucket_index(ts) * self.duration_secs() + self.anchor_secs();
        // Bucket starts are whole seconds inside chrono's range for any valid `ts`.
        Utc.timestamp_opt(secs, 0).single().unwrap_or(ts)
    }

    /// Close instant (right edge) of a bar opened at `open_time`.
    pub fn close_time(self, open_time: DateTime<Utc>) -> DateTime<Utc> {
        open_time + self.duration()
    }

    /// True if buckets of `self` are unions of whole `base` buckets.
    pub fn is_derivable_from(self, base: Timeframe) -> bool {
        let (d, b) = (self.duration_secs(), base.duration_secs());
        d >= b && d % b == 0 && (self.anchor_secs() - base.anchor_secs()) % b == 0
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1m" | "1min" => Ok(Timeframe::M1),
            "5m" | "5min" => Ok(Timeframe::M5),
            "15m" | "15min" => Ok(Timeframe::M15),
            "30m" | "30min" => Ok(Timeframe::M30),
            "1h" | "60m" => Ok(Timeframe::H1),
            "4h" | "240m" => Ok(Timeframe::H4),
            "1d" | "d" | "daily" => Ok(Timeframe::D1),
            "1w" | "w" | "weekly" => Ok(Timeframe::W1),
            _ => Err(CoreError::UnknownTimeframe(s.to_string())),
        }
    }
}
