use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The pivot currency. Every stored rate is USD-to-symbol; the USD rate
/// itself is defined as `1.0` and never fetched or persisted.
pub const USD: &str = "USD";

/// A requested conversion: the rate from `base` to `quote` on `date`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bid {
    pub date: NaiveDate,
    pub base: String,
    pub quote: String,
}

impl Bid {
    pub fn new(date: NaiveDate, base: impl AsRef<str>, quote: impl AsRef<str>) -> Self {
        Self {
            date,
            base: base.as_ref().trim().to_uppercase(),
            quote: quote.as_ref().trim().to_uppercase(),
        }
    }

    /// Whether the bid trivially resolves to `1.0` without any lookup.
    pub fn is_identity(&self) -> bool {
        self.base == self.quote
    }
}

/// A USD-pivoted lookup key: the USD-to-`symbol` rate on `date`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsdBid {
    pub date: NaiveDate,
    pub symbol: String,
}

impl UsdBid {
    pub fn new(date: NaiveDate, symbol: impl AsRef<str>) -> Self {
        Self {
            date,
            symbol: symbol.as_ref().trim().to_uppercase(),
        }
    }
}

/// One persisted row of the rate store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub date: NaiveDate,
    pub symbol: String,
    pub rate: f64,
}

impl RateRecord {
    pub fn new(date: NaiveDate, symbol: impl Into<String>, rate: f64) -> Self {
        Self {
            date,
            symbol: symbol.into(),
            rate,
        }
    }
}

/// Outcome of one unit of backfill work (a downloaded day or a merged
/// source store). Failure reports are collected and logged at the end of a
/// run instead of aborting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub error: bool,
    pub description: String,
}

impl TaskReport {
    pub fn success(description: impl Into<String>) -> Self {
        Self {
            error: false,
            description: description.into(),
        }
    }

    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            error: true,
            description: description.into(),
        }
    }
}
