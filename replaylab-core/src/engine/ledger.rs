//! Append-only trade ledger.

use serde::{Deserialize, Serialize};

use crate::domain::TradeRecord;

/// Records are only ever appended; there is no API to edit or remove one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeLedger {
    records: Vec<TradeRecord>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: TradeRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<TradeRecord> {
        self.records
    }
}
