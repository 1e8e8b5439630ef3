//! Price-level index registry.
//!
//! Indexes are published yearly (annual average) or monthly. The registry
//! keeps an immutable, sorted snapshot that calculations borrow; refreshing
//! swaps the snapshot under a writer lock so in-flight calculations keep a
//! consistent view.

use chrono::NaiveDate;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::calendar::RentCycle;
use crate::error::{CalculatorError, LeaseError};
use crate::LeaseResult;

/// A published index number. `month == None` marks an annual index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    pub number: Decimal,
}

impl Index {
    pub fn annual(year: i32, number: Decimal) -> Self {
        Self {
            year,
            month: None,
            number,
        }
    }

    pub fn monthly(year: i32, month: u32, number: Decimal) -> Self {
        Self {
            year,
            month: Some(month),
            number,
        }
    }

    fn sort_key(&self) -> (i32, u32) {
        (self.year, self.month.unwrap_or(0))
    }

    /// First day the index applies; annual indexes are effective Jan-1.
    pub fn effective_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month.unwrap_or(1), 1)
    }
}

/// Immutable, ordered set of indexes.
#[derive(Debug, Clone, Default)]
pub struct IndexTable {
    indexes: Vec<Index>,
}

impl IndexTable {
    pub fn new(mut indexes: Vec<Index>) -> LeaseResult<Self> {
        for index in &indexes {
            if index.number <= Decimal::ZERO {
                return Err(LeaseError::InvalidInput {
                    field: "index.number".into(),
                    reason: format!("index {}/{:?} must be positive", index.year, index.month),
                });
            }
            if matches!(index.month, Some(m) if !(1..=12).contains(&m)) {
                return Err(LeaseError::InvalidInput {
                    field: "index.month".into(),
                    reason: format!("month {:?} out of range", index.month),
                });
            }
        }
        indexes.sort_by_key(Index::sort_key);
        indexes.dedup_by_key(|index| index.sort_key());
        Ok(Self { indexes })
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub fn get(&self, year: i32, month: Option<u32>) -> Option<&Index> {
        self.indexes
            .iter()
            .find(|index| index.year == year && index.month == month)
    }

    /// Most recent index effective on or before `date`.
    pub fn latest_for_date(&self, date: NaiveDate) -> Option<&Index> {
        self.indexes
            .iter()
            .rev()
            .find(|index| index.effective_date().is_some_and(|eff| eff <= date))
    }

    /// Latest index whose year is at most `year`.
    pub fn latest_for_year(&self, year: i32) -> Option<&Index> {
        self.indexes.iter().rev().find(|index| index.year <= year)
    }

    /// Index used to adjust rents for the adjustment year `year`.
    pub fn for_adjustment_year(&self, year: i32) -> Result<&Index, CalculatorError> {
        self.latest_for_year(year)
            .filter(|index| index.year == year)
            .ok_or(CalculatorError::MissingIndex { year })
    }

    /// Whether `index` is the one a rent on `cycle` must use on `date`.
    pub fn is_correct_index_for_date(
        &self,
        index: &Index,
        date: NaiveDate,
        cycle: RentCycle,
    ) -> bool {
        let year = cycle.cycle_year(date);
        index.year == year && self.latest_for_year(year) == Some(index)
    }
}

/// Process-wide cache of the index table.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    table: RwLock<Arc<IndexTable>>,
}

impl IndexRegistry {
    pub fn new(table: IndexTable) -> Self {
        Self {
            table: RwLock::new(Arc::new(table)),
        }
    }

    pub fn snapshot(&self) -> Arc<IndexTable> {
        Arc::clone(&self.table.read())
    }

    /// Replace the cached table, e.g. after an administrator publishes a new
    /// index number.
    pub fn refresh(&self, table: IndexTable) {
        *self.table.write() = Arc::new(table);
    }

    pub fn insert(&self, index: Index) -> LeaseResult<()> {
        let mut guard = self.table.write();
        let mut indexes = guard.indexes.clone();
        indexes.retain(|existing| existing.sort_key() != index.sort_key());
        indexes.push(index);
        *guard = Arc::new(IndexTable::new(indexes)?);
        Ok(())
    }
}
