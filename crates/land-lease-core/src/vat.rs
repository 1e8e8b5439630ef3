//! Time-keyed VAT rates.

use chrono::NaiveDate;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::LeaseError;
use crate::types::Percent;
use crate::LeaseResult;

/// VAT percentage effective from `start_date` until the next rate starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatRate {
    pub start_date: NaiveDate,
    pub rate: Percent,
}

#[derive(Debug, Clone, Default)]
pub struct VatTable {
    rates: Vec<VatRate>,
}

impl VatTable {
    pub fn new(mut rates: Vec<VatRate>) -> LeaseResult<Self> {
        if let Some(bad) = rates
            .iter()
            .find(|vat| vat.rate < Decimal::ZERO || vat.rate > Decimal::ONE_HUNDRED)
        {
            return Err(LeaseError::InvalidInput {
                field: "vat.rate".into(),
                reason: format!("{} is not a percentage", bad.rate),
            });
        }
        rates.sort_by_key(|vat| vat.start_date);
        if rates.windows(2).any(|pair| pair[0].start_date == pair[1].start_date) {
            return Err(LeaseError::InvalidInput {
                field: "vat.start_date".into(),
                reason: "two rates start on the same date".into(),
            });
        }
        Ok(Self { rates })
    }

    /// Rate in force on `date`.
    pub fn for_date(&self, date: NaiveDate) -> Option<&VatRate> {
        self.rates.iter().rev().find(|vat| vat.start_date <= date)
    }

    pub fn rates(&self) -> &[VatRate] {
        &self.rates
    }
}

/// Process-wide cache of the VAT table.
#[derive(Debug, Default)]
pub struct VatRegistry {
    table: RwLock<Arc<VatTable>>,
}

impl VatRegistry {
    pub fn new(table: VatTable) -> Self {
        Self {
            table: RwLock::new(Arc::new(table)),
        }
    }

    pub fn snapshot(&self) -> Arc<VatTable> {
        Arc::clone(&self.table.read())
    }

    pub fn refresh(&self, table: VatTable) {
        *self.table.write() = Arc::new(table);
    }

    pub fn for_date(&self, date: NaiveDate) -> Option<VatRate> {
        self.table.read().for_date(date).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_rate_for_date() {
        let registry = VatRegistry::new(
            VatTable::new(vec![
                VatRate {
                    start_date: d(2024, 9, 1),
                    rate: dec!(25.5),
                },
                VatRate {
                    start_date: d(2013, 1, 1),
                    rate: dec!(24),
                },
            ])
            .unwrap(),
        );
        assert!(registry.for_date(d(2012, 12, 31)).is_none());
        assert_eq!(registry.for_date(d(2024, 8, 31)).unwrap().rate, dec!(24));
        assert_eq!(registry.for_date(d(2024, 9, 1)).unwrap().rate, dec!(25.5));
    }

    #[test]
    fn test_refresh_replaces_snapshot() {
        let registry = VatRegistry::default();
        let before = registry.snapshot();
        registry.refresh(
            VatTable::new(vec![VatRate {
                start_date: d(2000, 1, 1),
                rate: dec!(22),
            }])
            .unwrap(),
        );
        assert!(before.for_date(d(2020, 1, 1)).is_none());
        assert_eq!(registry.for_date(d(2020, 1, 1)).unwrap().rate, dec!(22));
    }

    #[test]
    fn test_duplicate_start_rejected() {
        let rate = VatRate {
            start_date: d(2000, 1, 1),
            rate: dec!(22),
        };
        assert!(VatTable::new(vec![rate.clone(), rate]).is_err());
    }
}
