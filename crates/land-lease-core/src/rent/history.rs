use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{IntendedUseId, Money, Percent};

/// Index-adjusted yearly amount computed by a committed calculation.
/// Kept for audit; never read back by the calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexAdjustedRent {
    pub intended_use: IntendedUseId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Yearly amount after applying the index factor
    pub amount: Money,
    pub factor: Decimal,
    pub index_year: i32,
    pub index_number: Decimal,
}

/// Amount payable for one rent-year piece, as computed by a committed
/// calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayableRent {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub amount: Money,
    /// `amount` scaled to a full year
    pub calendar_year_rent: Money,
    /// Change against the previous record's yearly rent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difference_percent: Option<Percent>,
}
