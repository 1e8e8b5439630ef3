use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::{DateRange, DayMonth, RentCycle};
use crate::types::{
    ContractRentId, FixedInitialYearRentId, IntendedUseId, Money, Percent, ReceivableTypeId,
    RentAdjustmentId, RentId,
};

use super::history::{IndexAdjustedRent, PayableRent};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Kind of rent; the calculator dispatches on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentType {
    Fixed,
    Index,
    Index2022,
    Manual,
    Free,
    OneTime,
}

impl RentType {
    pub const fn is_index_adjusted(self) -> bool {
        matches!(self, RentType::Index | RentType::Index2022)
    }

    /// Rent types that may carry an override receivable type.
    pub const fn accepts_override_receivable_type(self) -> bool {
        matches!(
            self,
            RentType::Fixed | RentType::Index | RentType::Index2022 | RentType::Manual
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueDatesType {
    #[default]
    Fixed,
    Custom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    #[default]
    PerYear,
    PerMonth,
}

impl PeriodType {
    pub fn annualize(self, amount: Money) -> Money {
        match self {
            PeriodType::PerYear => amount,
            PeriodType::PerMonth => amount * Decimal::from(12),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    Discount,
    Increase,
}

impl AdjustmentType {
    pub fn sign(self) -> Decimal {
        match self {
            AdjustmentType::Discount => Decimal::NEGATIVE_ONE,
            AdjustmentType::Increase => Decimal::ONE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentAmountType {
    PercentPerYear,
    AmountPerYear,
    AmountTotal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubventionKind {
    FormOfManagement,
    ReLease,
}

// ---------------------------------------------------------------------------
// Rent and children
// ---------------------------------------------------------------------------

/// Window inside each calendar year when a seasonal rent is billable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalWindow {
    pub start: DayMonth,
    pub end: DayMonth,
}

impl SeasonalWindow {
    /// The window as absolute dates in `year`.
    pub fn in_year(&self, year: i32) -> Option<DateRange> {
        let start = self.start.to_date(year)?;
        let end = self.end.to_date(year)?;
        DateRange::new(start, end).ok()
    }
}

/// Parameters of legacy index arithmetic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_value: Option<Decimal>,
    /// Base index number of a legacy index rent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_value: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_value_start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equalization_start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equalization_end: Option<NaiveDate>,
}

/// A computable obligation under a lease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rent {
    pub id: RentId,
    pub rent_type: RentType,
    #[serde(default)]
    pub cycle: RentCycle,
    #[serde(default)]
    pub due_dates_type: DueDatesType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_dates_per_year: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_due_dates: Vec<DayMonth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seasonal: Option<SeasonalWindow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub index_parameters: IndexParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_receivable_type: Option<ReceivableTypeId>,
    #[serde(default)]
    pub contract_rents: Vec<ContractRent>,
    #[serde(default)]
    pub fixed_initial_year_rents: Vec<FixedInitialYearRent>,
    #[serde(default)]
    pub rent_adjustments: Vec<RentAdjustment>,
    #[serde(default)]
    pub index_adjusted_rents: Vec<IndexAdjustedRent>,
    #[serde(default)]
    pub payable_rents: Vec<PayableRent>,
}

impl Rent {
    /// A rent of `rent_type` with no children, billed once a year on the
    /// calendar cycle.
    pub fn new(id: RentId, rent_type: RentType) -> Self {
        Self {
            id,
            rent_type,
            cycle: RentCycle::JanuaryToDecember,
            due_dates_type: DueDatesType::Fixed,
            due_dates_per_year: Some(1),
            custom_due_dates: Vec::new(),
            seasonal: None,
            start_date: None,
            end_date: None,
            index_parameters: IndexParameters::default(),
            override_receivable_type: None,
            contract_rents: Vec::new(),
            fixed_initial_year_rents: Vec::new(),
            rent_adjustments: Vec::new(),
            index_adjusted_rents: Vec::new(),
            payable_rents: Vec::new(),
        }
    }

    pub fn is_active_on(&self, range: &DateRange) -> bool {
        range.clamp(self.start_date, self.end_date).is_some()
    }

    pub fn is_seasonal(&self) -> bool {
        self.seasonal.is_some()
    }

    pub fn rent_adjustment_mut(&mut self, id: RentAdjustmentId) -> Option<&mut RentAdjustment> {
        self.rent_adjustments.iter_mut().find(|adj| adj.id == id)
    }
}

/// Quoted rent for one intended use at a reference price level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRent {
    pub id: ContractRentId,
    pub amount: Money,
    #[serde(default)]
    pub period: PeriodType,
    #[serde(default)]
    pub base_amount: Money,
    #[serde(default)]
    pub base_amount_period: PeriodType,
    pub intended_use: IntendedUseId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl ContractRent {
    pub fn annual_amount(&self) -> Money {
        self.period.annualize(self.amount)
    }

    pub fn annual_base_amount(&self) -> Money {
        self.base_amount_period.annualize(self.base_amount)
    }

    pub fn active_range(&self, within: &DateRange) -> Option<DateRange> {
        within.clamp(self.start_date, self.end_date)
    }
}

/// Fixed yearly amount that replaces the calculated rent of its intended use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedInitialYearRent {
    pub id: FixedInitialYearRentId,
    pub intended_use: IntendedUseId,
    pub amount: Money,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl FixedInitialYearRent {
    pub fn active_range(&self, within: &DateRange) -> Option<DateRange> {
        within.clamp(Some(self.start_date), Some(self.end_date))
    }
}

/// Public subsidy details attached to a discount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subvention {
    pub kind: SubventionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_percent: Option<Percent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graduated_percent: Option<Percent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Discount or increase applied to one intended use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentAdjustment {
    pub id: RentAdjustmentId,
    pub adjustment_type: AdjustmentType,
    pub intended_use: IntendedUseId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub amount_type: AdjustmentAmountType,
    pub full_amount: Decimal,
    /// Remaining balance of an AMOUNT_TOTAL adjustment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_left: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subvention: Option<Subvention>,
}

impl RentAdjustment {
    pub fn active_range(&self, within: &DateRange) -> Option<DateRange> {
        within.clamp(self.start_date, self.end_date)
    }

    /// Balance still available to an AMOUNT_TOTAL adjustment. A missing
    /// balance means nothing has been consumed yet.
    pub fn remaining_total(&self) -> Money {
        self.amount_left.unwrap_or(self.full_amount)
    }
}
