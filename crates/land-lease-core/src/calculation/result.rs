use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::calendar::DateRange;
use crate::rent::{IndexAdjustedRent, PayableRent};
use crate::types::{
    round_money, ContractRentId, FixedInitialYearRentId, IntendedUseId, LeaseId, Money,
    RentAdjustmentId, RentId,
};

/// Options of a single calculation run.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalculationOptions {
    /// When set, AMOUNT_TOTAL balances and history records stay untouched
    pub dry_run: bool,
    /// Abort with `DeadlineExceeded` once this instant has passed
    pub deadline: Option<Instant>,
}

impl CalculationOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            deadline: None,
        }
    }

    pub fn committing() -> Self {
        Self {
            dry_run: false,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub(crate) fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Source entity an amount was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalculationItem {
    ContractRent {
        id: ContractRentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index_number: Option<Decimal>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        factor: Option<Decimal>,
    },
    FixedInitialYearRent {
        id: FixedInitialYearRentId,
    },
    RentAdjustment {
        id: RentAdjustmentId,
    },
}

/// One dated amount of a calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationAmount {
    pub item: CalculationItem,
    pub intended_use: IntendedUseId,
    /// Signed amount at intermediate precision
    pub amount: Decimal,
    pub date_range: DateRange,
}

/// Balance an AMOUNT_TOTAL adjustment would lose if the calculation is
/// committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentConsumption {
    pub adjustment: RentAdjustmentId,
    pub consumed: Money,
    pub amount_left: Money,
}

/// Output of the rent calculator for one rent over one range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub rent: RentId,
    pub date_range: DateRange,
    pub dry_run: bool,
    pub amounts: Vec<CalculationAmount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adjustment_consumption: Vec<AdjustmentConsumption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub index_adjusted_rents: Vec<IndexAdjustedRent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payable_rents: Vec<PayableRent>,
}

impl CalculationResult {
    pub fn empty(rent: RentId, date_range: DateRange, dry_run: bool) -> Self {
        Self {
            rent,
            date_range,
            dry_run,
            amounts: Vec::new(),
            adjustment_consumption: Vec::new(),
            index_adjusted_rents: Vec::new(),
            payable_rents: Vec::new(),
        }
    }

    /// Gross amount per intended use, rounded half-up to cents.
    pub fn total_by_intended_use(&self) -> BTreeMap<IntendedUseId, Money> {
        let mut totals: BTreeMap<IntendedUseId, Decimal> = BTreeMap::new();
        for amount in &self.amounts {
            *totals.entry(amount.intended_use).or_default() += amount.amount;
        }
        totals
            .into_iter()
            .map(|(use_id, total)| (use_id, round_money(total)))
            .collect()
    }

    /// Sum of the rounded per-intended-use totals.
    pub fn total(&self) -> Money {
        self.total_by_intended_use().values().copied().sum()
    }

    pub fn is_zero(&self) -> bool {
        self.total().is_zero()
    }

    pub fn amounts_for(&self, intended_use: IntendedUseId) -> impl Iterator<Item = &CalculationAmount> {
        self.amounts
            .iter()
            .filter(move |amount| amount.intended_use == intended_use)
    }
}

/// Calculation of every rent of a lease over one range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseCalculation {
    pub lease: LeaseId,
    pub date_range: DateRange,
    pub rents: Vec<CalculationResult>,
}

impl LeaseCalculation {
    pub fn total(&self) -> Money {
        self.rents.iter().map(CalculationResult::total).sum()
    }

    pub fn total_by_intended_use(&self) -> BTreeMap<IntendedUseId, Money> {
        let mut totals: BTreeMap<IntendedUseId, Money> = BTreeMap::new();
        for rent in &self.rents {
            for (use_id, amount) in rent.total_by_intended_use() {
                *totals.entry(use_id).or_default() += amount;
            }
        }
        totals
    }
}
