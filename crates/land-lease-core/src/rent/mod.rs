//! Rent configuration: rent definitions and their contract rents,
//! fixed-initial-year rents, adjustments, due-date schedules and the
//! historical records committed calculations leave behind.

mod due_dates;
mod history;
mod model;

pub use due_dates::{fixed_due_dates, SUPPORTED_DUE_DATES_PER_YEAR};
pub use history::{IndexAdjustedRent, PayableRent};
pub use model::{
    AdjustmentAmountType, AdjustmentType, ContractRent, DueDatesType, FixedInitialYearRent,
    IndexParameters, PeriodType, Rent, RentAdjustment, RentType, SeasonalWindow, Subvention,
    SubventionKind,
};

use chrono::NaiveDate;

use crate::error::CalculatorError;

impl Rent {
    /// Check the parts of the configuration the calculator relies on.
    pub fn validate_configuration(&self) -> Result<(), CalculatorError> {
        if let Some(window) = &self.seasonal {
            if window.start > window.end {
                return Err(CalculatorError::InvalidRentConfiguration {
                    rent: self.id,
                    reason: format!("seasonal window {} - {} is empty", window.start, window.end),
                });
            }
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(CalculatorError::InvalidRentConfiguration {
                    rent: self.id,
                    reason: format!("start date {start} is after end date {end}"),
                });
            }
        }

        let params = &self.index_parameters;
        match (params.equalization_start, params.equalization_end) {
            (Some(start), Some(end)) if start > end => {
                return Err(CalculatorError::InvalidRentConfiguration {
                    rent: self.id,
                    reason: "equalization period is empty".into(),
                })
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(CalculatorError::InvalidRentConfiguration {
                    rent: self.id,
                    reason: "equalization needs both start and end".into(),
                })
            }
            _ => {}
        }

        if let Some(adj) = self.rent_adjustments.iter().find(|adj| {
            adj.amount_type != AdjustmentAmountType::AmountTotal && adj.amount_left.is_some()
        }) {
            return Err(CalculatorError::InvalidRentConfiguration {
                rent: self.id,
                reason: format!("adjustment {} carries a balance but is not a total", adj.id),
            });
        }

        self.check_contract_rent_overlap()
    }

    fn check_contract_rent_overlap(&self) -> Result<(), CalculatorError> {
        for (i, a) in self.contract_rents.iter().enumerate() {
            for b in &self.contract_rents[i + 1..] {
                if a.intended_use != b.intended_use {
                    continue;
                }
                let start = a
                    .start_date
                    .unwrap_or(NaiveDate::MIN)
                    .max(b.start_date.unwrap_or(NaiveDate::MIN));
                let end = a
                    .end_date
                    .unwrap_or(NaiveDate::MAX)
                    .min(b.end_date.unwrap_or(NaiveDate::MAX));
                if start <= end {
                    return Err(CalculatorError::OverlappingContractRents {
                        rent: self.id,
                        intended_use: a.intended_use,
                        date: start,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContractRentId, IntendedUseId, RentId};
    use rust_decimal_macros::dec;

    fn contract(id: u64, use_id: u64, start: Option<NaiveDate>, end: Option<NaiveDate>) -> ContractRent {
        ContractRent {
            id: ContractRentId(id),
            amount: dec!(100),
            period: PeriodType::PerYear,
            base_amount: dec!(100),
            base_amount_period: PeriodType::PerYear,
            intended_use: IntendedUseId(use_id),
            start_date: start,
            end_date: end,
        }
    }

    #[test]
    fn test_overlapping_same_use_rejected() {
        let mut rent = Rent::new(RentId(1), RentType::Fixed);
        rent.contract_rents = vec![
            contract(1, 1, None, NaiveDate::from_ymd_opt(2020, 6, 30)),
            contract(2, 1, NaiveDate::from_ymd_opt(2020, 6, 1), None),
        ];
        assert_eq!(
            rent.validate_configuration(),
            Err(CalculatorError::OverlappingContractRents {
                rent: RentId(1),
                intended_use: IntendedUseId(1),
                date: NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
            })
        );
    }

    #[test]
    fn test_overlapping_distinct_uses_allowed() {
        let mut rent = Rent::new(RentId(1), RentType::Fixed);
        rent.contract_rents = vec![contract(1, 1, None, None), contract(2, 2, None, None)];
        assert!(rent.validate_configuration().is_ok());
    }

    #[test]
    fn test_adjacent_same_use_allowed() {
        let mut rent = Rent::new(RentId(1), RentType::Fixed);
        rent.contract_rents = vec![
            contract(1, 1, None, NaiveDate::from_ymd_opt(2020, 5, 31)),
            contract(2, 1, NaiveDate::from_ymd_opt(2020, 6, 1), None),
        ];
        assert!(rent.validate_configuration().is_ok());
    }
}
