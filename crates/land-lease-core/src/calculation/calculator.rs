//! The rent calculator: a pure function from a rent configuration and a
//! closed date range to dated amounts.
//!
//! The requested range is clamped to the rent's validity and seasonal
//! window, split at rent-year boundaries, and every rent-year piece is cut
//! into segments in which the set of active contract rents, fixed initial
//! year rents and adjustments is constant. Within one segment the base
//! amount per intended use comes from fixed initial year rents where they
//! exist and from (index adjusted) contract rents elsewhere; adjustments are
//! then applied one after another.

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::calendar::{
    fraction_of_year, month_fraction_of_year, split_ranges_by_cycle, DateRange,
};
use crate::error::CalculatorError;
use crate::index::{Index, IndexTable};
use crate::rent::{
    AdjustmentAmountType, IndexAdjustedRent, PayableRent, Rent, RentAdjustment, RentType,
};
use crate::types::{round_intermediate, round_money, IntendedUseId, Money, RentAdjustmentId};

use super::result::{
    AdjustmentConsumption, CalculationAmount, CalculationItem, CalculationOptions,
    CalculationResult,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Base index number of INDEX2022 rents.
pub const INDEX_2022_BASE_NUMBER: Decimal = dec!(100);

/// Base index number of legacy INDEX rents without a configured `y_value`.
pub const DEFAULT_INDEX_BASE_NUMBER: Decimal = dec!(100);

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Calculate the gross amounts of `rent` over `range`.
pub fn calculate_rent(
    rent: &Rent,
    range: &DateRange,
    indexes: &IndexTable,
    options: &CalculationOptions,
) -> Result<CalculationResult, CalculatorError> {
    if options.deadline_passed() {
        return Err(CalculatorError::DeadlineExceeded);
    }
    rent.validate_configuration()?;

    let mut result = CalculationResult::empty(rent.id, *range, options.dry_run);

    let Some(clamped) = range.clamp(rent.start_date, rent.end_date) else {
        return Ok(result);
    };

    match rent.rent_type {
        RentType::Free | RentType::Manual => return Ok(result),
        RentType::OneTime => {
            result.amounts = one_time_amounts(rent, &clamped);
            return Ok(result);
        }
        RentType::Fixed | RentType::Index | RentType::Index2022 => {}
    }

    let billable = billable_ranges(rent, &clamped);
    let pieces = split_ranges_by_cycle(&billable, rent.cycle);

    let mut consumption = Consumption::default();
    for piece in pieces {
        if options.deadline_passed() {
            return Err(CalculatorError::DeadlineExceeded);
        }
        calculate_piece(rent, &piece, indexes, &mut consumption, &mut result)?;
    }

    result.adjustment_consumption = consumption.into_records(rent);

    debug!(
        rent = %rent.id,
        range = %range,
        total = %result.total(),
        "rent calculated"
    );
    Ok(result)
}

/// Index factor of an index-adjusted rent for one adjustment year.
pub fn index_factor(rent: &Rent, index: &Index) -> Decimal {
    let base = match rent.rent_type {
        RentType::Index2022 => INDEX_2022_BASE_NUMBER,
        _ => rent
            .index_parameters
            .y_value
            .filter(|base| !base.is_zero())
            .unwrap_or(DEFAULT_INDEX_BASE_NUMBER),
    };
    round_intermediate(index.number / base)
}

// ---------------------------------------------------------------------------
// Pieces and segments
// ---------------------------------------------------------------------------

/// Ranges that may be billed at all: the whole clamped range, or its
/// intersection with the seasonal window of every year it touches.
fn billable_ranges(rent: &Rent, clamped: &DateRange) -> Vec<DateRange> {
    match &rent.seasonal {
        None => vec![*clamped],
        Some(window) => (clamped.start().year()..=clamped.end().year())
            .filter_map(|year| window.in_year(year))
            .filter_map(|season| season.intersection(clamped))
            .collect(),
    }
}

/// Weight of `sub` within its rent year. Seasonal rents spread the yearly
/// amount over the days of the season, other rents over twelve months.
fn weight(rent: &Rent, sub: &DateRange) -> Decimal {
    match rent
        .seasonal
        .as_ref()
        .and_then(|window| window.in_year(sub.start().year()))
    {
        Some(season) => fraction_of_year(sub, season.start(), season.end()),
        None => month_fraction_of_year(sub),
    }
}

fn next_day(date: Option<NaiveDate>) -> Option<NaiveDate> {
    date.and_then(|d| d.checked_add_signed(Duration::days(1)))
}

fn segment_boundaries(rent: &Rent) -> Vec<NaiveDate> {
    let mut boundaries = Vec::new();
    for contract in &rent.contract_rents {
        boundaries.extend(contract.start_date);
        boundaries.extend(next_day(contract.end_date));
    }
    for fixed in &rent.fixed_initial_year_rents {
        boundaries.push(fixed.start_date);
        boundaries.extend(next_day(Some(fixed.end_date)));
    }
    for adjustment in &rent.rent_adjustments {
        boundaries.extend(adjustment.start_date);
        boundaries.extend(next_day(adjustment.end_date));
    }
    boundaries
}

fn ordered_adjustments(rent: &Rent) -> Vec<&RentAdjustment> {
    let mut adjustments: Vec<&RentAdjustment> = rent.rent_adjustments.iter().collect();
    adjustments.sort_by_key(|adj| (adj.start_date, adj.id));
    adjustments
}

fn calculate_piece(
    rent: &Rent,
    piece: &DateRange,
    indexes: &IndexTable,
    consumption: &mut Consumption,
    result: &mut CalculationResult,
) -> Result<(), CalculatorError> {
    let index = if rent.rent_type.is_index_adjusted()
        && rent
            .contract_rents
            .iter()
            .any(|contract| contract.active_range(piece).is_some())
    {
        let year = rent.cycle.cycle_year(piece.start());
        Some(indexes.for_adjustment_year(year)?)
    } else {
        None
    };
    let factor = index.map(|index| index_factor(rent, index));

    let segments = piece.split_at(&segment_boundaries(rent));
    let adjustments = ordered_adjustments(rent);
    let first_amount = result.amounts.len();

    for segment in &segments {
        let segment_weight = weight(rent, segment);
        let mut running: BTreeMap<IntendedUseId, Decimal> = BTreeMap::new();

        let fixed_uses: BTreeSet<IntendedUseId> = rent
            .fixed_initial_year_rents
            .iter()
            .filter(|fixed| fixed.active_range(segment).is_some())
            .map(|fixed| {
                let amount = round_intermediate(fixed.amount * segment_weight);
                *running.entry(fixed.intended_use).or_default() += amount;
                result.amounts.push(CalculationAmount {
                    item: CalculationItem::FixedInitialYearRent { id: fixed.id },
                    intended_use: fixed.intended_use,
                    amount,
                    date_range: *segment,
                });
                fixed.intended_use
            })
            .collect();

        for contract in &rent.contract_rents {
            if contract.active_range(segment).is_none()
                || fixed_uses.contains(&contract.intended_use)
            {
                continue;
            }
            let annual = contract.annual_amount() * factor.unwrap_or(Decimal::ONE);
            let amount = round_intermediate(annual * segment_weight);
            *running.entry(contract.intended_use).or_default() += amount;
            result.amounts.push(CalculationAmount {
                item: CalculationItem::ContractRent {
                    id: contract.id,
                    index_number: index.map(|index| index.number),
                    factor,
                },
                intended_use: contract.intended_use,
                amount,
                date_range: *segment,
            });
        }

        for adjustment in &adjustments {
            if adjustment.active_range(segment).is_none() {
                continue;
            }
            let current = running.entry(adjustment.intended_use).or_default();
            let delta = adjustment_delta(adjustment, *current, segment_weight, consumption);
            if delta.is_zero() {
                continue;
            }
            *current += delta;
            result.amounts.push(CalculationAmount {
                item: CalculationItem::RentAdjustment { id: adjustment.id },
                intended_use: adjustment.intended_use,
                amount: delta,
                date_range: *segment,
            });
        }
    }

    if let (Some(index), Some(factor)) = (index, factor) {
        for contract in &rent.contract_rents {
            if let Some(active) = contract.active_range(piece) {
                result.index_adjusted_rents.push(IndexAdjustedRent {
                    intended_use: contract.intended_use,
                    start_date: active.start(),
                    end_date: active.end(),
                    amount: round_money(contract.annual_amount() * factor),
                    factor,
                    index_year: index.year,
                    index_number: index.number,
                });
            }
        }
    }

    let piece_total: Decimal = result.amounts[first_amount..]
        .iter()
        .map(|amount| amount.amount)
        .sum();
    let piece_weight = weight(rent, piece);
    let calendar_year_rent = if piece_weight.is_zero() {
        Decimal::ZERO
    } else {
        round_money(piece_total / piece_weight)
    };
    result.payable_rents.push(PayableRent {
        start_date: piece.start(),
        end_date: piece.end(),
        amount: round_money(piece_total),
        calendar_year_rent,
        difference_percent: None,
    });

    Ok(())
}

// ---------------------------------------------------------------------------
// Adjustments
// ---------------------------------------------------------------------------

/// AMOUNT_TOTAL balances consumed so far in this run.
#[derive(Debug, Default)]
struct Consumption {
    consumed: HashMap<RentAdjustmentId, Money>,
}

impl Consumption {
    fn available(&self, adjustment: &RentAdjustment) -> Money {
        let used = self.consumed.get(&adjustment.id).copied().unwrap_or_default();
        (adjustment.remaining_total() - used).max(Decimal::ZERO)
    }

    fn consume(&mut self, adjustment: &RentAdjustment, amount: Money) {
        *self.consumed.entry(adjustment.id).or_default() += amount;
    }

    fn into_records(self, rent: &Rent) -> Vec<AdjustmentConsumption> {
        let mut records: Vec<AdjustmentConsumption> = rent
            .rent_adjustments
            .iter()
            .filter_map(|adjustment| {
                let consumed = self.consumed.get(&adjustment.id).copied()?;
                (!consumed.is_zero()).then(|| AdjustmentConsumption {
                    adjustment: adjustment.id,
                    consumed: round_money(consumed),
                    amount_left: round_money(
                        (adjustment.remaining_total() - consumed).max(Decimal::ZERO),
                    ),
                })
            })
            .collect();
        records.sort_by_key(|record| record.adjustment);
        records
    }
}

/// Signed change an adjustment makes to the running amount of a segment.
/// Discounts never take the running amount below zero.
fn adjustment_delta(
    adjustment: &RentAdjustment,
    running: Decimal,
    segment_weight: Decimal,
    consumption: &mut Consumption,
) -> Decimal {
    let sign = adjustment.adjustment_type.sign();
    let raw = match adjustment.amount_type {
        AdjustmentAmountType::PercentPerYear => {
            running * adjustment.full_amount / Decimal::ONE_HUNDRED
        }
        AdjustmentAmountType::AmountPerYear => adjustment.full_amount * segment_weight,
        AdjustmentAmountType::AmountTotal => {
            let available = consumption.available(adjustment);
            let take = if sign.is_sign_negative() {
                available.min(running.max(Decimal::ZERO))
            } else {
                available
            };
            consumption.consume(adjustment, take);
            return round_intermediate(sign * take);
        }
    };

    let delta = round_intermediate(sign * raw);
    if sign.is_sign_negative() {
        delta.max(-running.max(Decimal::ZERO))
    } else {
        delta
    }
}

// ---------------------------------------------------------------------------
// One-time rents
// ---------------------------------------------------------------------------

/// A one-time rent is billed in full, once, by the range that contains its
/// start date (any range when it has none).
fn one_time_amounts(rent: &Rent, clamped: &DateRange) -> Vec<CalculationAmount> {
    if rent
        .start_date
        .is_some_and(|start| !clamped.contains(start))
    {
        return Vec::new();
    }
    rent.contract_rents
        .iter()
        .map(|contract| CalculationAmount {
            item: CalculationItem::ContractRent {
                id: contract.id,
                index_number: None,
                factor: None,
            },
            intended_use: contract.intended_use,
            amount: round_intermediate(contract.annual_amount()),
            date_range: *clamped,
        })
        .collect()
}
