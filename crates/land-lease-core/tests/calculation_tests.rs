mod common;

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use common::{contract_rent, d, store_with, tenant, year};
use land_lease_core::calculation::{calculate_rent, CalculationOptions};
use land_lease_core::calendar::{split_range_by_cycle, DateRange, DayMonth, RentCycle};
use land_lease_core::clock::FixedClock;
use land_lease_core::index::{Index, IndexRegistry, IndexTable};
use land_lease_core::lease::Lease;
use land_lease_core::rent::{
    AdjustmentAmountType, AdjustmentType, Rent, RentAdjustment, RentType, SeasonalWindow,
};
use land_lease_core::store::LeaseStore;
use land_lease_core::types::{IntendedUseId, LeaseId, RentAdjustmentId, RentId, ServiceUnitId};
use land_lease_core::LeaseEngine;

fn index_rent(amount: Decimal, cycle: RentCycle) -> Rent {
    let mut rent = Rent::new(RentId(1), RentType::Index);
    rent.cycle = cycle;
    rent.contract_rents.push(contract_rent(amount));
    rent
}

fn indexes() -> IndexTable {
    IndexTable::new(vec![
        Index::annual(2017, dec!(1913)),
        Index::annual(2018, dec!(1927)),
    ])
    .unwrap()
}

fn dry_run(rent: &Rent, range: &DateRange, table: &IndexTable) -> Decimal {
    calculate_rent(rent, range, table, &CalculationOptions::dry_run())
        .unwrap()
        .total()
}

#[test]
fn test_index_rent_calendar_cycle() {
    let rent = index_rent(dec!(100), RentCycle::JanuaryToDecember);
    assert_eq!(dry_run(&rent, &year(2018), &indexes()), dec!(1927.00));
}

#[test]
fn test_index_rent_april_cycle_splits_year() {
    let rent = index_rent(dec!(100), RentCycle::AprilToMarch);
    let result =
        calculate_rent(&rent, &year(2018), &indexes(), &CalculationOptions::dry_run()).unwrap();
    assert_eq!(result.total(), dec!(1923.50));
    assert_eq!(result.payable_rents.len(), 2);
    assert_eq!(result.payable_rents[0].end_date, d(2018, 3, 31));
    assert_eq!(result.payable_rents[1].start_date, d(2018, 4, 1));
}

#[test]
fn test_half_year_percent_discount() {
    let mut rent = index_rent(dec!(100), RentCycle::JanuaryToDecember);
    rent.rent_adjustments.push(RentAdjustment {
        id: RentAdjustmentId(1),
        adjustment_type: AdjustmentType::Discount,
        intended_use: IntendedUseId(1),
        start_date: Some(d(2020, 7, 1)),
        end_date: Some(d(2020, 12, 31)),
        amount_type: AdjustmentAmountType::PercentPerYear,
        full_amount: dec!(50),
        amount_left: None,
        subvention: None,
    });
    let table = IndexTable::new(vec![Index::annual(2020, dec!(100))]).unwrap();
    assert_eq!(dry_run(&rent, &year(2020), &table), dec!(75.00));
}

#[test]
fn test_cycle_pieces_cover_range() {
    let range = DateRange::new(d(2017, 2, 15), d(2019, 5, 10)).unwrap();
    for cycle in [RentCycle::JanuaryToDecember, RentCycle::AprilToMarch] {
        let pieces = split_range_by_cycle(&range, cycle);
        assert_eq!(pieces.first().unwrap().start(), range.start());
        assert_eq!(pieces.last().unwrap().end(), range.end());
        for pair in pieces.windows(2) {
            assert_eq!(pair[0].end().succ_opt().unwrap(), pair[1].start());
        }
        let days: i64 = pieces.iter().map(DateRange::days).sum();
        assert_eq!(days, range.days());
    }
}

#[test]
fn test_seasonal_rent_only_inside_window() {
    let mut rent = Rent::new(RentId(1), RentType::Fixed);
    rent.contract_rents.push(contract_rent(dec!(1000)));
    rent.seasonal = Some(SeasonalWindow {
        start: DayMonth::new(1, 5).unwrap(),
        end: DayMonth::new(30, 9).unwrap(),
    });
    let empty = IndexTable::default();

    let outside = DateRange::new(d(2020, 10, 1), d(2021, 4, 30)).unwrap();
    assert_eq!(dry_run(&rent, &outside, &empty), dec!(0));
    assert_eq!(dry_run(&rent, &year(2020), &empty), dec!(1000));
}

#[test]
fn test_amount_total_discount_not_consumed_twice() {
    let mut lease = Lease::new(LeaseId(1), "A1-1", ServiceUnitId(1));
    let mut rent = Rent::new(RentId(1), RentType::Fixed);
    rent.contract_rents.push(contract_rent(dec!(1000)));
    rent.rent_adjustments.push(RentAdjustment {
        id: RentAdjustmentId(1),
        adjustment_type: AdjustmentType::Discount,
        intended_use: IntendedUseId(1),
        start_date: None,
        end_date: None,
        amount_type: AdjustmentAmountType::AmountTotal,
        full_amount: dec!(300),
        amount_left: None,
        subvention: None,
    });
    lease.rents.push(rent);
    lease.tenants = vec![tenant(1, 1, 1)];
    let store = store_with(vec![lease]);
    let engine = LeaseEngine::builder(store.clone(), store.clone())
        .clock(Arc::new(FixedClock(d(2020, 1, 1))))
        .build();

    let first = engine
        .generate_invoices(LeaseId(1), &year(2020), d(2020, 6, 30))
        .unwrap();
    let after_first = store.lease(LeaseId(1)).unwrap();
    assert_eq!(
        after_first.rents[0].rent_adjustments[0].amount_left,
        Some(dec!(0))
    );
    assert_eq!(
        store.invoice(first.invoices[0]).unwrap().total_amount,
        dec!(700.00)
    );

    let second = engine
        .generate_invoices(LeaseId(1), &year(2020), d(2020, 6, 30))
        .unwrap();
    assert_eq!(second, first);
    assert_eq!(store.lease(LeaseId(1)).unwrap(), after_first);
}

#[test]
fn test_dry_run_leaves_lease_untouched() {
    let mut lease = Lease::new(LeaseId(1), "A1-1", ServiceUnitId(1));
    lease.rents.push(index_rent(dec!(100), RentCycle::JanuaryToDecember));
    lease.tenants = vec![tenant(1, 1, 1)];
    let store = store_with(vec![lease.clone()]);
    let engine = LeaseEngine::builder(store.clone(), store.clone())
        .indexes(Arc::new(IndexRegistry::new(indexes())))
        .build();

    let calculation = engine.calculate_rent(LeaseId(1), &year(2018), true).unwrap();
    assert_eq!(calculation.total(), dec!(1927.00));
    assert_eq!(store.lease(LeaseId(1)).unwrap(), lease);

    engine.calculate_rent(LeaseId(1), &year(2018), false).unwrap();
    let committed = store.lease(LeaseId(1)).unwrap();
    assert_eq!(committed.rents[0].index_adjusted_rents.len(), 1);
    assert_eq!(committed.rents[0].payable_rents.len(), 1);

    engine.calculate_rent(LeaseId(1), &year(2018), false).unwrap();
    assert_eq!(store.lease(LeaseId(1)).unwrap(), committed);
}

#[test]
fn test_committed_history_tracks_yearly_change() {
    let mut lease = Lease::new(LeaseId(1), "A1-1", ServiceUnitId(1));
    lease.rents.push(index_rent(dec!(100), RentCycle::JanuaryToDecember));
    lease.tenants = vec![tenant(1, 1, 1)];
    let store = store_with(vec![lease]);
    let engine = LeaseEngine::builder(store.clone(), store.clone())
        .indexes(Arc::new(IndexRegistry::new(indexes())))
        .build();

    engine.calculate_rent(LeaseId(1), &year(2018), false).unwrap();
    engine.calculate_rent(LeaseId(1), &year(2017), false).unwrap();
    engine.calculate_rent(LeaseId(1), &year(2018), false).unwrap();

    let history = store.lease(LeaseId(1)).unwrap().rents[0].payable_rents.clone();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].calendar_year_rent, dec!(1913.00));
    assert_eq!(history[0].difference_percent, None);
    assert_eq!(history[1].calendar_year_rent, dec!(1927.00));
    assert_eq!(history[1].difference_percent, Some(dec!(0.7318)));
}
