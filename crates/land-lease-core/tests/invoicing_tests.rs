mod common;

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;

use common::{d, engine, fixed_lease, store_with, tenant, year};
use land_lease_core::invoice::{Invoice, InvoiceState, InvoiceType, DEFAULT_UNIT_NUMBER_START};
use land_lease_core::store::LeaseStore;
use land_lease_core::types::{InvoiceSetId, LeaseId, ReceivableTypeId, TenantId};
use land_lease_core::LeaseError;

fn invoices_of(store: &dyn LeaseStore, ids: &[land_lease_core::types::InvoiceId]) -> Vec<Invoice> {
    ids.iter().map(|id| store.invoice(*id).unwrap()).collect()
}

// ===========================================================================
// Generation
// ===========================================================================

#[test]
fn test_single_tenant_gets_one_invoice() {
    let store = store_with(vec![fixed_lease(1, dec!(1000), vec![tenant(1, 1, 1)])]);
    let engine = engine(&store, d(2017, 5, 1));

    let set = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();
    let invoices = invoices_of(store.as_ref(), &set.invoices);

    assert_eq!(invoices.len(), 1);
    let invoice = &invoices[0];
    assert_eq!(invoice.total_amount, dec!(1000.00));
    assert_eq!(invoice.state, InvoiceState::Open);
    assert_eq!(invoice.rows.len(), 1);
    assert_eq!(invoice.rows[0].tenant, Some(TenantId(1)));
    assert_eq!(invoice.rows[0].receivable_type, ReceivableTypeId(1));
    assert_eq!(invoice.number, Some(DEFAULT_UNIT_NUMBER_START));
    assert_eq!(invoice.invoice_set, Some(set.id));
}

#[test]
fn test_two_halves_get_two_invoices() {
    let store = store_with(vec![fixed_lease(
        1,
        dec!(1000),
        vec![tenant(1, 1, 2), tenant(2, 1, 2)],
    )]);
    let engine = engine(&store, d(2017, 5, 1));

    let set = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();
    let invoices = invoices_of(store.as_ref(), &set.invoices);

    let totals: Vec<Decimal> = invoices.iter().map(|inv| inv.total_amount).collect();
    assert_eq!(totals, vec![dec!(500.00), dec!(500.00)]);
    assert!(invoices.iter().all(|inv| inv.rows.len() == 1));
}

#[test]
fn test_thirds_residual_on_last_tenant() {
    let store = store_with(vec![fixed_lease(
        1,
        dec!(1000),
        vec![tenant(3, 1, 3), tenant(1, 1, 3), tenant(2, 1, 3)],
    )]);
    let engine = engine(&store, d(2017, 5, 1));

    let set = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();
    let invoices = invoices_of(store.as_ref(), &set.invoices);

    let by_tenant: Vec<(Option<TenantId>, Decimal)> = invoices
        .iter()
        .map(|inv| (inv.rows[0].tenant, inv.total_amount))
        .collect();
    assert_eq!(
        by_tenant,
        vec![
            (Some(TenantId(1)), dec!(333.33)),
            (Some(TenantId(2)), dec!(333.33)),
            (Some(TenantId(3)), dec!(333.34)),
        ]
    );
    let sum: Decimal = invoices.iter().map(|inv| inv.total_amount).sum();
    assert_eq!(sum, dec!(1000.00));
}

#[test]
fn test_tenants_sharing_a_recipient_are_merged() {
    let mut second = tenant(2, 1, 2);
    second.contacts[0].contact = land_lease_core::types::ContactId(101);
    let store = store_with(vec![fixed_lease(1, dec!(1000), vec![tenant(1, 1, 2), second])]);
    let engine = engine(&store, d(2017, 5, 1));

    let set = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();
    let invoices = invoices_of(store.as_ref(), &set.invoices);

    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].rows.len(), 2);
    assert_eq!(invoices[0].total_amount, dec!(1000.00));
}

#[test]
fn test_regeneration_returns_the_same_set() {
    let store = store_with(vec![fixed_lease(
        1,
        dec!(1000),
        vec![tenant(1, 1, 2), tenant(2, 1, 2)],
    )]);
    let engine = engine(&store, d(2017, 5, 1));

    let first = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();
    let before = store.invoices();
    let second = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(store.invoices(), before);
}

#[test]
fn test_changed_rent_supersedes_old_invoice() {
    let store = store_with(vec![fixed_lease(1, dec!(1000), vec![tenant(1, 1, 1)])]);
    let engine = engine(&store, d(2017, 5, 1));

    let first = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();
    let old_id = first.invoices[0];

    let mut lease = store.lease(LeaseId(1)).unwrap();
    lease.rents[0].contract_rents[0].amount = dec!(1200);
    store.insert_lease(lease);

    let second = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.invoices.len(), 1);
    assert_ne!(second.invoices[0], old_id);

    let old = store.invoice(old_id).unwrap();
    assert_eq!(old.state, InvoiceState::Refunded);
    assert_eq!(old.outstanding_amount, Decimal::ZERO);

    let notes = store.credit_notes_for(old_id).unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].total_amount, dec!(1000.00));

    let new = store.invoice(second.invoices[0]).unwrap();
    assert_eq!(new.total_amount, dec!(1200.00));
}

#[test]
fn test_numbers_unique_and_monotonic() {
    let store = store_with(vec![
        fixed_lease(1, dec!(1000), vec![tenant(1, 1, 2), tenant(2, 1, 2)]),
        fixed_lease(2, dec!(500), vec![tenant(3, 1, 1)]),
    ]);
    let engine = engine(&store, d(2017, 5, 1));

    engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();
    engine
        .generate_invoices(LeaseId(2), &year(2017), d(2017, 6, 1))
        .unwrap();
    let first = store.invoices()[0].id;
    engine.credit_full(first).unwrap();

    let mut numbers: Vec<u64> = store.invoices().iter().filter_map(|inv| inv.number).collect();
    numbers.sort_unstable();
    let unique: HashSet<u64> = numbers.iter().copied().collect();
    assert_eq!(unique.len(), numbers.len());
    assert_eq!(
        numbers,
        (DEFAULT_UNIT_NUMBER_START..DEFAULT_UNIT_NUMBER_START + 4).collect::<Vec<_>>()
    );
}

#[test]
fn test_unbalanced_shares_refuse_generation() {
    let store = store_with(vec![fixed_lease(
        1,
        dec!(1000),
        vec![tenant(1, 1, 2), tenant(2, 1, 3)],
    )]);
    let engine = engine(&store, d(2017, 5, 1));

    let err = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap_err();
    assert!(matches!(err, LeaseError::InvariantViolation { lease, .. } if lease == LeaseId(1)));
    assert!(store.invoices().is_empty());
}

#[test]
fn test_tenant_handover_mid_period_is_invoiced() {
    let mut outgoing = tenant(1, 1, 1);
    outgoing.contacts[0].end_date = Some(d(2020, 6, 30));
    let mut incoming = tenant(2, 1, 1);
    incoming.contacts[0].start_date = Some(d(2020, 7, 1));
    let store = store_with(vec![fixed_lease(1, dec!(1000), vec![outgoing, incoming])]);
    let engine = engine(&store, d(2020, 5, 1));

    let set = engine
        .generate_invoices(LeaseId(1), &year(2020), d(2020, 6, 30))
        .unwrap();
    let invoices = invoices_of(store.as_ref(), &set.invoices);

    assert_eq!(invoices.len(), 2);
    let tenants: Vec<_> = invoices.iter().flat_map(Invoice::tenants).collect();
    assert_eq!(tenants, vec![TenantId(1), TenantId(2)]);
    assert_eq!(invoices[0].rows[0].billing_period.end(), d(2020, 6, 30));
    assert_eq!(invoices[1].rows[0].billing_period.start(), d(2020, 7, 1));
    let total: Decimal = invoices.iter().map(|inv| inv.total_amount).sum();
    assert_eq!(total, dec!(1000.00));
}

#[test]
fn test_unsupported_due_dates_refuse_generation() {
    let mut lease = fixed_lease(1, dec!(1000), vec![tenant(1, 1, 1)]);
    lease.rents[0].due_dates_per_year = Some(3);
    let store = store_with(vec![lease]);
    let engine = engine(&store, d(2017, 5, 1));

    let err = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap_err();
    assert!(matches!(err, LeaseError::Configuration { .. }));

    let findings = engine.invoicing_review(LeaseId(1)).unwrap();
    assert_eq!(findings.len(), 1);
    assert!(findings[0].is_blocking());
}

#[test]
fn test_store_outage_is_transient() {
    let store = store_with(vec![fixed_lease(1, dec!(1000), vec![tenant(1, 1, 1)])]);
    let engine = engine(&store, d(2017, 5, 1));
    store.set_available(false);

    let err = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap_err();
    assert!(err.is_transient());
}

// ===========================================================================
// Payments
// ===========================================================================

#[test]
fn test_payments_settle_and_negative_payment_reopens() {
    let store = store_with(vec![fixed_lease(1, dec!(200), vec![tenant(1, 1, 1)])]);
    let engine = engine(&store, d(2017, 5, 1));
    let set = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();
    let id = set.invoices[0];

    let invoice = engine.record_payment(id, dec!(100), d(2017, 6, 1), None).unwrap();
    assert_eq!(invoice.state, InvoiceState::Open);
    assert_eq!(invoice.outstanding_amount, dec!(100));

    let invoice = engine
        .record_payment(id, dec!(100), d(2017, 6, 2), Some("FC-1".into()))
        .unwrap();
    assert_eq!(invoice.state, InvoiceState::Paid);
    assert_eq!(invoice.outstanding_amount, dec!(0));

    let invoice = engine.record_payment(id, dec!(-50), d(2017, 6, 3), None).unwrap();
    assert_eq!(invoice.state, InvoiceState::Open);
    assert_eq!(invoice.outstanding_amount, dec!(50));
    assert_eq!(invoice.payments.len(), 3);
    assert_eq!(store.invoice(id).unwrap(), invoice);
}

#[test]
fn test_payment_on_refunded_invoice_refused() {
    let store = store_with(vec![fixed_lease(1, dec!(200), vec![tenant(1, 1, 1)])]);
    let engine = engine(&store, d(2017, 5, 1));
    let set = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();
    let id = set.invoices[0];
    let note = engine.credit_full(id).unwrap();

    assert!(matches!(
        engine.record_payment(id, dec!(10), d(2017, 6, 1), None),
        Err(LeaseError::InvalidOperation(_))
    ));
    assert!(matches!(
        engine.record_payment(note.id, dec!(10), d(2017, 6, 1), None),
        Err(LeaseError::InvalidOperation(_))
    ));
}

// ===========================================================================
// Credit notes
// ===========================================================================

#[test]
fn test_credit_by_amount_until_refunded() {
    let store = store_with(vec![fixed_lease(1, dec!(100), vec![tenant(1, 1, 1)])]);
    let engine = engine(&store, d(2017, 5, 1));
    let set = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();
    let id = set.invoices[0];

    let note = engine.credit_amount(id, dec!(20)).unwrap();
    assert_eq!(note.invoice_type, InvoiceType::CreditNote);
    assert_eq!(note.total_amount, dec!(20));
    assert_eq!(note.credited_invoice, Some(id));
    let original = engine.invoice(id).unwrap();
    assert_eq!(original.outstanding_amount, dec!(80));
    assert_eq!(original.state, InvoiceState::Open);

    engine.credit_amount(id, dec!(80)).unwrap();
    let original = engine.invoice(id).unwrap();
    assert_eq!(original.outstanding_amount, dec!(0));
    assert_eq!(original.state, InvoiceState::Refunded);
}

#[test]
fn test_over_credit_refused_without_effect() {
    let store = store_with(vec![fixed_lease(1, dec!(100), vec![tenant(1, 1, 1)])]);
    let engine = engine(&store, d(2017, 5, 1));
    let set = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();
    let id = set.invoices[0];
    engine.credit_amount(id, dec!(60)).unwrap();
    let before = store.invoices();

    let err = engine.credit_amount(id, dec!(41)).unwrap_err();
    assert!(matches!(err, LeaseError::CreditExceedsRemaining { .. }));
    assert_eq!(store.invoices(), before);
}

#[test]
fn test_credit_amounts_never_exceed_row_amounts() {
    let store = store_with(vec![fixed_lease(1, dec!(100), vec![tenant(1, 1, 1)])]);
    let engine = engine(&store, d(2017, 5, 1));
    let set = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();
    let id = set.invoices[0];

    for amount in [dec!(33.33), dec!(33.33), dec!(33.34)] {
        engine.credit_amount(id, amount).unwrap();
        let invoice = engine.invoice(id).unwrap();
        assert!(invoice
            .rows
            .iter()
            .all(|row| row.credited_amount <= row.amount));
    }
    let invoice = engine.invoice(id).unwrap();
    assert_eq!(invoice.credited_amount, dec!(100));
    assert!(engine.credit_amount(id, dec!(0.01)).is_err());
}

#[test]
fn test_credit_note_cannot_be_credited() {
    let store = store_with(vec![fixed_lease(1, dec!(100), vec![tenant(1, 1, 1)])]);
    let engine = engine(&store, d(2017, 5, 1));
    let set = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();
    let note = engine.credit_amount(set.invoices[0], dec!(10)).unwrap();

    assert!(matches!(
        engine.credit_full(note.id),
        Err(LeaseError::InvalidOperation(_))
    ));
}

#[test]
fn test_credit_rows_and_receivable_type() {
    let store = store_with(vec![fixed_lease(1, dec!(100), vec![tenant(1, 1, 1)])]);
    let engine = engine(&store, d(2017, 5, 1));
    let set = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();
    let id = set.invoices[0];
    let row = engine.invoice(id).unwrap().rows[0].id;

    let note = engine.credit_rows(id, vec![row], Some(dec!(25))).unwrap();
    assert_eq!(note.rows.len(), 1);
    assert_eq!(note.rows[0].credited_row, Some(row));
    assert_eq!(note.total_amount, dec!(25));

    let note = engine
        .credit_by_receivable_type(id, ReceivableTypeId(1))
        .unwrap();
    assert_eq!(note.total_amount, dec!(75));
    assert_eq!(engine.invoice(id).unwrap().state, InvoiceState::Refunded);

    assert!(engine
        .credit_by_receivable_type(id, ReceivableTypeId(9))
        .is_err());
}

#[test]
fn test_repeated_row_in_credit_request_credited_once() {
    let store = store_with(vec![fixed_lease(1, dec!(100), vec![tenant(1, 1, 1)])]);
    let engine = engine(&store, d(2017, 5, 1));
    let set = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();
    let id = set.invoices[0];
    let row = engine.invoice(id).unwrap().rows[0].id;

    let note = engine.credit_rows(id, vec![row, row], None).unwrap();
    assert_eq!(note.rows.len(), 1);
    assert_eq!(note.total_amount, dec!(100.00));

    let invoice = engine.invoice(id).unwrap();
    assert_eq!(invoice.credited_amount, dec!(100.00));
    assert!(invoice.credited_amount <= invoice.total_amount);
    assert_eq!(invoice.state, InvoiceState::Refunded);
}

#[test]
fn test_credit_invoice_set_spreads_by_tenant() {
    let store = store_with(vec![fixed_lease(
        1,
        dec!(1000),
        vec![tenant(1, 1, 2), tenant(2, 1, 2)],
    )]);
    let engine = engine(&store, d(2017, 5, 1));
    let set = engine
        .generate_invoices(LeaseId(1), &year(2017), d(2017, 6, 1))
        .unwrap();

    let notes = engine.credit_invoice_set(set.id, None, Some(dec!(100))).unwrap();
    let totals: Vec<Decimal> = notes.iter().map(|note| note.total_amount).collect();
    assert_eq!(totals, vec![dec!(50), dec!(50)]);

    let outstanding: Vec<Decimal> = invoices_of(store.as_ref(), &set.invoices)
        .iter()
        .map(|inv| inv.outstanding_amount)
        .collect();
    assert_eq!(outstanding, vec![dec!(450), dec!(450)]);

    assert!(engine
        .credit_invoice_set(InvoiceSetId(999), None, None)
        .is_err());
}

// ===========================================================================
// Scheduler
// ===========================================================================

#[test]
fn test_due_date_run_reports_failures_per_lease() {
    let store = store_with(vec![
        fixed_lease(1, dec!(1000), vec![tenant(1, 1, 1)]),
        fixed_lease(2, dec!(1000), vec![tenant(2, 1, 2), tenant(3, 1, 3)]),
        fixed_lease(3, dec!(300), vec![tenant(4, 1, 1)]),
    ]);
    let engine = engine(&store, d(2017, 5, 1));

    let run = engine.generate_for_due_date(d(2017, 6, 30)).unwrap();
    assert_eq!(run.generated.len(), 2);
    assert_eq!(run.failures.len(), 1);
    assert_eq!(run.failures[0].lease, LeaseId(2));
    assert!(!run.failures[0].transient);

    let again = engine.generate_for_due_date(d(2017, 6, 30)).unwrap();
    assert_eq!(again.generated, run.generated);

    let off_schedule = engine.generate_for_due_date(d(2017, 6, 29)).unwrap();
    assert!(off_schedule.generated.is_empty());
    assert_eq!(off_schedule.skipped, 3);
}
