//! Transactional invoice operations: generation, credit notes and payments.
//!
//! Every mutation runs under a keyed lock (lease for generation, invoice for
//! payments and credits) and ends in a single store commit. Locks are taken
//! lease first, then invoices in id order.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::calculation::{calculate_rent, CalculationOptions, CalculationResult, LeaseCalculation};
use crate::calendar::DateRange;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{CalculatorError, LeaseError};
use crate::index::IndexRegistry;
use crate::lease::Lease;
use crate::locks::{KeyedGuard, KeyedLocks};
use crate::review::{review_lease, FindingKind, ReviewFinding};
use crate::store::{IdKind, LeaseStore, Transaction};
use crate::types::{
    round_intermediate, InvoiceId, InvoiceRowId, InvoiceSetId, LeaseId, Money, PaymentId, ReceivableTypeId, RentId,
};
use crate::LeaseResult;

use super::credit::{apply_credit, build_credit_note, plan_credit, plan_set_credit, CreditLine, CreditRequest};
use super::generator::{draft_invoices, DraftInvoice, RentGross};
use super::matching::{match_draft, MatchOutcome};
use super::model::{
    ConsumedAdjustment, Invoice, InvoicePayment, InvoiceRow, InvoiceSet, InvoiceState, InvoiceType,
};
use super::numbering::ServiceUnit;

pub struct InvoiceService {
    store: Arc<dyn LeaseStore>,
    indexes: Arc<IndexRegistry>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    lease_locks: KeyedLocks<LeaseId>,
    invoice_locks: KeyedLocks<InvoiceId>,
}

/// Put AMOUNT_TOTAL balances and history records of committed results on
/// the lease. History for the same span is replaced, not duplicated.
pub fn record_results(lease: &mut Lease, results: &[CalculationResult]) -> LeaseResult<()> {
    for result in results {
        let rent = lease.rent_mut(result.rent)?;
        for consumption in &result.adjustment_consumption {
            if let Some(adjustment) = rent.rent_adjustment_mut(consumption.adjustment) {
                adjustment.amount_left = Some(consumption.amount_left);
            }
        }
        for record in &result.index_adjusted_rents {
            rent.index_adjusted_rents.retain(|old| {
                !(old.intended_use == record.intended_use
                    && old.start_date == record.start_date
                    && old.end_date == record.end_date)
            });
            rent.index_adjusted_rents.push(record.clone());
        }
        for record in &result.payable_rents {
            rent.payable_rents
                .retain(|old| !(old.start_date == record.start_date && old.end_date == record.end_date));
            let previous = rent
                .payable_rents
                .iter()
                .filter(|old| old.end_date < record.start_date)
                .max_by_key(|old| old.end_date);
            let mut record = record.clone();
            record.difference_percent = previous
                .filter(|prev| !prev.calendar_year_rent.is_zero())
                .map(|prev| {
                    round_intermediate(
                        (record.calendar_year_rent - prev.calendar_year_rent) / prev.calendar_year_rent
                            * Decimal::ONE_HUNDRED,
                    )
                });
            rent.payable_rents.push(record);
        }
        rent.payable_rents.sort_by_key(|record| record.start_date);
    }
    Ok(())
}

/// Give back the balances a previous generation took.
fn restore_consumption(lease: &mut Lease, consumed: &[ConsumedAdjustment]) -> LeaseResult<()> {
    for entry in consumed {
        let rent = lease.rent_mut(entry.rent)?;
        if let Some(adjustment) = rent.rent_adjustment_mut(entry.adjustment) {
            let restored = (adjustment.remaining_total() + entry.consumed).min(adjustment.full_amount);
            adjustment.amount_left = Some(restored);
        }
    }
    Ok(())
}

fn refuse_on_findings(lease: LeaseId, findings: &[ReviewFinding]) -> LeaseResult<()> {
    let blocking: Vec<&ReviewFinding> = findings.iter().filter(|f| f.is_blocking()).collect();
    if blocking.is_empty() {
        return Ok(());
    }
    let reason = blocking
        .iter()
        .map(|f| f.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    let configuration = blocking.iter().any(|f| {
        matches!(
            f.kind,
            FindingKind::RentConfiguration | FindingKind::DueDates | FindingKind::OverrideReceivableType
        )
    });
    Err(if configuration {
        LeaseError::Configuration { lease, reason }
    } else {
        LeaseError::InvariantViolation { lease, reason }
    })
}

impl InvoiceService {
    pub fn new(
        store: Arc<dyn LeaseStore>,
        indexes: Arc<IndexRegistry>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            indexes,
            clock,
            config,
            lease_locks: KeyedLocks::new("lease"),
            invoice_locks: KeyedLocks::new("invoice"),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn options(&self, dry_run: bool) -> CalculationOptions {
        let options = if dry_run {
            CalculationOptions::dry_run()
        } else {
            CalculationOptions::committing()
        };
        match self.config.calculation_deadline() {
            Some(limit) => options.with_deadline(Instant::now() + limit),
            None => options,
        }
    }

    fn lock_lease(&self, lease: LeaseId) -> LeaseResult<KeyedGuard<'_, LeaseId>> {
        self.lease_locks.acquire(lease, self.config.lock_timeout())
    }

    fn lock_invoices(&self, mut ids: Vec<InvoiceId>) -> LeaseResult<Vec<KeyedGuard<'_, InvoiceId>>> {
        ids.sort();
        ids.dedup();
        ids.into_iter()
            .map(|id| self.invoice_locks.acquire(id, self.config.lock_timeout()))
            .collect()
    }

    /// Calculate the selected rents of `lease` over `range`.
    fn calculate(
        &self,
        lease: &Lease,
        range: &DateRange,
        rents: Option<&[RentId]>,
        options: &CalculationOptions,
    ) -> Result<Vec<CalculationResult>, CalculatorError> {
        let indexes = self.indexes.snapshot();
        lease
            .rents
            .iter()
            .filter(|rent| rents.map_or(true, |ids| ids.contains(&rent.id)))
            .map(|rent| calculate_rent(rent, range, &indexes, options))
            .collect()
    }

    /// Calculate every rent of a lease; committing runs store the consumed
    /// balances and history records.
    pub fn calculate_lease(
        &self,
        lease_id: LeaseId,
        range: &DateRange,
        dry_run: bool,
    ) -> LeaseResult<LeaseCalculation> {
        let options = self.options(dry_run);
        if dry_run {
            let lease = self.store.lease(lease_id)?;
            let rents = self.calculate(&lease, range, None, &options)?;
            return Ok(LeaseCalculation {
                lease: lease_id,
                date_range: *range,
                rents,
            });
        }

        let _guard = self.lock_lease(lease_id)?;
        let mut lease = self.store.lease(lease_id)?;
        let rents = self.calculate(&lease, range, None, &options)?;
        record_results(&mut lease, &rents)?;
        self.store.commit(Transaction {
            leases: vec![lease],
            ..Transaction::default()
        })?;
        info!(lease = %lease_id, range = %range, "calculation committed");
        Ok(LeaseCalculation {
            lease: lease_id,
            date_range: *range,
            rents,
        })
    }

    pub fn review(&self, lease_id: LeaseId, period: &DateRange) -> LeaseResult<Vec<ReviewFinding>> {
        let lease = self.store.lease(lease_id)?;
        let unit = self.store.service_unit(lease.service_unit)?;
        Ok(review_lease(&lease, &unit, period))
    }

    pub fn generate_invoices(
        &self,
        lease_id: LeaseId,
        period: &DateRange,
        due_date: NaiveDate,
    ) -> LeaseResult<InvoiceSet> {
        self.generate_for_rents(lease_id, period, due_date, None)
    }

    /// Generate the invoice set of `(lease, period, due_date)` from the
    /// given rents (all rents when `None`). Running it again with unchanged
    /// configuration returns the same set and invoices.
    pub fn generate_for_rents(
        &self,
        lease_id: LeaseId,
        period: &DateRange,
        due_date: NaiveDate,
        rents: Option<&[RentId]>,
    ) -> LeaseResult<InvoiceSet> {
        let _lease_guard = self.lock_lease(lease_id)?;

        let stored_lease = self.store.lease(lease_id)?;
        let unit = self.store.service_unit(stored_lease.service_unit)?;
        refuse_on_findings(lease_id, &review_lease(&stored_lease, &unit, period))?;

        let prior_set = self
            .store
            .invoice_sets_for_lease(lease_id)?
            .into_iter()
            .find(|set| set.billing_period == *period && set.due_date == due_date);

        let mut lease = stored_lease;
        if let Some(set) = &prior_set {
            restore_consumption(&mut lease, &set.consumed_adjustments)?;
        }

        let options = self.options(false);
        let results = self.calculate(&lease, period, rents, &options)?;

        let drafts = draft_invoices(&lease, period, self.config.normalize_shares, |sub_period| {
            if sub_period == period {
                return Ok(self.gross_amounts(&lease, &unit, &results));
            }
            let partial = self.calculate(&lease, sub_period, rents, &self.options(true))?;
            Ok(self.gross_amounts(&lease, &unit, &partial))
        })?;

        let set_id = prior_set
            .as_ref()
            .map(|set| set.id)
            .unwrap_or_else(|| InvoiceSetId(self.store.allocate_id(IdKind::InvoiceSet)));

        let existing = self.store.invoices_for_lease(lease_id)?;
        let outcomes: Vec<MatchOutcome> = {
            let mut taken = Vec::new();
            drafts
                .iter()
                .map(|draft| {
                    let outcome = match_draft(draft, lease_id, period, &existing, &taken);
                    if let MatchOutcome::Reuse(id) | MatchOutcome::Supersede(id) = outcome {
                        taken.push(id);
                    }
                    outcome
                })
                .collect()
        };

        let superseded: Vec<InvoiceId> = outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                MatchOutcome::Supersede(id) => Some(*id),
                _ => None,
            })
            .collect();
        let _invoice_guards = self.lock_invoices(superseded)?;

        let today = self.clock.today();
        let mut tx = Transaction::default();
        let mut members = Vec::with_capacity(drafts.len());
        for (draft, outcome) in drafts.iter().zip(&outcomes) {
            match outcome {
                MatchOutcome::Reuse(id) => members.push(*id),
                MatchOutcome::Supersede(id) => {
                    let mut old = self.store.invoice(*id)?;
                    let lines = plan_credit(&old, &CreditRequest::Full)?;
                    let note = self.credit_note(&old, &lines, today)?;
                    apply_credit(&mut old, &lines);
                    warn!(
                        lease = %lease_id,
                        invoice = %old.id,
                        credit_note = %note.id,
                        "invoice superseded by regenerated amounts"
                    );
                    tx.invoices.push(old);
                    tx.invoices.push(note);
                    let invoice = self.new_invoice(&lease, &unit, draft, period, due_date, set_id, today)?;
                    members.push(invoice.id);
                    tx.invoices.push(invoice);
                }
                MatchOutcome::Create => {
                    let invoice = self.new_invoice(&lease, &unit, draft, period, due_date, set_id, today)?;
                    members.push(invoice.id);
                    tx.invoices.push(invoice);
                }
            }
        }

        if let Some(set) = &prior_set {
            for dropped in set.invoices.iter().filter(|id| !members.contains(id)) {
                warn!(lease = %lease_id, invoice = %dropped, "invoice no longer produced by generation");
            }
        }

        let consumed_adjustments: Vec<ConsumedAdjustment> = results
            .iter()
            .flat_map(|result| {
                result
                    .adjustment_consumption
                    .iter()
                    .filter(|c| !c.consumed.is_zero())
                    .map(move |c| ConsumedAdjustment {
                        rent: result.rent,
                        adjustment: c.adjustment,
                        consumed: c.consumed,
                    })
            })
            .collect();

        record_results(&mut lease, &results)?;
        let set = InvoiceSet {
            id: set_id,
            lease: lease_id,
            billing_period: *period,
            due_date,
            invoices: members,
            consumed_adjustments,
        };

        let created = outcomes
            .iter()
            .filter(|outcome| !matches!(outcome, MatchOutcome::Reuse(_)))
            .count();
        tx.leases.push(lease);
        tx.invoice_sets.push(set.clone());
        self.store.commit(tx)?;

        info!(
            lease = %lease_id,
            period = %period,
            due_date = %due_date,
            invoices = set.invoices.len(),
            created,
            "invoice set generated"
        );
        Ok(set)
    }

    fn gross_amounts(&self, lease: &Lease, unit: &ServiceUnit, results: &[CalculationResult]) -> Vec<RentGross> {
        results
            .iter()
            .filter_map(|result| {
                let rent = lease.rent(result.rent).ok()?;
                RentGross::from_result(rent, unit, result)
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn new_invoice(
        &self,
        lease: &Lease,
        unit: &ServiceUnit,
        draft: &DraftInvoice,
        period: &DateRange,
        due_date: NaiveDate,
        set: InvoiceSetId,
        today: NaiveDate,
    ) -> LeaseResult<Invoice> {
        let rows = draft
            .rows
            .iter()
            .map(|row| InvoiceRow {
                id: InvoiceRowId(self.store.allocate_id(IdKind::InvoiceRow)),
                tenant: Some(row.tenant),
                receivable_type: row.receivable_type,
                billing_period: row.billing_period,
                amount: row.amount,
                credited_amount: Decimal::ZERO,
                credited_row: None,
            })
            .collect();
        let mut invoice = Invoice {
            id: InvoiceId(self.store.allocate_id(IdKind::Invoice)),
            lease: lease.id,
            recipient: draft.recipient,
            invoice_type: InvoiceType::Charge,
            state: InvoiceState::Open,
            due_date,
            invoicing_date: Some(today),
            billing_period: *period,
            total_amount: Decimal::ZERO,
            billed_amount: Decimal::ZERO,
            outstanding_amount: Decimal::ZERO,
            credited_amount: Decimal::ZERO,
            service_unit: unit.id,
            number: Some(self.store.next_invoice_number(unit.id)?),
            credited_invoice: None,
            invoice_set: Some(set),
            postpone_date: None,
            collection_charge: Decimal::ZERO,
            rows,
            payments: Vec::new(),
        };
        invoice.update_amounts();
        invoice.billed_amount = invoice.total_amount;
        Ok(invoice)
    }

    fn credit_note(&self, original: &Invoice, lines: &[CreditLine], today: NaiveDate) -> LeaseResult<Invoice> {
        let id = InvoiceId(self.store.allocate_id(IdKind::Invoice));
        let number = self.store.next_invoice_number(original.service_unit)?;
        Ok(build_credit_note(
            original,
            lines,
            id,
            || InvoiceRowId(self.store.allocate_id(IdKind::InvoiceRow)),
            number,
            today,
        ))
    }

    /// Issue a credit note against one charge invoice.
    pub fn credit_invoice(&self, invoice_id: InvoiceId, request: &CreditRequest) -> LeaseResult<Invoice> {
        let _guard = self.invoice_locks.acquire(invoice_id, self.config.lock_timeout())?;
        let mut original = self.store.invoice(invoice_id)?;
        let lines = plan_credit(&original, request)?;
        let note = self.credit_note(&original, &lines, self.clock.today())?;
        apply_credit(&mut original, &lines);

        info!(
            invoice = %invoice_id,
            credit_note = %note.id,
            amount = %note.total_amount,
            state = ?original.state,
            "invoice credited"
        );
        self.store.commit(Transaction {
            invoices: vec![original, note.clone()],
            ..Transaction::default()
        })?;
        Ok(note)
    }

    /// Credit the charge invoices of a set, optionally only one receivable
    /// type or only `amount` in total.
    pub fn credit_invoice_set(
        &self,
        set_id: InvoiceSetId,
        receivable_type: Option<ReceivableTypeId>,
        amount: Option<Money>,
    ) -> LeaseResult<Vec<Invoice>> {
        let set = self.store.invoice_set(set_id)?;
        let _guards = self.lock_invoices(set.invoices.clone())?;
        let invoices = set
            .invoices
            .iter()
            .map(|id| self.store.invoice(*id))
            .collect::<LeaseResult<Vec<_>>>()?;

        let plan = plan_set_credit(&invoices, receivable_type, amount)?;
        let today = self.clock.today();
        let mut tx = Transaction::default();
        let mut notes = Vec::with_capacity(plan.len());
        for (invoice_id, lines) in plan {
            let Some(mut original) = invoices.iter().find(|inv| inv.id == invoice_id).cloned() else {
                continue;
            };
            let note = self.credit_note(&original, &lines, today)?;
            apply_credit(&mut original, &lines);
            tx.invoices.push(original);
            notes.push(note.clone());
            tx.invoices.push(note);
        }
        self.store.commit(tx)?;

        info!(set = %set_id, credit_notes = notes.len(), "invoice set credited");
        Ok(notes)
    }

    pub fn record_payment(
        &self,
        invoice_id: InvoiceId,
        paid_amount: Money,
        paid_date: NaiveDate,
        filing_code: Option<String>,
    ) -> LeaseResult<Invoice> {
        let _guard = self.invoice_locks.acquire(invoice_id, self.config.lock_timeout())?;
        let mut invoice = self.store.invoice(invoice_id)?;
        match (invoice.invoice_type, invoice.state) {
            (InvoiceType::CreditNote, _) => {
                return Err(LeaseError::InvalidOperation(format!(
                    "invoice {invoice_id} is a credit note"
                )))
            }
            (_, InvoiceState::Refunded) => {
                return Err(LeaseError::InvalidOperation(format!(
                    "invoice {invoice_id} is refunded"
                )))
            }
            _ => {}
        }

        invoice.payments.push(InvoicePayment {
            id: PaymentId(self.store.allocate_id(IdKind::Payment)),
            paid_amount,
            paid_date,
            filing_code,
        });
        invoice.update_amounts();
        self.store.commit(Transaction {
            invoices: vec![invoice.clone()],
            ..Transaction::default()
        })?;

        info!(
            invoice = %invoice_id,
            amount = %paid_amount,
            outstanding = %invoice.outstanding_amount,
            state = ?invoice.state,
            "payment recorded"
        );
        Ok(invoice)
    }
}
