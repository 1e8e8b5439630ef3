//! Matching freshly drafted invoices against invoices already on file.

use crate::calendar::DateRange;
use crate::types::{InvoiceId, LeaseId, Money, ReceivableTypeId, TenantId};

use super::generator::DraftInvoice;
use super::model::{Invoice, InvoiceState, InvoiceType};

type RowKey = (Option<TenantId>, ReceivableTypeId);

fn sorted<T: Ord>(mut items: Vec<T>) -> Vec<T> {
    items.sort();
    items
}

/// Multiset of `(tenant, receivable type)` over the rows.
fn invoice_signature(invoice: &Invoice) -> Vec<RowKey> {
    sorted(
        invoice
            .rows
            .iter()
            .map(|row| (row.tenant, row.receivable_type))
            .collect(),
    )
}

fn draft_signature(draft: &DraftInvoice) -> Vec<RowKey> {
    sorted(
        draft
            .rows
            .iter()
            .map(|row| (Some(row.tenant), row.receivable_type))
            .collect(),
    )
}

/// Two invoices are for the same recipient and tenants.
pub fn invoices_match(a: &Invoice, b: &Invoice) -> bool {
    a.invoice_type == b.invoice_type
        && a.recipient == b.recipient
        && a.billing_period == b.billing_period
        && a.lease == b.lease
        && invoice_signature(a) == invoice_signature(b)
}

/// What generation does with one draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// An identical invoice exists; keep it
    Reuse(InvoiceId),
    /// A matching invoice with different amounts exists; credit it and bill anew
    Supersede(InvoiceId),
    Create,
}

/// Decide how `draft` relates to `existing` invoices of `lease` for `period`.
/// Fully credited charges and invoices listed in `taken` are ignored.
pub fn match_draft(
    draft: &DraftInvoice,
    lease: LeaseId,
    period: &DateRange,
    existing: &[Invoice],
    taken: &[InvoiceId],
) -> MatchOutcome {
    let signature = draft_signature(draft);
    let candidate = existing.iter().find(|invoice| {
        invoice.invoice_type == InvoiceType::Charge
            && invoice.state != InvoiceState::Refunded
            && invoice.lease == lease
            && invoice.recipient == draft.recipient
            && invoice.billing_period == *period
            && !taken.contains(&invoice.id)
            && invoice_signature(invoice) == signature
    });

    match candidate {
        Some(invoice) if same_amounts(invoice, draft) => MatchOutcome::Reuse(invoice.id),
        Some(invoice) => MatchOutcome::Supersede(invoice.id),
        None => MatchOutcome::Create,
    }
}

fn same_amounts(invoice: &Invoice, draft: &DraftInvoice) -> bool {
    let stored: Vec<(Option<TenantId>, ReceivableTypeId, DateRange, Money)> = sorted(
        invoice
            .rows
            .iter()
            .map(|row| (row.tenant, row.receivable_type, row.billing_period, row.amount))
            .collect(),
    );
    let drafted: Vec<(Option<TenantId>, ReceivableTypeId, DateRange, Money)> = sorted(
        draft
            .rows
            .iter()
            .map(|row| (Some(row.tenant), row.receivable_type, row.billing_period, row.amount))
            .collect(),
    );
    stored == drafted
}
