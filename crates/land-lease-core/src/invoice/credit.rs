//! Credit-note planning.
//!
//! Planning only reads invoices. The service turns a plan into a credit note
//! and applies it to the original, so a refused request changes nothing.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::LeaseError;
use crate::types::{
    round_money, InvoiceId, InvoiceRowId, Money, ReceivableTypeId, TenantId,
};
use crate::LeaseResult;

use super::model::{Invoice, InvoiceRow, InvoiceState, InvoiceType};

/// What to credit on a single invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CreditRequest {
    Full,
    Rows {
        rows: Vec<InvoiceRowId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<Money>,
    },
    ReceivableType {
        receivable_type: ReceivableTypeId,
    },
    Amount {
        amount: Money,
    },
}

/// Amount credited against one row of the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLine {
    pub row: InvoiceRowId,
    pub amount: Money,
}

/// Split `amount` proportionally to `weights` at cent precision.
///
/// The last positive weight absorbs the rounding residual; no part exceeds
/// its weight when `amount` does not exceed the weight total.
pub fn spread(amount: Money, weights: &[Money]) -> Vec<Money> {
    let total: Decimal = weights.iter().copied().filter(|w| *w > Decimal::ZERO).sum();
    let mut parts = vec![Decimal::ZERO; weights.len()];
    if total.is_zero() {
        return parts;
    }
    let Some(last) = weights.iter().rposition(|w| *w > Decimal::ZERO) else {
        return parts;
    };

    let mut assigned = Decimal::ZERO;
    for (i, weight) in weights.iter().enumerate() {
        if *weight <= Decimal::ZERO {
            continue;
        }
        parts[i] = if i == last {
            amount - assigned
        } else {
            round_money(amount * *weight / total)
        };
        assigned += parts[i];
    }

    // Rounding may push the sink a cent over its weight; hand the excess back.
    let mut excess = parts[last] - weights[last];
    if amount <= total && excess > Decimal::ZERO {
        parts[last] = weights[last];
        for (i, weight) in weights.iter().enumerate() {
            if excess <= Decimal::ZERO {
                break;
            }
            let room = *weight - parts[i];
            if room > Decimal::ZERO {
                let take = room.min(excess);
                parts[i] += take;
                excess -= take;
            }
        }
    }
    parts
}

fn ensure_creditable(invoice: &Invoice) -> LeaseResult<()> {
    if invoice.invoice_type == InvoiceType::CreditNote {
        return Err(LeaseError::InvalidOperation(format!(
            "invoice {} is a credit note and cannot be credited",
            invoice.id
        )));
    }
    if invoice.state == InvoiceState::Refunded {
        return Err(LeaseError::InvalidOperation(format!(
            "invoice {} is already fully credited",
            invoice.id
        )));
    }
    Ok(())
}

fn ensure_positive(amount: Money) -> LeaseResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LeaseError::InvalidInput {
            field: "amount".into(),
            reason: format!("credit amount must be positive, got {amount}"),
        });
    }
    Ok(())
}

fn full_lines<'a>(rows: impl Iterator<Item = &'a InvoiceRow>) -> Vec<CreditLine> {
    rows.filter(|row| row.creditable_amount() > Decimal::ZERO)
        .map(|row| CreditLine {
            row: row.id,
            amount: row.creditable_amount(),
        })
        .collect()
}

fn spread_lines(amount: Money, rows: &[&InvoiceRow]) -> LeaseResult<Vec<CreditLine>> {
    ensure_positive(amount)?;
    let amount = round_money(amount);
    let weights: Vec<Money> = rows.iter().map(|row| row.creditable_amount()).collect();
    let remaining: Money = weights.iter().copied().sum();
    if amount > remaining {
        return Err(LeaseError::CreditExceedsRemaining {
            requested: amount,
            remaining,
        });
    }
    Ok(rows
        .iter()
        .zip(spread(amount, &weights))
        .filter(|(_, part)| *part > Decimal::ZERO)
        .map(|(row, part)| CreditLine {
            row: row.id,
            amount: part,
        })
        .collect())
}

/// Lines a credit note for `request` would carry. Fails without side
/// effects when the request cannot be honoured.
pub fn plan_credit(invoice: &Invoice, request: &CreditRequest) -> LeaseResult<Vec<CreditLine>> {
    ensure_creditable(invoice)?;

    let lines = match request {
        CreditRequest::Full => full_lines(invoice.rows.iter()),
        CreditRequest::Rows { rows, amount } => {
            // A row listed twice is credited once
            let mut seen = BTreeSet::new();
            let selected = rows
                .iter()
                .filter(|id| seen.insert(**id))
                .map(|id| {
                    invoice
                        .row(*id)
                        .ok_or_else(|| LeaseError::not_found("invoice row", id.0))
                })
                .collect::<LeaseResult<Vec<_>>>()?;
            match amount {
                Some(amount) => spread_lines(*amount, &selected)?,
                None => full_lines(selected.into_iter()),
            }
        }
        CreditRequest::ReceivableType { receivable_type } => {
            let selected: Vec<&InvoiceRow> = invoice
                .rows
                .iter()
                .filter(|row| row.receivable_type == *receivable_type)
                .collect();
            if selected.is_empty() {
                return Err(LeaseError::InvalidOperation(format!(
                    "invoice {} has no rows of receivable type {receivable_type}",
                    invoice.id
                )));
            }
            full_lines(selected.into_iter())
        }
        CreditRequest::Amount { amount } => {
            let remaining = invoice.creditable_amount();
            if round_money(*amount) > remaining {
                return Err(LeaseError::CreditExceedsRemaining {
                    requested: round_money(*amount),
                    remaining,
                });
            }
            let rows: Vec<&InvoiceRow> = invoice.rows.iter().collect();
            spread_lines(*amount, &rows)?
        }
    };

    if lines.is_empty() {
        return Err(LeaseError::InvalidOperation(format!(
            "nothing left to credit on invoice {}",
            invoice.id
        )));
    }
    Ok(lines)
}

/// Credit lines per member invoice of an invoice set.
///
/// Without `amount` every eligible row is credited in full. With `amount`
/// the total is split between tenants by their creditable row sums (tenant
/// id order, last tenant takes the residual) and then across each tenant's
/// rows.
pub fn plan_set_credit(
    invoices: &[Invoice],
    receivable_type: Option<ReceivableTypeId>,
    amount: Option<Money>,
) -> LeaseResult<Vec<(InvoiceId, Vec<CreditLine>)>> {
    let eligible: Vec<&Invoice> = invoices
        .iter()
        .filter(|invoice| invoice.is_charge() && invoice.state != InvoiceState::Refunded)
        .collect();
    if eligible.is_empty() {
        return Err(LeaseError::InvalidOperation(
            "invoice set has no creditable charge invoices".into(),
        ));
    }

    let rows: Vec<(InvoiceId, &InvoiceRow)> = eligible
        .iter()
        .flat_map(|invoice| invoice.rows.iter().map(move |row| (invoice.id, row)))
        .filter(|(_, row)| receivable_type.map_or(true, |rt| row.receivable_type == rt))
        .filter(|(_, row)| row.creditable_amount() > Decimal::ZERO)
        .collect();
    if rows.is_empty() {
        return Err(LeaseError::InvalidOperation(
            "invoice set has nothing left to credit".into(),
        ));
    }

    let mut lines: BTreeMap<InvoiceId, Vec<CreditLine>> = BTreeMap::new();
    match amount {
        None => {
            for (invoice, row) in &rows {
                lines.entry(*invoice).or_default().push(CreditLine {
                    row: row.id,
                    amount: row.creditable_amount(),
                });
            }
        }
        Some(amount) => {
            ensure_positive(amount)?;
            let amount = round_money(amount);
            let mut by_tenant: BTreeMap<Option<TenantId>, Vec<(InvoiceId, &InvoiceRow)>> =
                BTreeMap::new();
            for (invoice, row) in &rows {
                by_tenant.entry(row.tenant).or_default().push((*invoice, row));
            }
            let tenant_weights: Vec<Money> = by_tenant
                .values()
                .map(|rows| rows.iter().map(|(_, row)| row.creditable_amount()).sum())
                .collect();
            let remaining: Money = tenant_weights.iter().copied().sum();
            if amount > remaining {
                return Err(LeaseError::CreditExceedsRemaining {
                    requested: amount,
                    remaining,
                });
            }
            for (tenant_rows, tenant_amount) in by_tenant.values().zip(spread(amount, &tenant_weights)) {
                let weights: Vec<Money> =
                    tenant_rows.iter().map(|(_, row)| row.creditable_amount()).collect();
                for ((invoice, row), part) in tenant_rows.iter().zip(spread(tenant_amount, &weights)) {
                    if part > Decimal::ZERO {
                        lines.entry(*invoice).or_default().push(CreditLine {
                            row: row.id,
                            amount: part,
                        });
                    }
                }
            }
        }
    }
    Ok(lines.into_iter().collect())
}

/// Record `lines` on the original charge and recompute its state.
pub fn apply_credit(original: &mut Invoice, lines: &[CreditLine]) {
    for line in lines {
        if let Some(row) = original.rows.iter_mut().find(|row| row.id == line.row) {
            row.credited_amount += line.amount;
        }
    }
    original.credited_amount += lines.iter().map(|line| line.amount).sum::<Decimal>();
    original.update_amounts();
}

/// Credit note mirroring the credited rows of `original`.
pub fn build_credit_note<F>(
    original: &Invoice,
    lines: &[CreditLine],
    id: InvoiceId,
    mut next_row_id: F,
    number: u64,
    invoicing_date: NaiveDate,
) -> Invoice
where
    F: FnMut() -> InvoiceRowId,
{
    let rows = lines
        .iter()
        .filter_map(|line| {
            let source = original.row(line.row)?;
            Some(InvoiceRow {
                id: next_row_id(),
                tenant: source.tenant,
                receivable_type: source.receivable_type,
                billing_period: source.billing_period,
                amount: line.amount,
                credited_amount: Decimal::ZERO,
                credited_row: Some(source.id),
            })
        })
        .collect();

    let mut note = Invoice {
        id,
        lease: original.lease,
        recipient: original.recipient,
        invoice_type: InvoiceType::CreditNote,
        state: InvoiceState::Paid,
        due_date: original.due_date,
        invoicing_date: Some(invoicing_date),
        billing_period: original.billing_period,
        total_amount: Decimal::ZERO,
        billed_amount: Decimal::ZERO,
        outstanding_amount: Decimal::ZERO,
        credited_amount: Decimal::ZERO,
        service_unit: original.service_unit,
        number: Some(number),
        credited_invoice: Some(original.id),
        invoice_set: original.invoice_set,
        postpone_date: None,
        collection_charge: Decimal::ZERO,
        rows,
        payments: Vec::new(),
    };
    note.update_amounts();
    note.billed_amount = note.total_amount;
    note
}
