//! Sales-order records for the external financial system.
//!
//! Building a sales order is read-only: the invoice is never mutated and the
//! transport belongs to a [`SalesOrderSink`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::invoice::Invoice;
use crate::lease::Lease;
use crate::tenant::{ContactDirectory, Tenant};
use crate::types::{ContactId, InvoiceId, Money, Percent, ReceivableTypeId};
use crate::vat::{VatRate, VatTable};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    #[error("Invoice {invoice} has no number")]
    MissingNumber { invoice: InvoiceId },

    #[error("Recipient contact {contact} not found")]
    RecipientNotFound { contact: ContactId },

    #[error("No VAT rate in effect on {date}")]
    MissingVatRate { date: NaiveDate },

    #[error("Export sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("Export rejected: {0}")]
    Rejected(String),
}

impl ExportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ExportError::SinkUnavailable(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientBlock {
    pub name: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderLine {
    pub receivable_type: ReceivableTypeId,
    pub amount: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_rate: Option<Percent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrder {
    pub invoice_number: u64,
    pub recipient_block: RecipientBlock,
    pub bill_text: String,
    pub buyer_reference: String,
    pub line_items: Vec<SalesOrderLine>,
    pub due_date: NaiveDate,
    pub invoicing_date: NaiveDate,
}

/// Transport to the financial system.
pub trait SalesOrderSink: Send + Sync {
    fn send(&self, order: &SalesOrder) -> Result<(), ExportError>;
}

/// Date whose VAT rate applies when no advance payment settles the invoice:
/// billing period end, else invoicing date, else today.
pub fn vat_reference_date(
    billing_period_end: Option<NaiveDate>,
    invoicing_date: Option<NaiveDate>,
    today: NaiveDate,
) -> NaiveDate {
    billing_period_end.or(invoicing_date).unwrap_or(today)
}

/// Rate for a VAT-subject invoice.
///
/// An invoice paid in full in advance of the rate change that applies to it
/// keeps the rate in effect on the clearing payment date.
fn select_vat_rate<'a>(
    invoice: &Invoice,
    vat: &'a VatTable,
    today: NaiveDate,
) -> Result<&'a VatRate, ExportError> {
    let reference_date = vat_reference_date(
        Some(invoice.billing_period.end()),
        invoice.invoicing_date,
        today,
    );
    let applicable = vat
        .for_date(reference_date)
        .ok_or(ExportError::MissingVatRate { date: reference_date })?;

    let mut payments: Vec<_> = invoice
        .payments
        .iter()
        .filter(|payment| payment.paid_date < applicable.start_date)
        .collect();
    payments.sort_by_key(|payment| payment.paid_date);
    let mut paid = Money::ZERO;
    for payment in payments {
        paid += payment.paid_amount;
        if invoice.total_amount > Money::ZERO && paid >= invoice.total_amount {
            return vat
                .for_date(payment.paid_date)
                .ok_or(ExportError::MissingVatRate { date: payment.paid_date });
        }
    }
    Ok(applicable)
}

fn bill_text(lease: &Lease) -> String {
    lease
        .billing_address()
        .map(|address| address.address.clone())
        .unwrap_or_default()
}

fn buyer_reference(invoice: &Invoice, lease: &Lease, today: NaiveDate) -> String {
    let mut tenants: Vec<&Tenant> = invoice
        .tenants()
        .into_iter()
        .filter_map(|id| lease.tenant(id))
        .collect();
    tenants.sort_by_key(|tenant| tenant.id);

    if let [tenant] = tenants.as_slice() {
        return tenant.reference.clone().unwrap_or_default();
    }

    let matching: Vec<&&Tenant> = tenants
        .iter()
        .filter(|tenant| {
            tenant
                .contacts_active_on(today)
                .any(|contact| contact == invoice.recipient)
        })
        .collect();
    if let [tenant] = matching.as_slice() {
        return tenant.reference.clone().unwrap_or_default();
    }

    tenants
        .iter()
        .filter_map(|tenant| tenant.reference.as_deref())
        .filter(|reference| !reference.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sales order for a numbered invoice.
pub fn build_sales_order(
    invoice: &Invoice,
    lease: &Lease,
    contacts: &dyn ContactDirectory,
    vat: &VatTable,
    today: NaiveDate,
) -> Result<SalesOrder, ExportError> {
    let invoice_number = invoice
        .number
        .ok_or(ExportError::MissingNumber { invoice: invoice.id })?;
    let recipient = contacts
        .contact(invoice.recipient)
        .ok_or(ExportError::RecipientNotFound {
            contact: invoice.recipient,
        })?;

    let vat_rate = if lease.is_subject_to_vat {
        Some(select_vat_rate(invoice, vat, today)?.rate)
    } else {
        None
    };

    let line_items = invoice
        .rows
        .iter()
        .map(|row| SalesOrderLine {
            receivable_type: row.receivable_type,
            amount: row.amount,
            vat_rate,
        })
        .collect();

    Ok(SalesOrder {
        invoice_number,
        recipient_block: RecipientBlock {
            name: recipient.name,
            address: recipient.address,
            postal_code: recipient.postal_code,
            city: recipient.city,
            customer_number: recipient.customer_number,
        },
        bill_text: bill_text(lease),
        buyer_reference: buyer_reference(invoice, lease, today),
        line_items,
        due_date: invoice.due_date,
        invoicing_date: invoice.invoicing_date.unwrap_or(today),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::DateRange;
    use crate::invoice::{InvoicePayment, InvoiceRow, InvoiceState, InvoiceType};
    use crate::lease::{LeaseArea, LeaseAreaAddress};
    use crate::tenant::{Contact, Share, TenantContact, TenantContactType};
    use crate::types::{InvoiceRowId, LeaseId, PaymentId, ServiceUnitId, TenantId};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    struct Directory(HashMap<ContactId, Contact>);

    impl ContactDirectory for Directory {
        fn contact(&self, id: ContactId) -> Option<Contact> {
            self.0.get(&id).cloned()
        }
    }

    fn directory() -> Directory {
        let contact = Contact {
            id: ContactId(10),
            name: "Oy Tontti Ab".into(),
            address: "Satamakatu 1".into(),
            postal_code: "00100".into(),
            city: "Helsinki".into(),
            customer_number: Some("C-1".into()),
        };
        Directory(HashMap::from([(contact.id, contact)]))
    }

    fn vat() -> VatTable {
        VatTable::new(vec![
            VatRate {
                start_date: d(2013, 1, 1),
                rate: dec!(24),
            },
            VatRate {
                start_date: d(2024, 9, 1),
                rate: dec!(25.5),
            },
        ])
        .unwrap()
    }

    fn tenant(id: u64, contact: u64, reference: &str) -> Tenant {
        Tenant {
            id: TenantId(id),
            share: Share::new(1, 2),
            reference: Some(reference.into()),
            rent_shares: Vec::new(),
            contacts: vec![TenantContact {
                contact: ContactId(contact),
                contact_type: TenantContactType::Tenant,
                start_date: None,
                end_date: None,
            }],
        }
    }

    fn lease(tenants: Vec<Tenant>, addresses: Vec<LeaseAreaAddress>) -> Lease {
        let mut lease = Lease::new(LeaseId(1), "A1-1", ServiceUnitId(1));
        lease.is_subject_to_vat = true;
        lease.tenants = tenants;
        lease.areas.push(LeaseArea {
            identifier: "91-1-1-1".into(),
            addresses,
        });
        lease
    }

    fn address(street: &str, is_primary: bool) -> LeaseAreaAddress {
        LeaseAreaAddress {
            address: street.into(),
            postal_code: "00100".into(),
            city: "Helsinki".into(),
            is_primary,
        }
    }

    fn invoice(tenants: &[u64]) -> Invoice {
        let period = DateRange::new(d(2024, 7, 1), d(2024, 12, 31)).unwrap();
        let rows = tenants
            .iter()
            .map(|&tenant| InvoiceRow {
                id: InvoiceRowId(tenant),
                tenant: Some(TenantId(tenant)),
                receivable_type: crate::types::ReceivableTypeId(1),
                billing_period: period,
                amount: dec!(500),
                credited_amount: Decimal::ZERO,
                credited_row: None,
            })
            .collect::<Vec<_>>();
        let total = rows.iter().map(|row| row.amount).sum();
        let mut invoice = Invoice {
            id: InvoiceId(1),
            lease: LeaseId(1),
            recipient: ContactId(10),
            invoice_type: InvoiceType::Charge,
            state: InvoiceState::Open,
            due_date: d(2024, 7, 1),
            invoicing_date: Some(d(2024, 6, 1)),
            billing_period: period,
            total_amount: total,
            billed_amount: total,
            outstanding_amount: total,
            credited_amount: Decimal::ZERO,
            service_unit: ServiceUnitId(1),
            number: Some(1_000_123),
            credited_invoice: None,
            invoice_set: None,
            postpone_date: None,
            collection_charge: Decimal::ZERO,
            rows,
            payments: Vec::new(),
        };
        invoice.update_amounts();
        invoice
    }

    #[test]
    fn test_sales_order_uses_period_end_rate() {
        let l = lease(vec![tenant(1, 10, "PO-1")], vec![address("Satamakatu 1", true)]);
        let inv = invoice(&[1]);
        let order = build_sales_order(&inv, &l, &directory(), &vat(), d(2024, 6, 15)).unwrap();
        assert_eq!(order.invoice_number, 1_000_123);
        assert_eq!(order.recipient_block.name, "Oy Tontti Ab");
        assert_eq!(order.bill_text, "Satamakatu 1");
        assert_eq!(order.buyer_reference, "PO-1");
        assert_eq!(order.line_items.len(), 1);
        assert_eq!(order.line_items[0].vat_rate, Some(dec!(25.5)));
        assert_eq!(order.invoicing_date, d(2024, 6, 1));
    }

    #[test]
    fn test_advance_payment_keeps_old_rate() {
        let l = lease(vec![tenant(1, 10, "PO-1")], Vec::new());
        let mut inv = invoice(&[1]);
        inv.payments.push(InvoicePayment {
            id: PaymentId(1),
            paid_amount: dec!(500),
            paid_date: d(2024, 8, 20),
            filing_code: None,
        });
        inv.update_amounts();
        let before = inv.clone();
        let order = build_sales_order(&inv, &l, &directory(), &vat(), d(2024, 9, 15)).unwrap();
        assert_eq!(order.line_items[0].vat_rate, Some(dec!(24)));
        assert_eq!(order.bill_text, "");
        assert_eq!(inv, before);
    }

    #[test]
    fn test_no_vat_for_exempt_lease() {
        let mut l = lease(vec![tenant(1, 10, "PO-1")], vec![address("Katu 2", false)]);
        l.is_subject_to_vat = false;
        let order = build_sales_order(&invoice(&[1]), &l, &directory(), &vat(), d(2024, 6, 15)).unwrap();
        assert_eq!(order.line_items[0].vat_rate, None);
        assert_eq!(order.bill_text, "Katu 2");
    }

    #[test]
    fn test_buyer_reference_with_several_tenants() {
        let inv = invoice(&[1, 2]);
        let today = d(2024, 6, 15);

        let recipient_matches = lease(
            vec![tenant(1, 11, "PO-1"), tenant(2, 10, "PO-2")],
            Vec::new(),
        );
        let order = build_sales_order(&inv, &recipient_matches, &directory(), &vat(), today).unwrap();
        assert_eq!(order.buyer_reference, "PO-2");

        let no_match = lease(
            vec![tenant(2, 12, "PO-2"), tenant(1, 11, "PO-1")],
            Vec::new(),
        );
        let order = build_sales_order(&inv, &no_match, &directory(), &vat(), today).unwrap();
        assert_eq!(order.buyer_reference, "PO-1 PO-2");
    }

    #[test]
    fn test_missing_recipient_and_number() {
        let l = lease(vec![tenant(1, 10, "PO-1")], Vec::new());
        let mut inv = invoice(&[1]);
        inv.recipient = ContactId(99);
        assert_eq!(
            build_sales_order(&inv, &l, &directory(), &vat(), d(2024, 6, 15)),
            Err(ExportError::RecipientNotFound { contact: ContactId(99) })
        );
        inv.number = None;
        assert!(matches!(
            build_sales_order(&inv, &l, &directory(), &vat(), d(2024, 6, 15)),
            Err(ExportError::MissingNumber { .. })
        ));
        assert!(!ExportError::Rejected("bad".into()).is_transient());
        assert!(ExportError::SinkUnavailable("down".into()).is_transient());
    }

    #[test]
    fn test_vat_reference_date_precedence() {
        let today = d(2024, 1, 1);
        assert_eq!(vat_reference_date(Some(d(2024, 3, 31)), Some(d(2024, 2, 1)), today), d(2024, 3, 31));
        assert_eq!(vat_reference_date(None, Some(d(2024, 2, 1)), today), d(2024, 2, 1));
        assert_eq!(vat_reference_date(None, None, today), today);
    }
}
