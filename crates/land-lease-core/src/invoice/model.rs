use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::DateRange;
use crate::types::{
    round_money, ContactId, InvoiceId, InvoiceRowId, InvoiceSetId, LeaseId, Money, PaymentId,
    ReceivableTypeId, RentAdjustmentId, RentId, ServiceUnitId, TenantId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    Charge,
    CreditNote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceState {
    Open,
    Paid,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRow {
    pub id: InvoiceRowId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<TenantId>,
    pub receivable_type: ReceivableTypeId,
    pub billing_period: DateRange,
    pub amount: Money,
    /// Sum of credit-note rows issued against this row
    #[serde(default)]
    pub credited_amount: Money,
    /// Row of the charge this credit-note row offsets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credited_row: Option<InvoiceRowId>,
}

impl InvoiceRow {
    pub fn creditable_amount(&self) -> Money {
        (self.amount - self.credited_amount).max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePayment {
    pub id: PaymentId,
    /// Negative amounts reverse earlier payments
    pub paid_amount: Money,
    pub paid_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filing_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub lease: LeaseId,
    pub recipient: ContactId,
    pub invoice_type: InvoiceType,
    pub state: InvoiceState,
    pub due_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoicing_date: Option<NaiveDate>,
    pub billing_period: DateRange,
    pub total_amount: Money,
    pub billed_amount: Money,
    pub outstanding_amount: Money,
    /// Sum of credit notes issued against this invoice
    #[serde(default)]
    pub credited_amount: Money,
    pub service_unit: ServiceUnitId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credited_invoice: Option<InvoiceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_set: Option<InvoiceSetId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postpone_date: Option<NaiveDate>,
    #[serde(default)]
    pub collection_charge: Money,
    #[serde(default)]
    pub rows: Vec<InvoiceRow>,
    #[serde(default)]
    pub payments: Vec<InvoicePayment>,
}

impl Invoice {
    pub fn is_charge(&self) -> bool {
        self.invoice_type == InvoiceType::Charge
    }

    pub fn paid_amount(&self) -> Money {
        self.payments.iter().map(|payment| payment.paid_amount).sum()
    }

    /// Amount that can still be credited.
    pub fn creditable_amount(&self) -> Money {
        (self.total_amount - self.credited_amount).max(Decimal::ZERO)
    }

    pub fn is_fully_credited(&self) -> bool {
        self.is_charge() && !self.total_amount.is_zero() && self.creditable_amount().is_zero()
    }

    pub fn row(&self, id: InvoiceRowId) -> Option<&InvoiceRow> {
        self.rows.iter().find(|row| row.id == id)
    }

    /// Distinct tenants on the rows, in id order.
    pub fn tenants(&self) -> Vec<TenantId> {
        let mut tenants: Vec<TenantId> = self.rows.iter().filter_map(|row| row.tenant).collect();
        tenants.sort();
        tenants.dedup();
        tenants
    }

    /// Recompute totals, the outstanding amount and the lifecycle state.
    ///
    /// The result depends only on rows, collection charge, payments and
    /// credits, so calling it again changes nothing. REFUNDED is terminal.
    pub fn update_amounts(&mut self) {
        self.total_amount = round_money(self.rows.iter().map(|row| row.amount).sum());

        if self.invoice_type == InvoiceType::CreditNote {
            self.outstanding_amount = Decimal::ZERO;
            self.state = InvoiceState::Paid;
            return;
        }
        if self.state == InvoiceState::Refunded || self.is_fully_credited() {
            self.outstanding_amount = Decimal::ZERO;
            self.state = InvoiceState::Refunded;
            return;
        }

        let outstanding = self.total_amount + self.collection_charge
            - self.paid_amount()
            - self.credited_amount;
        self.outstanding_amount = outstanding.max(Decimal::ZERO);
        self.state = if outstanding <= Decimal::ZERO {
            InvoiceState::Paid
        } else {
            InvoiceState::Open
        };
    }
}

/// AMOUNT_TOTAL balance taken by one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedAdjustment {
    pub rent: RentId,
    pub adjustment: RentAdjustmentId,
    pub consumed: Money,
}

/// Invoices produced together for one `(lease, period, due date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSet {
    pub id: InvoiceSetId,
    pub lease: LeaseId,
    pub billing_period: DateRange,
    pub due_date: NaiveDate,
    pub invoices: Vec<InvoiceId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumed_adjustments: Vec<ConsumedAdjustment>,
}
