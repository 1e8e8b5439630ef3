//! Programmatic entry point of the engine.

use chrono::{Datelike, NaiveDate};
use std::sync::Arc;

use crate::calculation::LeaseCalculation;
use crate::calendar::DateRange;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::LeaseError;
use crate::index::IndexRegistry;
use crate::invoice::{CreditRequest, Invoice, InvoiceService, InvoiceSet};
use crate::review::ReviewFinding;
use crate::scheduler::{generate_for_due_date, DueDateRun};
use crate::store::LeaseStore;
use crate::tenant::ContactDirectory;
use crate::types::{InvoiceId, InvoiceRowId, InvoiceSetId, LeaseId, Money, ReceivableTypeId};
use crate::vat::VatRegistry;
use crate::LeaseResult;

#[cfg(feature = "export")]
use crate::export::{build_sales_order, SalesOrder, SalesOrderSink};
#[cfg(feature = "interest")]
use crate::interest::{calculate_penalty_interest, InterestBreakdown, InterestRateRegistry};

/// Assembles a [`LeaseEngine`] from its collaborators.
pub struct LeaseEngineBuilder {
    store: Arc<dyn LeaseStore>,
    contacts: Arc<dyn ContactDirectory>,
    indexes: Arc<IndexRegistry>,
    vat: Arc<VatRegistry>,
    #[cfg(feature = "interest")]
    interest_rates: Arc<InterestRateRegistry>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    #[cfg(feature = "export")]
    sink: Option<Arc<dyn SalesOrderSink>>,
}

impl LeaseEngineBuilder {
    pub fn indexes(mut self, indexes: Arc<IndexRegistry>) -> Self {
        self.indexes = indexes;
        self
    }

    pub fn vat(mut self, vat: Arc<VatRegistry>) -> Self {
        self.vat = vat;
        self
    }

    #[cfg(feature = "interest")]
    pub fn interest_rates(mut self, rates: Arc<InterestRateRegistry>) -> Self {
        self.interest_rates = rates;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[cfg(feature = "export")]
    pub fn sink(mut self, sink: Arc<dyn SalesOrderSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> LeaseEngine {
        let invoices = InvoiceService::new(
            Arc::clone(&self.store),
            Arc::clone(&self.indexes),
            Arc::clone(&self.clock),
            self.config,
        );
        LeaseEngine {
            store: self.store,
            contacts: self.contacts,
            indexes: self.indexes,
            vat: self.vat,
            #[cfg(feature = "interest")]
            interest_rates: self.interest_rates,
            clock: self.clock,
            invoices,
            #[cfg(feature = "export")]
            sink: self.sink,
        }
    }
}

pub struct LeaseEngine {
    store: Arc<dyn LeaseStore>,
    #[cfg_attr(not(feature = "export"), allow(dead_code))]
    contacts: Arc<dyn ContactDirectory>,
    indexes: Arc<IndexRegistry>,
    vat: Arc<VatRegistry>,
    #[cfg(feature = "interest")]
    interest_rates: Arc<InterestRateRegistry>,
    clock: Arc<dyn Clock>,
    invoices: InvoiceService,
    #[cfg(feature = "export")]
    sink: Option<Arc<dyn SalesOrderSink>>,
}

impl LeaseEngine {
    /// Start a builder with empty registries, the system clock and default
    /// configuration.
    pub fn builder(store: Arc<dyn LeaseStore>, contacts: Arc<dyn ContactDirectory>) -> LeaseEngineBuilder {
        LeaseEngineBuilder {
            store,
            contacts,
            indexes: Arc::new(IndexRegistry::default()),
            vat: Arc::new(VatRegistry::default()),
            #[cfg(feature = "interest")]
            interest_rates: Arc::new(InterestRateRegistry::default()),
            clock: Arc::new(SystemClock),
            config: EngineConfig::default(),
            #[cfg(feature = "export")]
            sink: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.invoices.config()
    }

    pub fn indexes(&self) -> &IndexRegistry {
        &self.indexes
    }

    pub fn vat(&self) -> &VatRegistry {
        &self.vat
    }

    #[cfg(feature = "interest")]
    pub fn interest_rates(&self) -> &InterestRateRegistry {
        &self.interest_rates
    }

    pub fn calculate_rent(&self, lease_id: LeaseId, range: &DateRange, dry_run: bool) -> LeaseResult<LeaseCalculation> {
        self.invoices.calculate_lease(lease_id, range, dry_run)
    }

    pub fn generate_invoices(
        &self,
        lease_id: LeaseId,
        period: &DateRange,
        due_date: NaiveDate,
    ) -> LeaseResult<InvoiceSet> {
        self.invoices.generate_invoices(lease_id, period, due_date)
    }

    /// Generate every lease with a rent due on `due_date`.
    pub fn generate_for_due_date(&self, due_date: NaiveDate) -> LeaseResult<DueDateRun> {
        generate_for_due_date(&self.invoices, self.store.as_ref(), due_date)
    }

    pub fn credit_full(&self, invoice_id: InvoiceId) -> LeaseResult<Invoice> {
        self.invoices.credit_invoice(invoice_id, &CreditRequest::Full)
    }

    pub fn credit_rows(
        &self,
        invoice_id: InvoiceId,
        rows: Vec<InvoiceRowId>,
        amount: Option<Money>,
    ) -> LeaseResult<Invoice> {
        self.invoices
            .credit_invoice(invoice_id, &CreditRequest::Rows { rows, amount })
    }

    pub fn credit_by_receivable_type(
        &self,
        invoice_id: InvoiceId,
        receivable_type: ReceivableTypeId,
    ) -> LeaseResult<Invoice> {
        self.invoices
            .credit_invoice(invoice_id, &CreditRequest::ReceivableType { receivable_type })
    }

    pub fn credit_amount(&self, invoice_id: InvoiceId, amount: Money) -> LeaseResult<Invoice> {
        self.invoices
            .credit_invoice(invoice_id, &CreditRequest::Amount { amount })
    }

    pub fn credit(&self, invoice_id: InvoiceId, request: &CreditRequest) -> LeaseResult<Invoice> {
        self.invoices.credit_invoice(invoice_id, request)
    }

    pub fn credit_invoice_set(
        &self,
        set_id: InvoiceSetId,
        receivable_type: Option<ReceivableTypeId>,
        amount: Option<Money>,
    ) -> LeaseResult<Vec<Invoice>> {
        self.invoices.credit_invoice_set(set_id, receivable_type, amount)
    }

    pub fn record_payment(
        &self,
        invoice_id: InvoiceId,
        paid_amount: Money,
        paid_date: NaiveDate,
        filing_code: Option<String>,
    ) -> LeaseResult<Invoice> {
        self.invoices
            .record_payment(invoice_id, paid_amount, paid_date, filing_code)
    }

    pub fn invoice(&self, invoice_id: InvoiceId) -> LeaseResult<Invoice> {
        self.store.invoice(invoice_id)
    }

    /// Review findings of the lease for the current calendar year.
    pub fn invoicing_review(&self, lease_id: LeaseId) -> LeaseResult<Vec<ReviewFinding>> {
        let year = self.clock.today().year();
        let period = DateRange::year(year)
            .ok_or_else(|| LeaseError::DateError(format!("year {year} out of range")))?;
        self.invoices.review(lease_id, &period)
    }

    pub fn review_period(&self, lease_id: LeaseId, period: &DateRange) -> LeaseResult<Vec<ReviewFinding>> {
        self.invoices.review(lease_id, period)
    }

    #[cfg(feature = "interest")]
    pub fn calculate_penalty_interest(
        &self,
        invoice_id: InvoiceId,
        at_date: NaiveDate,
    ) -> LeaseResult<InterestBreakdown> {
        let invoice = self.store.invoice(invoice_id)?;
        calculate_penalty_interest(&invoice, at_date, &self.interest_rates.snapshot())
    }

    #[cfg(feature = "export")]
    pub fn build_sales_order(&self, invoice_id: InvoiceId) -> LeaseResult<SalesOrder> {
        let invoice = self.store.invoice(invoice_id)?;
        let lease = self.store.lease(invoice.lease)?;
        let order = build_sales_order(
            &invoice,
            &lease,
            self.contacts.as_ref(),
            &self.vat.snapshot(),
            self.clock.today(),
        )?;
        Ok(order)
    }

    /// Build and send the sales orders of `ids` in order. Stops at the
    /// first failure; orders already sent stay sent.
    #[cfg(feature = "export")]
    pub fn export_invoices(&self, ids: &[InvoiceId]) -> LeaseResult<Vec<SalesOrder>> {
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| LeaseError::InvalidOperation("no sales order sink configured".into()))?;
        let mut sent = Vec::with_capacity(ids.len());
        for &id in ids {
            let order = self.build_sales_order(id)?;
            sink.send(&order)?;
            tracing::info!(invoice = %id, number = order.invoice_number, "sales order sent");
            sent.push(order);
        }
        Ok(sent)
    }
}
