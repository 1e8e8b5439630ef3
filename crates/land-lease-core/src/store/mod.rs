//! Persistence boundary of the engine.

mod memory;

pub use memory::MemoryStore;

use crate::invoice::{Invoice, InvoiceSet, ReceivableType, ServiceUnit};
use crate::lease::Lease;
use crate::types::{InvoiceId, InvoiceSetId, LeaseId, ReceivableTypeId, ServiceUnitId};
use crate::LeaseResult;

/// Kinds of record handles the store hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Invoice,
    InvoiceRow,
    InvoiceSet,
    Payment,
}

/// Records written together or not at all.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    pub leases: Vec<Lease>,
    pub invoices: Vec<Invoice>,
    pub invoice_sets: Vec<InvoiceSet>,
}

impl Transaction {
    pub fn is_empty(&self) -> bool {
        self.leases.is_empty() && self.invoices.is_empty() && self.invoice_sets.is_empty()
    }
}

pub trait LeaseStore: Send + Sync {
    fn lease(&self, id: LeaseId) -> LeaseResult<Lease>;
    fn lease_ids(&self) -> LeaseResult<Vec<LeaseId>>;
    fn service_unit(&self, id: ServiceUnitId) -> LeaseResult<ServiceUnit>;
    fn receivable_type(&self, id: ReceivableTypeId) -> LeaseResult<ReceivableType>;

    fn invoice(&self, id: InvoiceId) -> LeaseResult<Invoice>;
    fn invoices_for_lease(&self, lease: LeaseId) -> LeaseResult<Vec<Invoice>>;
    /// Credit notes issued against `invoice`.
    fn credit_notes_for(&self, invoice: InvoiceId) -> LeaseResult<Vec<Invoice>>;
    fn invoice_set(&self, id: InvoiceSetId) -> LeaseResult<InvoiceSet>;
    fn invoice_sets_for_lease(&self, lease: LeaseId) -> LeaseResult<Vec<InvoiceSet>>;

    fn allocate_id(&self, kind: IdKind) -> u64;
    fn next_invoice_number(&self, unit: ServiceUnitId) -> LeaseResult<u64>;

    /// Apply every record of `tx` atomically.
    fn commit(&self, tx: Transaction) -> LeaseResult<()>;
}
