use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::{LeaseError, StoreError};
use crate::invoice::{Invoice, InvoiceNumberSequences, InvoiceSet, ReceivableType, ServiceUnit};
use crate::lease::Lease;
use crate::tenant::{Contact, ContactDirectory};
use crate::types::{
    ContactId, InvoiceId, InvoiceSetId, LeaseId, ReceivableTypeId, ServiceUnitId,
};
use crate::LeaseResult;

use super::{IdKind, LeaseStore, Transaction};

#[derive(Debug, Default)]
struct Tables {
    leases: BTreeMap<LeaseId, Lease>,
    service_units: HashMap<ServiceUnitId, ServiceUnit>,
    receivable_types: HashMap<ReceivableTypeId, ReceivableType>,
    contacts: HashMap<ContactId, Contact>,
    invoices: BTreeMap<InvoiceId, Invoice>,
    invoice_sets: BTreeMap<InvoiceSetId, InvoiceSet>,
}

/// In-process store keyed by handle.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    sequences: InvoiceNumberSequences,
    next_ids: [AtomicU64; 4],
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            sequences: InvoiceNumberSequences::default(),
            next_ids: [
                AtomicU64::new(1),
                AtomicU64::new(1),
                AtomicU64::new(1),
                AtomicU64::new(1),
            ],
            available: AtomicBool::new(true),
        }
    }
}

fn id_slot(kind: IdKind) -> usize {
    match kind {
        IdKind::Invoice => 0,
        IdKind::InvoiceRow => 1,
        IdKind::InvoiceSet => 2,
        IdKind::Payment => 3,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_service_unit(&self, unit: ServiceUnit) {
        self.sequences.register(&unit);
        self.tables.write().service_units.insert(unit.id, unit);
    }

    pub fn insert_receivable_type(&self, receivable_type: ReceivableType) {
        self.tables
            .write()
            .receivable_types
            .insert(receivable_type.id, receivable_type);
    }

    pub fn insert_contact(&self, contact: Contact) {
        self.tables.write().contacts.insert(contact.id, contact);
    }

    pub fn insert_lease(&self, lease: Lease) {
        self.tables.write().leases.insert(lease.id, lease);
    }

    /// Insert an invoice recorded elsewhere, keeping id allocation ahead of it.
    pub fn insert_invoice(&self, invoice: Invoice) {
        self.bump(IdKind::Invoice, invoice.id.0);
        for row in &invoice.rows {
            self.bump(IdKind::InvoiceRow, row.id.0);
        }
        for payment in &invoice.payments {
            self.bump(IdKind::Payment, payment.id.0);
        }
        if let Some(number) = invoice.number {
            self.sequences.observe(invoice.service_unit, number);
        }
        self.tables.write().invoices.insert(invoice.id, invoice);
    }

    pub fn insert_invoice_set(&self, set: InvoiceSet) {
        self.bump(IdKind::InvoiceSet, set.id.0);
        self.tables.write().invoice_sets.insert(set.id, set);
    }

    pub fn leases(&self) -> Vec<Lease> {
        self.tables.read().leases.values().cloned().collect()
    }

    pub fn invoice_sets(&self) -> Vec<InvoiceSet> {
        self.tables.read().invoice_sets.values().cloned().collect()
    }

    /// Simulate an outage; every operation fails with `Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn invoices(&self) -> Vec<Invoice> {
        self.tables.read().invoices.values().cloned().collect()
    }

    fn bump(&self, kind: IdKind, used: u64) {
        self.next_ids[id_slot(kind)].fetch_max(used + 1, Ordering::SeqCst);
    }

    fn check_available(&self) -> LeaseResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".into()).into())
        }
    }

    fn validate(tables: &Tables, tx: &Transaction) -> Result<(), StoreError> {
        let mut numbers: HashSet<(ServiceUnitId, u64)> = tables
            .invoices
            .values()
            .filter(|invoice| !tx.invoices.iter().any(|new| new.id == invoice.id))
            .filter_map(|invoice| invoice.number.map(|n| (invoice.service_unit, n)))
            .collect();
        for invoice in &tx.invoices {
            if let Some(number) = invoice.number {
                if !numbers.insert((invoice.service_unit, number)) {
                    return Err(StoreError::Conflict(format!(
                        "invoice number {number} already used in service unit {}",
                        invoice.service_unit
                    )));
                }
            }
            if let Some(stored) = tables.invoices.get(&invoice.id) {
                if stored.number.is_some() && stored.number != invoice.number {
                    return Err(StoreError::Conflict(format!(
                        "invoice {} number is immutable",
                        invoice.id
                    )));
                }
            }
        }
        for lease in &tx.leases {
            if !tables.leases.contains_key(&lease.id) {
                return Err(StoreError::NotFound(format!("lease {}", lease.id)));
            }
        }
        Ok(())
    }
}

impl LeaseStore for MemoryStore {
    fn lease(&self, id: LeaseId) -> LeaseResult<Lease> {
        self.check_available()?;
        self.tables
            .read()
            .leases
            .get(&id)
            .cloned()
            .ok_or_else(|| LeaseError::not_found("lease", id.0))
    }

    fn lease_ids(&self) -> LeaseResult<Vec<LeaseId>> {
        self.check_available()?;
        Ok(self.tables.read().leases.keys().copied().collect())
    }

    fn service_unit(&self, id: ServiceUnitId) -> LeaseResult<ServiceUnit> {
        self.check_available()?;
        self.tables
            .read()
            .service_units
            .get(&id)
            .cloned()
            .ok_or_else(|| LeaseError::not_found("service unit", id.0))
    }

    fn receivable_type(&self, id: ReceivableTypeId) -> LeaseResult<ReceivableType> {
        self.check_available()?;
        self.tables
            .read()
            .receivable_types
            .get(&id)
            .cloned()
            .ok_or_else(|| LeaseError::not_found("receivable type", id.0))
    }

    fn invoice(&self, id: InvoiceId) -> LeaseResult<Invoice> {
        self.check_available()?;
        self.tables
            .read()
            .invoices
            .get(&id)
            .cloned()
            .ok_or_else(|| LeaseError::not_found("invoice", id.0))
    }

    fn invoices_for_lease(&self, lease: LeaseId) -> LeaseResult<Vec<Invoice>> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .invoices
            .values()
            .filter(|invoice| invoice.lease == lease)
            .cloned()
            .collect())
    }

    fn credit_notes_for(&self, invoice: InvoiceId) -> LeaseResult<Vec<Invoice>> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .invoices
            .values()
            .filter(|note| note.credited_invoice == Some(invoice))
            .cloned()
            .collect())
    }

    fn invoice_set(&self, id: InvoiceSetId) -> LeaseResult<InvoiceSet> {
        self.check_available()?;
        self.tables
            .read()
            .invoice_sets
            .get(&id)
            .cloned()
            .ok_or_else(|| LeaseError::not_found("invoice set", id.0))
    }

    fn invoice_sets_for_lease(&self, lease: LeaseId) -> LeaseResult<Vec<InvoiceSet>> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .invoice_sets
            .values()
            .filter(|set| set.lease == lease)
            .cloned()
            .collect())
    }

    fn allocate_id(&self, kind: IdKind) -> u64 {
        self.next_ids[id_slot(kind)].fetch_add(1, Ordering::SeqCst)
    }

    fn next_invoice_number(&self, unit: ServiceUnitId) -> LeaseResult<u64> {
        self.check_available()?;
        self.sequences.next(unit)
    }

    fn commit(&self, tx: Transaction) -> LeaseResult<()> {
        self.check_available()?;
        let mut tables = self.tables.write();
        Self::validate(&tables, &tx)?;
        for lease in tx.leases {
            tables.leases.insert(lease.id, lease);
        }
        for invoice in tx.invoices {
            tables.invoices.insert(invoice.id, invoice);
        }
        for set in tx.invoice_sets {
            tables.invoice_sets.insert(set.id, set);
        }
        Ok(())
    }
}

impl ContactDirectory for MemoryStore {
    fn contact(&self, id: ContactId) -> Option<Contact> {
        self.tables.read().contacts.get(&id).cloned()
    }
}
