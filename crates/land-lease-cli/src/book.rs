//! Lease-book snapshots: everything one CLI invocation computes with.

use chrono::NaiveDate;
use clap::Args;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use land_lease_core::clock::{Clock, FixedClock, SystemClock};
use land_lease_core::config::EngineConfig;
use land_lease_core::export::SalesOrderSink;
use land_lease_core::index::{Index, IndexRegistry, IndexTable};
use land_lease_core::interest::{InterestRate, InterestRateRegistry, InterestRateTable};
use land_lease_core::invoice::{Invoice, InvoiceSet, ReceivableType, ServiceUnit};
use land_lease_core::lease::Lease;
use land_lease_core::store::MemoryStore;
use land_lease_core::tenant::Contact;
use land_lease_core::vat::{VatRate, VatRegistry, VatTable};
use land_lease_core::LeaseEngine;

use crate::input;

/// Serialized state of the lease register and its reference tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaseBook {
    #[serde(default)]
    pub service_units: Vec<ServiceUnit>,
    #[serde(default)]
    pub receivable_types: Vec<ReceivableType>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub leases: Vec<Lease>,
    #[serde(default)]
    pub invoices: Vec<Invoice>,
    #[serde(default)]
    pub invoice_sets: Vec<InvoiceSet>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(default)]
    pub vat_rates: Vec<VatRate>,
    #[serde(default)]
    pub interest_rates: Vec<InterestRate>,
}

/// Where the book comes from and where it goes.
#[derive(Args, Debug, Clone, Default)]
pub struct BookArgs {
    /// Lease book snapshot (JSON or YAML); read from stdin when omitted
    #[arg(long)]
    pub book: Option<String>,

    /// Write the updated book to this path after the command
    #[arg(long)]
    pub save: Option<String>,

    /// Run as if today were this date (YYYY-MM-DD)
    #[arg(long)]
    pub today: Option<NaiveDate>,
}

impl LeaseBook {
    pub fn load(args: &BookArgs) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(ref path) = args.book {
            input::file::read_document(path)
        } else if let Some(book) = input::stdin::read_stdin()? {
            Ok(book)
        } else {
            Err("--book is required (or pipe a lease book on stdin)".into())
        }
    }

    /// Fill an in-memory store with the book's records. Service units go in
    /// first so that stored invoice numbers advance their sequences.
    pub fn to_store(&self) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for unit in &self.service_units {
            store.insert_service_unit(unit.clone());
        }
        for receivable_type in &self.receivable_types {
            store.insert_receivable_type(receivable_type.clone());
        }
        for contact in &self.contacts {
            store.insert_contact(contact.clone());
        }
        for lease in &self.leases {
            store.insert_lease(lease.clone());
        }
        for invoice in &self.invoices {
            store.insert_invoice(invoice.clone());
        }
        for set in &self.invoice_sets {
            store.insert_invoice_set(set.clone());
        }
        debug!(
            leases = self.leases.len(),
            invoices = self.invoices.len(),
            "lease book loaded"
        );
        store
    }

    /// Take over the mutable records of `store`.
    pub fn absorb(&mut self, store: &MemoryStore) {
        self.leases = store.leases();
        self.invoices = store.invoices();
        self.invoice_sets = store.invoice_sets();
    }
}

/// A book opened for one command.
pub struct Session {
    pub book: LeaseBook,
    pub store: Arc<MemoryStore>,
    pub engine: LeaseEngine,
    save: Option<String>,
}

impl Session {
    pub fn open(args: &BookArgs) -> Result<Self, Box<dyn std::error::Error>> {
        Self::open_with_sink(args, None)
    }

    pub fn open_with_sink(
        args: &BookArgs,
        sink: Option<Arc<dyn SalesOrderSink>>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let book = LeaseBook::load(args)?;
        let config = EngineConfig::from_env()?;
        let store = book.to_store();

        let clock: Arc<dyn Clock> = match args.today {
            Some(today) => Arc::new(FixedClock(today)),
            None => Arc::new(SystemClock),
        };
        let mut builder = LeaseEngine::builder(store.clone(), store.clone())
            .indexes(Arc::new(IndexRegistry::new(IndexTable::new(book.indexes.clone())?)))
            .vat(Arc::new(VatRegistry::new(VatTable::new(book.vat_rates.clone())?)))
            .interest_rates(Arc::new(InterestRateRegistry::new(InterestRateTable::new(
                book.interest_rates.clone(),
            )?)))
            .clock(clock)
            .config(config);
        if let Some(sink) = sink {
            builder = builder.sink(sink);
        }

        Ok(Self {
            book,
            store,
            engine: builder.build(),
            save: args.save.clone(),
        })
    }

    /// Persist the book when `--save` was given.
    pub fn finish(mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(path) = self.save.take() {
            self.book.absorb(&self.store);
            input::file::write_document(&path, &self.book)?;
            info!(path = %path, "lease book saved");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use land_lease_core::store::LeaseStore;
    use land_lease_core::types::{LeaseId, ServiceUnitId};

    fn book() -> LeaseBook {
        LeaseBook {
            service_units: vec![ServiceUnit::new(ServiceUnitId(1), "Land leases", true)],
            leases: vec![Lease::new(LeaseId(3), "A1-3", ServiceUnitId(1))],
            ..LeaseBook::default()
        }
    }

    #[test]
    fn test_sparse_yaml_book_parses() {
        let yaml = "service_units:\n  - id: 1\n    name: Land leases\n    default_receivable_type: 1\n";
        let parsed: LeaseBook = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.service_units.len(), 1);
        assert_eq!(parsed.service_units[0].invoice_number_start, 1);
        assert!(parsed.leases.is_empty());
    }

    #[test]
    fn test_store_round_trip_keeps_leases() {
        let original = book();
        let store = original.to_store();
        assert_eq!(store.lease_ids().unwrap(), vec![LeaseId(3)]);

        let mut copy = LeaseBook::default();
        copy.absorb(&store);
        assert_eq!(copy.leases, original.leases);
    }
}
