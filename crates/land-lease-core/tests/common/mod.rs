#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;

use land_lease_core::calendar::DateRange;
use land_lease_core::clock::FixedClock;
use land_lease_core::invoice::{ReceivableType, ServiceUnit};
use land_lease_core::lease::Lease;
use land_lease_core::rent::{ContractRent, PeriodType, Rent, RentType};
use land_lease_core::store::MemoryStore;
use land_lease_core::tenant::{Contact, Share, Tenant, TenantContact, TenantContactType};
use land_lease_core::types::{
    ContactId, ContractRentId, IntendedUseId, LeaseId, ReceivableTypeId, RentId, ServiceUnitId,
    TenantId,
};
use land_lease_core::LeaseEngine;

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn year(y: i32) -> DateRange {
    DateRange::year(y).unwrap()
}

/// Tenant `id` whose TENANT contact is `100 + id`.
pub fn tenant(id: u64, numerator: u32, denominator: u32) -> Tenant {
    Tenant {
        id: TenantId(id),
        share: Share::new(numerator, denominator),
        reference: Some(format!("REF-{id}")),
        rent_shares: Vec::new(),
        contacts: vec![TenantContact {
            contact: ContactId(100 + id),
            contact_type: TenantContactType::Tenant,
            start_date: None,
            end_date: None,
        }],
    }
}

pub fn contract_rent(amount: Decimal) -> ContractRent {
    ContractRent {
        id: ContractRentId(1),
        amount,
        period: PeriodType::PerYear,
        base_amount: amount,
        base_amount_period: PeriodType::PerYear,
        intended_use: IntendedUseId(1),
        start_date: None,
        end_date: None,
    }
}

/// Lease with one fixed yearly rent.
pub fn fixed_lease(id: u64, amount: Decimal, tenants: Vec<Tenant>) -> Lease {
    let mut lease = Lease::new(LeaseId(id), format!("A1-{id}"), ServiceUnitId(1));
    let mut rent = Rent::new(RentId(id), RentType::Fixed);
    rent.contract_rents.push(contract_rent(amount));
    lease.rents.push(rent);
    lease.tenants = tenants;
    lease
}

pub fn store_with(leases: Vec<Lease>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert_service_unit(ServiceUnit::new(ServiceUnitId(1), "Land leases", true));
    store.insert_receivable_type(ReceivableType {
        id: ReceivableTypeId(1),
        name: "Rent".into(),
        sap_material_code: None,
        is_active: true,
    });
    for lease in leases {
        for tenant in &lease.tenants {
            for link in &tenant.contacts {
                store.insert_contact(Contact {
                    id: link.contact,
                    name: format!("Contact {}", link.contact),
                    address: "Katu 1".into(),
                    postal_code: "00100".into(),
                    city: "Helsinki".into(),
                    customer_number: None,
                });
            }
        }
        store.insert_lease(lease);
    }
    store
}

pub fn engine(store: &Arc<MemoryStore>, today: NaiveDate) -> LeaseEngine {
    LeaseEngine::builder(store.clone(), store.clone())
        .clock(Arc::new(FixedClock(today)))
        .build()
}
