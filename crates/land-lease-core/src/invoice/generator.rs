//! Turns calculated gross amounts into per-recipient invoice drafts.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::calculation::CalculationResult;
use crate::calendar::DateRange;
use crate::lease::{override_receivable_type_allowed, Lease};
use crate::rent::Rent;
use crate::tenant::{allocate, Tenant};
use crate::types::{ContactId, IntendedUseId, Money, ReceivableTypeId, TenantId};
use crate::LeaseResult;

use super::numbering::ServiceUnit;

/// Gross amounts of one rent over one period, keyed by intended use.
#[derive(Debug, Clone, PartialEq)]
pub struct RentGross {
    pub receivable_type: ReceivableTypeId,
    pub by_intended_use: BTreeMap<IntendedUseId, Money>,
}

impl RentGross {
    /// `None` when the calculation produced no amounts at all.
    pub fn from_result(
        rent: &Rent,
        service_unit: &ServiceUnit,
        result: &CalculationResult,
    ) -> Option<Self> {
        if result.amounts.is_empty() {
            return None;
        }
        Some(Self {
            receivable_type: receivable_type_for(rent, service_unit),
            by_intended_use: result.total_by_intended_use(),
        })
    }
}

/// Override receivable type when the rent may use one, else the unit default.
pub fn receivable_type_for(rent: &Rent, service_unit: &ServiceUnit) -> ReceivableTypeId {
    match rent.override_receivable_type {
        Some(rt) if override_receivable_type_allowed(rent, service_unit) => rt,
        _ => service_unit.default_receivable_type,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftRow {
    pub tenant: TenantId,
    pub receivable_type: ReceivableTypeId,
    pub billing_period: DateRange,
    pub amount: Money,
}

/// Invoice content before ids and numbers are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftInvoice {
    pub recipient: ContactId,
    pub rows: Vec<DraftRow>,
}

impl DraftInvoice {
    pub fn total(&self) -> Money {
        self.rows.iter().map(|row| row.amount).sum()
    }

    pub fn first_tenant(&self) -> Option<TenantId> {
        self.rows.iter().map(|row| row.tenant).min()
    }

    fn add(&mut self, row: DraftRow) {
        match self.rows.iter_mut().find(|existing| {
            existing.tenant == row.tenant
                && existing.receivable_type == row.receivable_type
                && existing.billing_period == row.billing_period
        }) {
            Some(existing) => existing.amount += row.amount,
            None => self.rows.push(row),
        }
    }
}

/// Group active tenants by the part of `period` they are active in.
fn tenant_groups<'a>(lease: &'a Lease, period: &DateRange) -> Vec<(DateRange, Vec<&'a Tenant>)> {
    let mut groups: Vec<(DateRange, Vec<&Tenant>)> = Vec::new();
    for tenant in lease.active_tenants(period) {
        let Some(active) = tenant.active_period_within(period) else {
            continue;
        };
        match groups.iter_mut().find(|(range, _)| *range == active) {
            Some((_, tenants)) => tenants.push(tenant),
            None => groups.push((active, vec![tenant])),
        }
    }
    groups
}

/// Build the invoices of one generation.
///
/// `gross_for` yields the rents' gross amounts for a sub-period; it is called
/// once per distinct tenant activity window. Tenants sharing a recipient end
/// up on one invoice, rows are ordered by receivable type, tenant and period
/// start, and invoices by their first tenant.
pub fn draft_invoices<F>(
    lease: &Lease,
    period: &DateRange,
    normalize_shares: bool,
    mut gross_for: F,
) -> LeaseResult<Vec<DraftInvoice>>
where
    F: FnMut(&DateRange) -> LeaseResult<Vec<RentGross>>,
{
    let mut drafts: Vec<DraftInvoice> = Vec::new();

    for (sub_period, tenants) in tenant_groups(lease, period) {
        let recipients: BTreeMap<TenantId, ContactId> = tenants
            .iter()
            .filter_map(|tenant| {
                tenant
                    .recipient_for(&sub_period)
                    .map(|contact| (tenant.id, contact))
            })
            .collect();

        for gross in gross_for(&sub_period)? {
            for (&intended_use, &amount) in &gross.by_intended_use {
                let shares: Vec<_> = tenants
                    .iter()
                    .map(|tenant| (tenant.id, tenant.billing_share(intended_use)))
                    .collect();
                for allocation in allocate(amount, &shares, normalize_shares) {
                    let Some(&recipient) = recipients.get(&allocation.tenant) else {
                        debug!(
                            lease = %lease.id,
                            tenant = %allocation.tenant,
                            "tenant has no recipient; allocation dropped"
                        );
                        continue;
                    };
                    let row = DraftRow {
                        tenant: allocation.tenant,
                        receivable_type: gross.receivable_type,
                        billing_period: sub_period,
                        amount: allocation.amount,
                    };
                    match drafts.iter_mut().find(|draft| draft.recipient == recipient) {
                        Some(draft) => draft.add(row),
                        None => drafts.push(DraftInvoice {
                            recipient,
                            rows: vec![row],
                        }),
                    }
                }
            }
        }
    }

    for draft in &mut drafts {
        draft.rows.sort_by_key(|row| {
            (row.receivable_type, row.tenant, row.billing_period.start())
        });
    }
    drafts.sort_by_key(DraftInvoice::first_tenant);
    Ok(drafts)
}

/// Sum of draft totals; equals the gross of the generation when every
/// tenant covers the whole period and shares sum to one.
pub fn drafts_total(drafts: &[DraftInvoice]) -> Money {
    drafts.iter().map(DraftInvoice::total).sum::<Decimal>()
}
