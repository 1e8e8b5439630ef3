//! Invoicing review: problems that stop a lease from being invoiced.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

use crate::calendar::DateRange;
use crate::invoice::ServiceUnit;
use crate::lease::Lease;
use crate::rent::RentType;
use crate::tenant::{ShareSum, Tenant, TenantContactType};
use crate::types::{IntendedUseId, LeaseId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    RentConfiguration,
    DueDates,
    OverrideReceivableType,
    ManagementShares,
    BillingShares,
    NoActiveTenant,
    MissingRecipient,
    ZeroBillingShare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Generation refuses the lease
    Blocking,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFinding {
    pub lease: LeaseId,
    pub kind: FindingKind,
    pub severity: Severity,
    pub message: String,
}

impl ReviewFinding {
    fn blocking(lease: LeaseId, kind: FindingKind, message: String) -> Self {
        Self {
            lease,
            kind,
            severity: Severity::Blocking,
            message,
        }
    }

    fn warning(lease: LeaseId, kind: FindingKind, message: String) -> Self {
        Self {
            lease,
            kind,
            severity: Severity::Warning,
            message,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

/// Intended uses the lease's billable rents produce amounts for in `period`.
fn billed_intended_uses(lease: &Lease, period: &DateRange) -> BTreeSet<IntendedUseId> {
    lease
        .rents
        .iter()
        .filter(|rent| !matches!(rent.rent_type, RentType::Free | RentType::Manual))
        .filter(|rent| rent.is_active_on(period))
        .flat_map(|rent| {
            let contract = rent
                .contract_rents
                .iter()
                .filter(|cr| cr.active_range(period).is_some())
                .map(|cr| cr.intended_use);
            let fixed = rent
                .fixed_initial_year_rents
                .iter()
                .filter(|fiyr| fiyr.active_range(period).is_some())
                .map(|fiyr| fiyr.intended_use);
            contract.chain(fixed).collect::<Vec<_>>()
        })
        .collect()
}

/// Pieces of `period` over which the set of active tenants stays the same,
/// each with its active tenants. Pieces nobody is active on are left out.
fn tenancy_segments<'a>(lease: &'a Lease, period: &DateRange) -> Vec<(DateRange, Vec<&'a Tenant>)> {
    let boundaries: Vec<NaiveDate> = lease
        .tenants
        .iter()
        .flat_map(|tenant| &tenant.contacts)
        .filter(|contact| contact.contact_type == TenantContactType::Tenant)
        .flat_map(|contact| {
            let after_end = contact.end_date.and_then(|end| end.succ_opt());
            [contact.start_date, after_end]
        })
        .flatten()
        .collect();

    period
        .split_at(&boundaries)
        .into_iter()
        .filter_map(|segment| {
            let active: Vec<&Tenant> = lease
                .active_tenants(&segment)
                .into_iter()
                .filter(|tenant| tenant.is_active_on_date(segment.start()))
                .collect();
            (!active.is_empty()).then_some((segment, active))
        })
        .collect()
}

/// Review one lease for invoicing over `period`.
pub fn review_lease(lease: &Lease, service_unit: &ServiceUnit, period: &DateRange) -> Vec<ReviewFinding> {
    let mut findings = Vec::new();

    for rent in &lease.rents {
        if let Err(err) = rent.validate_configuration() {
            findings.push(ReviewFinding::blocking(
                lease.id,
                FindingKind::RentConfiguration,
                err.to_string(),
            ));
        }
        if !matches!(rent.rent_type, RentType::Free | RentType::Manual) {
            if let Err(err) = rent.validate_due_dates() {
                findings.push(ReviewFinding::blocking(lease.id, FindingKind::DueDates, err.to_string()));
            }
        }
    }
    if let Err(err) = lease.validate(service_unit) {
        findings.push(ReviewFinding::blocking(
            lease.id,
            FindingKind::OverrideReceivableType,
            err.to_string(),
        ));
    }

    let tenants = lease.active_tenants(period);
    if tenants.is_empty() {
        findings.push(ReviewFinding::blocking(
            lease.id,
            FindingKind::NoActiveTenant,
            format!("no tenant has an active tenant contact during {period}"),
        ));
    } else {
        for tenant in &tenants {
            if tenant.recipient_for(period).is_none() {
                findings.push(ReviewFinding::blocking(
                    lease.id,
                    FindingKind::MissingRecipient,
                    format!("tenant {} has no invoice recipient", tenant.id),
                ));
            }
        }

        let intended_uses = billed_intended_uses(lease, period);
        for (segment, active) in tenancy_segments(lease, period) {
            let management: ShareSum = active.iter().map(|tenant| tenant.share).collect();
            if !management.is_one() {
                findings.push(ReviewFinding::blocking(
                    lease.id,
                    FindingKind::ManagementShares,
                    format!("management shares of tenants active during {segment} sum to {management}"),
                ));
            }
            for &intended_use in &intended_uses {
                let billing: ShareSum = active
                    .iter()
                    .map(|tenant| tenant.billing_share(intended_use))
                    .collect();
                if !billing.is_one() {
                    findings.push(ReviewFinding::blocking(
                        lease.id,
                        FindingKind::BillingShares,
                        format!(
                            "billing shares for intended use {intended_use} during {segment} sum to {billing}"
                        ),
                    ));
                }
            }
        }

        for &intended_use in &intended_uses {
            for tenant in &tenants {
                if tenant.billing_share(intended_use).is_zero() {
                    findings.push(ReviewFinding::warning(
                        lease.id,
                        FindingKind::ZeroBillingShare,
                        format!(
                            "tenant {} has no billing share for intended use {intended_use}",
                            tenant.id
                        ),
                    ));
                }
            }
        }
    }

    for finding in &findings {
        warn!(lease = %lease.id, kind = ?finding.kind, "{}", finding.message);
    }
    findings
}
