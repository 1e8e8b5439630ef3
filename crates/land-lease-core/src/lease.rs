use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::DateRange;
use crate::error::LeaseError;
use crate::invoice::ServiceUnit;
use crate::rent::Rent;
use crate::tenant::Tenant;
use crate::types::{LeaseId, RentId, ServiceUnitId, TenantId};
use crate::LeaseResult;

/// Postal address of a leased area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseAreaAddress {
    pub address: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LeaseArea {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub addresses: Vec<LeaseAreaAddress>,
}

/// A lease and everything it owns that the engine computes with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub id: LeaseId,
    pub identifier: String,
    pub service_unit: ServiceUnitId,
    #[serde(default)]
    pub is_subject_to_vat: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub areas: Vec<LeaseArea>,
    #[serde(default)]
    pub rents: Vec<Rent>,
    #[serde(default)]
    pub tenants: Vec<Tenant>,
}

impl Lease {
    pub fn new(id: LeaseId, identifier: impl Into<String>, service_unit: ServiceUnitId) -> Self {
        Self {
            id,
            identifier: identifier.into(),
            service_unit,
            is_subject_to_vat: false,
            start_date: None,
            end_date: None,
            areas: Vec::new(),
            rents: Vec::new(),
            tenants: Vec::new(),
        }
    }

    pub fn rent(&self, id: RentId) -> LeaseResult<&Rent> {
        self.rents
            .iter()
            .find(|rent| rent.id == id)
            .ok_or_else(|| LeaseError::not_found("rent", id.0))
    }

    pub fn rent_mut(&mut self, id: RentId) -> LeaseResult<&mut Rent> {
        self.rents
            .iter_mut()
            .find(|rent| rent.id == id)
            .ok_or_else(|| LeaseError::not_found("rent", id.0))
    }

    pub fn tenant(&self, id: TenantId) -> Option<&Tenant> {
        self.tenants.iter().find(|tenant| tenant.id == id)
    }

    /// Tenants with a TENANT contact during `period`, in id order.
    pub fn active_tenants(&self, period: &DateRange) -> Vec<&Tenant> {
        let mut tenants: Vec<&Tenant> = self
            .tenants
            .iter()
            .filter(|tenant| tenant.is_active_on(period))
            .collect();
        tenants.sort_by_key(|tenant| tenant.id);
        tenants
    }

    /// Every tenant in id order.
    pub fn tenants_by_id(&self) -> Vec<&Tenant> {
        let mut tenants: Vec<&Tenant> = self.tenants.iter().collect();
        tenants.sort_by_key(|tenant| tenant.id);
        tenants
    }

    /// Address printed on outgoing invoices: the primary address if any,
    /// otherwise the only address when there is exactly one.
    pub fn billing_address(&self) -> Option<&LeaseAreaAddress> {
        let mut addresses = self.areas.iter().flat_map(|area| area.addresses.iter());
        if let Some(primary) = addresses.clone().find(|address| address.is_primary) {
            return Some(primary);
        }
        match (addresses.next(), addresses.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    /// Refuse rents whose override receivable type is not allowed for their
    /// rent type under `service_unit`.
    pub fn validate(&self, service_unit: &ServiceUnit) -> LeaseResult<()> {
        if service_unit.id != self.service_unit {
            return Err(LeaseError::Configuration {
                lease: self.id,
                reason: format!(
                    "service unit {} does not own the lease (owner {})",
                    service_unit.id, self.service_unit
                ),
            });
        }
        for rent in &self.rents {
            if rent.override_receivable_type.is_some()
                && !override_receivable_type_allowed(rent, service_unit)
            {
                return Err(LeaseError::Configuration {
                    lease: self.id,
                    reason: format!(
                        "rent {} of type {:?} cannot override the receivable type",
                        rent.id, rent.rent_type
                    ),
                });
            }
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(LeaseError::Configuration {
                    lease: self.id,
                    reason: format!("start date {start} is after end date {end}"),
                });
            }
        }
        Ok(())
    }
}

/// Static `(rent type, service unit)` rule for override receivable types.
pub fn override_receivable_type_allowed(rent: &Rent, service_unit: &ServiceUnit) -> bool {
    rent.rent_type.accepts_override_receivable_type() && service_unit.use_override_receivable_type
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rent::RentType;
    use crate::types::ReceivableTypeId;

    fn unit(allow: bool) -> ServiceUnit {
        ServiceUnit {
            id: ServiceUnitId(1),
            name: "Land use".into(),
            default_receivable_type: ReceivableTypeId(1),
            use_override_receivable_type: allow,
            invoice_number_start: 1_000_000,
        }
    }

    fn address(text: &str, primary: bool) -> LeaseAreaAddress {
        LeaseAreaAddress {
            address: text.into(),
            postal_code: "00100".into(),
            city: "Helsinki".into(),
            is_primary: primary,
        }
    }

    #[test]
    fn test_override_requires_rent_type_and_unit() {
        let mut lease = Lease::new(LeaseId(1), "A1234-1", ServiceUnitId(1));
        let mut rent = Rent::new(RentId(1), RentType::Free);
        rent.override_receivable_type = Some(ReceivableTypeId(9));
        lease.rents.push(rent);
        assert!(lease.validate(&unit(true)).is_err());

        lease.rents[0].rent_type = RentType::Index;
        assert!(lease.validate(&unit(true)).is_ok());
        assert!(lease.validate(&unit(false)).is_err());
    }

    #[test]
    fn test_billing_address_prefers_primary() {
        let mut lease = Lease::new(LeaseId(1), "A1234-1", ServiceUnitId(1));
        assert!(lease.billing_address().is_none());

        lease.areas.push(LeaseArea {
            identifier: "91-1-1-1".into(),
            addresses: vec![address("Side 2", false)],
        });
        assert_eq!(lease.billing_address().map(|a| a.address.as_str()), Some("Side 2"));

        lease.areas[0].addresses.push(address("Other 3", false));
        assert!(lease.billing_address().is_none());

        lease.areas.push(LeaseArea {
            identifier: "91-1-1-2".into(),
            addresses: vec![address("Main 1", true)],
        });
        assert_eq!(lease.billing_address().map(|a| a.address.as_str()), Some("Main 1"));
    }
}
