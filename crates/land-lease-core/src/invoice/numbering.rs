//! Service units, receivable types and invoice-number sequences.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::LeaseError;
use crate::types::{ReceivableTypeId, ServiceUnitId};
use crate::LeaseResult;

/// First invoice number of the default service unit.
pub const DEFAULT_UNIT_NUMBER_START: u64 = 1_000_000;
/// First invoice number of every other service unit.
pub const UNIT_NUMBER_START: u64 = 1;

/// Organisational owner of leases and of one invoice-number sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUnit {
    pub id: ServiceUnitId,
    pub name: String,
    pub default_receivable_type: ReceivableTypeId,
    /// Whether rents of this unit may carry an override receivable type
    #[serde(default)]
    pub use_override_receivable_type: bool,
    #[serde(default = "default_number_start")]
    pub invoice_number_start: u64,
}

fn default_number_start() -> u64 {
    UNIT_NUMBER_START
}

impl ServiceUnit {
    pub fn new(id: ServiceUnitId, name: impl Into<String>, is_default: bool) -> Self {
        Self {
            id,
            name: name.into(),
            default_receivable_type: ReceivableTypeId(1),
            use_override_receivable_type: false,
            invoice_number_start: if is_default {
                DEFAULT_UNIT_NUMBER_START
            } else {
                UNIT_NUMBER_START
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivableType {
    pub id: ReceivableTypeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sap_material_code: Option<String>,
    #[serde(default = "active_default")]
    pub is_active: bool,
}

fn active_default() -> bool {
    true
}

/// Per-unit monotonic counters. A number is consumed as soon as it is handed
/// out; numbers of rolled-back generations are never reissued.
#[derive(Debug, Default)]
pub struct InvoiceNumberSequences {
    next: Mutex<HashMap<ServiceUnitId, u64>>,
}

impl InvoiceNumberSequences {
    pub fn register(&self, unit: &ServiceUnit) {
        self.next
            .lock()
            .entry(unit.id)
            .or_insert(unit.invoice_number_start);
    }

    pub fn next(&self, unit: ServiceUnitId) -> LeaseResult<u64> {
        let mut next = self.next.lock();
        let counter = next
            .get_mut(&unit)
            .ok_or_else(|| LeaseError::not_found("service unit", unit.0))?;
        let number = *counter;
        *counter = counter.checked_add(1).ok_or_else(|| {
            LeaseError::InvalidOperation(format!("invoice numbers of unit {unit} exhausted"))
        })?;
        Ok(number)
    }

    /// Move the counter past `number`, which was issued by an earlier run.
    pub fn observe(&self, unit: ServiceUnitId, number: u64) {
        if let Some(counter) = self.next.lock().get_mut(&unit) {
            if number >= *counter {
                *counter = number.saturating_add(1);
            }
        }
    }

    /// Value the next call to [`next`](Self::next) would return.
    pub fn peek(&self, unit: ServiceUnitId) -> Option<u64> {
        self.next.lock().get(&unit).copied()
    }
}
