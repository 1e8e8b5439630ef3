use chrono::NaiveDate;
use thiserror::Error;

use crate::types::{IntendedUseId, LeaseId, Money, RentId};

#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Configuration error in lease {lease}: {reason}")]
    Configuration { lease: LeaseId, reason: String },

    #[error("Invariant violation in lease {lease}: {reason}")]
    InvariantViolation { lease: LeaseId, reason: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Credit of {requested} exceeds the remaining creditable amount {remaining}")]
    CreditExceedsRemaining { requested: Money, remaining: Money },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error("No interest rate covers {date}")]
    MissingInterestRate { date: NaiveDate },

    #[error("Timed out waiting for the {resource} lock")]
    LockTimeout { resource: String },

    #[error(transparent)]
    Calculation(#[from] CalculatorError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[cfg(feature = "export")]
    #[error(transparent)]
    Export(#[from] crate::export::ExportError),

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl LeaseError {
    /// Errors a caller may retry with bounded backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            LeaseError::LockTimeout { .. } => true,
            LeaseError::Store(StoreError::Unavailable(_)) => true,
            #[cfg(feature = "export")]
            LeaseError::Export(err) => err.is_transient(),
            _ => false,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: u64) -> Self {
        LeaseError::NotFound { entity, id }
    }
}

impl From<serde_json::Error> for LeaseError {
    fn from(e: serde_json::Error) -> Self {
        LeaseError::SerializationError(e.to_string())
    }
}

/// Failures raised by the rent calculator. The calculator never persists
/// anything, so every variant leaves the lease untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalculatorError {
    #[error("No index available for adjustment year {year}")]
    MissingIndex { year: i32 },

    #[error("Rent {rent} has an unsupported number of due dates per year: {per_year}")]
    UnsupportedDueDatesPerYear { rent: RentId, per_year: u32 },

    #[error("Rent {rent} has overlapping contract rents for intended use {intended_use} on {date}")]
    OverlappingContractRents {
        rent: RentId,
        intended_use: IntendedUseId,
        date: NaiveDate,
    },

    #[error("Rent {rent} is misconfigured: {reason}")]
    InvalidRentConfiguration { rent: RentId, reason: String },

    #[error("Calculation deadline exceeded")]
    DeadlineExceeded,
}

/// Persistence layer failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
