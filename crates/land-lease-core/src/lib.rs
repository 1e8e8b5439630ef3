pub mod calculation;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod invoice;
pub mod lease;
pub mod locks;
pub mod rent;
pub mod review;
pub mod scheduler;
pub mod store;
pub mod tenant;
pub mod types;
pub mod vat;

#[cfg(feature = "interest")]
pub mod interest;

#[cfg(feature = "export")]
pub mod export;

pub use engine::LeaseEngine;
pub use error::{CalculatorError, LeaseError, StoreError};
pub use types::*;

/// Standard result type for all land-lease operations
pub type LeaseResult<T> = Result<T, LeaseError>;
