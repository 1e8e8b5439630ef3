use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as percentages (7.5 = 7.5 %), as stored by the city.
pub type Percent = Decimal;

/// Scale of stored money columns (decimal(12,2)).
pub const MONEY_SCALE: u32 = 2;

/// Scale of intermediate calculator values.
pub const INTERMEDIATE_SCALE: u32 = 4;

/// Round half-up to the stored money scale.
pub fn round_money(value: Decimal) -> Money {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Round half-up to the intermediate calculation scale.
pub fn round_intermediate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(INTERMEDIATE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

macro_rules! entity_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(pub u64);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

entity_id!(
    /// Handle of a lease in the store arena
    LeaseId,
    RentId,
    ContractRentId,
    FixedInitialYearRentId,
    RentAdjustmentId,
    /// Intended use of a leased area (residential, parking, ...)
    IntendedUseId,
    TenantId,
    ContactId,
    InvoiceId,
    InvoiceRowId,
    InvoiceSetId,
    PaymentId,
    ReceivableTypeId,
    ServiceUnitId,
);
