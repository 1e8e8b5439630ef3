//! Rent calculation: dated, provenance-tagged amounts per intended use.

mod calculator;
mod result;

pub use calculator::{
    calculate_rent, index_factor, DEFAULT_INDEX_BASE_NUMBER, INDEX_2022_BASE_NUMBER,
};
pub use result::{
    AdjustmentConsumption, CalculationAmount, CalculationItem, CalculationOptions,
    CalculationResult, LeaseCalculation,
};
