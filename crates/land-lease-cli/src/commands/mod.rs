pub mod calculate;
pub mod credit;
pub mod interest;
pub mod invoicing;
pub mod payment;
pub mod review;
pub mod sales_order;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Instant;

use land_lease_core::calendar::DateRange;

pub type CommandResult = Result<Value, Box<dyn std::error::Error>>;

/// Standard output envelope shared by every command.
pub fn envelope<T: Serialize>(
    result: &T,
    warnings: Vec<String>,
    started: Instant,
) -> CommandResult {
    Ok(json!({
        "result": serde_json::to_value(result)?,
        "warnings": warnings,
        "metadata": {
            "version": env!("CARGO_PKG_VERSION"),
            "computation_time_us": started.elapsed().as_micros() as u64,
            "precision": "rust_decimal_128bit",
        },
    }))
}

pub fn period(start: NaiveDate, end: NaiveDate) -> Result<DateRange, Box<dyn std::error::Error>> {
    Ok(DateRange::new(start, end)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_envelope_shape() {
        let value = envelope(&json!({"total": "10.00"}), vec!["late".into()], Instant::now()).unwrap();
        assert_eq!(value["result"]["total"], json!("10.00"));
        assert_eq!(value["warnings"], json!(["late"]));
        assert!(value["metadata"]["version"].is_string());
    }

    #[test]
    fn test_reversed_period_rejected() {
        let start = NaiveDate::from_ymd_opt(2020, 12, 31).unwrap();
        let end = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(period(start, end).is_err());
    }
}
