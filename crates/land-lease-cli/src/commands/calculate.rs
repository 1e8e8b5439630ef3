use chrono::NaiveDate;
use clap::Args;
use serde_json::json;
use std::time::Instant;

use land_lease_core::types::LeaseId;

use super::{envelope, period, CommandResult};
use crate::book::{BookArgs, Session};

/// Arguments for rent calculation
#[derive(Args)]
pub struct CalculateArgs {
    #[command(flatten)]
    pub book: BookArgs,

    /// Lease to calculate
    #[arg(long)]
    pub lease: u64,

    /// First day of the range
    #[arg(long)]
    pub start: NaiveDate,

    /// Last day of the range
    #[arg(long)]
    pub end: NaiveDate,

    /// Record the calculated rent history on the lease
    #[arg(long)]
    pub commit: bool,
}

pub fn run_calculate(args: CalculateArgs) -> CommandResult {
    let started = Instant::now();
    let session = Session::open(&args.book)?;
    let range = period(args.start, args.end)?;

    let calculation = session
        .engine
        .calculate_rent(LeaseId(args.lease), &range, !args.commit)?;

    let by_intended_use: Vec<_> = calculation
        .total_by_intended_use()
        .into_iter()
        .map(|(intended_use, amount)| json!({"intended_use": intended_use, "amount": amount}))
        .collect();
    let result = json!({
        "lease": args.lease,
        "start_date": range.start(),
        "end_date": range.end(),
        "total": calculation.total(),
        "by_intended_use": by_intended_use,
        "rents": calculation.rents,
    });

    session.finish()?;
    envelope(&result, Vec::new(), started)
}
