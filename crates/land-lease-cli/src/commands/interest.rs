use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::json;
use std::time::Instant;

use land_lease_core::types::InvoiceId;

use super::{envelope, CommandResult};
use crate::book::{BookArgs, Session};

/// Arguments for penalty interest
#[derive(Args)]
pub struct InterestArgs {
    #[command(flatten)]
    pub book: BookArgs,

    /// Invoices to calculate interest for
    #[arg(long = "invoice", required = true, value_delimiter = ',')]
    pub invoices: Vec<u64>,

    /// Calculate up to and including this date
    #[arg(long)]
    pub date: NaiveDate,
}

pub fn run_interest(args: InterestArgs) -> CommandResult {
    let started = Instant::now();
    let session = Session::open(&args.book)?;

    let breakdowns = args
        .invoices
        .iter()
        .map(|&id| session.engine.calculate_penalty_interest(InvoiceId(id), args.date))
        .collect::<Result<Vec<_>, _>>()?;
    let total: Decimal = breakdowns.iter().map(|breakdown| breakdown.total).sum();

    envelope(
        &json!({"total": total, "invoices": breakdowns}),
        Vec::new(),
        started,
    )
}
