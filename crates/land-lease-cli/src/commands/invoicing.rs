use chrono::NaiveDate;
use clap::Args;
use serde_json::json;
use std::time::Instant;

use land_lease_core::invoice::Invoice;
use land_lease_core::types::LeaseId;

use super::{envelope, period, CommandResult};
use crate::book::{BookArgs, Session};

/// Arguments for generating the invoices of one lease
#[derive(Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub book: BookArgs,

    /// Lease to invoice
    #[arg(long)]
    pub lease: u64,

    /// First day of the billing period
    #[arg(long)]
    pub start: NaiveDate,

    /// Last day of the billing period
    #[arg(long)]
    pub end: NaiveDate,

    /// Due date of the generated invoices
    #[arg(long)]
    pub due_date: NaiveDate,
}

/// Arguments for the scheduled run of a due date
#[derive(Args)]
pub struct DueDateArgs {
    #[command(flatten)]
    pub book: BookArgs,

    /// Due date to invoice every lease for
    #[arg(long)]
    pub due_date: NaiveDate,
}

pub fn run_generate(args: GenerateArgs) -> CommandResult {
    let started = Instant::now();
    let session = Session::open(&args.book)?;
    let billing_period = period(args.start, args.end)?;

    let set = session
        .engine
        .generate_invoices(LeaseId(args.lease), &billing_period, args.due_date)?;
    let invoices = set
        .invoices
        .iter()
        .map(|&id| session.engine.invoice(id))
        .collect::<Result<Vec<Invoice>, _>>()?;

    let warnings = session
        .engine
        .review_period(LeaseId(args.lease), &billing_period)?
        .into_iter()
        .map(|finding| finding.message)
        .collect();
    let result = json!({
        "invoice_set": set,
        "total_amount": invoices.iter().map(|invoice| invoice.total_amount).sum::<rust_decimal::Decimal>(),
        "invoices": invoices,
    });

    session.finish()?;
    envelope(&result, warnings, started)
}

pub fn run_due_date(args: DueDateArgs) -> CommandResult {
    let started = Instant::now();
    let session = Session::open(&args.book)?;

    let run = session.engine.generate_for_due_date(args.due_date)?;
    let warnings = run
        .failures
        .iter()
        .map(|failure| format!("lease {}: {}", failure.lease, failure.error))
        .collect();

    session.finish()?;
    envelope(&run, warnings, started)
}
