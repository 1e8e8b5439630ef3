use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use std::time::Instant;

use land_lease_core::types::InvoiceId;

use super::{envelope, CommandResult};
use crate::book::{BookArgs, Session};

/// Arguments for recording a payment
#[derive(Args)]
pub struct PayArgs {
    #[command(flatten)]
    pub book: BookArgs,

    /// Invoice the payment settles
    #[arg(long)]
    pub invoice: u64,

    /// Paid amount
    #[arg(long)]
    pub amount: Decimal,

    /// Payment date (YYYY-MM-DD)
    #[arg(long)]
    pub date: NaiveDate,

    /// Bank filing code of the payment
    #[arg(long)]
    pub filing_code: Option<String>,
}

pub fn run_pay(args: PayArgs) -> CommandResult {
    let started = Instant::now();
    let session = Session::open(&args.book)?;

    let invoice = session.engine.record_payment(
        InvoiceId(args.invoice),
        args.amount,
        args.date,
        args.filing_code,
    )?;
    let mut warnings = Vec::new();
    let overpaid = invoice.paid_amount() - invoice.creditable_amount() - invoice.collection_charge;
    if overpaid > Decimal::ZERO {
        warnings.push(format!("invoice {} is overpaid by {}", invoice.id, overpaid));
    }

    session.finish()?;
    envelope(&invoice, warnings, started)
}
