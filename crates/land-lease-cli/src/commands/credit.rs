use clap::Args;
use rust_decimal::Decimal;
use serde_json::json;
use std::time::Instant;

use land_lease_core::invoice::CreditRequest;
use land_lease_core::types::{InvoiceId, InvoiceRowId, InvoiceSetId, ReceivableTypeId};

use super::{envelope, CommandResult};
use crate::book::{BookArgs, Session};

/// Arguments for crediting an invoice or an invoice set
#[derive(Args)]
pub struct CreditArgs {
    #[command(flatten)]
    pub book: BookArgs,

    /// Invoice to credit
    #[arg(long, conflicts_with = "invoice_set")]
    pub invoice: Option<u64>,

    /// Invoice set to credit as a whole
    #[arg(long)]
    pub invoice_set: Option<u64>,

    /// Credit only these rows (comma separated ids)
    #[arg(long, value_delimiter = ',', conflicts_with = "invoice_set")]
    pub rows: Vec<u64>,

    /// Credit only rows of this receivable type
    #[arg(long, conflicts_with = "rows")]
    pub receivable_type: Option<u64>,

    /// Credit this amount instead of the full creditable amount
    #[arg(long)]
    pub amount: Option<Decimal>,
}

fn credit_request(args: &CreditArgs) -> CreditRequest {
    if !args.rows.is_empty() {
        CreditRequest::Rows {
            rows: args.rows.iter().copied().map(InvoiceRowId).collect(),
            amount: args.amount,
        }
    } else if let Some(receivable_type) = args.receivable_type {
        CreditRequest::ReceivableType {
            receivable_type: ReceivableTypeId(receivable_type),
        }
    } else if let Some(amount) = args.amount {
        CreditRequest::Amount { amount }
    } else {
        CreditRequest::Full
    }
}

pub fn run_credit(args: CreditArgs) -> CommandResult {
    let started = Instant::now();
    let session = Session::open(&args.book)?;

    let credit_notes = match (args.invoice, args.invoice_set) {
        (Some(invoice), None) => {
            vec![session.engine.credit(InvoiceId(invoice), &credit_request(&args))?]
        }
        (None, Some(set)) => session.engine.credit_invoice_set(
            InvoiceSetId(set),
            args.receivable_type.map(ReceivableTypeId),
            args.amount,
        )?,
        _ => return Err("one of --invoice or --invoice-set is required".into()),
    };

    let result = json!({
        "total_amount": credit_notes.iter().map(|note| note.total_amount).sum::<Decimal>(),
        "credit_notes": credit_notes,
    });

    session.finish()?;
    envelope(&result, Vec::new(), started)
}
