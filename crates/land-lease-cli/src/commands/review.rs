use chrono::NaiveDate;
use clap::Args;
use serde_json::json;
use std::time::Instant;

use land_lease_core::review::Severity;
use land_lease_core::types::LeaseId;

use super::{envelope, period, CommandResult};
use crate::book::{BookArgs, Session};

/// Arguments for the invoicing review
#[derive(Args)]
pub struct ReviewArgs {
    #[command(flatten)]
    pub book: BookArgs,

    /// Leases to review; every lease of the book when omitted
    #[arg(long = "lease", value_delimiter = ',')]
    pub leases: Vec<u64>,

    /// First day of the reviewed period (defaults to the current year)
    #[arg(long, requires = "end")]
    pub start: Option<NaiveDate>,

    /// Last day of the reviewed period
    #[arg(long, requires = "start")]
    pub end: Option<NaiveDate>,
}

pub fn run_review(args: ReviewArgs) -> CommandResult {
    let started = Instant::now();
    let session = Session::open(&args.book)?;

    let leases: Vec<LeaseId> = if args.leases.is_empty() {
        session.book.leases.iter().map(|lease| lease.id).collect()
    } else {
        args.leases.iter().copied().map(LeaseId).collect()
    };
    let range = match (args.start, args.end) {
        (Some(start), Some(end)) => Some(period(start, end)?),
        _ => None,
    };

    let mut findings = Vec::new();
    for lease in leases {
        let lease_findings = match range {
            Some(ref range) => session.engine.review_period(lease, range)?,
            None => session.engine.invoicing_review(lease)?,
        };
        findings.extend(lease_findings);
    }
    let blocking = findings
        .iter()
        .filter(|finding| finding.severity == Severity::Blocking)
        .count();

    envelope(
        &json!({"blocking": blocking, "findings": findings}),
        Vec::new(),
        started,
    )
}
