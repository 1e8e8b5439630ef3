//! Batch invoicing of every lease with rents due on a date.
//!
//! Leases are split across scoped worker threads; each lease is generated
//! under its own lock by [`InvoiceService`], so one failing lease never stops
//! the run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::calendar::DateRange;
use crate::invoice::{InvoiceService, InvoiceSet};
use crate::lease::Lease;
use crate::rent::RentType;
use crate::store::LeaseStore;
use crate::types::{LeaseId, RentId};
use crate::LeaseResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseFailure {
    pub lease: LeaseId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_period: Option<DateRange>,
    pub error: String,
    /// Retrying later may succeed
    pub transient: bool,
}

/// Outcome of one scheduled run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueDateRun {
    pub due_date: Option<NaiveDate>,
    pub generated: Vec<InvoiceSet>,
    pub failures: Vec<LeaseFailure>,
    /// Leases with no rent due on the date
    pub skipped: u32,
}

impl DueDateRun {
    fn merge(&mut self, other: DueDateRun) {
        self.generated.extend(other.generated);
        self.failures.extend(other.failures);
        self.skipped += other.skipped;
    }
}

/// Billing periods of the lease's rents that fall due on `due_date`, with
/// the rents billed in each.
pub fn due_rent_groups(lease: &Lease, due_date: NaiveDate) -> BTreeMap<DateRange, Vec<RentId>> {
    let mut groups: BTreeMap<DateRange, Vec<RentId>> = BTreeMap::new();
    for rent in &lease.rents {
        if matches!(rent.rent_type, RentType::Free | RentType::Manual) {
            continue;
        }
        let Some(period) = rent.get_billing_period_from_due_date(due_date) else {
            continue;
        };
        if rent.is_active_on(&period) {
            groups.entry(period).or_default().push(rent.id);
        }
    }
    groups
}

fn run_lease(
    service: &InvoiceService,
    store: &dyn LeaseStore,
    lease_id: LeaseId,
    due_date: NaiveDate,
    run: &mut DueDateRun,
) {
    let lease = match store.lease(lease_id) {
        Ok(lease) => lease,
        Err(err) => {
            run.failures.push(LeaseFailure {
                lease: lease_id,
                billing_period: None,
                transient: err.is_transient(),
                error: err.to_string(),
            });
            return;
        }
    };

    let groups = due_rent_groups(&lease, due_date);
    if groups.is_empty() {
        debug!(lease = %lease_id, due_date = %due_date, "nothing due");
        run.skipped += 1;
        return;
    }

    for (period, rents) in groups {
        match service.generate_for_rents(lease_id, &period, due_date, Some(&rents)) {
            Ok(set) => run.generated.push(set),
            Err(err) => {
                warn!(lease = %lease_id, period = %period, error = %err, "lease skipped");
                run.failures.push(LeaseFailure {
                    lease: lease_id,
                    billing_period: Some(period),
                    transient: err.is_transient(),
                    error: err.to_string(),
                });
            }
        }
    }
}

/// Generate the invoices of every lease with a rent due on `due_date`.
pub fn generate_for_due_date(
    service: &InvoiceService,
    store: &dyn LeaseStore,
    due_date: NaiveDate,
) -> LeaseResult<DueDateRun> {
    let lease_ids = store.lease_ids()?;
    let workers = service.config().worker_threads.max(1);
    let chunk_size = lease_ids.len().div_ceil(workers).max(1);

    let mut run = DueDateRun {
        due_date: Some(due_date),
        ..DueDateRun::default()
    };
    let partials: Vec<DueDateRun> = std::thread::scope(|scope| {
        let handles: Vec<_> = lease_ids
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    let mut partial = DueDateRun::default();
                    for &lease_id in chunk {
                        run_lease(service, store, lease_id, due_date, &mut partial);
                    }
                    partial
                })
            })
            .collect();
        handles
            .into_iter()
            .filter_map(|handle| match handle.join() {
                Ok(partial) => Some(partial),
                Err(_) => {
                    warn!(due_date = %due_date, "invoicing worker panicked");
                    None
                }
            })
            .collect()
    });
    for partial in partials {
        run.merge(partial);
    }
    run.generated.sort_by_key(|set| (set.lease, set.billing_period));
    run.failures.sort_by_key(|failure| failure.lease);

    info!(
        due_date = %due_date,
        leases = lease_ids.len(),
        generated = run.generated.len(),
        failed = run.failures.len(),
        skipped = run.skipped,
        "due date run completed"
    );
    Ok(run)
}
