//! Penalty interest on overdue invoices.
//!
//! Interest runs from the day after the due date (or postponed due date) up
//! to and including the calculation date. The overdue interval is cut at
//! every change of the interest-rate table and each part accrues
//! `outstanding * penalty_rate% * days / 365` (Actual/365 Fixed).

use chrono::{Duration, NaiveDate};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::calendar::DateRange;
use crate::error::LeaseError;
use crate::invoice::{Invoice, InvoiceState};
use crate::types::{round_money, InvoiceId, Money, Percent};
use crate::LeaseResult;

const DAYS_IN_YEAR: Decimal = dec!(365);

/// Reference and penalty rates (percent per annum) for a date span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestRate {
    pub start_date: NaiveDate,
    /// `None` while the rate is the current one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub reference_rate: Percent,
    pub penalty_rate: Percent,
}

impl InterestRate {
    fn span_within(&self, range: &DateRange) -> Option<DateRange> {
        range.clamp(Some(self.start_date), self.end_date)
    }
}

/// Ordered, non-overlapping interest rates.
#[derive(Debug, Clone, Default)]
pub struct InterestRateTable {
    rates: Vec<InterestRate>,
}

impl InterestRateTable {
    pub fn new(mut rates: Vec<InterestRate>) -> LeaseResult<Self> {
        rates.sort_by_key(|rate| rate.start_date);
        for rate in &rates {
            if rate.end_date.is_some_and(|end| end < rate.start_date) {
                return Err(LeaseError::InvalidInput {
                    field: "interest_rate.end_date".into(),
                    reason: format!("rate starting {} ends before it starts", rate.start_date),
                });
            }
        }
        for pair in rates.windows(2) {
            let overlaps = match pair[0].end_date {
                Some(end) => end >= pair[1].start_date,
                None => true,
            };
            if overlaps {
                return Err(LeaseError::InvalidInput {
                    field: "interest_rate".into(),
                    reason: format!(
                        "rates starting {} and {} overlap",
                        pair[0].start_date, pair[1].start_date
                    ),
                });
            }
        }
        Ok(Self { rates })
    }

    pub fn rates(&self) -> &[InterestRate] {
        &self.rates
    }

    /// Cut `range` by the table. Fails on the first day no rate covers.
    pub fn split(&self, range: &DateRange) -> LeaseResult<Vec<(DateRange, &InterestRate)>> {
        let parts: Vec<(DateRange, &InterestRate)> = self
            .rates
            .iter()
            .filter_map(|rate| rate.span_within(range).map(|span| (span, rate)))
            .collect();

        let mut expected = range.start();
        for (span, _) in &parts {
            if span.start() != expected {
                return Err(LeaseError::MissingInterestRate { date: expected });
            }
            expected = span.end() + Duration::days(1);
        }
        if parts.is_empty() || expected <= range.end() {
            return Err(LeaseError::MissingInterestRate { date: expected });
        }
        Ok(parts)
    }
}

/// Process-wide cache of the interest-rate table.
#[derive(Debug, Default)]
pub struct InterestRateRegistry {
    table: RwLock<Arc<InterestRateTable>>,
}

impl InterestRateRegistry {
    pub fn new(table: InterestRateTable) -> Self {
        Self {
            table: RwLock::new(Arc::new(table)),
        }
    }

    pub fn snapshot(&self) -> Arc<InterestRateTable> {
        Arc::clone(&self.table.read())
    }

    pub fn refresh(&self, table: InterestRateTable) {
        *self.table.write() = Arc::new(table);
    }
}

/// Interest accrued in one rate period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i64,
    pub penalty_rate: Percent,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestBreakdown {
    pub invoice: InvoiceId,
    pub outstanding_amount: Money,
    pub calculation_date: NaiveDate,
    pub periods: Vec<InterestPeriod>,
    pub total: Money,
}

/// Penalty interest of `invoice` up to `calculation_date`.
///
/// Invoices that are not open, or not yet overdue, accrue nothing.
pub fn calculate_penalty_interest(
    invoice: &Invoice,
    calculation_date: NaiveDate,
    rates: &InterestRateTable,
) -> LeaseResult<InterestBreakdown> {
    let mut breakdown = InterestBreakdown {
        invoice: invoice.id,
        outstanding_amount: invoice.outstanding_amount,
        calculation_date,
        periods: Vec::new(),
        total: Decimal::ZERO,
    };
    if invoice.state != InvoiceState::Open || invoice.outstanding_amount <= Decimal::ZERO {
        return Ok(breakdown);
    }

    let due = invoice
        .postpone_date
        .map_or(invoice.due_date, |postponed| postponed.max(invoice.due_date));
    let Some(start) = due.checked_add_signed(Duration::days(1)) else {
        return Ok(breakdown);
    };
    let Some(overdue) = DateRange::ordered(start, calculation_date) else {
        return Ok(breakdown);
    };

    for (span, rate) in rates.split(&overdue)? {
        let days = span.days();
        let amount = round_money(
            invoice.outstanding_amount * rate.penalty_rate / Decimal::ONE_HUNDRED
                * Decimal::from(days)
                / DAYS_IN_YEAR,
        );
        breakdown.periods.push(InterestPeriod {
            start_date: span.start(),
            end_date: span.end(),
            days,
            penalty_rate: rate.penalty_rate,
            amount,
        });
    }
    breakdown.total = breakdown.periods.iter().map(|period| period.amount).sum();
    Ok(breakdown)
}
