//! Due-date schedules and the billing periods they cover.

use chrono::{Datelike, NaiveDate};

use crate::calendar::{last_day_of_month, DateRange, DayMonth};
use crate::error::CalculatorError;

use super::model::{DueDatesType, Rent};

/// Due dates per year with a canonical fixed schedule.
pub const SUPPORTED_DUE_DATES_PER_YEAR: [u32; 4] = [1, 2, 4, 12];

fn day_month(day: u32, month: u32) -> Option<DayMonth> {
    DayMonth::new(day, month).ok()
}

/// Canonical due dates of a fixed schedule. Unsupported counts (3 and
/// anything not in [`SUPPORTED_DUE_DATES_PER_YEAR`]) yield no dates.
pub fn fixed_due_dates(per_year: u32) -> Vec<DayMonth> {
    let dates: Vec<Option<DayMonth>> = match per_year {
        1 => vec![day_month(30, 6)],
        2 => vec![day_month(15, 3), day_month(30, 9)],
        4 => vec![
            day_month(1, 3),
            day_month(15, 4),
            day_month(15, 7),
            day_month(15, 10),
        ],
        12 => (1..=12).map(|month| day_month(1, month)).collect(),
        _ => Vec::new(),
    };
    dates.into_iter().flatten().collect()
}

/// Split a calendar year into `count` equally long month blocks.
fn year_blocks(year: i32, count: usize) -> Option<Vec<DateRange>> {
    if count == 0 || 12 % count != 0 {
        return None;
    }
    let months = (12 / count) as u32;
    (0..count as u32)
        .map(|block| {
            let first = block * months + 1;
            let start = NaiveDate::from_ymd_opt(year, first, 1)?;
            let end = last_day_of_month(year, first + months - 1)?;
            DateRange::new(start, end).ok()
        })
        .collect()
}

impl Rent {
    /// Due dates of one year in chronological order.
    pub fn due_day_months(&self) -> Vec<DayMonth> {
        let mut dates = match self.due_dates_type {
            DueDatesType::Fixed => self
                .due_dates_per_year
                .map(fixed_due_dates)
                .unwrap_or_default(),
            DueDatesType::Custom => self.custom_due_dates.clone(),
        };
        dates.sort();
        dates.dedup();
        dates
    }

    /// Fail when the schedule cannot produce due dates.
    pub fn validate_due_dates(&self) -> Result<(), CalculatorError> {
        match self.due_dates_type {
            DueDatesType::Fixed => {
                let per_year = self.due_dates_per_year.unwrap_or(0);
                if SUPPORTED_DUE_DATES_PER_YEAR.contains(&per_year) {
                    Ok(())
                } else {
                    Err(CalculatorError::UnsupportedDueDatesPerYear {
                        rent: self.id,
                        per_year,
                    })
                }
            }
            DueDatesType::Custom => {
                let count = self.custom_due_dates.len();
                if count > 0 && 12 % count == 0 {
                    Ok(())
                } else {
                    Err(CalculatorError::UnsupportedDueDatesPerYear {
                        rent: self.id,
                        per_year: count as u32,
                    })
                }
            }
        }
    }

    /// Every due date of the schedule that falls inside `range`.
    pub fn get_due_dates_for_period(&self, range: &DateRange) -> Vec<NaiveDate> {
        let day_months = self.due_day_months();
        (range.start().year()..=range.end().year())
            .flat_map(|year| day_months.iter().filter_map(move |dm| dm.to_date(year)))
            .filter(|date| range.contains(*date))
            .collect()
    }

    /// Billing period that a due date covers, or `None` when `due_date` is
    /// not on the schedule (or falls outside the seasonal window).
    pub fn get_billing_period_from_due_date(&self, due_date: NaiveDate) -> Option<DateRange> {
        let year = due_date.year();
        let day_months = self.due_day_months();
        let position = day_months
            .iter()
            .position(|dm| dm.to_date(year) == Some(due_date))?;
        let period = year_blocks(year, day_months.len())?.get(position).copied()?;

        match &self.seasonal {
            Some(window) => {
                let season = window.in_year(year)?;
                if !season.contains(due_date) {
                    return None;
                }
                period.intersection(&season)
            }
            None => Some(period),
        }
    }

    /// All `(due_date, billing_period)` pairs of a year, in due-date order.
    pub fn get_all_billing_periods_for_year(&self, year: i32) -> Vec<(NaiveDate, DateRange)> {
        let Some(whole_year) = DateRange::year(year) else {
            return Vec::new();
        };
        self.get_due_dates_for_period(&whole_year)
            .into_iter()
            .filter_map(|due| {
                self.get_billing_period_from_due_date(due)
                    .map(|period| (due, period))
            })
            .collect()
    }
}
