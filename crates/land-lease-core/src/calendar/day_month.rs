use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LeaseError;
use crate::LeaseResult;

use super::date_range::last_day_of_month;

/// A recurring calendar day without a year (due dates, seasonal windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDayMonth")]
pub struct DayMonth {
    // month first so the derived ordering is chronological
    month: u32,
    day: u32,
}

#[derive(Deserialize)]
struct RawDayMonth {
    day: u32,
    month: u32,
}

impl TryFrom<RawDayMonth> for DayMonth {
    type Error = LeaseError;

    fn try_from(raw: RawDayMonth) -> Result<Self, Self::Error> {
        DayMonth::new(raw.day, raw.month)
    }
}

impl DayMonth {
    pub fn new(day: u32, month: u32) -> LeaseResult<Self> {
        // 2000 is a leap year so Feb-29 is accepted
        if NaiveDate::from_ymd_opt(2000, month, day).is_none() {
            return Err(LeaseError::InvalidInput {
                field: "day_month".into(),
                reason: format!("{day}.{month} is not a calendar day"),
            });
        }
        Ok(Self { month, day })
    }

    pub const fn day(&self) -> u32 {
        self.day
    }

    pub const fn month(&self) -> u32 {
        self.month
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }

    /// Absolute date of this day in `year`. Feb-29 falls back to Feb-28
    /// outside leap years.
    pub fn to_date(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day).or_else(|| {
            last_day_of_month(year, self.month).filter(|last| last.day() < self.day)
        })
    }
}

impl fmt::Display for DayMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.", self.day, self.month)
    }
}

pub fn daymonth_to_date(day_month: DayMonth, year: i32) -> Option<NaiveDate> {
    day_month.to_date(year)
}
