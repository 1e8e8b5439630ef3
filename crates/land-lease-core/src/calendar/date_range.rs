use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LeaseError;
use crate::LeaseResult;

/// Closed date range: both `start` and `end` are billable days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = LeaseError;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        DateRange::new(raw.start, raw.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> LeaseResult<Self> {
        if start > end {
            return Err(LeaseError::DateError(format!(
                "empty date range: {start} is after {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Build a range from two dates already known to be ordered.
    pub(crate) fn ordered(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn single_day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Whole calendar year.
    pub fn year(year: i32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)?;
        Some(Self { start, end })
    }

    /// Whole calendar month.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = last_day_of_month(year, month)?;
        Some(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days in the range, inclusive of both ends.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn contains_range(&self, other: &DateRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn intersection(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        DateRange::ordered(start, end)
    }

    /// Intersect with optional open-ended bounds (`None` means unbounded).
    pub fn clamp(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<DateRange> {
        let start = start.map_or(self.start, |s| s.max(self.start));
        let end = end.map_or(self.end, |e| e.min(self.end));
        DateRange::ordered(start, end)
    }

    /// Parts of `self` not covered by any of `others`, in date order.
    pub fn subtract(&self, others: &[DateRange]) -> Vec<DateRange> {
        let mut holes: Vec<DateRange> = others
            .iter()
            .filter_map(|other| self.intersection(other))
            .collect();
        holes.sort();

        let mut remainder = Vec::new();
        let mut cursor = Some(self.start);
        for hole in holes {
            let Some(from) = cursor else { break };
            if hole.start > from {
                if let Some(piece) = DateRange::ordered(from, hole.start - Duration::days(1)) {
                    remainder.push(piece);
                }
            }
            if hole.end >= from {
                cursor = hole.end.succ_opt().filter(|next| *next <= self.end);
            }
        }
        if let Some(from) = cursor {
            if let Some(piece) = DateRange::ordered(from, self.end) {
                remainder.push(piece);
            }
        }
        remainder
    }

    /// Split the range so that every date in `boundaries` that falls strictly
    /// inside it starts a new piece.
    pub fn split_at(&self, boundaries: &[NaiveDate]) -> Vec<DateRange> {
        let mut cuts: Vec<NaiveDate> = boundaries
            .iter()
            .copied()
            .filter(|date| *date > self.start && *date <= self.end)
            .collect();
        cuts.sort();
        cuts.dedup();

        let mut pieces = Vec::with_capacity(cuts.len() + 1);
        let mut from = self.start;
        for cut in cuts {
            pieces.push(DateRange {
                start: from,
                end: cut - Duration::days(1),
            });
            from = cut;
        }
        pieces.push(DateRange {
            start: from,
            end: self.end,
        });
        pieces
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    last_day_of_month(year, month).map_or(30, |d| d.day())
}

/// Weight of `subrange` within the rent year `[rent_year_start, rent_year_end]`,
/// counted in literal days (leap days included).
pub fn fraction_of_year(
    subrange: &DateRange,
    rent_year_start: NaiveDate,
    rent_year_end: NaiveDate,
) -> Decimal {
    let year_days = (rent_year_end - rent_year_start).num_days() + 1;
    if year_days <= 0 {
        return Decimal::ZERO;
    }
    Decimal::from(subrange.days()) / Decimal::from(year_days)
}

/// Weight of `subrange` as twelfths of a year: every fully covered calendar
/// month counts 1/12, partially covered months count their covered days
/// over the month length.
pub fn month_fraction_of_year(subrange: &DateRange) -> Decimal {
    let mut months = Decimal::ZERO;
    let mut cursor = subrange.start;
    while cursor <= subrange.end {
        let month_len = days_in_month(cursor.year(), cursor.month());
        let month_end = last_day_of_month(cursor.year(), cursor.month()).unwrap_or(cursor);
        let piece_end = month_end.min(subrange.end);
        let covered = (piece_end - cursor).num_days() + 1;
        if covered == i64::from(month_len) {
            months += Decimal::ONE;
        } else {
            months += Decimal::from(covered) / Decimal::from(month_len);
        }
        match piece_end.succ_opt() {
            Some(next) => cursor = next,
            None => break,
        }
    }
    months / Decimal::from(12)
}
