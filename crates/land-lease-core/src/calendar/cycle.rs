use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::date_range::DateRange;

/// The twelve-month window that forms one rent year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentCycle {
    #[default]
    JanuaryToDecember,
    AprilToMarch,
}

impl RentCycle {
    const fn start_month(self) -> u32 {
        match self {
            RentCycle::JanuaryToDecember => 1,
            RentCycle::AprilToMarch => 4,
        }
    }

    /// Rent year that `date` belongs to. For April-to-March cycles the year
    /// is named after the April that starts it. This is also the adjustment
    /// year used when choosing an index.
    pub fn cycle_year(self, date: NaiveDate) -> i32 {
        if date.month() >= self.start_month() {
            date.year()
        } else {
            date.year() - 1
        }
    }

    /// Full date range of the rent year named `year`.
    pub fn year_range(self, year: i32) -> Option<DateRange> {
        let start = NaiveDate::from_ymd_opt(year, self.start_month(), 1)?;
        let end = match self {
            RentCycle::JanuaryToDecember => NaiveDate::from_ymd_opt(year, 12, 31)?,
            RentCycle::AprilToMarch => NaiveDate::from_ymd_opt(year + 1, 3, 31)?,
        };
        DateRange::ordered(start, end)
    }

    fn boundaries_within(self, range: &DateRange) -> Vec<NaiveDate> {
        (range.start().year()..=range.end().year())
            .filter_map(|year| NaiveDate::from_ymd_opt(year, self.start_month(), 1))
            .collect()
    }
}

/// Split a closed range at every rent-year boundary of `cycle`. The pieces
/// are non-empty and cover the input exactly once.
pub fn split_range_by_cycle(range: &DateRange, cycle: RentCycle) -> Vec<DateRange> {
    range.split_at(&cycle.boundaries_within(range))
}

/// [`split_range_by_cycle`] applied to each range independently, keeping the
/// input order. Identical inputs produce identical (duplicated) outputs.
pub fn split_ranges_by_cycle(ranges: &[DateRange], cycle: RentCycle) -> Vec<DateRange> {
    ranges
        .iter()
        .flat_map(|range| split_range_by_cycle(range, cycle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn r(a: NaiveDate, b: NaiveDate) -> DateRange {
        DateRange::new(a, b).unwrap()
    }

    #[test]
    fn test_april_to_march_split() {
        let range = r(d(2018, 1, 1), d(2018, 12, 31));
        let pieces = split_range_by_cycle(&range, RentCycle::AprilToMarch);
        assert_eq!(
            pieces,
            vec![r(d(2018, 1, 1), d(2018, 3, 31)), r(d(2018, 4, 1), d(2018, 12, 31))]
        );
    }

    #[test]
    fn test_calendar_cycle_split_over_years() {
        let range = r(d(2017, 7, 1), d(2019, 2, 28));
        let pieces = split_range_by_cycle(&range, RentCycle::JanuaryToDecember);
        assert_eq!(pieces.len(), 3);
        let total: i64 = pieces.iter().map(|p| p.days()).sum();
        assert_eq!(total, range.days());
        assert_eq!(pieces[1], DateRange::year(2018).unwrap());
    }

    #[test]
    fn test_split_starting_on_boundary_not_duplicated() {
        let range = r(d(2018, 4, 1), d(2019, 3, 31));
        assert_eq!(
            split_range_by_cycle(&range, RentCycle::AprilToMarch),
            vec![range]
        );
    }

    #[test]
    fn test_split_ranges_keeps_duplicates() {
        let range = r(d(2018, 1, 1), d(2018, 12, 31));
        let pieces = split_ranges_by_cycle(&[range, range], RentCycle::AprilToMarch);
        assert_eq!(pieces.len(), 4);
        assert_eq!(pieces[0], pieces[2]);
    }

    #[test]
    fn test_cycle_year() {
        assert_eq!(RentCycle::AprilToMarch.cycle_year(d(2018, 3, 31)), 2017);
        assert_eq!(RentCycle::AprilToMarch.cycle_year(d(2018, 4, 1)), 2018);
        assert_eq!(RentCycle::JanuaryToDecember.cycle_year(d(2018, 3, 31)), 2018);
        assert_eq!(
            RentCycle::AprilToMarch.year_range(2017),
            Some(r(d(2017, 4, 1), d(2018, 3, 31)))
        );
    }
}
