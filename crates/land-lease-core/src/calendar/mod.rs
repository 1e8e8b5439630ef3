//! Calendar arithmetic shared by the calculator and the invoice engine:
//! closed date ranges, rent-year cycles, recurring day-months and the two
//! year-fraction weightings.

mod cycle;
mod date_range;
mod day_month;

pub use cycle::{split_range_by_cycle, split_ranges_by_cycle, RentCycle};
pub use date_range::{
    days_in_month, fraction_of_year, last_day_of_month, month_fraction_of_year, DateRange,
};
pub use day_month::{daymonth_to_date, DayMonth};
