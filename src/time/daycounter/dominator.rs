use chrono::{
    Datelike,
    NaiveDate
};

use crate::time::daycounter::daycounter::{
    DayCounterDominator,
    DayCounterNumerator
};
use crate::time::utility::is_leap;

/// Fixed days per year, e.g. 365 or 360.
pub struct FixedBasis(pub f64);

impl DayCounterDominator for FixedBasis {
    #[inline]
    fn year_fraction(&self, start_date: NaiveDate, end_date: NaiveDate, numerator: &dyn DayCounterNumerator) -> f64 {
        numerator.days_between(start_date, end_date) / self.0
    }
}

/// ACT/ACT ISDA: each calendar year is counted over its own length.
pub struct IsdaActualBasis;

fn days_in_year(year: i32) -> f64 {
    if is_leap(year) { 366.0 } else { 365.0 }
}

impl DayCounterDominator for IsdaActualBasis {
    fn year_fraction(&self, start_date: NaiveDate, end_date: NaiveDate, numerator: &dyn DayCounterNumerator) -> f64 {
        let (y1, y2) = (start_date.year(), end_date.year());
        if y1 == y2 {
            return numerator.days_between(start_date, end_date) / days_in_year(y1);
        }
        let (Some(after_start), Some(before_end)) =
            (NaiveDate::from_ymd_opt(y1 + 1, 1, 1), NaiveDate::from_ymd_opt(y2, 1, 1))
        else {
            return numerator.days_between(start_date, end_date) / 365.0;
        };
        // 頭尾兩段各自按所在年份的天數，中間整年各記 1
        numerator.days_between(start_date, after_start) / days_in_year(y1)
            + numerator.days_between(before_end, end_date) / days_in_year(y2)
            + (y2 - y1 - 1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::time::daycounter::numerator::ActualNumerator;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn isda_splits_across_years() {
        let yf = IsdaActualBasis.year_fraction(ymd(2023, 7, 1), ymd(2025, 3, 1), &ActualNumerator);
        assert_abs_diff_eq!(yf, 184.0 / 365.0 + 1.0 + 59.0 / 365.0, epsilon = 1e-15);
        let leap = IsdaActualBasis.year_fraction(ymd(2024, 1, 1), ymd(2024, 7, 1), &ActualNumerator);
        assert_abs_diff_eq!(leap, 182.0 / 366.0, epsilon = 1e-15);
        let act360 = FixedBasis(360.0).year_fraction(ymd(2024, 1, 1), ymd(2024, 7, 1), &ActualNumerator);
        assert_abs_diff_eq!(act360, 182.0 / 360.0, epsilon = 1e-15);
    }
}
