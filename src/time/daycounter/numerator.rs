use chrono::{
    Datelike,
    NaiveDate
};

use crate::time::daycounter::daycounter::DayCounterNumerator;

/// Calendar days.
pub struct ActualNumerator;

impl DayCounterNumerator for ActualNumerator {
    #[inline]
    fn days_between(&self, d1: NaiveDate, d2: NaiveDate) -> f64 {
        (d2 - d1).num_days() as f64
    }
}

/// 30/360 bond basis: D1 = 31 → 30；若 D1 調整後為 30，D2 = 31 → 30。
pub struct ThirtyNumerator;

impl DayCounterNumerator for ThirtyNumerator {
    fn days_between(&self, d1: NaiveDate, d2: NaiveDate) -> f64 {
        let day1 = d1.day().min(30) as i32;
        let day2 = if day1 == 30 { d2.day().min(30) } else { d2.day() } as i32;
        let years = d2.year() - d1.year();
        let months = d2.month() as i32 - d1.month() as i32;
        (360 * years + 30 * months + day2 - day1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn actual_counts_calendar_days() {
        assert_eq!(ActualNumerator.days_between(ymd(2024, 2, 1), ymd(2024, 3, 1)), 29.0);
        assert_eq!(ActualNumerator.days_between(ymd(2024, 3, 1), ymd(2024, 2, 1)), -29.0);
    }

    #[test]
    fn thirty_caps_month_ends() {
        assert_eq!(ThirtyNumerator.days_between(ymd(2022, 1, 31), ymd(2022, 3, 31)), 60.0);
        assert_eq!(ThirtyNumerator.days_between(ymd(2022, 1, 15), ymd(2022, 3, 31)), 76.0);
        assert_eq!(ThirtyNumerator.days_between(ymd(2022, 2, 28), ymd(2023, 2, 28)), 360.0);
    }
}
