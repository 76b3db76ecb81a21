use std::collections::HashSet;

use chrono::{Days, NaiveDate};

const ONE_DAY: Days = Days::new(1);

pub trait HolidayCalendar: Send + Sync {
    fn is_holiday(&self, d: NaiveDate) -> bool;

    fn get_holiday_set(&self, year: i32) -> HashSet<NaiveDate>;

    fn is_business_day(&self, d: NaiveDate) -> bool {
        !self.is_holiday(d)
    }

    fn shift_n_business_day(&self, horizon: NaiveDate, n: i32) -> NaiveDate {
        let shif_one_day = if n >= 0 {
            |d: NaiveDate| d + ONE_DAY
        } else {
            |d: NaiveDate| d - ONE_DAY
        };

        let mut m = n.unsigned_abs();
        let mut d = horizon;
        while m > 0 {
            d = shif_one_day(d);
            m -= self.is_business_day(d) as u32;
        }
        d
    }

    /// 先往後滾到營業日，再往後數 `n` 個營業日。
    fn add_business_days(&self, d: NaiveDate, n: u32) -> NaiveDate {
        let start = self.nearest_business_day(d);
        self.shift_n_business_day(start, n as i32)
    }

    /// `d` itself when it is a business day, else the next one.
    fn nearest_business_day(&self, d: NaiveDate) -> NaiveDate {
        let mut d = d;
        while self.is_holiday(d) {
            d = d + ONE_DAY;
        }
        d
    }

    fn next_business_day(&self, d: NaiveDate) -> NaiveDate {
        self.shift_n_business_day(d, 1)
    }

    fn previous_business_day(&self, d: NaiveDate) -> NaiveDate {
        self.shift_n_business_day(d, -1)
    }
}
