use std::collections::HashSet;

use chrono::{
    Datelike,
    Days,
    NaiveDate,
    Weekday
};

use crate::time::calendar::holidaycalendar::HolidayCalendar;

/// Weekend set as a bitmask, Mon(0) ... Sun(6).
#[derive(Clone, Copy)]
struct WeekendMask(u8);

impl WeekendMask {
    fn new(weekends: &HashSet<Weekday>) -> Self {
        let mut mask = 0u8;
        for &weekday in weekends {
            mask |= 1u8 << weekday.num_days_from_monday();
        }
        WeekendMask(mask)
    }

    #[inline]
    fn is_weekend(&self, weekday: Weekday) -> bool {
        let bit = 1u8 << weekday.num_days_from_monday();
        (self.0 & bit) != 0
    }

    fn weekend_list(&self) -> Vec<Weekday> {
        (0..7u8)
            .filter(|day| (self.0 & (1u8 << day)) != 0)
            .filter_map(|day| Weekday::try_from(day).ok())
            .collect()
    }
}

/// 週末遮罩加上明列的假日清單；假日產生規則不在這裡處理。
pub struct SimpleCalendar {
    weekends: WeekendMask,
    holidays: HashSet<NaiveDate>,
    additional_business_days: HashSet<NaiveDate>
}

impl SimpleCalendar {
    pub fn new(
        weekends: HashSet<Weekday>,
        holidays: Vec<NaiveDate>,
        additional_business_days: Vec<NaiveDate>
    ) -> SimpleCalendar {
        SimpleCalendar {
            weekends: WeekendMask::new(&weekends),
            holidays: holidays.into_iter().collect(),
            additional_business_days: additional_business_days.into_iter().collect()
        }
    }

    /// Saturday and Sunday off, no holidays.
    pub fn weekends_only() -> SimpleCalendar {
        SimpleCalendar::new(HashSet::from([Weekday::Sat, Weekday::Sun]), Vec::new(), Vec::new())
    }

    #[inline]
    pub fn is_weekend(&self, d: NaiveDate) -> bool {
        self.weekends.is_weekend(d.weekday())
    }

    pub fn holidays(&self) -> &HashSet<NaiveDate> {
        &self.holidays
    }
}

const SEVEN_DAYS: Days = Days::new(7);

impl HolidayCalendar for SimpleCalendar {
    fn is_holiday(&self, d: NaiveDate) -> bool {
        if self.additional_business_days.contains(&d) {
            return false;
        }
        self.is_weekend(d) || self.holidays.contains(&d)
    }

    fn get_holiday_set(&self, year: i32) -> HashSet<NaiveDate> {
        let mut holiday_set = HashSet::with_capacity(120);

        if let (Some(year_start), Some(year_end)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31)
        ) {
            for target_weekday in self.weekends.weekend_list() {
                let offset = (7 + target_weekday.num_days_from_monday()
                    - year_start.weekday().num_days_from_monday()) % 7;
                let mut current = year_start + Days::new(offset as u64);
                while current <= year_end {
                    holiday_set.insert(current);
                    current = current + SEVEN_DAYS;
                }
            }
        }

        holiday_set.extend(self.holidays.iter().filter(|d| d.year() == year).copied());

        for b_day in self.additional_business_days.iter().filter(|d| d.year() == year) {
            holiday_set.remove(b_day);
        }

        holiday_set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn nyb_2022() -> SimpleCalendar {
        SimpleCalendar::new(
            HashSet::from([Weekday::Sat, Weekday::Sun]),
            vec![ymd(2022, 10, 10), ymd(2022, 11, 11), ymd(2022, 11, 24)],
            Vec::new()
        )
    }

    #[test]
    fn weekends_and_holidays() {
        let cal = nyb_2022();
        assert!(cal.is_holiday(ymd(2022, 10, 8)));
        assert!(cal.is_holiday(ymd(2022, 10, 10)));
        assert!(cal.is_business_day(ymd(2022, 10, 11)));
    }

    #[test]
    fn add_business_days_rolls_forward_first() {
        let cal = nyb_2022();
        // 週六先滾到 10/11（10/10 為假日），再加一個營業日
        assert_eq!(cal.add_business_days(ymd(2022, 10, 8), 1), ymd(2022, 10, 12));
        assert_eq!(cal.add_business_days(ymd(2022, 10, 7), 1), ymd(2022, 10, 11));
        assert_eq!(cal.nearest_business_day(ymd(2022, 10, 9)), ymd(2022, 10, 11));
        assert_eq!(cal.nearest_business_day(ymd(2022, 10, 11)), ymd(2022, 10, 11));
        assert_eq!(cal.previous_business_day(ymd(2022, 10, 11)), ymd(2022, 10, 7));
    }

    #[test]
    fn holiday_set_contains_every_weekend() {
        let cal = nyb_2022();
        let set = cal.get_holiday_set(2022);
        // 2022 年有 105 個週末日
        assert_eq!(set.len(), 105 + 3);
        assert!(set.contains(&ymd(2022, 1, 1)));
        assert!(set.contains(&ymd(2022, 12, 31)));
    }
}
