use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::time::calendar::holidaycalendar::HolidayCalendar;
use crate::time::calendar::simplecalendar::SimpleCalendar;

/// Combines two calendars using logical operations (union or intersection).
///
/// # Union
/// A date is a holiday if it's a holiday in EITHER calendar.
///
/// # Intersection
/// A date is a holiday if it's a holiday in BOTH calendars.
pub struct JointCalendar {
    c1: Arc<dyn HolidayCalendar>,
    c2: Arc<dyn HolidayCalendar>,
    logical_operator: fn(bool, bool) -> bool
}

impl JointCalendar {
    pub fn union(c1: Arc<dyn HolidayCalendar>, c2: Arc<dyn HolidayCalendar>) -> JointCalendar {
        JointCalendar {
            c1,
            c2,
            logical_operator: |b1, b2| b1 || b2
        }
    }

    pub fn intersection(c1: Arc<dyn HolidayCalendar>, c2: Arc<dyn HolidayCalendar>) -> JointCalendar {
        JointCalendar {
            c1,
            c2,
            logical_operator: |b1, b2| b1 && b2
        }
    }

    pub fn is_union(&self) -> bool {
        (self.logical_operator)(true, false)
    }

    /// 多個日曆取聯集；空清單時回傳只有週末的日曆。
    pub fn union_of(calendars: &[Arc<dyn HolidayCalendar>]) -> Arc<dyn HolidayCalendar> {
        match calendars {
            [] => Arc::new(SimpleCalendar::weekends_only()),
            [single] => Arc::clone(single),
            [first, rest @ ..] => rest.iter().fold(Arc::clone(first), |acc, c| {
                Arc::new(JointCalendar::union(acc, Arc::clone(c)))
            })
        }
    }
}

impl HolidayCalendar for JointCalendar {
    #[inline]
    fn is_holiday(&self, d: NaiveDate) -> bool {
        (self.logical_operator)(self.c1.is_holiday(d), self.c2.is_holiday(d))
    }

    fn get_holiday_set(&self, year: i32) -> HashSet<NaiveDate> {
        let s1 = self.c1.get_holiday_set(year);
        let s2 = self.c2.get_holiday_set(year);

        if self.is_union() {
            s1.union(&s2).copied().collect()
        } else {
            s1.intersection(&s2).copied().collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn calendar(holidays: Vec<NaiveDate>) -> Arc<dyn HolidayCalendar> {
        Arc::new(SimpleCalendar::new(HashSet::from([Weekday::Sat, Weekday::Sun]), holidays, Vec::new()))
    }

    #[test]
    fn union_and_intersection() {
        let us = calendar(vec![ymd(2022, 7, 4)]);
        let uk = calendar(vec![ymd(2022, 8, 29)]);
        let union = JointCalendar::union(Arc::clone(&us), Arc::clone(&uk));
        let inter = JointCalendar::intersection(us, uk);
        assert!(union.is_holiday(ymd(2022, 7, 4)) && union.is_holiday(ymd(2022, 8, 29)));
        assert!(!inter.is_holiday(ymd(2022, 7, 4)));
        assert!(inter.is_holiday(ymd(2022, 7, 2)));
        assert_eq!(union.get_holiday_set(2022).len(), 105 + 2);
    }

    #[test]
    fn union_of_empty_list_is_weekends_only() {
        let cal = JointCalendar::union_of(&[]);
        assert!(cal.is_holiday(ymd(2022, 10, 8)));
        assert!(cal.is_business_day(ymd(2022, 10, 10)));

        let joint = JointCalendar::union_of(&[calendar(vec![ymd(2022, 10, 10)]), calendar(vec![ymd(2022, 10, 11)])]);
        assert_eq!(joint.add_business_days(ymd(2022, 10, 7), 1), ymd(2022, 10, 12));
    }
}
