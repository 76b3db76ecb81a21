use chrono::NaiveDate;

use crate::curveerror::{
    CurveError,
    CurveResult
};
use crate::time::calendar::holidaycalendar::HolidayCalendar;
use crate::time::daycounter::daycounter::DayCount;
use crate::time::period::{
    DateFrequency,
    Period
};
use crate::time::schedule::generationdirection::GenerationDirection;

/// Rules for rolling a coupon schedule between two unadjusted dates.
#[derive(Debug, Clone, Copy)]
pub struct CouponScheduleRule {
    pub frequency: DateFrequency,
    pub direction: GenerationDirection,
    pub payment_days: u32,
    pub pay_dates_relative_to_adj: bool,
    pub force_start_and_end: bool,
}

impl CouponScheduleRule {
    /// Backward from maturity, paid on the unadjusted end dates.
    pub fn backward(frequency: DateFrequency, payment_days: u32) -> CouponScheduleRule {
        CouponScheduleRule {
            frequency,
            direction: GenerationDirection::Backward,
            payment_days,
            pay_dates_relative_to_adj: false,
            force_start_and_end: false,
        }
    }
}

/// Coupon periods in ascending order, each with unadjusted and adjusted
/// accrual dates and a payment date.
#[derive(Debug, Clone)]
pub struct CouponSchedule {
    unadj_start_dates: Vec<NaiveDate>,
    unadj_end_dates: Vec<NaiveDate>,
    adj_start_dates: Vec<NaiveDate>,
    adj_end_dates: Vec<NaiveDate>,
    payment_dates: Vec<NaiveDate>,
}

fn roll_unadjusted(
    start_date: NaiveDate,
    end_date: NaiveDate,
    rule: &CouponScheduleRule,
) -> (Vec<NaiveDate>, Vec<NaiveDate>) {
    let frequency = rule.frequency.period();
    let step = Period::new(frequency.number() * rule.direction as i32, frequency.unit());
    let mut starts = Vec::new();
    let mut ends = Vec::new();

    match rule.direction {
        GenerationDirection::Forward => {
            let mut s = start_date;
            let mut e = s + step;
            if e > end_date {
                starts.push(start_date);
                ends.push(end_date);
            }
            while e <= end_date {
                starts.push(s);
                ends.push(e);
                s = e;
                e = s + step;
            }
            if rule.force_start_and_end {
                if let Some(last) = ends.last_mut() {
                    *last = end_date;
                }
            }
        }
        GenerationDirection::Backward => {
            let mut e = end_date;
            let mut s = e + step;
            if s < start_date {
                starts.push(start_date);
                ends.push(end_date);
            }
            while s >= start_date {
                starts.push(s);
                ends.push(e);
                e = s;
                s = e + step;
            }
            if rule.force_start_and_end {
                if let Some(first) = starts.last_mut() {
                    *first = start_date;
                }
            }
            starts.reverse();
            ends.reverse();
        }
    }
    (starts, ends)
}

impl CouponSchedule {
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        rule: &CouponScheduleRule,
        coupon_calendar: &dyn HolidayCalendar,
        payment_calendar: &dyn HolidayCalendar,
    ) -> CurveResult<CouponSchedule> {
        if start_date >= end_date {
            return Err(CurveError::validation(format!(
                "CouponSchedule: start date {start_date} must precede end date {end_date}"
            )));
        }

        let (unadj_start_dates, unadj_end_dates) = roll_unadjusted(start_date, end_date, rule);

        // 調整後的起始日沿用上一期的調整後到期日
        let adj_end_dates: Vec<NaiveDate> = unadj_end_dates
            .iter()
            .map(|&d| coupon_calendar.nearest_business_day(d))
            .collect();
        let mut adj_start_dates = Vec::with_capacity(adj_end_dates.len());
        adj_start_dates.push(coupon_calendar.nearest_business_day(unadj_start_dates[0]));
        adj_start_dates.extend_from_slice(&adj_end_dates[..adj_end_dates.len() - 1]);

        let pay_relative_to = if rule.pay_dates_relative_to_adj {
            &adj_end_dates
        } else {
            &unadj_end_dates
        };
        let payment_dates = pay_relative_to
            .iter()
            .map(|&d| payment_calendar.add_business_days(d, rule.payment_days))
            .collect();

        Ok(CouponSchedule {
            unadj_start_dates,
            unadj_end_dates,
            adj_start_dates,
            adj_end_dates,
            payment_dates,
        })
    }

    pub fn len(&self) -> usize {
        self.payment_dates.len()
    }

    pub fn unadj_start_dates(&self) -> &[NaiveDate] {
        &self.unadj_start_dates
    }

    pub fn unadj_end_dates(&self) -> &[NaiveDate] {
        &self.unadj_end_dates
    }

    pub fn adj_start_dates(&self) -> &[NaiveDate] {
        &self.adj_start_dates
    }

    pub fn adj_end_dates(&self) -> &[NaiveDate] {
        &self.adj_end_dates
    }

    pub fn payment_dates(&self) -> &[NaiveDate] {
        &self.payment_dates
    }

    /// Adjusted accrual periods.
    pub fn period_dates(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.adj_start_dates
            .iter()
            .copied()
            .zip(self.adj_end_dates.iter().copied())
            .collect()
    }

    pub fn dcfs(&self, day_count: DayCount) -> Vec<f64> {
        self.period_dates()
            .into_iter()
            .map(|(s, e)| day_count.year_fraction(s, e))
            .collect()
    }

    /// Index of the unadjusted period with `start <= date < end`.
    pub fn coupon_period(&self, date: NaiveDate) -> Option<usize> {
        self.unadj_start_dates
            .iter()
            .zip(&self.unadj_end_dates)
            .position(|(&s, &e)| s <= date && date < e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::calendar::simplecalendar::SimpleCalendar;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn backward_from_maturity() {
        let cal = SimpleCalendar::weekends_only();
        let rule = CouponScheduleRule::backward(DateFrequency::Semiannually, 0);
        let schedule = CouponSchedule::new(ymd(2022, 9, 15), ymd(2025, 9, 30), &rule, &cal, &cal).unwrap();
        assert_eq!(schedule.len(), 6);
        assert_eq!(schedule.unadj_start_dates()[0], ymd(2022, 9, 30));
        assert_eq!(schedule.unadj_end_dates()[0], ymd(2023, 3, 30));
        assert_eq!(schedule.unadj_end_dates()[5], ymd(2025, 9, 30));

        // 2023-09-30 是星期六
        assert_eq!(schedule.adj_end_dates()[1], ymd(2023, 10, 2));
        assert_eq!(schedule.adj_start_dates()[2], ymd(2023, 10, 2));
        assert_eq!(schedule.payment_dates()[1], ymd(2023, 10, 2));
        assert_eq!(schedule.coupon_period(ymd(2022, 9, 20)), None);
        assert_eq!(schedule.coupon_period(ymd(2022, 10, 10)), Some(0));
        assert_eq!(schedule.coupon_period(ymd(2023, 9, 30)), Some(2));
        assert_eq!(schedule.coupon_period(ymd(2025, 9, 30)), None);
    }

    #[test]
    fn forced_start_and_forward_generation() {
        let cal = SimpleCalendar::weekends_only();
        let mut rule = CouponScheduleRule::backward(DateFrequency::Semiannually, 0);
        rule.force_start_and_end = true;
        let schedule = CouponSchedule::new(ymd(2022, 9, 15), ymd(2024, 9, 30), &rule, &cal, &cal).unwrap();
        assert_eq!(schedule.unadj_start_dates()[0], ymd(2022, 9, 15));
        assert_eq!(schedule.coupon_period(ymd(2022, 10, 10)), Some(0));

        rule.direction = GenerationDirection::Forward;
        rule.force_start_and_end = false;
        let schedule = CouponSchedule::new(ymd(2024, 1, 15), ymd(2025, 1, 15), &rule, &cal, &cal).unwrap();
        assert_eq!(schedule.unadj_end_dates(), &[ymd(2024, 7, 15), ymd(2025, 1, 15)]);
    }

    #[test]
    fn a_period_longer_than_the_span_is_a_single_coupon() {
        let cal = SimpleCalendar::weekends_only();
        let rule = CouponScheduleRule::backward(DateFrequency::Yearly, 1);
        let schedule = CouponSchedule::new(ymd(2024, 3, 1), ymd(2024, 9, 2), &rule, &cal, &cal).unwrap();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule.unadj_start_dates()[0], ymd(2024, 3, 1));
        assert_eq!(schedule.payment_dates()[0], ymd(2024, 9, 3));
        assert!(CouponSchedule::new(ymd(2024, 9, 2), ymd(2024, 3, 1), &rule, &cal, &cal).is_err());
    }

    #[test]
    fn day_count_fractions_over_adjusted_periods() {
        let cal = SimpleCalendar::weekends_only();
        let rule = CouponScheduleRule::backward(DateFrequency::Semiannually, 0);
        let schedule = CouponSchedule::new(ymd(2023, 1, 2), ymd(2024, 1, 2), &rule, &cal, &cal).unwrap();
        let dcfs = schedule.dcfs(DayCount::Act360);
        assert_eq!(dcfs.len(), 2);
        assert!((dcfs[0] - 182.0 / 360.0).abs() < 1e-12);
        assert!((dcfs[1] - 183.0 / 360.0).abs() < 1e-12);
    }
}
