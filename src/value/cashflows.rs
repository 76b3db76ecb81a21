use std::cmp::Reverse;
use std::collections::{
    BTreeMap,
    BinaryHeap
};
use std::ops::Index;

use chrono::NaiveDate;
use serde::Serialize;

use crate::curveerror::{
    CurveError,
    CurveResult
};
use crate::time::daycounter::daycounter::DayCount;

fn product(params: &[f64]) -> f64 {
    params.iter().product()
}

fn missing_date_error(leg: &str, date: NaiveDate) -> CurveError {
    CurveError::validation(format!("{leg}: no cashflow on {date}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// CashflowRecord
// ─────────────────────────────────────────────────────────────────────────────

/// One row of an exported cashflow schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashflowRecord {
    pub leg_index: usize,
    pub payment_date: NaiveDate,
    #[serde(rename = "type")]
    pub record_type: String,
    /// 浮動息票在投影前沒有金額
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_count_fraction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projected_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_time: Option<f64>,
}

impl CashflowRecord {
    fn new(leg_index: usize, payment_date: NaiveDate, record_type: &str, amount: Option<f64>) -> CashflowRecord {
        CashflowRecord {
            leg_index,
            payment_date,
            record_type: record_type.to_string(),
            amount,
            day_count_fraction: None,
            start_date: None,
            end_date: None,
            rate: None,
            projected_amount: None,
            payment_time: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fixed amounts
// ─────────────────────────────────────────────────────────────────────────────

/// Known amounts on known dates.
#[derive(Debug, Clone)]
pub struct FixedCashflows {
    flows: BTreeMap<NaiveDate, f64>,
}

impl FixedCashflows {
    pub fn new(payment_dates: &[NaiveDate], amounts: &[f64]) -> CurveResult<FixedCashflows> {
        if payment_dates.len() != amounts.len() {
            return Err(CurveError::validation(format!(
                "FixedCashflows: {} payment dates but {} amounts",
                payment_dates.len(),
                amounts.len()
            )));
        }
        let mut flows = BTreeMap::new();
        for (&d, &a) in payment_dates.iter().zip(amounts) {
            *flows.entry(d).or_insert(0.0) += a;
        }
        Ok(FixedCashflows { flows })
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.flows.keys().copied().collect()
    }

    pub fn sum(&self) -> f64 {
        self.flows.values().sum()
    }

    /// 合約金額乘上所有投影因子；沒有因子時為 1
    pub fn amount(&self, date: NaiveDate, params: &[f64]) -> CurveResult<f64> {
        self.flows
            .get(&date)
            .map(|a| a * product(params))
            .ok_or_else(|| missing_date_error("FixedCashflows", date))
    }
}

/// Single redemption of the notional.
#[derive(Debug, Clone)]
pub struct PrincipalCashflows {
    flows: FixedCashflows,
}

impl PrincipalCashflows {
    pub fn new(payment_date: NaiveDate, notional: f64) -> PrincipalCashflows {
        let mut flows = BTreeMap::new();
        flows.insert(payment_date, notional);
        PrincipalCashflows { flows: FixedCashflows { flows } }
    }

    pub fn amount(&self, date: NaiveDate, params: &[f64]) -> CurveResult<f64> {
        self.flows
            .amount(date, params)
            .map_err(|_| missing_date_error("PrincipalCashflows", date))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Coupons
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CouponPeriod {
    pub payment_date: NaiveDate,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub day_count_fraction: f64,
}

/// Coupons whose rate is only known once projected: `notional · rate · dcf`.
#[derive(Debug, Clone)]
pub struct CouponCashflows {
    notional: f64,
    periods: Vec<CouponPeriod>,
    day_count: Option<DayCount>,
}

impl CouponCashflows {
    pub fn new(
        payment_dates: &[NaiveDate],
        notional: f64,
        dcfs: &[f64],
        period_dates: &[(NaiveDate, NaiveDate)],
        day_count: Option<DayCount>,
    ) -> CurveResult<CouponCashflows> {
        if payment_dates.len() != dcfs.len() || payment_dates.len() != period_dates.len() {
            return Err(CurveError::validation(format!(
                "CouponCashflows: got {} payment dates, {} day count fractions and {} periods",
                payment_dates.len(),
                dcfs.len(),
                period_dates.len()
            )));
        }
        if let Some(dcf) = dcfs.iter().find(|dcf| !(**dcf >= 0.0)) {
            return Err(CurveError::validation(format!(
                "CouponCashflows: day count fraction {dcf} must be non-negative"
            )));
        }

        let mut periods: Vec<CouponPeriod> = payment_dates
            .iter()
            .zip(dcfs)
            .zip(period_dates)
            .map(|((&payment_date, &day_count_fraction), &(start_date, end_date))| CouponPeriod {
                payment_date,
                start_date,
                end_date,
                day_count_fraction,
            })
            .collect();
        periods.sort_by_key(|p| (p.payment_date, p.start_date));
        Ok(CouponCashflows { notional, periods, day_count })
    }

    pub fn notional(&self) -> f64 {
        self.notional
    }

    pub fn periods(&self) -> &[CouponPeriod] {
        &self.periods
    }

    pub fn day_count(&self) -> Option<DayCount> {
        self.day_count
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.periods.iter().map(|p| p.payment_date).collect();
        dates.dedup();
        dates
    }

    fn accrual_on(&self, date: NaiveDate) -> Option<f64> {
        let mut paying = self.periods.iter().filter(|p| p.payment_date == date).peekable();
        paying.peek()?;
        Some(paying.map(|p| self.notional * p.day_count_fraction).sum())
    }

    /// `params[0]` 為投影利率，其餘為乘數
    pub fn amount(&self, date: NaiveDate, params: &[f64]) -> CurveResult<f64> {
        let (rate, factors) = params
            .split_first()
            .ok_or_else(|| CurveError::validation(format!("CouponCashflows: no projected rate on {date}")))?;
        self.accrual_on(date)
            .map(|accrual| accrual * rate * product(factors))
            .ok_or_else(|| missing_date_error("CouponCashflows", date))
    }

    fn records(&self, leg_index: usize, date: NaiveDate, record_type: &str, rate: Option<f64>) -> Vec<CashflowRecord> {
        self.periods
            .iter()
            .filter(|p| p.payment_date == date)
            .map(|p| {
                let amount = rate.map(|r| self.notional * r * p.day_count_fraction);
                let mut record = CashflowRecord::new(leg_index, date, record_type, amount);
                record.day_count_fraction = Some(p.day_count_fraction);
                record.start_date = Some(p.start_date);
                record.end_date = Some(p.end_date);
                record.rate = rate;
                record
            })
            .collect()
    }
}

/// Coupons at a contractual fixed rate.
#[derive(Debug, Clone)]
pub struct FixedCouponCashflows {
    coupons: CouponCashflows,
    rate: f64,
}

impl FixedCouponCashflows {
    pub fn new(
        payment_dates: &[NaiveDate],
        notional: f64,
        rate: f64,
        dcfs: &[f64],
        period_dates: &[(NaiveDate, NaiveDate)],
        day_count: Option<DayCount>,
    ) -> CurveResult<FixedCouponCashflows> {
        let coupons = CouponCashflows::new(payment_dates, notional, dcfs, period_dates, day_count)?;
        Ok(FixedCouponCashflows { coupons, rate })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn coupons(&self) -> &CouponCashflows {
        &self.coupons
    }

    pub fn amount(&self, date: NaiveDate, params: &[f64]) -> CurveResult<f64> {
        self.coupons
            .accrual_on(date)
            .map(|accrual| accrual * self.rate * product(params))
            .ok_or_else(|| missing_date_error("FixedCouponCashflows", date))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Leg
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Leg {
    Fixed(FixedCashflows),
    Coupon(CouponCashflows),
    FixedCoupon(FixedCouponCashflows),
    Principal(PrincipalCashflows),
}

impl Leg {
    /// Ascending, without duplicates.
    pub fn payment_dates(&self) -> Vec<NaiveDate> {
        match self {
            Leg::Fixed(leg) => leg.dates(),
            Leg::Coupon(leg) => leg.dates(),
            Leg::FixedCoupon(leg) => leg.coupons.dates(),
            Leg::Principal(leg) => leg.flows.dates(),
        }
    }

    pub fn amount(&self, date: NaiveDate, params: &[f64]) -> CurveResult<f64> {
        match self {
            Leg::Fixed(leg) => leg.amount(date, params),
            Leg::Coupon(leg) => leg.amount(date, params),
            Leg::FixedCoupon(leg) => leg.amount(date, params),
            Leg::Principal(leg) => leg.amount(date, params),
        }
    }

    pub fn records(&self, leg_index: usize, date: NaiveDate) -> Vec<CashflowRecord> {
        match self {
            Leg::Fixed(leg) => leg
                .flows
                .get(&date)
                .map(|&a| vec![CashflowRecord::new(leg_index, date, "Cashflow", Some(a))])
                .unwrap_or_default(),
            Leg::Coupon(leg) => leg.records(leg_index, date, "CouponCashflow", None),
            Leg::FixedCoupon(leg) => leg.coupons.records(leg_index, date, "CouponCashflow", Some(leg.rate)),
            Leg::Principal(leg) => leg
                .flows
                .flows
                .get(&date)
                .map(|&a| vec![CashflowRecord::new(leg_index, date, "PrincipalCashflow", Some(a))])
                .unwrap_or_default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MultiLegCashflows
// ─────────────────────────────────────────────────────────────────────────────

/// Several legs on one ascending payment-date axis.
#[derive(Debug, Clone)]
pub struct MultiLegCashflows {
    legs: Vec<Leg>,
    payment_dates: Vec<NaiveDate>,
    nonzero_leg_map: BTreeMap<NaiveDate, Vec<usize>>,
}

impl MultiLegCashflows {
    pub fn new(legs: Vec<Leg>) -> MultiLegCashflows {
        let leg_dates: Vec<Vec<NaiveDate>> = legs.iter().map(Leg::payment_dates).collect();

        // k-way merge：(日期, 腿, 位置) 的最小堆
        let mut heap = BinaryHeap::new();
        for (leg, dates) in leg_dates.iter().enumerate() {
            if let Some(&d) = dates.first() {
                heap.push(Reverse((d, leg, 0usize)));
            }
        }

        let mut payment_dates: Vec<NaiveDate> = Vec::new();
        let mut nonzero_leg_map: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        while let Some(Reverse((d, leg, pos))) = heap.pop() {
            if payment_dates.last() != Some(&d) {
                payment_dates.push(d);
            }
            nonzero_leg_map.entry(d).or_default().push(leg);
            if let Some(&next) = leg_dates[leg].get(pos + 1) {
                heap.push(Reverse((next, leg, pos + 1)));
            }
        }

        MultiLegCashflows { legs, payment_dates, nonzero_leg_map }
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn payment_dates(&self) -> &[NaiveDate] {
        &self.payment_dates
    }

    pub fn nonzero_leg_map(&self) -> &BTreeMap<NaiveDate, Vec<usize>> {
        &self.nonzero_leg_map
    }

    /// Leg indices paying on `date`; empty if none.
    pub fn legs_paying_on(&self, date: NaiveDate) -> &[usize] {
        self.nonzero_leg_map.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Contractual amount summed over legs, every leg unprojected.
    pub fn amount(&self, date: NaiveDate) -> CurveResult<f64> {
        self.legs_paying_on(date)
            .iter()
            .map(|&j| self.legs[j].amount(date, &[]))
            .sum()
    }

    pub fn schedule(&self) -> Vec<CashflowRecord> {
        let mut records = Vec::new();
        for &d in &self.payment_dates {
            for &j in self.legs_paying_on(d) {
                records.extend(self.legs[j].records(j, d));
            }
        }
        records
    }
}

impl Index<usize> for MultiLegCashflows {
    type Output = Leg;

    fn index(&self, leg: usize) -> &Leg {
        &self.legs[leg]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn coupon_leg() -> Leg {
        let pay = [ymd(2025, 6, 30), ymd(2025, 12, 31)];
        let periods = [(ymd(2024, 12, 31), ymd(2025, 6, 30)), (ymd(2025, 6, 30), ymd(2025, 12, 31))];
        Leg::FixedCoupon(FixedCouponCashflows::new(&pay, 100.0, 0.04, &[0.5, 0.5], &periods, None).unwrap())
    }

    #[test]
    fn merges_coupon_and_principal_legs() {
        let cf = MultiLegCashflows::new(vec![
            coupon_leg(),
            Leg::Principal(PrincipalCashflows::new(ymd(2025, 12, 31), 100.0)),
        ]);
        assert_eq!(cf.payment_dates(), &[ymd(2025, 6, 30), ymd(2025, 12, 31)]);
        assert_eq!(cf.legs_paying_on(ymd(2025, 12, 31)), &[0, 1]);
        assert_eq!(cf.legs_paying_on(ymd(2025, 6, 30)), &[0]);
        assert!(cf.legs_paying_on(ymd(2025, 7, 1)).is_empty());
        assert_abs_diff_eq!(cf.amount(ymd(2025, 12, 31)).unwrap(), 102.0, epsilon = 1e-12);
    }

    #[test]
    fn merge_is_stable_across_interleaved_legs() {
        let a = FixedCashflows::new(&[ymd(2025, 3, 1), ymd(2025, 1, 1)], &[1.0, 2.0]).unwrap();
        let b = FixedCashflows::new(&[ymd(2025, 2, 1), ymd(2025, 3, 1)], &[3.0, 4.0]).unwrap();
        let cf = MultiLegCashflows::new(vec![Leg::Fixed(a), Leg::Fixed(b)]);
        assert_eq!(cf.payment_dates(), &[ymd(2025, 1, 1), ymd(2025, 2, 1), ymd(2025, 3, 1)]);
        assert_eq!(cf.legs_paying_on(ymd(2025, 3, 1)), &[0, 1]);
        let schedule = cf.schedule();
        assert_eq!(schedule.len(), 4);
        assert_eq!(schedule[2].leg_index, 0);
        assert_eq!(schedule[3].leg_index, 1);
    }

    #[test]
    fn amounts_scale_by_projection_factors() {
        let fixed = FixedCashflows::new(&[ymd(2025, 1, 1)], &[10.0]).unwrap();
        assert_abs_diff_eq!(fixed.amount(ymd(2025, 1, 1), &[]).unwrap(), 10.0);
        assert_abs_diff_eq!(fixed.amount(ymd(2025, 1, 1), &[0.5, 0.9]).unwrap(), 4.5);
        assert!(fixed.amount(ymd(2025, 1, 2), &[]).is_err());

        let floating = CouponCashflows::new(
            &[ymd(2025, 6, 30)],
            1000.0,
            &[0.5],
            &[(ymd(2024, 12, 31), ymd(2025, 6, 30))],
            Some(DayCount::Act360),
        )
        .unwrap();
        assert_abs_diff_eq!(floating.amount(ymd(2025, 6, 30), &[0.03, 0.98]).unwrap(), 1000.0 * 0.5 * 0.03 * 0.98);
        assert!(floating.amount(ymd(2025, 6, 30), &[]).is_err());
    }

    #[test]
    fn rejects_negative_day_count_fractions_and_length_mismatch() {
        let pay = [ymd(2025, 6, 30)];
        let periods = [(ymd(2024, 12, 31), ymd(2025, 6, 30))];
        assert!(CouponCashflows::new(&pay, 1.0, &[-0.1], &periods, None).is_err());
        assert!(CouponCashflows::new(&pay, 1.0, &[0.5, 0.5], &periods, None).is_err());
        assert!(FixedCashflows::new(&pay, &[]).is_err());
    }

    #[test]
    fn schedule_records_carry_coupon_details() {
        let cf = MultiLegCashflows::new(vec![
            coupon_leg(),
            Leg::Principal(PrincipalCashflows::new(ymd(2025, 12, 31), 100.0)),
        ]);
        let schedule = cf.schedule();
        assert_eq!(schedule.len(), 3);
        assert_eq!(schedule[0].record_type, "CouponCashflow");
        assert_eq!(schedule[0].start_date, Some(ymd(2024, 12, 31)));
        assert_abs_diff_eq!(schedule[0].amount.unwrap(), 2.0, epsilon = 1e-12);
        assert_eq!(schedule[2].record_type, "PrincipalCashflow");

        let json = serde_json::to_value(&schedule[2]).unwrap();
        assert_eq!(json["type"], "PrincipalCashflow");
        assert!(json.get("day_count_fraction").is_none());
    }
}
