use std::sync::Arc;

use chrono::NaiveDate;
use serde::{
    Serialize,
    Deserialize
};

use crate::configuration::Configuration;
use crate::curveerror::{
    CurveError,
    CurveResult
};
use crate::instrument::bond::bondconvention::{
    BondConvention,
    CouponConvention,
    YieldConvention,
    FIXED_RATE_BOND,
    ZERO_COUPON_BOND
};
use crate::instrument::bond::couponschedule::{
    CouponSchedule,
    CouponScheduleRule
};
use crate::manager::manager::IManager;
use crate::time::calendar::holidaycalendar::HolidayCalendar;
use crate::time::daycounter::daycounter::DayCount;
use crate::time::period::DateFrequency;
use crate::value::cashflows::{
    CashflowRecord,
    FixedCouponCashflows,
    Leg,
    MultiLegCashflows,
    PrincipalCashflows
};
use crate::value::projectedcashflows::ProjectedCashflows;
use crate::value::yieldcalculator::YieldCalculator;

/// A quote that risk measures can be evaluated from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum YieldOrPrice {
    Yield(f64),
    CleanPrice(f64),
}

// ─────────────────────────────────────────────────────────────────────────────
// BondCore
// ─────────────────────────────────────────────────────────────────────────────

/// Terms shared by every bond type.
#[derive(Clone)]
pub struct BondCore {
    notional: f64,
    maturity_date: NaiveDate,
    settlement_days: u32,
    settlement_calendar: Arc<dyn HolidayCalendar>,
    payment_days: u32,
    payment_calendar: Arc<dyn HolidayCalendar>,
    last_payment_date: NaiveDate,
}

impl BondCore {
    pub fn new(
        notional: f64,
        maturity_date: NaiveDate,
        settlement_days: u32,
        settlement_calendar: Arc<dyn HolidayCalendar>,
        payment_days: u32,
        payment_calendar: Arc<dyn HolidayCalendar>,
    ) -> BondCore {
        let last_payment_date = payment_calendar.add_business_days(maturity_date, payment_days);
        BondCore {
            notional,
            maturity_date,
            settlement_days,
            settlement_calendar,
            payment_days,
            payment_calendar,
            last_payment_date,
        }
    }

    pub fn notional(&self) -> f64 {
        self.notional
    }

    pub fn maturity_date(&self) -> NaiveDate {
        self.maturity_date
    }

    pub fn payment_days(&self) -> u32 {
        self.payment_days
    }

    pub fn last_payment_date(&self) -> NaiveDate {
        self.last_payment_date
    }

    pub fn settlement_date(&self, base_date: NaiveDate) -> NaiveDate {
        self.settlement_calendar.add_business_days(base_date, self.settlement_days)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ZeroCouponBond
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ZeroCouponBond {
    core: BondCore,
    cashflows: MultiLegCashflows,
}

impl ZeroCouponBond {
    pub fn new(core: BondCore) -> ZeroCouponBond {
        let principal = PrincipalCashflows::new(core.last_payment_date(), core.notional());
        let cashflows = MultiLegCashflows::new(vec![Leg::Principal(principal)]);
        ZeroCouponBond { core, cashflows }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FixedRateBond
// ─────────────────────────────────────────────────────────────────────────────

/// Coupon terms of a fixed rate bond.
#[derive(Debug, Clone, Copy)]
pub struct FixedRateTerms {
    pub dated_date: NaiveDate,
    pub rate: f64,
    pub payment_frequency: DateFrequency,
    pub coupon_convention: CouponConvention,
    pub coupon_day_count: Option<DayCount>,
    pub accrued_interest_day_count: DayCount,
    pub yield_convention: YieldConvention,
}

#[derive(Clone)]
pub struct FixedRateBond {
    core: BondCore,
    terms: FixedRateTerms,
    coupon_schedule: CouponSchedule,
    dcfs: Vec<f64>,
    periods_per_year: Option<f64>,
    cashflows: MultiLegCashflows,
}

impl FixedRateBond {
    pub fn new(core: BondCore, terms: FixedRateTerms) -> CurveResult<FixedRateBond> {
        let rule = CouponScheduleRule::backward(terms.payment_frequency, core.payment_days());
        let calendar = core.payment_calendar.as_ref();
        let coupon_schedule = CouponSchedule::new(terms.dated_date, core.maturity_date(), &rule, calendar, calendar)?;

        let (dcfs, periods_per_year) = match terms.coupon_convention {
            CouponConvention::Uniform => (
                vec![CouponConvention::uniform_weight(terms.payment_frequency); coupon_schedule.len()],
                Some(terms.payment_frequency.periods_per_year()),
            ),
            CouponConvention::AdjDateDcf => {
                let day_count = terms.coupon_day_count.ok_or_else(|| {
                    CurveError::validation("FixedRateBond: ADJ_DATE_DCF coupons need a coupon_day_count")
                })?;
                (coupon_schedule.dcfs(day_count), None)
            }
        };

        let coupons = FixedCouponCashflows::new(
            coupon_schedule.payment_dates(),
            core.notional(),
            terms.rate,
            &dcfs,
            &coupon_schedule.period_dates(),
            terms.coupon_day_count,
        )?;
        let last_payment_date = coupon_schedule
            .payment_dates()
            .last()
            .copied()
            .unwrap_or(core.last_payment_date);
        let principal = PrincipalCashflows::new(last_payment_date, core.notional());
        let cashflows = MultiLegCashflows::new(vec![Leg::FixedCoupon(coupons), Leg::Principal(principal)]);

        let mut core = core;
        core.last_payment_date = last_payment_date;

        Ok(FixedRateBond {
            core,
            terms,
            coupon_schedule,
            dcfs,
            periods_per_year,
            cashflows,
        })
    }

    pub fn rate(&self) -> f64 {
        self.terms.rate
    }

    pub fn terms(&self) -> &FixedRateTerms {
        &self.terms
    }

    pub fn coupon_schedule(&self) -> &CouponSchedule {
        &self.coupon_schedule
    }

    pub fn dcfs(&self) -> &[f64] {
        &self.dcfs
    }

    /// 只有 UNIFORM 票息才有固定的年付息次數
    pub fn periods_per_year(&self) -> Option<f64> {
        self.periods_per_year
    }

    /// Elapsed fraction of the coupon period containing `settlement_date`,
    /// 0 outside the schedule.
    fn coupon_frac(&self, settlement_date: NaiveDate) -> CurveResult<Option<(usize, f64)>> {
        let Some(i) = self.coupon_schedule.coupon_period(settlement_date) else {
            return Ok(None);
        };
        if self.terms.accrued_interest_day_count != DayCount::ActAct {
            return Err(CurveError::not_implemented(format!(
                "accrued interest under {}",
                self.terms.accrued_interest_day_count
            )));
        }
        let s = self.coupon_schedule.unadj_start_dates()[i];
        let e = self.coupon_schedule.unadj_end_dates()[i];
        let frac = (settlement_date - s).num_days() as f64 / (e - s).num_days() as f64;
        Ok(Some((i, frac)))
    }

    pub fn next_coupon_frac(&self, settlement_date: NaiveDate) -> CurveResult<f64> {
        Ok(self.coupon_frac(settlement_date)?.map_or(0.0, |(_, frac)| frac))
    }

    pub fn accrued_interest_per_100(&self, base_date: NaiveDate) -> CurveResult<f64> {
        let settlement_date = self.core.settlement_date(base_date);
        Ok(self
            .coupon_frac(settlement_date)?
            .map_or(0.0, |(i, frac)| 100.0 * self.terms.rate * self.dcfs[i] * frac))
    }

    fn yield_calculator(&self, base_date: NaiveDate) -> CurveResult<YieldCalculator> {
        match self.terms.yield_convention {
            YieldConvention::TrueYield => Ok(YieldCalculator::TrueYield),
            YieldConvention::UsStreet => {
                let periods_per_year = self.periods_per_year.ok_or_else(|| {
                    CurveError::validation("FixedRateBond: US_STREET yield needs UNIFORM coupons")
                })?;
                let settlement_date = self.core.settlement_date(base_date);
                Ok(YieldCalculator::UsStreet {
                    periods_per_year,
                    coupon_frac: 1.0 - self.next_coupon_frac(settlement_date)?,
                })
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bond
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub enum Bond {
    ZeroCoupon(ZeroCouponBond),
    FixedRate(FixedRateBond),
}

impl Bond {
    pub fn core(&self) -> &BondCore {
        match self {
            Bond::ZeroCoupon(bond) => &bond.core,
            Bond::FixedRate(bond) => &bond.core,
        }
    }

    pub fn cashflows(&self) -> &MultiLegCashflows {
        match self {
            Bond::ZeroCoupon(bond) => &bond.cashflows,
            Bond::FixedRate(bond) => &bond.cashflows,
        }
    }

    pub fn bond_type(&self) -> &'static str {
        match self {
            Bond::ZeroCoupon(_) => ZERO_COUPON_BOND,
            Bond::FixedRate(_) => FIXED_RATE_BOND,
        }
    }

    pub fn notional(&self) -> f64 {
        self.core().notional()
    }

    pub fn maturity_date(&self) -> NaiveDate {
        self.core().maturity_date()
    }

    pub fn last_payment_date(&self) -> NaiveDate {
        self.core().last_payment_date()
    }

    pub fn settlement_date(&self, base_date: NaiveDate) -> NaiveDate {
        self.core().settlement_date(base_date)
    }

    pub fn accrued_interest_per_100(&self, base_date: NaiveDate) -> CurveResult<f64> {
        match self {
            Bond::ZeroCoupon(_) => Ok(0.0),
            Bond::FixedRate(bond) => bond.accrued_interest_per_100(base_date),
        }
    }

    pub fn accrued_interest(&self, base_date: NaiveDate) -> CurveResult<f64> {
        Ok(self.notional() * self.accrued_interest_per_100(base_date)? / 100.0)
    }

    /// Zero coupon bonds always quote a true yield.
    pub fn yield_calculator(&self, base_date: NaiveDate) -> CurveResult<YieldCalculator> {
        match self {
            Bond::ZeroCoupon(_) => Ok(YieldCalculator::TrueYield),
            Bond::FixedRate(bond) => bond.yield_calculator(base_date),
        }
    }

    pub fn projected_cashflows(&self, base_date: NaiveDate) -> CurveResult<ProjectedCashflows<'_>> {
        ProjectedCashflows::fixed(self.cashflows(), base_date, self.yield_calculator(base_date)?)
    }

    pub fn schedule(&self) -> Vec<CashflowRecord> {
        self.cashflows().schedule()
    }

    pub fn projected_schedule(&self, base_date: NaiveDate) -> CurveResult<Vec<CashflowRecord>> {
        Ok(self.projected_cashflows(base_date)?.schedule())
    }

    // ─────────────────────────────────────────────
    // Price chain
    // ─────────────────────────────────────────────

    pub fn pv_to_dirty_price(&self, pv: f64) -> f64 {
        100.0 * pv / self.notional()
    }

    pub fn dirty_price_to_clean_price(&self, dirty_price: f64, base_date: NaiveDate) -> CurveResult<f64> {
        Ok(dirty_price - self.accrued_interest_per_100(base_date)?)
    }

    pub fn clean_price_to_dirty_price(&self, clean_price: f64, base_date: NaiveDate) -> CurveResult<f64> {
        Ok(clean_price + self.accrued_interest_per_100(base_date)?)
    }

    pub fn pv_to_clean_price(&self, pv: f64, base_date: NaiveDate) -> CurveResult<f64> {
        self.dirty_price_to_clean_price(self.pv_to_dirty_price(pv), base_date)
    }

    pub fn clean_price_to_market_value(&self, clean_price: f64, base_date: NaiveDate) -> CurveResult<f64> {
        Ok(self.notional() * self.clean_price_to_dirty_price(clean_price, base_date)? / 100.0)
    }

    pub fn pv_to_yield(&self, pv: f64, base_date: NaiveDate) -> CurveResult<f64> {
        self.projected_cashflows(base_date)?.pv_to_yield(pv)
    }

    pub fn clean_price_to_yield(&self, clean_price: f64, base_date: NaiveDate) -> CurveResult<f64> {
        self.pv_to_yield(self.clean_price_to_market_value(clean_price, base_date)?, base_date)
    }

    pub fn yield_to_pv(&self, y: f64, base_date: NaiveDate) -> CurveResult<f64> {
        Ok(self.projected_cashflows(base_date)?.yield_to_pv(y))
    }

    pub fn yield_to_dirty_price(&self, y: f64, base_date: NaiveDate) -> CurveResult<f64> {
        Ok(self.pv_to_dirty_price(self.yield_to_pv(y, base_date)?))
    }

    pub fn yield_to_clean_price(&self, y: f64, base_date: NaiveDate) -> CurveResult<f64> {
        self.dirty_price_to_clean_price(self.yield_to_dirty_price(y, base_date)?, base_date)
    }

    pub fn annual_yield_to_ctsly_compounded(&self, y: f64, base_date: NaiveDate) -> CurveResult<f64> {
        Ok(self.yield_calculator(base_date)?.annual_yield_to_ctsly_compounded(y))
    }

    // ─────────────────────────────────────────────
    // Risk measures
    // ─────────────────────────────────────────────

    fn resolve_yield(&self, quote: YieldOrPrice, base_date: NaiveDate) -> CurveResult<f64> {
        match quote {
            YieldOrPrice::Yield(y) => Ok(y),
            YieldOrPrice::CleanPrice(p) => self.clean_price_to_yield(p, base_date),
        }
    }

    pub fn yield_dv01(&self, quote: YieldOrPrice, base_date: NaiveDate) -> CurveResult<f64> {
        let y = self.resolve_yield(quote, base_date)?;
        Ok(self.projected_cashflows(base_date)?.yield_dv01(y))
    }

    pub fn modified_duration(&self, quote: YieldOrPrice, base_date: NaiveDate) -> CurveResult<f64> {
        let y = self.resolve_yield(quote, base_date)?;
        Ok(self.projected_cashflows(base_date)?.modified_duration(y))
    }

    pub fn macauley_duration(&self, quote: YieldOrPrice, base_date: NaiveDate) -> CurveResult<f64> {
        let y = self.resolve_yield(quote, base_date)?;
        Ok(self.projected_cashflows(base_date)?.macauley_duration(y))
    }

    pub fn convexity(&self, quote: YieldOrPrice, base_date: NaiveDate) -> CurveResult<f64> {
        let y = self.resolve_yield(quote, base_date)?;
        Ok(self.projected_cashflows(base_date)?.convexity(y))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BondTerms (JSON)
// ─────────────────────────────────────────────────────────────────────────────

/// Bond description in requests: a named convention plus economic terms, or
/// every convention field spelled out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondTerms {
    #[serde(rename = "Convention", default, skip_serializing_if = "Option::is_none")]
    pub convention: Option<String>,
    pub notional: f64,
    pub maturity_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dated_date: Option<NaiveDate>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub bond_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement_calendars: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_calendars: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_frequency: Option<DateFrequency>,
    #[serde(default, alias = "day_count", skip_serializing_if = "Option::is_none")]
    pub coupon_day_count: Option<DayCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_convention: Option<CouponConvention>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrued_interest_day_count: Option<DayCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yield_convention: Option<YieldConvention>,
}

impl BondTerms {
    /// Named convention first, explicit fields override it.
    fn resolve_convention(&self, config: &Configuration) -> CurveResult<BondConvention> {
        let mut convention = match &self.convention {
            Some(name) => config.bond_conventions().get(name)?,
            None => BondConvention {
                bond_type: self
                    .bond_type
                    .clone()
                    .ok_or_else(|| CurveError::validation("bond: either Convention or type is required"))?,
                settlement_days: 0,
                settlement_calendars: Vec::new(),
                payment_days: 0,
                payment_calendars: Vec::new(),
                payment_frequency: None,
                coupon_day_count: None,
                coupon_convention: None,
                accrued_interest_day_count: None,
                yield_convention: YieldConvention::default(),
            },
        };

        if let Some(bond_type) = &self.bond_type {
            convention.bond_type = bond_type.clone();
        }
        if let Some(days) = self.settlement_days {
            convention.settlement_days = days;
        }
        if let Some(calendars) = &self.settlement_calendars {
            convention.settlement_calendars = calendars.clone();
        }
        if let Some(days) = self.payment_days {
            convention.payment_days = days;
        }
        if let Some(calendars) = &self.payment_calendars {
            convention.payment_calendars = calendars.clone();
        }
        convention.payment_frequency = self.payment_frequency.or(convention.payment_frequency);
        convention.coupon_day_count = self.coupon_day_count.or(convention.coupon_day_count);
        convention.coupon_convention = self.coupon_convention.or(convention.coupon_convention);
        convention.accrued_interest_day_count = self.accrued_interest_day_count.or(convention.accrued_interest_day_count);
        if let Some(yield_convention) = self.yield_convention {
            convention.yield_convention = yield_convention;
        }
        Ok(convention)
    }

    pub fn create_bond(&self, config: &Configuration) -> CurveResult<Bond> {
        let convention = self.resolve_convention(config)?;
        let settlement_calendar = config.calendars().joint(&convention.settlement_calendars)?;
        let payment_calendar = config.calendars().joint(&convention.payment_calendars)?;
        let core = BondCore::new(
            self.notional,
            self.maturity_date,
            convention.settlement_days,
            settlement_calendar,
            convention.payment_days,
            payment_calendar,
        );

        match convention.bond_type.as_str() {
            ZERO_COUPON_BOND => Ok(Bond::ZeroCoupon(ZeroCouponBond::new(core))),
            FIXED_RATE_BOND => {
                let missing = |field: &str| CurveError::validation(format!("FixedRateBond: missing {field}"));
                let terms = FixedRateTerms {
                    dated_date: self.dated_date.ok_or_else(|| missing("dated_date"))?,
                    rate: self.rate.ok_or_else(|| missing("rate"))?,
                    payment_frequency: convention.payment_frequency.ok_or_else(|| missing("payment_frequency"))?,
                    coupon_convention: convention.coupon_convention.ok_or_else(|| missing("coupon_convention"))?,
                    coupon_day_count: convention.coupon_day_count,
                    accrued_interest_day_count: convention
                        .accrued_interest_day_count
                        .ok_or_else(|| missing("accrued_interest_day_count"))?,
                    yield_convention: convention.yield_convention,
                };
                Ok(Bond::FixedRate(FixedRateBond::new(core, terms)?))
            }
            other => Err(CurveError::not_implemented(format!("bond type {other}"))),
        }
    }
}
