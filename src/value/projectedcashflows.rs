use chrono::NaiveDate;

use crate::curveerror::{
    CurveError,
    CurveResult
};
use crate::math::solver::rootfinder::{
    SolverConfig,
    solve_root
};
use crate::time::utility::act365_time;
use crate::value::cashflows::{
    CashflowRecord,
    MultiLegCashflows
};
use crate::value::yieldcalculator::YieldCalculator;

const YIELD_BRACKET: (f64, f64) = (-1.0 + 1e-2, 1e2);

/// Per-leg projection: the factors a leg needs to compute its amount on a date.
pub type Projection<'f> = &'f dyn Fn(NaiveDate) -> CurveResult<Vec<f64>>;

macro_rules! impl_yield_functions {
    ($($name:ident, $with_times:ident => $inner:ident;)*) => {
        $(
            pub fn $name(&self, y: f64) -> f64 {
                self.$inner(y, &self.payment_times)
            }

            pub fn $with_times(&self, y: f64, payment_times: &[f64]) -> CurveResult<f64> {
                self.check_payment_times(payment_times)?;
                Ok(self.$inner(y, payment_times))
            }
        )*
    };
}

/// Contractual cashflows evaluated once through their leg projections.
pub struct ProjectedCashflows<'a> {
    cashflows: &'a MultiLegCashflows,
    base_date: NaiveDate,
    projected_leg_amounts: Vec<Vec<f64>>,
    projected_amounts: Vec<f64>,
    payment_times: Vec<f64>,
    calculator: YieldCalculator,
}

impl<'a> ProjectedCashflows<'a> {
    /// `projections` holds one entry per leg, or is empty when no leg needs one.
    /// Dates before `base_date` project to 0.
    pub fn new(
        cashflows: &'a MultiLegCashflows,
        projections: &[Option<Projection<'_>>],
        base_date: NaiveDate,
        calculator: YieldCalculator,
    ) -> CurveResult<ProjectedCashflows<'a>> {
        let n_legs = cashflows.legs().len();
        if !projections.is_empty() && projections.len() != n_legs {
            return Err(CurveError::validation(format!(
                "ProjectedCashflows: {} projections for {} legs",
                projections.len(),
                n_legs
            )));
        }

        let mut projected_leg_amounts = Vec::with_capacity(cashflows.payment_dates().len());
        for &d in cashflows.payment_dates() {
            let mut leg_amounts = vec![0.0; n_legs];
            if d >= base_date {
                for &j in cashflows.legs_paying_on(d) {
                    let projection = projections.get(j).copied().flatten();
                    leg_amounts[j] = Self::project_leg(cashflows, projection, j, d).map_err(|e| {
                        CurveError::validation(format!("ProjectedCashflows: cannot project on {d} for leg {j}, {e}"))
                    })?;
                }
            }
            projected_leg_amounts.push(leg_amounts);
        }

        let projected_amounts = projected_leg_amounts.iter().map(|a| a.iter().sum()).collect();
        let payment_times = cashflows
            .payment_dates()
            .iter()
            .map(|&d| act365_time(base_date, d))
            .collect();

        Ok(ProjectedCashflows {
            cashflows,
            base_date,
            projected_leg_amounts,
            projected_amounts,
            payment_times,
            calculator,
        })
    }

    /// No leg needs a projection.
    pub fn fixed(
        cashflows: &'a MultiLegCashflows,
        base_date: NaiveDate,
        calculator: YieldCalculator,
    ) -> CurveResult<ProjectedCashflows<'a>> {
        Self::new(cashflows, &[], base_date, calculator)
    }

    fn project_leg(
        cashflows: &MultiLegCashflows,
        projection: Option<Projection<'_>>,
        leg: usize,
        d: NaiveDate,
    ) -> CurveResult<f64> {
        match projection {
            Some(f) => cashflows[leg].amount(d, &f(d)?),
            None => cashflows[leg].amount(d, &[]),
        }
    }

    pub fn base_date(&self) -> NaiveDate {
        self.base_date
    }

    pub fn payment_dates(&self) -> &[NaiveDate] {
        self.cashflows.payment_dates()
    }

    pub fn payment_times(&self) -> &[f64] {
        &self.payment_times
    }

    pub fn projected_amounts(&self) -> &[f64] {
        &self.projected_amounts
    }

    pub fn projected_leg_amounts(&self) -> &[Vec<f64>] {
        &self.projected_leg_amounts
    }

    pub fn calculator(&self) -> YieldCalculator {
        self.calculator
    }

    pub fn sum_projected_amounts(&self) -> f64 {
        self.projected_amounts.iter().sum()
    }

    pub fn schedule(&self) -> Vec<CashflowRecord> {
        let mut records = Vec::new();
        for (i, &d) in self.payment_dates().iter().enumerate() {
            for &j in self.cashflows.legs_paying_on(d) {
                for mut record in self.cashflows[j].records(j, d) {
                    record.record_type = format!("Projected{}", record.record_type);
                    record.projected_amount = Some(self.projected_leg_amounts[i][j]);
                    record.payment_time = Some(self.payment_times[i]);
                    records.push(record);
                }
            }
        }
        records
    }

    fn check_payment_times(&self, payment_times: &[f64]) -> CurveResult<()> {
        if payment_times.len() != self.payment_times.len() {
            return Err(CurveError::validation(format!(
                "ProjectedCashflows: {} payment times override {} payment dates",
                payment_times.len(),
                self.payment_times.len()
            )));
        }
        Ok(())
    }

    // ─────────────────────────────────────────────
    // Yield math
    // ─────────────────────────────────────────────

    fn pv_at(&self, y: f64, times: &[f64]) -> f64 {
        self.calculator.yield_to_pv(y, &self.projected_amounts, times)
    }

    fn pv_prime_at(&self, y: f64, times: &[f64]) -> f64 {
        self.calculator.yield_to_pv_prime(y, &self.projected_amounts, times)
    }

    fn pv_prime2_at(&self, y: f64, times: &[f64]) -> f64 {
        self.calculator.yield_to_pv_prime2(y, &self.projected_amounts, times)
    }

    fn dv01_at(&self, y: f64, times: &[f64]) -> f64 {
        -self.pv_prime_at(y, times) / 10000.0
    }

    fn modified_duration_at(&self, y: f64, times: &[f64]) -> f64 {
        -self.pv_prime_at(y, times) / self.pv_at(y, times)
    }

    fn macauley_duration_at(&self, y: f64, times: &[f64]) -> f64 {
        self.calculator.duration_scale(y) * self.modified_duration_at(y, times)
    }

    fn convexity_at(&self, y: f64, times: &[f64]) -> f64 {
        self.pv_prime2_at(y, times) / self.pv_at(y, times)
    }

    impl_yield_functions! {
        yield_to_pv, yield_to_pv_with_times => pv_at;
        yield_to_pv_prime, yield_to_pv_prime_with_times => pv_prime_at;
        yield_to_pv_prime2, yield_to_pv_prime2_with_times => pv_prime2_at;
        yield_dv01, yield_dv01_with_times => dv01_at;
        modified_duration, modified_duration_with_times => modified_duration_at;
        macauley_duration, macauley_duration_with_times => macauley_duration_at;
        convexity, convexity_with_times => convexity_at;
    }

    fn pv_to_yield_at(&self, pv: f64, times: &[f64]) -> CurveResult<f64> {
        if !(pv > 0.0) {
            return Err(CurveError::validation(format!("pv_to_yield: pv must be positive, got {pv}")));
        }
        let target = |y: f64| (self.pv_at(y, times) - pv, self.pv_prime_at(y, times), self.pv_prime2_at(y, times));
        let value = |y: f64| self.pv_at(y, times) - pv;
        let result = solve_root(target, value, 0.0, YIELD_BRACKET, &SolverConfig::default())?;
        Ok(result.root)
    }

    /// Yield reproducing `pv`: Halley from 0, then Brent on `(-0.99, 100)`.
    pub fn pv_to_yield(&self, pv: f64) -> CurveResult<f64> {
        self.pv_to_yield_at(pv, &self.payment_times)
    }

    pub fn pv_to_yield_with_times(&self, pv: f64, payment_times: &[f64]) -> CurveResult<f64> {
        self.check_payment_times(payment_times)?;
        self.pv_to_yield_at(pv, payment_times)
    }

    pub fn annual_yield_to_ctsly_compounded(&self, y: f64) -> f64 {
        self.calculator.annual_yield_to_ctsly_compounded(y)
    }
}
