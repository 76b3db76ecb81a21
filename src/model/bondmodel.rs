use chrono::NaiveDate;
use nalgebra::{
    DMatrix,
    DVector
};
use tracing::{
    debug,
    error,
    info
};
use uuid::Uuid;

use crate::buildsettings::{
    BuildSettings,
    ModelType
};
use crate::configuration::Configuration;
use crate::curvedata::curvedata::{
    BondPriceAndYieldDataPoint,
    CurveDataPoint
};
use crate::curvedata::domains::{
    DomainX,
    DomainY,
    time_difference
};
use crate::curveerror::{
    CalibrationDiagnostic,
    CurveError,
    CurveResult
};
use crate::instrument::bond::bond::Bond;
use crate::math::fitting::fittingmethod::{
    FittingMethodKind,
    Interpolator
};
use crate::math::optimizer::minimizer::{
    MinimizerConfig,
    Objective,
    minimize
};
use crate::model::curvemodel::CurveModel;
use crate::model::modelresults::{
    Metric,
    ModelResults
};
use crate::objectwithuuid::ObjectWithUUID;
use crate::time::period::Period;
use crate::value::cashflows::MultiLegCashflows;
use crate::value::projectedcashflows::{
    Projection,
    ProjectedCashflows
};
use crate::value::yieldcalculator::YieldCalculator;

/// 最小化的目標值，相對於校準容忍度
const TARGET_COST_FACTOR: f64 = 1e-6;

/// Knobs for the calibration loop.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOptions {
    /// Sum of squared PV errors accepted after minimizing.
    pub tolerance: f64,
    pub max_iters: u64,
    /// Starting node values, one per bond; derived from the quoted yields when absent.
    pub initial_guess: Option<Vec<f64>>,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        CalibrationOptions {
            tolerance: 1e-8,
            max_iters: 500,
            initial_guess: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DiscountCurve
// ─────────────────────────────────────────────────────────────────────────────

/// Fitted nodes read as discount factors: `df = exp(-s·y)` with `s = 1` on
/// time weighted zero rates and `s = t` on zero rates.
struct DiscountCurve {
    domain_y: DomainY,
    interpolator: Box<dyn Interpolator>,
}

impl DiscountCurve {
    fn fit(fitting_method: FittingMethodKind, domain_y: DomainY, xs: &[f64], ys: &[f64]) -> CurveResult<DiscountCurve> {
        match domain_y {
            DomainY::TimeWeightedZeroRate | DomainY::ZeroRate => {}
            other => return Err(CurveError::validation(format!("BondModel: unsupported Y domain {other}"))),
        }
        let mut interpolator = fitting_method.build();
        interpolator.fit(xs, ys)?;
        Ok(DiscountCurve { domain_y, interpolator })
    }

    fn scale(&self, t: f64) -> f64 {
        match self.domain_y {
            DomainY::ZeroRate => t,
            _ => 1.0,
        }
    }

    fn df(&self, t: f64) -> CurveResult<f64> {
        Ok((-self.scale(t) * self.interpolator.predict(t)?).exp())
    }

    fn df_gradient(&self, t: f64) -> CurveResult<DVector<f64>> {
        let s = self.scale(t);
        Ok(self.interpolator.grad(t)? * (-s * self.df(t)?))
    }

    fn df_hessian(&self, t: f64) -> CurveResult<DMatrix<f64>> {
        let s = self.scale(t);
        let g = self.interpolator.grad(t)?;
        let h = self.interpolator.hess(t)?;
        Ok((&g * g.transpose() * (s * s) - h * s) * self.df(t)?)
    }

    fn instantaneous_forward_rate(&self, t: f64) -> CurveResult<f64> {
        let dydt = self.interpolator.dydx(t)?;
        match self.domain_y {
            DomainY::ZeroRate => Ok(self.interpolator.predict(t)? + t * dydt),
            _ => Ok(dydt),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Calibration objective
// ─────────────────────────────────────────────────────────────────────────────

/// Unrealized flows of one bond as `(curve time, amount)`.
type TimedFlows = Vec<(f64, f64)>;

struct CalibrationObjective<'a> {
    fitting_method: FittingMethodKind,
    domain_y: DomainY,
    /// 第一個節點固定為 (0, 0)
    node_times: Vec<f64>,
    flows: &'a [TimedFlows],
    target_pvs: &'a [f64],
}

impl CalibrationObjective<'_> {
    fn curve(&self, x: &[f64]) -> CurveResult<DiscountCurve> {
        let mut ys = Vec::with_capacity(x.len() + 1);
        ys.push(0.0);
        ys.extend_from_slice(x);
        DiscountCurve::fit(self.fitting_method, self.domain_y, &self.node_times, &ys)
    }

    fn pv(curve: &DiscountCurve, flows: &TimedFlows) -> CurveResult<f64> {
        flows.iter().map(|&(t, a)| Ok(a * curve.df(t)?)).sum()
    }

    /// ∂pv/∂x over the free nodes.
    fn pv_gradient(curve: &DiscountCurve, flows: &TimedFlows, n: usize) -> CurveResult<DVector<f64>> {
        let mut g = DVector::<f64>::zeros(n);
        for &(t, a) in flows {
            g += curve.df_gradient(t)?.rows(1, n) * a;
        }
        Ok(g)
    }

    fn pv_hessian(curve: &DiscountCurve, flows: &TimedFlows, n: usize) -> CurveResult<DMatrix<f64>> {
        let mut h = DMatrix::<f64>::zeros(n, n);
        for &(t, a) in flows {
            h += curve.df_hessian(t)?.view((1, 1), (n, n)) * a;
        }
        Ok(h)
    }
}

impl Objective for CalibrationObjective<'_> {
    fn value(&self, x: &[f64]) -> CurveResult<f64> {
        let curve = self.curve(x)?;
        let mut square_error = 0.0;
        for (flows, target) in self.flows.iter().zip(self.target_pvs) {
            let diff = target - Self::pv(&curve, flows)?;
            square_error += diff * diff;
        }
        debug!(square_error, "calibration objective");
        Ok(square_error)
    }

    fn gradient(&self, x: &[f64]) -> CurveResult<Vec<f64>> {
        let curve = self.curve(x)?;
        let n = x.len();
        let mut g = DVector::<f64>::zeros(n);
        for (flows, target) in self.flows.iter().zip(self.target_pvs) {
            let residual = Self::pv(&curve, flows)? - target;
            g += Self::pv_gradient(&curve, flows, n)? * (2.0 * residual);
        }
        Ok(g.iter().copied().collect())
    }

    fn hessian(&self, x: &[f64]) -> CurveResult<Vec<Vec<f64>>> {
        let curve = self.curve(x)?;
        let n = x.len();
        let mut h = DMatrix::<f64>::zeros(n, n);
        for (flows, target) in self.flows.iter().zip(self.target_pvs) {
            let residual = Self::pv(&curve, flows)? - target;
            let g = Self::pv_gradient(&curve, flows, n)?;
            h += (&g * g.transpose() + Self::pv_hessian(&curve, flows, n)? * residual) * 2.0;
        }
        Ok((0..n).map(|i| h.row(i).iter().copied().collect()).collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BondModel
// ─────────────────────────────────────────────────────────────────────────────

/// Nominal discount curve calibrated so every quoted bond reprices to its market value.
pub struct BondModel {
    id: Uuid,
    base_date: NaiveDate,
    t0_date: NaiveDate,
    domain_x: DomainX,
    bond_points: Vec<BondPriceAndYieldDataPoint>,
    target_pvs: Vec<f64>,
    training_data: Vec<(f64, f64)>,
    curve: DiscountCurve,
    square_error: f64,
}

impl BondModel {
    pub fn build(
        base_date: NaiveDate,
        data: &[CurveDataPoint],
        settings: &BuildSettings,
        config: &Configuration,
        options: &CalibrationOptions,
    ) -> CurveResult<BondModel> {
        if settings.model_type != ModelType::BondCurve {
            return Err(CurveError::validation(format!(
                "BondModel: build settings are for {}",
                settings.model_type
            )));
        }
        let t0_date = settings.t0_date_or(base_date);
        let fitting_method = settings.fitting_method()?;
        let opt_method = settings.opt_method.unwrap_or_default();

        let mut bond_points = data
            .iter()
            .map(|p| p.to_bond_price_and_yield(config, base_date))
            .collect::<CurveResult<Vec<_>>>()?;
        bond_points.sort_by_key(|p| p.bond.maturity_date());

        let training_times = bond_points
            .iter()
            .map(|p| time_difference(t0_date, p.bond.last_payment_date(), settings.domain_x))
            .collect::<CurveResult<Vec<_>>>()?;
        if training_times.iter().any(|&t| t <= 0.0) {
            return Err(CurveError::validation("BondModel: training times must be strictly positive"));
        }
        // 同一付款日的兩檔債券會產生重複節點
        if let Some(i) = (1..training_times.len()).find(|&i| training_times[i] <= training_times[i - 1]) {
            return Err(CurveError::validation(format!(
                "BondModel: {} and {} share the training time {}",
                bond_points[i - 1].label,
                bond_points[i].label,
                training_times[i]
            )));
        }
        let target_pvs = bond_points
            .iter()
            .map(|p| p.bond.clean_price_to_market_value(p.clean_price, base_date))
            .collect::<CurveResult<Vec<_>>>()?;

        let initial_guess = match &options.initial_guess {
            Some(guess) if guess.len() != bond_points.len() => {
                return Err(CurveError::validation(format!(
                    "BondModel: initial guess has {} values for {} bonds",
                    guess.len(),
                    bond_points.len()
                )))
            }
            Some(guess) => guess.clone(),
            None => Self::initial_guess(&bond_points, &training_times, settings.domain_y)?,
        };

        let flows = bond_points
            .iter()
            .map(|p| Self::timed_flows(&p.bond, base_date, t0_date, settings.domain_x))
            .collect::<CurveResult<Vec<_>>>()?;

        let mut node_times = Vec::with_capacity(training_times.len() + 1);
        node_times.push(0.0);
        node_times.extend_from_slice(&training_times);
        let objective = CalibrationObjective {
            fitting_method,
            domain_y: settings.domain_y,
            node_times: node_times.clone(),
            flows: &flows,
            target_pvs: &target_pvs,
        };

        info!(
            %fitting_method,
            %opt_method,
            bonds = bond_points.len(),
            %base_date,
            "calibrating bond curve"
        );
        let minimizer_config = MinimizerConfig {
            method: opt_method,
            max_iters: options.max_iters,
            target_cost: options.tolerance * TARGET_COST_FACTOR,
        };
        let minimum = minimize(&objective, initial_guess, &minimizer_config)?;

        let curve = objective.curve(&minimum.param)?;
        let square_error = objective.value(&minimum.param)?;
        let mut node_values = vec![0.0];
        node_values.extend_from_slice(&minimum.param);
        let training_data = node_times.into_iter().zip(node_values).collect();

        let model = BondModel {
            id: Uuid::new_v4(),
            base_date,
            t0_date,
            domain_x: settings.domain_x,
            bond_points,
            target_pvs,
            training_data,
            curve,
            square_error,
        };

        if square_error >= options.tolerance {
            let diagnostics = model.calibration_report()?;
            error!(
                square_error,
                tolerance = options.tolerance,
                iterations = minimum.iterations,
                termination = %minimum.termination,
                "bond curve failed to calibrate"
            );
            return Err(CurveError::Convergence {
                message: format!(
                    "BondModel: square error {square_error} is not below calibration tolerance {}",
                    options.tolerance
                ),
                diagnostics,
            });
        }
        info!(square_error, iterations = minimum.iterations, "bond curve calibrated");
        Ok(model)
    }

    fn initial_guess(
        bond_points: &[BondPriceAndYieldDataPoint],
        training_times: &[f64],
        domain_y: DomainY,
    ) -> CurveResult<Vec<f64>> {
        bond_points
            .iter()
            .zip(training_times)
            .map(|(p, &t)| {
                let y = p.ctsly_compounded_yield()?;
                match domain_y {
                    DomainY::TimeWeightedZeroRate => Ok(t * y),
                    DomainY::ZeroRate => Ok(y),
                    other => Err(CurveError::validation(format!("BondModel: no initial guess for domain {other}"))),
                }
            })
            .collect()
    }

    fn timed_flows(bond: &Bond, base_date: NaiveDate, t0_date: NaiveDate, domain_x: DomainX) -> CurveResult<TimedFlows> {
        let projected = bond.projected_cashflows(base_date)?;
        projected
            .payment_dates()
            .iter()
            .zip(projected.projected_amounts())
            .filter(|(d, _)| **d >= base_date)
            .map(|(&d, &a)| Ok((time_difference(t0_date, d, domain_x)?, a)))
            .collect()
    }

    pub fn t0_date(&self) -> NaiveDate {
        self.t0_date
    }

    /// Calibrated `(t, y)` nodes, `(0, 0)` first.
    pub fn training_data(&self) -> &[(f64, f64)] {
        &self.training_data
    }

    pub fn bond_points(&self) -> &[BondPriceAndYieldDataPoint] {
        &self.bond_points
    }

    pub fn square_error(&self) -> f64 {
        self.square_error
    }

    fn curve_time(&self, date: NaiveDate) -> CurveResult<f64> {
        time_difference(self.t0_date, date, self.domain_x)
    }

    pub fn df(&self, date: NaiveDate) -> CurveResult<f64> {
        self.curve.df(self.curve_time(date)?)
    }

    pub fn time_weighted_zero_rate(&self, date: NaiveDate) -> CurveResult<f64> {
        Ok(-self.df(date)?.ln())
    }

    pub fn zero_rate(&self, date: NaiveDate) -> CurveResult<f64> {
        let t = self.curve_time(date)?;
        if t == 0.0 {
            return Ok(0.0);
        }
        Ok(self.time_weighted_zero_rate(date)? / t)
    }

    pub fn one_day_forward_rate(&self, date: NaiveDate) -> CurveResult<f64> {
        let next = date + Period::days(1);
        let dt = time_difference(date, next, self.domain_x)?;
        Ok((self.time_weighted_zero_rate(next)? - self.time_weighted_zero_rate(date)?) / dt)
    }

    pub fn instantaneous_forward_rate(&self, date: NaiveDate) -> CurveResult<f64> {
        self.curve.instantaneous_forward_rate(self.curve_time(date)?)
    }

    /// ∂df/∂y over every node, including the fixed origin.
    pub fn df_gradient(&self, date: NaiveDate) -> CurveResult<DVector<f64>> {
        self.curve.df_gradient(self.curve_time(date)?)
    }

    pub fn df_hessian(&self, date: NaiveDate) -> CurveResult<DMatrix<f64>> {
        self.curve.df_hessian(self.curve_time(date)?)
    }

    /// 以模型折現因子投影每條腿後加總
    pub fn pv_cashflows(&self, cashflows: &MultiLegCashflows) -> CurveResult<f64> {
        let df = |d: NaiveDate| -> CurveResult<Vec<f64>> { Ok(vec![self.df(d)?]) };
        let projection: Projection<'_> = &df;
        let projections = vec![Some(projection); cashflows.legs().len()];
        let projected = ProjectedCashflows::new(cashflows, &projections, self.base_date, YieldCalculator::TrueYield)?;
        Ok(projected.sum_projected_amounts())
    }

    pub fn pv_bond(&self, bond: &Bond) -> CurveResult<f64> {
        self.pv_cashflows(bond.cashflows())
    }

    pub fn bond_model_dirty_price(&self, bond: &Bond) -> CurveResult<f64> {
        Ok(bond.pv_to_dirty_price(self.pv_bond(bond)?))
    }

    pub fn bond_model_clean_price(&self, bond: &Bond) -> CurveResult<f64> {
        bond.pv_to_clean_price(self.pv_bond(bond)?, self.base_date)
    }

    pub fn bond_model_yield(&self, bond: &Bond) -> CurveResult<f64> {
        bond.pv_to_yield(self.pv_bond(bond)?, self.base_date)
    }

    /// Target against model PV for every quoted bond.
    pub fn calibration_report(&self) -> CurveResult<Vec<CalibrationDiagnostic>> {
        self.bond_points
            .iter()
            .zip(&self.target_pvs)
            .map(|(p, &target)| Ok(CalibrationDiagnostic::new(p.label.clone(), target, self.pv_bond(&p.bond)?)))
            .collect()
    }
}

impl ObjectWithUUID for BondModel {
    fn uuid(&self) -> &Uuid {
        &self.id
    }
}

impl CurveModel for BondModel {
    fn model_type(&self) -> ModelType {
        ModelType::BondCurve
    }

    fn base_date(&self) -> NaiveDate {
        self.base_date
    }

    fn results_on(&self, dates: &[NaiveDate]) -> ModelResults {
        let df = |d| self.df(d);
        let twzr = |d| self.time_weighted_zero_rate(d);
        let zr = |d| self.zero_rate(d);
        let ifr = |d| self.instantaneous_forward_rate(d);
        let metrics: [Metric<'_>; 4] = [
            ("df", &df),
            ("time_weighted_zero_rate", &twzr),
            ("zero_rate", &zr),
            ("instantaneous_forward_rate", &ifr),
        ];
        ModelResults::sample(self.id, ModelType::BondCurve, self.base_date, dates, &metrics)
    }
}
