use std::fmt;
use std::str::FromStr;

use argmin::core::{
    CostFunction,
    Executor,
    Gradient,
    Hessian,
    State
};
use argmin::solver::conjugategradient::NonlinearConjugateGradient;
use argmin::solver::conjugategradient::beta::PolakRibiere;
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::BFGS;
use argmin::solver::trustregion::{
    Steihaug,
    TrustRegion
};
use serde::{
    Serialize,
    Deserialize
};
use tracing::debug;

use crate::curveerror::{
    CurveError,
    CurveResult
};

const GRADIENT_STEP: f64 = 1e-6;
const HESSIAN_STEP: f64 = 1e-4;
const GRADIENT_TOLERANCE: f64 = 1e-9;
const NELDER_MEAD_SD_TOLERANCE: f64 = 1e-14;
const NELDER_MEAD_SIMPLEX_STEP: f64 = 0.05;

// ─────────────────────────────────────────────────────────────────────────────
// Objective
// ─────────────────────────────────────────────────────────────────────────────

/// Scalar function to minimize. Gradient and Hessian fall back to central
/// finite differences when an implementation has nothing better.
pub trait Objective {
    fn value(&self, x: &[f64]) -> CurveResult<f64>;

    fn gradient(&self, x: &[f64]) -> CurveResult<Vec<f64>> {
        let mut bumped = x.to_vec();
        let mut g = Vec::with_capacity(x.len());
        for i in 0..x.len() {
            let h = GRADIENT_STEP * x[i].abs().max(1.0);
            bumped[i] = x[i] + h;
            let up = self.value(&bumped)?;
            bumped[i] = x[i] - h;
            let down = self.value(&bumped)?;
            bumped[i] = x[i];
            g.push((up - down) / (2.0 * h));
        }
        Ok(g)
    }

    fn hessian(&self, x: &[f64]) -> CurveResult<Vec<Vec<f64>>> {
        let n = x.len();
        let steps: Vec<f64> = x.iter().map(|xi| HESSIAN_STEP * xi.abs().max(1.0)).collect();
        let mut bumped = x.to_vec();
        let mut hess = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i..n {
                let mut corner = |si: f64, sj: f64| -> CurveResult<f64> {
                    bumped[i] += si * steps[i];
                    bumped[j] += sj * steps[j];
                    let v = self.value(&bumped);
                    bumped[i] = x[i];
                    bumped[j] = x[j];
                    v
                };
                let h_ij = (corner(1.0, 1.0)? - corner(1.0, -1.0)? - corner(-1.0, 1.0)? + corner(-1.0, -1.0)?)
                    / (4.0 * steps[i] * steps[j]);
                hess[i][j] = h_ij;
                hess[j][i] = h_ij;
            }
        }
        Ok(hess)
    }
}

/// argmin 端的包裝：把 `CurveError` 轉成 argmin 的錯誤型別
struct ArgminProblem<'a, O: Objective> {
    objective: &'a O,
}

impl<O: Objective> CostFunction for ArgminProblem<'_, O> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        Ok(self.objective.value(param)?)
    }
}

impl<O: Objective> Gradient for ArgminProblem<'_, O> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, param: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
        Ok(self.objective.gradient(param)?)
    }
}

impl<O: Objective> Hessian for ArgminProblem<'_, O> {
    type Param = Vec<f64>;
    type Hessian = Vec<Vec<f64>>;

    fn hessian(&self, param: &Self::Param) -> Result<Self::Hessian, argmin::core::Error> {
        Ok(self.objective.hessian(param)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OptimizationMethod
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum OptimizationMethod {
    #[serde(rename = "BFGS")]
    Bfgs,
    #[serde(rename = "CG")]
    ConjugateGradient,
    TrustRegion,
    NelderMead,
}

impl OptimizationMethod {
    pub const ALL: [OptimizationMethod; 4] = [
        OptimizationMethod::Bfgs,
        OptimizationMethod::ConjugateGradient,
        OptimizationMethod::TrustRegion,
        OptimizationMethod::NelderMead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationMethod::Bfgs => "BFGS",
            OptimizationMethod::ConjugateGradient => "CG",
            OptimizationMethod::TrustRegion => "TrustRegion",
            OptimizationMethod::NelderMead => "NelderMead",
        }
    }
}

impl Default for OptimizationMethod {
    fn default() -> Self {
        OptimizationMethod::Bfgs
    }
}

impl fmt::Display for OptimizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationMethod {
    type Err = CurveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OptimizationMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| CurveError::validation(format!("unsupported optimization method {s}")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// minimize
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct MinimizerConfig {
    pub method: OptimizationMethod,
    pub max_iters: u64,
    /// 目標值以下即視為收斂
    pub target_cost: f64,
}

impl Default for MinimizerConfig {
    fn default() -> Self {
        MinimizerConfig {
            method: OptimizationMethod::Bfgs,
            max_iters: 500,
            target_cost: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub param: Vec<f64>,
    pub cost: f64,
    pub iterations: u64,
    pub termination: String,
}

fn identity(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect()
}

fn nelder_mead_simplex(init: &[f64]) -> Vec<Vec<f64>> {
    let mut simplex = vec![init.to_vec()];
    for i in 0..init.len() {
        let mut vertex = init.to_vec();
        vertex[i] += NELDER_MEAD_SIMPLEX_STEP * init[i].abs().max(0.01);
        simplex.push(vertex);
    }
    simplex
}

fn into_minimum<S>(state: &S, init: &[f64]) -> Minimum
where
    S: State<Param = Vec<f64>, Float = f64>,
{
    Minimum {
        param: state.get_best_param().cloned().unwrap_or_else(|| init.to_vec()),
        cost: state.get_best_cost(),
        iterations: state.get_iter(),
        termination: state.get_termination_status().to_string(),
    }
}

/// Minimize `objective` from `init` with the configured method.
pub fn minimize<O: Objective>(objective: &O, init: Vec<f64>, config: &MinimizerConfig) -> CurveResult<Minimum> {
    if init.is_empty() {
        return Err(CurveError::validation("cannot minimize over an empty parameter vector"));
    }
    let problem = ArgminProblem { objective };
    let n = init.len();
    let max_iters = config.max_iters;
    let target_cost = config.target_cost;

    let minimum = match config.method {
        OptimizationMethod::Bfgs => {
            let linesearch: MoreThuenteLineSearch<Vec<f64>, Vec<f64>, f64> = MoreThuenteLineSearch::new();
            let solver = BFGS::new(linesearch).with_tolerance_grad(GRADIENT_TOLERANCE)?;
            let res = Executor::new(problem, solver)
                .configure(|state| {
                    state
                        .param(init.clone())
                        .inv_hessian(identity(n))
                        .max_iters(max_iters)
                        .target_cost(target_cost)
                })
                .run()?;
            into_minimum(res.state(), &init)
        }
        OptimizationMethod::ConjugateGradient => {
            let linesearch: MoreThuenteLineSearch<Vec<f64>, Vec<f64>, f64> = MoreThuenteLineSearch::new();
            let solver = NonlinearConjugateGradient::new(linesearch, PolakRibiere::new())
                .restart_iters(n as u64)
                .restart_orthogonality(0.1);
            let res = Executor::new(problem, solver)
                .configure(|state| state.param(init.clone()).max_iters(max_iters).target_cost(target_cost))
                .run()?;
            into_minimum(res.state(), &init)
        }
        OptimizationMethod::TrustRegion => {
            let subproblem: Steihaug<Vec<f64>, f64> = Steihaug::new().with_max_iters(50);
            let solver = TrustRegion::new(subproblem);
            let res = Executor::new(problem, solver)
                .configure(|state| state.param(init.clone()).max_iters(max_iters).target_cost(target_cost))
                .run()?;
            into_minimum(res.state(), &init)
        }
        OptimizationMethod::NelderMead => {
            let solver = NelderMead::new(nelder_mead_simplex(&init))
                .with_sd_tolerance(NELDER_MEAD_SD_TOLERANCE)?;
            let res = Executor::new(problem, solver)
                .configure(|state| state.max_iters(max_iters).target_cost(target_cost))
                .run()?;
            into_minimum(res.state(), &init)
        }
    };

    debug!(
        method = %config.method,
        iterations = minimum.iterations,
        cost = minimum.cost,
        termination = %minimum.termination,
        "optimizer finished"
    );
    Ok(minimum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// 凸二次函數，最小值在 (1, -2, 0.5)
    struct Quadratic;

    impl Objective for Quadratic {
        fn value(&self, x: &[f64]) -> CurveResult<f64> {
            Ok((x[0] - 1.0).powi(2) + 2.0 * (x[1] + 2.0).powi(2) + 3.0 * (x[2] - 0.5).powi(2)
                + 0.5 * (x[0] - 1.0) * (x[1] + 2.0))
        }
    }

    struct Failing;

    impl Objective for Failing {
        fn value(&self, _x: &[f64]) -> CurveResult<f64> {
            Err(CurveError::validation("bad node"))
        }
    }

    #[test]
    fn finite_difference_derivatives() {
        let x = [0.3, -1.0, 2.0];
        let g = Quadratic.gradient(&x).unwrap();
        assert_abs_diff_eq!(g[0], 2.0 * (0.3 - 1.0) + 0.5 * (-1.0 + 2.0), epsilon = 1e-6);
        assert_abs_diff_eq!(g[1], 4.0 * (-1.0 + 2.0) + 0.5 * (0.3 - 1.0), epsilon = 1e-6);
        let h = Quadratic.hessian(&x).unwrap();
        assert_abs_diff_eq!(h[0][0], 2.0, epsilon = 1e-4);
        assert_abs_diff_eq!(h[0][1], 0.5, epsilon = 1e-4);
        assert_abs_diff_eq!(h[1][0], 0.5, epsilon = 1e-4);
        assert_abs_diff_eq!(h[2][2], 6.0, epsilon = 1e-4);
    }

    #[test]
    fn every_method_finds_the_quadratic_minimum() {
        for method in OptimizationMethod::ALL {
            let config = MinimizerConfig { method, max_iters: 2000, target_cost: 1e-16 };
            let minimum = minimize(&Quadratic, vec![0.0, 0.0, 0.0], &config).unwrap();
            assert!(minimum.cost < 1e-8, "{method}: cost {}", minimum.cost);
            assert_abs_diff_eq!(minimum.param[0], 1.0, epsilon = 1e-3);
            assert_abs_diff_eq!(minimum.param[1], -2.0, epsilon = 1e-3);
            assert_abs_diff_eq!(minimum.param[2], 0.5, epsilon = 1e-3);
        }
    }

    #[test]
    fn objective_errors_surface_as_optimizer_errors() {
        let err = minimize(&Failing, vec![1.0], &MinimizerConfig::default()).unwrap_err();
        assert!(matches!(err, CurveError::Optimizer(_)));
        assert!(minimize(&Quadratic, Vec::new(), &MinimizerConfig::default()).is_err());
    }

    #[test]
    fn method_names() {
        assert_eq!("CG".parse::<OptimizationMethod>().unwrap(), OptimizationMethod::ConjugateGradient);
        assert_eq!(serde_json::to_string(&OptimizationMethod::Bfgs).unwrap(), "\"BFGS\"");
        assert!("Powell".parse::<OptimizationMethod>().is_err());
    }
}
