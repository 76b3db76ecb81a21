use std::fmt;
use std::str::FromStr;

use nalgebra::{
    DMatrix,
    DVector
};
use serde::{
    Serialize,
    Deserialize
};

use crate::curveerror::{
    CurveError,
    CurveResult
};
use crate::math::fitting::bestfit::{
    BestFitConstant,
    BestFitLinear
};
use crate::math::fitting::cubicspline::CubicSpline;
use crate::math::fitting::spline::{
    PiecewiseConstantLeftCts,
    PiecewiseConstantRightCts,
    PiecewiseLinear
};

/// `dydx` 預設的前向差分步長
pub const DYDX_STEP: f64 = 1e-8;

/// One-dimensional fit over training nodes `(x_i, y_i)`.
///
/// `grad` and `hess` are the partial derivatives of `predict(x)` with
/// respect to the training ys, in sorted node order. Every query made
/// before `fit` fails with `CurveError::State`.
pub trait Interpolator: Send {
    fn kind(&self) -> FittingMethodKind;

    fn fit(&mut self, xs: &[f64], ys: &[f64]) -> CurveResult<()>;

    fn is_fit(&self) -> bool;

    fn predict(&self, x: f64) -> CurveResult<f64>;

    fn dydx(&self, x: f64) -> CurveResult<f64> {
        difference_quotient(|x| self.predict(x), x, DYDX_STEP)
    }

    fn grad(&self, x: f64) -> CurveResult<DVector<f64>>;

    fn hess(&self, x: f64) -> CurveResult<DMatrix<f64>>;

    /// Training nodes as stored after `fit`.
    fn nodes(&self) -> CurveResult<(&[f64], &[f64])>;
}

pub fn difference_quotient<F>(f: F, x: f64, delta_x: f64) -> CurveResult<f64>
where
    F: Fn(f64) -> CurveResult<f64>,
{
    if delta_x == 0.0 {
        return Err(CurveError::validation("difference quotient step cannot be 0"));
    }
    let x1 = x + delta_x;
    Ok((f(x1)? - f(x)?) / (x1 - x))
}

pub(crate) fn not_fit_error(kind: FittingMethodKind) -> CurveError {
    CurveError::State(format!("{kind} has not been fit"))
}

pub(crate) fn check_lengths(xs: &[f64], ys: &[f64]) -> CurveResult<()> {
    if xs.len() != ys.len() {
        return Err(CurveError::validation(format!(
            "xs and ys must have the same length, got {} and {}",
            xs.len(),
            ys.len()
        )));
    }
    if ys.is_empty() {
        return Err(CurveError::validation("at least one training point is required"));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// FittingMethodKind
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum FittingMethodKind {
    BestFitConstant,
    BestFitLinear,
    PiecewiseLinear,
    PiecewiseConstantLeftCts,
    PiecewiseConstantRightCts,
    CubicSpline,
}

impl FittingMethodKind {
    pub const ALL: [FittingMethodKind; 6] = [
        FittingMethodKind::PiecewiseLinear,
        FittingMethodKind::PiecewiseConstantLeftCts,
        FittingMethodKind::PiecewiseConstantRightCts,
        FittingMethodKind::CubicSpline,
        FittingMethodKind::BestFitConstant,
        FittingMethodKind::BestFitLinear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FittingMethodKind::BestFitConstant => "BestFitConstant",
            FittingMethodKind::BestFitLinear => "BestFitLinear",
            FittingMethodKind::PiecewiseLinear => "PiecewiseLinear",
            FittingMethodKind::PiecewiseConstantLeftCts => "PiecewiseConstantLeftCts",
            FittingMethodKind::PiecewiseConstantRightCts => "PiecewiseConstantRightCts",
            FittingMethodKind::CubicSpline => "CubicSpline",
        }
    }

    /// A fresh, unfit interpolator of this kind.
    pub fn build(&self) -> Box<dyn Interpolator> {
        match self {
            FittingMethodKind::BestFitConstant => Box::new(BestFitConstant::new()),
            FittingMethodKind::BestFitLinear => Box::new(BestFitLinear::new()),
            FittingMethodKind::PiecewiseLinear => Box::new(PiecewiseLinear::new()),
            FittingMethodKind::PiecewiseConstantLeftCts => Box::new(PiecewiseConstantLeftCts::new()),
            FittingMethodKind::PiecewiseConstantRightCts => Box::new(PiecewiseConstantRightCts::new()),
            FittingMethodKind::CubicSpline => Box::new(CubicSpline::new()),
        }
    }
}

impl fmt::Display for FittingMethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FittingMethodKind {
    type Err = CurveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FittingMethodKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CurveError::validation(format!("unrecognized fitting method type {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn every_kind_interpolates_its_nodes() {
        let xs = [0.5, 1.0, 2.0, 3.5, 5.0];
        let ys = [0.01, 0.015, 0.02, 0.022, 0.025];
        for kind in [
            FittingMethodKind::PiecewiseLinear,
            FittingMethodKind::PiecewiseConstantLeftCts,
            FittingMethodKind::PiecewiseConstantRightCts,
            FittingMethodKind::CubicSpline,
        ] {
            let mut interp = kind.build();
            interp.fit(&xs, &ys).unwrap();
            for (x, y) in xs.iter().zip(ys.iter()) {
                assert_abs_diff_eq!(interp.predict(*x).unwrap(), *y, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn queries_before_fit_are_state_errors() {
        for kind in FittingMethodKind::ALL {
            let interp = kind.build();
            assert!(!interp.is_fit());
            assert!(matches!(interp.predict(1.0), Err(CurveError::State(_))));
            assert!(matches!(interp.grad(1.0), Err(CurveError::State(_))));
            assert!(matches!(interp.hess(1.0), Err(CurveError::State(_))));
            assert!(matches!(interp.dydx(1.0), Err(CurveError::State(_))));
        }
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        for kind in FittingMethodKind::ALL {
            let mut interp = kind.build();
            assert!(matches!(interp.fit(&[1.0, 2.0], &[1.0]), Err(CurveError::Validation(_))));
        }
    }

    #[test]
    fn names_parse() {
        assert_eq!("CubicSpline".parse::<FittingMethodKind>().unwrap(), FittingMethodKind::CubicSpline);
        assert!("Akima".parse::<FittingMethodKind>().is_err());
        assert_eq!(FittingMethodKind::PiecewiseLinear.to_string(), "PiecewiseLinear");
    }

    #[test]
    fn grad_matches_bumped_ys() {
        let xs = [0.0, 1.0, 2.5, 4.0, 7.0];
        let ys = [0.0, 0.3, 0.1, 0.6, 0.4];
        let bump = 1e-6;
        for kind in FittingMethodKind::ALL {
            let mut base = kind.build();
            base.fit(&xs, &ys).unwrap();
            for x in [-0.5, 0.7, 3.0, 6.9, 8.0] {
                let g = base.grad(x).unwrap();
                for i in 0..ys.len() {
                    let mut bumped_ys = ys;
                    bumped_ys[i] += bump;
                    let mut bumped = kind.build();
                    bumped.fit(&xs, &bumped_ys).unwrap();
                    let fd = (bumped.predict(x).unwrap() - base.predict(x).unwrap()) / bump;
                    assert_abs_diff_eq!(g[i], fd, epsilon = 1e-6);
                }
            }
        }
    }
}
