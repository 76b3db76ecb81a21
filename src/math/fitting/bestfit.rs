use nalgebra::{
    DMatrix,
    DVector
};

use crate::curveerror::{
    CurveError,
    CurveResult
};
use crate::math::fitting::fittingmethod::{
    FittingMethodKind,
    Interpolator,
    check_lengths,
    not_fit_error
};

const PINV_EPS: f64 = 1e-14;

// ─────────────────────────────────────────────
// BestFitConstant
// ─────────────────────────────────────────────

struct ConstantState {
    xs: Vec<f64>,
    ys: Vec<f64>,
    constant: f64,
}

/// Mean of the training ys. The xs are optional and only kept for `nodes()`.
pub struct BestFitConstant {
    state: Option<ConstantState>,
}

impl BestFitConstant {
    pub fn new() -> BestFitConstant {
        BestFitConstant { state: None }
    }

    fn fitted(&self) -> CurveResult<&ConstantState> {
        self.state.as_ref().ok_or_else(|| not_fit_error(self.kind()))
    }
}

impl Interpolator for BestFitConstant {
    fn kind(&self) -> FittingMethodKind {
        FittingMethodKind::BestFitConstant
    }

    fn fit(&mut self, xs: &[f64], ys: &[f64]) -> CurveResult<()> {
        if ys.is_empty() {
            return Err(CurveError::validation("BestFitConstant needs at least one y"));
        }
        if !xs.is_empty() {
            check_lengths(xs, ys)?;
        }
        let constant = ys.iter().sum::<f64>() / ys.len() as f64;
        self.state = Some(ConstantState { xs: xs.to_vec(), ys: ys.to_vec(), constant });
        Ok(())
    }

    fn is_fit(&self) -> bool {
        self.state.is_some()
    }

    fn predict(&self, _x: f64) -> CurveResult<f64> {
        Ok(self.fitted()?.constant)
    }

    fn dydx(&self, _x: f64) -> CurveResult<f64> {
        self.fitted().map(|_| 0.0)
    }

    fn grad(&self, _x: f64) -> CurveResult<DVector<f64>> {
        let n = self.fitted()?.ys.len();
        Ok(DVector::from_element(n, 1.0 / n as f64))
    }

    fn hess(&self, _x: f64) -> CurveResult<DMatrix<f64>> {
        let n = self.fitted()?.ys.len();
        Ok(DMatrix::zeros(n, n))
    }

    fn nodes(&self) -> CurveResult<(&[f64], &[f64])> {
        let state = self.fitted()?;
        Ok((&state.xs, &state.ys))
    }
}

// ─────────────────────────────────────────────
// BestFitLinear
// ─────────────────────────────────────────────

struct LinearRegressionState {
    xs: Vec<f64>,
    ys: Vec<f64>,
    // 設計矩陣 [[x_i, 1]] 的 pseudo-inverse，2 × n
    pinv: DMatrix<f64>,
    slope: f64,
    intercept: f64,
}

/// Ordinary least squares line `y = slope·x + intercept`.
pub struct BestFitLinear {
    state: Option<LinearRegressionState>,
}

impl BestFitLinear {
    pub fn new() -> BestFitLinear {
        BestFitLinear { state: None }
    }

    fn fitted(&self) -> CurveResult<&LinearRegressionState> {
        self.state.as_ref().ok_or_else(|| not_fit_error(self.kind()))
    }

    pub fn slope(&self) -> CurveResult<f64> {
        Ok(self.fitted()?.slope)
    }

    pub fn intercept(&self) -> CurveResult<f64> {
        Ok(self.fitted()?.intercept)
    }
}

impl Interpolator for BestFitLinear {
    fn kind(&self) -> FittingMethodKind {
        FittingMethodKind::BestFitLinear
    }

    fn fit(&mut self, xs: &[f64], ys: &[f64]) -> CurveResult<()> {
        check_lengths(xs, ys)?;
        let n = xs.len();
        let design = DMatrix::from_fn(n, 2, |i, j| if j == 0 { xs[i] } else { 1.0 });
        let pinv = design
            .pseudo_inverse(PINV_EPS)
            .map_err(|e| CurveError::validation(format!("BestFitLinear: {e}")))?;
        let coefs = &pinv * DVector::from_column_slice(ys);
        self.state = Some(LinearRegressionState {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            slope: coefs[0],
            intercept: coefs[1],
            pinv,
        });
        Ok(())
    }

    fn is_fit(&self) -> bool {
        self.state.is_some()
    }

    fn predict(&self, x: f64) -> CurveResult<f64> {
        let state = self.fitted()?;
        Ok(state.slope * x + state.intercept)
    }

    fn dydx(&self, _x: f64) -> CurveResult<f64> {
        Ok(self.fitted()?.slope)
    }

    fn grad(&self, x: f64) -> CurveResult<DVector<f64>> {
        let pinv = &self.fitted()?.pinv;
        Ok((pinv.row(0) * x + pinv.row(1)).transpose())
    }

    fn hess(&self, _x: f64) -> CurveResult<DMatrix<f64>> {
        let n = self.fitted()?.ys.len();
        Ok(DMatrix::zeros(n, n))
    }

    fn nodes(&self) -> CurveResult<(&[f64], &[f64])> {
        let state = self.fitted()?;
        Ok((&state.xs, &state.ys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn constant_is_the_mean() {
        let mut bf = BestFitConstant::new();
        bf.fit(&[], &[5.0, 7.0, 9.0]).unwrap();
        assert_abs_diff_eq!(bf.predict(123.0).unwrap(), 7.0);
        let g = bf.grad(0.0).unwrap();
        assert_eq!(g.len(), 3);
        for w in g.iter() {
            assert_abs_diff_eq!(*w, 1.0 / 3.0);
        }
        assert!(bf.fit(&[], &[]).is_err());
    }

    #[test]
    fn linear_recovers_an_exact_line() {
        let mut bf = BestFitLinear::new();
        bf.fit(&[0.0, 1.0, 2.0, 3.0], &[1.0, 3.0, 5.0, 7.0]).unwrap();
        assert_abs_diff_eq!(bf.slope().unwrap(), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(bf.intercept().unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(bf.dydx(10.0).unwrap(), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(bf.predict(1.5).unwrap(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn linear_grad_matches_finite_differences() {
        let xs = [0.5, 1.5, 2.0, 4.0, 6.0];
        let ys = [1.0, 1.8, 2.1, 2.9, 4.2];
        let mut base = BestFitLinear::new();
        base.fit(&xs, &ys).unwrap();
        let x = 3.3;
        let g = base.grad(x).unwrap();
        // 線性迴歸的預測值對 y 的權重總和為 1
        assert_abs_diff_eq!(g.sum(), 1.0, epsilon = 1e-12);
        for i in 0..ys.len() {
            let mut bumped_ys = ys;
            bumped_ys[i] += 1e-6;
            let mut bumped = BestFitLinear::new();
            bumped.fit(&xs, &bumped_ys).unwrap();
            let fd = (bumped.predict(x).unwrap() - base.predict(x).unwrap()) / 1e-6;
            assert_abs_diff_eq!(g[i], fd, epsilon = 1e-6);
        }
    }
}
