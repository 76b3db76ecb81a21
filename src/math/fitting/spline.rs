use std::cell::RefCell;
use std::collections::HashMap;

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

const INDEX_CACHE_CAPACITY: usize = 4096;

// ─────────────────────────────────────────────
// SplineNodes
// ─────────────────────────────────────────────

/// Sorted, strictly increasing training nodes with a memoized binary search.
pub struct SplineNodes {
    xs: Vec<f64>,
    ys: Vec<f64>,
    index_cache: RefCell<HashMap<u64, usize>>,
}

impl SplineNodes {
    pub fn new(xs: &[f64], ys: &[f64]) -> CurveResult<SplineNodes> {
        check_lengths(xs, ys)?;
        if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
            return Err(CurveError::validation("training nodes must be finite"));
        }
        let mut pairs: Vec<(f64, f64)> = xs.iter().copied().zip(ys.iter().copied()).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        if let Some(w) = pairs.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(CurveError::validation(format!(
                "x values must be strictly increasing, got multiple x={}",
                w[0].0
            )));
        }
        let (xs, ys) = pairs.into_iter().unzip();
        Ok(SplineNodes { xs, ys, index_cache: RefCell::new(HashMap::new()) })
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn x_min(&self) -> f64 {
        self.xs[0]
    }

    pub fn x_max(&self) -> f64 {
        self.xs[self.xs.len() - 1]
    }

    pub fn is_between_endpoints(&self, x: f64) -> bool {
        (self.x_min() <= x) && (x <= self.x_max())
    }

    /// Index of the node with the largest x that is `<= target`.
    pub fn find_node_index_below(&self, target: f64) -> CurveResult<usize> {
        if !self.is_between_endpoints(target) {
            return Err(CurveError::Range { x: target, min: self.x_min(), max: self.x_max() });
        }
        let key = target.to_bits();
        if let Some(&i) = self.index_cache.borrow().get(&key) {
            return Ok(i);
        }
        let i = self.xs.partition_point(|&x| x <= target) - 1;
        let mut cache = self.index_cache.borrow_mut();
        if cache.len() >= INDEX_CACHE_CAPACITY {
            cache.clear();
        }
        cache.insert(key, i);
        Ok(i)
    }

    /// Index of the node with the smallest x that is `>= target`.
    pub fn find_node_index_above(&self, target: f64) -> CurveResult<usize> {
        let i = self.find_node_index_below(target)?;
        if self.xs[i] == target {
            Ok(i)
        } else {
            Ok(i + 1)
        }
    }

    /// 外插時夾到第一段或最後一段，回傳區間左端點的 index。
    pub fn segment(&self, x: f64) -> usize {
        let last = self.len().saturating_sub(2);
        if x <= self.x_min() {
            0
        } else if x >= self.x_max() {
            last
        } else {
            self.find_node_index_below(x).map_or(last, |i| i.min(last))
        }
    }

    pub fn one_hot(&self, i: usize) -> DVector<f64> {
        let mut g = DVector::zeros(self.len());
        g[i] = 1.0;
        g
    }

    pub fn zero_hess(&self) -> DMatrix<f64> {
        DMatrix::zeros(self.len(), self.len())
    }
}

// ─────────────────────────────────────────────
// PiecewiseConstantLeftCts
// ─────────────────────────────────────────────

/// Step function taking the node at or above `x`.
pub struct PiecewiseConstantLeftCts {
    nodes: Option<SplineNodes>,
}

impl PiecewiseConstantLeftCts {
    pub fn new() -> PiecewiseConstantLeftCts {
        PiecewiseConstantLeftCts { nodes: None }
    }

    fn fitted(&self) -> CurveResult<&SplineNodes> {
        self.nodes.as_ref().ok_or_else(|| not_fit_error(self.kind()))
    }

    fn active_index(&self, x: f64) -> CurveResult<usize> {
        let nodes = self.fitted()?;
        if x <= nodes.x_min() {
            Ok(0)
        } else if x > nodes.x_max() {
            Ok(nodes.len() - 1)
        } else {
            nodes.find_node_index_above(x)
        }
    }
}

impl Interpolator for PiecewiseConstantLeftCts {
    fn kind(&self) -> FittingMethodKind {
        FittingMethodKind::PiecewiseConstantLeftCts
    }

    fn fit(&mut self, xs: &[f64], ys: &[f64]) -> CurveResult<()> {
        self.nodes = Some(SplineNodes::new(xs, ys)?);
        Ok(())
    }

    fn is_fit(&self) -> bool {
        self.nodes.is_some()
    }

    fn predict(&self, x: f64) -> CurveResult<f64> {
        let i = self.active_index(x)?;
        Ok(self.fitted()?.ys[i])
    }

    fn dydx(&self, _x: f64) -> CurveResult<f64> {
        self.fitted().map(|_| 0.0)
    }

    fn grad(&self, x: f64) -> CurveResult<DVector<f64>> {
        let i = self.active_index(x)?;
        Ok(self.fitted()?.one_hot(i))
    }

    fn hess(&self, _x: f64) -> CurveResult<DMatrix<f64>> {
        Ok(self.fitted()?.zero_hess())
    }

    fn nodes(&self) -> CurveResult<(&[f64], &[f64])> {
        let nodes = self.fitted()?;
        Ok((nodes.xs(), nodes.ys()))
    }
}

// ─────────────────────────────────────────────
// PiecewiseConstantRightCts
// ─────────────────────────────────────────────

/// Step function taking the node at or below `x`.
pub struct PiecewiseConstantRightCts {
    nodes: Option<SplineNodes>,
}

impl PiecewiseConstantRightCts {
    pub fn new() -> PiecewiseConstantRightCts {
        PiecewiseConstantRightCts { nodes: None }
    }

    fn fitted(&self) -> CurveResult<&SplineNodes> {
        self.nodes.as_ref().ok_or_else(|| not_fit_error(self.kind()))
    }

    fn active_index(&self, x: f64) -> CurveResult<usize> {
        let nodes = self.fitted()?;
        if x < nodes.x_min() {
            Ok(0)
        } else if x >= nodes.x_max() {
            Ok(nodes.len() - 1)
        } else {
            nodes.find_node_index_below(x)
        }
    }
}

impl Interpolator for PiecewiseConstantRightCts {
    fn kind(&self) -> FittingMethodKind {
        FittingMethodKind::PiecewiseConstantRightCts
    }

    fn fit(&mut self, xs: &[f64], ys: &[f64]) -> CurveResult<()> {
        self.nodes = Some(SplineNodes::new(xs, ys)?);
        Ok(())
    }

    fn is_fit(&self) -> bool {
        self.nodes.is_some()
    }

    fn predict(&self, x: f64) -> CurveResult<f64> {
        let i = self.active_index(x)?;
        Ok(self.fitted()?.ys[i])
    }

    fn dydx(&self, _x: f64) -> CurveResult<f64> {
        self.fitted().map(|_| 0.0)
    }

    fn grad(&self, x: f64) -> CurveResult<DVector<f64>> {
        let i = self.active_index(x)?;
        Ok(self.fitted()?.one_hot(i))
    }

    fn hess(&self, _x: f64) -> CurveResult<DMatrix<f64>> {
        Ok(self.fitted()?.zero_hess())
    }

    fn nodes(&self) -> CurveResult<(&[f64], &[f64])> {
        let nodes = self.fitted()?;
        Ok((nodes.xs(), nodes.ys()))
    }
}

// ─────────────────────────────────────────────
// PiecewiseLinear
// ─────────────────────────────────────────────

struct LinearState {
    nodes: SplineNodes,
    slopes: Vec<f64>,
}

/// Linear interpolation; beyond either end the nearest segment's slope continues.
pub struct PiecewiseLinear {
    state: Option<LinearState>,
}

impl PiecewiseLinear {
    pub fn new() -> PiecewiseLinear {
        PiecewiseLinear { state: None }
    }

    fn fitted(&self) -> CurveResult<&LinearState> {
        self.state.as_ref().ok_or_else(|| not_fit_error(self.kind()))
    }
}

impl Interpolator for PiecewiseLinear {
    fn kind(&self) -> FittingMethodKind {
        FittingMethodKind::PiecewiseLinear
    }

    fn fit(&mut self, xs: &[f64], ys: &[f64]) -> CurveResult<()> {
        let nodes = SplineNodes::new(xs, ys)?;
        let slopes = nodes
            .xs
            .windows(2)
            .zip(nodes.ys.windows(2))
            .map(|(x, y)| (y[1] - y[0]) / (x[1] - x[0]))
            .collect();
        self.state = Some(LinearState { nodes, slopes });
        Ok(())
    }

    fn is_fit(&self) -> bool {
        self.state.is_some()
    }

    fn predict(&self, x: f64) -> CurveResult<f64> {
        let state = self.fitted()?;
        if state.slopes.is_empty() {
            return Ok(state.nodes.ys[0]);
        }
        let i = state.nodes.segment(x);
        Ok(state.nodes.ys[i] + state.slopes[i] * (x - state.nodes.xs[i]))
    }

    fn dydx(&self, x: f64) -> CurveResult<f64> {
        let state = self.fitted()?;
        if state.slopes.is_empty() {
            return Ok(0.0);
        }
        Ok(state.slopes[state.nodes.segment(x)])
    }

    fn grad(&self, x: f64) -> CurveResult<DVector<f64>> {
        let state = self.fitted()?;
        let nodes = &state.nodes;
        if state.slopes.is_empty() {
            return Ok(nodes.one_hot(0));
        }
        let i = nodes.segment(x);
        let dx = nodes.xs[i + 1] - nodes.xs[i];
        let mut g = DVector::zeros(nodes.len());
        g[i] = (nodes.xs[i + 1] - x) / dx;
        g[i + 1] = (x - nodes.xs[i]) / dx;
        Ok(g)
    }

    fn hess(&self, _x: f64) -> CurveResult<DMatrix<f64>> {
        Ok(self.fitted()?.nodes.zero_hess())
    }

    fn nodes(&self) -> CurveResult<(&[f64], &[f64])> {
        let state = self.fitted()?;
        Ok((state.nodes.xs(), state.nodes.ys()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn linear_interpolates_and_extrapolates_naturally() {
        let mut pl = PiecewiseLinear::new();
        pl.fit(&[0.0, 1.0, 2.0], &[0.0, 2.0, 4.0]).unwrap();
        assert_abs_diff_eq!(pl.predict(0.5).unwrap(), 1.0);
        assert_abs_diff_eq!(pl.predict(3.0).unwrap(), 6.0);
        assert_abs_diff_eq!(pl.predict(-1.0).unwrap(), -2.0);
        assert_abs_diff_eq!(pl.dydx(1.5).unwrap(), 2.0);
    }

    #[test]
    fn linear_grad_is_barycentric() {
        let mut pl = PiecewiseLinear::new();
        pl.fit(&[3.0, 0.0, 1.0, 7.0], &[1.0, 0.5, 0.2, 0.9]).unwrap();
        for x in [-2.0, 0.0, 0.25, 1.0, 2.9, 3.0, 6.5, 10.0] {
            let g = pl.grad(x).unwrap();
            assert_abs_diff_eq!(g.sum(), 1.0, epsilon = 1e-14);
            assert!(g.iter().filter(|w| **w != 0.0).count() <= 2);
        }
        let g = pl.grad(0.25).unwrap();
        assert_abs_diff_eq!(g[0], 0.75);
        assert_abs_diff_eq!(g[1], 0.25);
        assert_eq!(pl.hess(0.25).unwrap(), DMatrix::zeros(4, 4));
    }

    #[test]
    fn single_node_linear_is_constant() {
        let mut pl = PiecewiseLinear::new();
        pl.fit(&[1.0], &[0.03]).unwrap();
        assert_eq!(pl.predict(5.0).unwrap(), 0.03);
        assert_eq!(pl.dydx(5.0).unwrap(), 0.0);
        assert_eq!(pl.grad(5.0).unwrap(), DVector::from_vec(vec![1.0]));
    }

    #[test]
    fn left_cts_partition() {
        let mut step = PiecewiseConstantLeftCts::new();
        step.fit(&[1.0, 2.0, 3.0], &[10.0, 20.0, 30.0]).unwrap();
        assert_eq!(step.predict(0.0).unwrap(), 10.0);
        assert_eq!(step.predict(1.0).unwrap(), 10.0);
        assert_eq!(step.predict(1.5).unwrap(), 20.0);
        assert_eq!(step.predict(2.0).unwrap(), 20.0);
        assert_eq!(step.predict(2.0 + 1e-9).unwrap(), 30.0);
        assert_eq!(step.predict(3.0).unwrap(), 30.0);
        assert_eq!(step.predict(9.0).unwrap(), 30.0);
        assert_eq!(step.predict(1.2).unwrap(), step.predict(1.9).unwrap());
        assert_eq!(step.grad(1.5).unwrap(), DVector::from_vec(vec![0.0, 1.0, 0.0]));
        assert_eq!(step.dydx(1.5).unwrap(), 0.0);
    }

    #[test]
    fn right_cts_partition() {
        let mut step = PiecewiseConstantRightCts::new();
        step.fit(&[1.0, 2.0, 3.0], &[10.0, 20.0, 30.0]).unwrap();
        assert_eq!(step.predict(0.0).unwrap(), 10.0);
        assert_eq!(step.predict(1.0).unwrap(), 10.0);
        assert_eq!(step.predict(1.5).unwrap(), 10.0);
        assert_eq!(step.predict(2.0).unwrap(), 20.0);
        assert_eq!(step.predict(2.0 - 1e-9).unwrap(), 10.0);
        assert_eq!(step.predict(3.0).unwrap(), 30.0);
        assert_eq!(step.predict(9.0).unwrap(), 30.0);
        assert_eq!(step.grad(-1.0).unwrap(), DVector::from_vec(vec![1.0, 0.0, 0.0]));
    }

    #[test]
    fn duplicate_xs_are_rejected() {
        let mut pl = PiecewiseLinear::new();
        assert!(matches!(pl.fit(&[1.0, 2.0, 1.0], &[0.0, 0.0, 0.0]), Err(CurveError::Validation(_))));
        assert!(!pl.is_fit());
    }

    #[test]
    fn bracketing_outside_range_is_a_range_error() {
        let nodes = SplineNodes::new(&[1.0, 2.0, 4.0], &[0.0, 1.0, 2.0]).unwrap();
        assert_eq!(nodes.find_node_index_below(2.0).unwrap(), 1);
        assert_eq!(nodes.find_node_index_below(3.0).unwrap(), 1);
        assert_eq!(nodes.find_node_index_below(3.0).unwrap(), 1);
        assert_eq!(nodes.find_node_index_below(4.0).unwrap(), 2);
        assert_eq!(nodes.find_node_index_above(3.0).unwrap(), 2);
        assert!(matches!(
            nodes.find_node_index_below(4.5),
            Err(CurveError::Range { min, max, .. }) if min == 1.0 && max == 4.0
        ));
        assert_eq!(nodes.segment(4.0), 1);
        assert_eq!(nodes.segment(0.0), 0);
    }
}
