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
    not_fit_error
};
use crate::math::fitting::spline::SplineNodes;

// ─────────────────────────────────────────────
// Subpolynomial
// ─────────────────────────────────────────────

struct Subpolynomial {
    coefs: Vec<f64>,
    deriv_coefs: Vec<f64>,
    lhs_x: f64,
}

impl Subpolynomial {
    fn new(coefs: Vec<f64>, lhs_x: f64) -> Subpolynomial {
        let deriv_coefs = Self::compute_deriv_coefs(&coefs);
        Subpolynomial { coefs, deriv_coefs, lhs_x }
    }

    fn compute_deriv_coefs(coefs: &[f64]) -> Vec<f64> {
        let order = coefs.len() - 1;
        if order == 0 {
            vec![0.0]
        } else {
            (0..order)
                .map(|i| (order - i) as f64 * coefs[i])
                .collect()
        }
    }

    fn value(&self, x: f64) -> f64 {
        self.evaluate(&self.coefs, x)
    }

    fn derivative(&self, x: f64) -> f64 {
        self.evaluate(&self.deriv_coefs, x)
    }

    fn evaluate(&self, coefs: &[f64], x: f64) -> f64 {
        let x_diff = x - self.lhs_x;
        let mut result = coefs[0];
        for &beta in &coefs[1..] {
            result = f64::mul_add(result, x_diff, beta);
        }
        result
    }
}

// ─────────────────────────────────────────────
// Not-a-knot 係數
// ─────────────────────────────────────────────
//
// 以各節點的二階導數 m[0..=n] 為未知數，內部方程式由 C² 連續性導出：
//   h[i-1]*m[i-1] + 2*(h[i-1]+h[i])*m[i] + h[i]*m[i+1]
//     = 6*( (y[i+1]-y[i])/h[i] - (y[i]-y[i-1])/h[i-1] )
// 第 0 列與第 n 列為 not-a-knot：第三導數在 x[1] 與 x[n-1] 連續。

/// 每段多項式以 Horner 形式存成 [d, c, b, a]：
///   S_i(x) = a + b*(x-x_i) + c*(x-x_i)^2 + d*(x-x_i)^3
fn cubic_coefs_from_moments(ys: &[f64], h: &[f64], m: &[f64]) -> Vec<Vec<f64>> {
    (0..h.len())
        .map(|i| {
            let d = (m[i + 1] - m[i]) / (6.0 * h[i]);
            let c = m[i] / 2.0;
            let b = (ys[i + 1] - ys[i]) / h[i]
                  - h[i] * (2.0 * m[i] + m[i + 1]) / 6.0;
            let a = ys[i];
            vec![d, c, b, a]
        })
        .collect()
}

fn build_interior_system(ys: &[f64], h: &[f64]) -> (DMatrix<f64>, DVector<f64>) {
    let n = h.len();
    let mut mat = DMatrix::<f64>::zeros(n + 1, n + 1);
    let mut rhs = DVector::<f64>::zeros(n + 1);

    for i in 1..n {
        mat[(i, i - 1)] = h[i - 1];
        mat[(i, i)]     = 2.0 * (h[i - 1] + h[i]);
        mat[(i, i + 1)] = h[i];
        rhs[i] = 6.0 * (
            (ys[i + 1] - ys[i]) / h[i]
          - (ys[i]     - ys[i - 1]) / h[i - 1]
        );
    }
    (mat, rhs)
}

/// 節點二階導數；少於 4 點時退化：3 點為拋物線，2 點為直線。
fn not_a_knot_moments(xs: &[f64], ys: &[f64], h: &[f64]) -> CurveResult<Vec<f64>> {
    let n = h.len();
    match n {
        1 => Ok(vec![0.0, 0.0]),
        2 => {
            let curvature = 2.0 * ((ys[2] - ys[1]) / h[1] - (ys[1] - ys[0]) / h[0]) / (xs[2] - xs[0]);
            Ok(vec![curvature; 3])
        }
        _ => {
            let (mut mat, rhs) = build_interior_system(ys, h);

            mat[(0, 0)] = -h[1];
            mat[(0, 1)] =  h[0] + h[1];
            mat[(0, 2)] = -h[0];

            mat[(n, n - 2)] = -h[n - 1];
            mat[(n, n - 1)] =  h[n - 2] + h[n - 1];
            mat[(n, n)]     = -h[n - 2];

            let m = mat
                .lu()
                .solve(&rhs)
                .ok_or_else(|| CurveError::validation("CubicSpline: singular not-a-knot system"))?;
            Ok(m.iter().copied().collect())
        }
    }
}

fn build_subpolynomials(xs: &[f64], ys: &[f64]) -> CurveResult<Vec<Subpolynomial>> {
    if xs.len() == 1 {
        return Ok(vec![Subpolynomial::new(vec![ys[0]], xs[0])]);
    }
    let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
    let m = not_a_knot_moments(xs, ys, &h)?;
    Ok(cubic_coefs_from_moments(ys, &h, &m)
        .into_iter()
        .zip(xs.iter())
        .map(|(coefs, &lhs_x)| Subpolynomial::new(coefs, lhs_x))
        .collect())
}

// ─────────────────────────────────────────────
// CubicSpline
// ─────────────────────────────────────────────

struct CubicState {
    nodes: SplineNodes,
    pieces: Vec<Subpolynomial>,
    // 樣條對 ys 是線性的：basis[j] 為通過單位向量 e_j 的樣條
    basis: Vec<Vec<Subpolynomial>>,
}

/// Not-a-knot cubic spline; the end polynomials extend beyond the nodes.
pub struct CubicSpline {
    state: Option<CubicState>,
}

impl CubicSpline {
    pub fn new() -> CubicSpline {
        CubicSpline { state: None }
    }

    fn fitted(&self) -> CurveResult<&CubicState> {
        self.state.as_ref().ok_or_else(|| not_fit_error(self.kind()))
    }
}

impl Interpolator for CubicSpline {
    fn kind(&self) -> FittingMethodKind {
        FittingMethodKind::CubicSpline
    }

    fn fit(&mut self, xs: &[f64], ys: &[f64]) -> CurveResult<()> {
        let nodes = SplineNodes::new(xs, ys)?;
        let pieces = build_subpolynomials(nodes.xs(), nodes.ys())?;
        let basis = (0..nodes.len())
            .map(|j| {
                let mut unit = vec![0.0; nodes.len()];
                unit[j] = 1.0;
                build_subpolynomials(nodes.xs(), &unit)
            })
            .collect::<CurveResult<Vec<_>>>()?;
        self.state = Some(CubicState { nodes, pieces, basis });
        Ok(())
    }

    fn is_fit(&self) -> bool {
        self.state.is_some()
    }

    fn predict(&self, x: f64) -> CurveResult<f64> {
        let state = self.fitted()?;
        Ok(state.pieces[state.nodes.segment(x)].value(x))
    }

    fn dydx(&self, x: f64) -> CurveResult<f64> {
        let state = self.fitted()?;
        Ok(state.pieces[state.nodes.segment(x)].derivative(x))
    }

    fn grad(&self, x: f64) -> CurveResult<DVector<f64>> {
        let state = self.fitted()?;
        let i = state.nodes.segment(x);
        Ok(DVector::from_iterator(
            state.basis.len(),
            state.basis.iter().map(|pieces| pieces[i].value(x))
        ))
    }

    fn hess(&self, _x: f64) -> CurveResult<DMatrix<f64>> {
        let n = self.fitted()?.nodes.len();
        Ok(DMatrix::zeros(n, n))
    }

    fn nodes(&self) -> CurveResult<(&[f64], &[f64])> {
        let state = self.fitted()?;
        Ok((state.nodes.xs(), state.nodes.ys()))
    }
}
