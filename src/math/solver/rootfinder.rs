use tracing::debug;

use crate::curveerror::{
    CurveError,
    CurveResult
};

pub const DEFAULT_TOLERANCE: f64 = 1e-10;
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl SolverConfig {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SolverResult {
    pub root: f64,
    pub iterations: u32,
    pub residual: f64,
}

/// Halley's method from `x0`; `f_df_d2f` returns the value and its first two
/// derivatives. Stops when the residual or the step falls below tolerance.
pub fn halley<F>(f_df_d2f: F, x0: f64, config: &SolverConfig) -> CurveResult<SolverResult>
where
    F: Fn(f64) -> (f64, f64, f64),
{
    let mut x = x0;
    for iteration in 0..config.max_iterations {
        let (fx, dfx, d2fx) = f_df_d2f(x);
        if !(fx.is_finite() && dfx.is_finite() && d2fx.is_finite()) {
            return Err(CurveError::convergence(format!("Halley: non-finite value at x={x}")));
        }
        if fx.abs() < config.tolerance {
            return Ok(SolverResult { root: x, iterations: iteration, residual: fx });
        }
        if dfx == 0.0 {
            return Err(CurveError::convergence(format!("Halley: zero derivative at x={x}")));
        }

        let denom = 2.0 * dfx * dfx - fx * d2fx;
        let step = if denom == 0.0 {
            fx / dfx
        } else {
            2.0 * fx * dfx / denom
        };
        x -= step;
        if step.abs() < config.tolerance * (1.0 + x.abs()) {
            let (fx, _, _) = f_df_d2f(x);
            return Ok(SolverResult { root: x, iterations: iteration + 1, residual: fx });
        }
    }

    Err(CurveError::convergence(format!(
        "Halley: no convergence after {} iterations",
        config.max_iterations
    )))
}

/// Brent's method on the bracket `[a, b]`; `f(a)` and `f(b)` must differ in sign.
pub fn brent<F>(f: F, a: f64, b: f64, config: &SolverConfig) -> CurveResult<SolverResult>
where
    F: Fn(f64) -> f64,
{
    let (mut a, mut b) = (a, b);
    let (mut fa, mut fb) = (f(a), f(b));
    if !(fa.is_finite() && fb.is_finite()) || fa * fb > 0.0 {
        return Err(CurveError::convergence(format!(
            "Brent: root not bracketed by [{a}, {b}] (f(a)={fa}, f(b)={fb})"
        )));
    }

    let (mut c, mut fc) = (b, fb);
    let mut d = b - a;
    let mut e = d;

    for iteration in 0..config.max_iterations {
        if (fb > 0.0 && fc > 0.0) || (fb < 0.0 && fc < 0.0) {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol = 2.0 * f64::EPSILON * b.abs() + 0.5 * config.tolerance;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol || fb == 0.0 {
            return Ok(SolverResult { root: b, iterations: iteration, residual: fb });
        }

        if e.abs() >= tol && fa.abs() > fb.abs() {
            // 反二次插值，只有兩點時退化為割線法
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                (2.0 * xm * s, 1.0 - s)
            } else {
                let q = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * xm * q * (q - r) - (b - a) * (r - 1.0)),
                    (q - 1.0) * (r - 1.0) * (s - 1.0),
                )
            };
            if p > 0.0 {
                q = -q;
            }
            p = p.abs();
            let min1 = 3.0 * xm * q - (tol * q).abs();
            let min2 = (e * q).abs();
            if 2.0 * p < min1.min(min2) {
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }

        a = b;
        fa = fb;
        b += if d.abs() > tol { d } else { tol.copysign(xm) };
        fb = f(b);
    }

    Err(CurveError::convergence(format!(
        "Brent: no convergence after {} iterations",
        config.max_iterations
    )))
}

/// Halley from `x0`, then Brent on `bracket` when Halley fails.
pub fn solve_root<F, G>(
    f_df_d2f: F,
    f: G,
    x0: f64,
    bracket: (f64, f64),
    config: &SolverConfig,
) -> CurveResult<SolverResult>
where
    F: Fn(f64) -> (f64, f64, f64),
    G: Fn(f64) -> f64,
{
    match halley(f_df_d2f, x0, config) {
        Ok(result) => Ok(result),
        Err(halley_error) => {
            debug!(%halley_error, "falling back to Brent");
            brent(f, bracket.0, bracket.1, config).map_err(|brent_error| {
                CurveError::convergence(format!("{halley_error}; {brent_error}"))
            })
        }
    }
}
