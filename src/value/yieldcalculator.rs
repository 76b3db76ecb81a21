/// Yield conventions for a projected cashflow stream.
///
/// Every function only sees the unrealized flows, i.e. those with a payment
/// time `t >= 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum YieldCalculator {
    /// `PV(y) = Σ a_i / (1+y)^t_i`
    TrueYield,
    /// Periodic discounting with a fractional first period:
    /// `PV(y) = Σ a_i · df^(i + coupon_frac)`, `df = 1 / (1 + y/periods_per_year)`.
    UsStreet {
        periods_per_year: f64,
        coupon_frac: f64,
    },
}

impl Default for YieldCalculator {
    fn default() -> Self {
        YieldCalculator::TrueYield
    }
}

fn unrealized<'a>(amounts: &'a [f64], times: &'a [f64]) -> impl Iterator<Item = (f64, f64)> + 'a {
    amounts
        .iter()
        .zip(times)
        .filter(|(_, t)| **t >= 0.0)
        .map(|(&a, &t)| (a, t))
}

impl YieldCalculator {
    /// 回傳 (金額, 折現指數)；US street 的指數為期數
    fn exponents<'a>(&self, amounts: &'a [f64], times: &'a [f64]) -> Box<dyn Iterator<Item = (f64, f64)> + 'a> {
        match *self {
            YieldCalculator::TrueYield => Box::new(unrealized(amounts, times)),
            YieldCalculator::UsStreet { coupon_frac, .. } => Box::new(
                unrealized(amounts, times)
                    .enumerate()
                    .map(move |(i, (a, _))| (a, i as f64 + coupon_frac)),
            ),
        }
    }

    /// 折現基底 `1+y` 或 `1+y/ppy`，以及對 y 的導數
    fn base(&self, y: f64) -> (f64, f64) {
        match *self {
            YieldCalculator::TrueYield => (1.0 + y, 1.0),
            YieldCalculator::UsStreet { periods_per_year, .. } => {
                (1.0 + y / periods_per_year, 1.0 / periods_per_year)
            }
        }
    }

    pub fn yield_to_pv(&self, y: f64, amounts: &[f64], times: &[f64]) -> f64 {
        let (base, _) = self.base(y);
        self.exponents(amounts, times)
            .map(|(a, k)| a * base.powf(-k))
            .sum()
    }

    pub fn yield_to_pv_prime(&self, y: f64, amounts: &[f64], times: &[f64]) -> f64 {
        let (base, dbase) = self.base(y);
        self.exponents(amounts, times)
            .map(|(a, k)| -k * a * dbase * base.powf(-k - 1.0))
            .sum()
    }

    pub fn yield_to_pv_prime2(&self, y: f64, amounts: &[f64], times: &[f64]) -> f64 {
        let (base, dbase) = self.base(y);
        self.exponents(amounts, times)
            .map(|(a, k)| k * (k + 1.0) * a * dbase * dbase * base.powf(-k - 2.0))
            .sum()
    }

    /// Macaulay duration is `scale · modified duration`.
    pub fn duration_scale(&self, y: f64) -> f64 {
        self.base(y).0
    }

    pub fn annual_yield_to_ctsly_compounded(&self, y: f64) -> f64 {
        match *self {
            YieldCalculator::TrueYield => y.ln_1p(),
            YieldCalculator::UsStreet { periods_per_year, .. } => {
                periods_per_year * (y / periods_per_year).ln_1p()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const AMOUNTS: [f64; 5] = [7.0, 2.0, 2.0, 2.0, 102.0];
    const TIMES: [f64; 5] = [-0.2, 0.3, 0.8, 1.3, 1.8];

    #[test]
    fn true_yield_skips_realized_flows() {
        let pv = YieldCalculator::TrueYield.yield_to_pv(0.0, &AMOUNTS, &TIMES);
        assert_abs_diff_eq!(pv, 108.0, epsilon = 1e-12);
        let pv = YieldCalculator::TrueYield.yield_to_pv(0.05, &[100.0], &[1.0]);
        assert_abs_diff_eq!(pv, 100.0 / 1.05, epsilon = 1e-12);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let h = 1e-6;
        let y = 0.043;
        for calc in [
            YieldCalculator::TrueYield,
            YieldCalculator::UsStreet { periods_per_year: 2.0, coupon_frac: 0.6 },
        ] {
            let pv = |y: f64| calc.yield_to_pv(y, &AMOUNTS, &TIMES);
            let prime = |y: f64| calc.yield_to_pv_prime(y, &AMOUNTS, &TIMES);
            let fd1 = (pv(y + h) - pv(y - h)) / (2.0 * h);
            let fd2 = (prime(y + h) - prime(y - h)) / (2.0 * h);
            assert_abs_diff_eq!(prime(y), fd1, epsilon = 1e-5);
            assert_abs_diff_eq!(calc.yield_to_pv_prime2(y, &AMOUNTS, &TIMES), fd2, epsilon = 1e-4);
        }
    }

    #[test]
    fn us_street_discounts_by_period_count() {
        let calc = YieldCalculator::UsStreet { periods_per_year: 2.0, coupon_frac: 0.5 };
        let pv = calc.yield_to_pv(0.04, &[2.0, 102.0], &[0.25, 0.75]);
        let expected = 2.0 / 1.02f64.powf(0.5) + 102.0 / 1.02f64.powf(1.5);
        assert_abs_diff_eq!(pv, expected, epsilon = 1e-12);
        assert_abs_diff_eq!(calc.duration_scale(0.04), 1.02);
        assert_abs_diff_eq!(calc.annual_yield_to_ctsly_compounded(0.04), 2.0 * 1.02f64.ln(), epsilon = 1e-15);
    }
}
