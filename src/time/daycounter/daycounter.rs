use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{
    Serialize,
    Deserialize
};

use super::dominator::{
    FixedBasis,
    IsdaActualBasis
};
use super::numerator::{
    ActualNumerator,
    ThirtyNumerator
};
use crate::curveerror::CurveError;

// ─────────────────────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────────────────────

pub trait DayCounterNumerator: Send + Sync {
    fn days_between(&self, d1: NaiveDate, d2: NaiveDate) -> f64;
}

/// 分母決定如何把 numerator 的天數換成年數；ISDA 會依年份切段。
pub trait DayCounterDominator: Send + Sync {
    fn year_fraction(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        numerator: &dyn DayCounterNumerator,
    ) -> f64;
}

// ─────────────────────────────────────────────────────────────────────────────
// DayCount
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum DayCount {
    #[serde(rename = "ACT_365")]
    Act365,
    #[serde(rename = "ACT_360")]
    Act360,
    #[serde(rename = "ACT_ACT")]
    ActAct,
    #[serde(rename = "THIRTY_360")]
    Thirty360,
}

const ACT_365: FixedBasis = FixedBasis(365.0);
const ACT_360: FixedBasis = FixedBasis(360.0);

impl DayCount {
    fn parts(&self) -> (&'static dyn DayCounterNumerator, &'static dyn DayCounterDominator) {
        match self {
            DayCount::Act365 => (&ActualNumerator, &ACT_365),
            DayCount::Act360 => (&ActualNumerator, &ACT_360),
            DayCount::ActAct => (&ActualNumerator, &IsdaActualBasis),
            DayCount::Thirty360 => (&ThirtyNumerator, &ACT_360),
        }
    }

    /// Signed year fraction from `d1` to `d2`.
    pub fn year_fraction(&self, d1: NaiveDate, d2: NaiveDate) -> f64 {
        let (numerator, dominator) = self.parts();
        if d1 == d2 {
            0.0
        } else if d1 > d2 {
            -dominator.year_fraction(d2, d1, numerator)
        } else {
            dominator.year_fraction(d1, d2, numerator)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayCount::Act365 => "ACT_365",
            DayCount::Act360 => "ACT_360",
            DayCount::ActAct => "ACT_ACT",
            DayCount::Thirty360 => "THIRTY_360",
        }
    }
}

impl fmt::Display for DayCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayCount {
    type Err = CurveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACT_365" => Ok(DayCount::Act365),
            "ACT_360" => Ok(DayCount::Act360),
            "ACT_ACT" => Ok(DayCount::ActAct),
            "THIRTY_360" => Ok(DayCount::Thirty360),
            _ => Err(CurveError::validation(format!("unsupported day count {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn act_fixed_bases() {
        let d1 = ymd(2023, 1, 1);
        let d2 = ymd(2023, 7, 1);
        assert_abs_diff_eq!(DayCount::Act365.year_fraction(d1, d2), 181.0 / 365.0);
        assert_abs_diff_eq!(DayCount::Act360.year_fraction(d1, d2), 181.0 / 360.0);
        assert_abs_diff_eq!(DayCount::Act360.year_fraction(d2, d1), -181.0 / 360.0);
    }

    #[test]
    fn act_act_splits_by_calendar_year() {
        let yf = DayCount::ActAct.year_fraction(ymd(2023, 11, 1), ymd(2024, 3, 1));
        assert_abs_diff_eq!(yf, 61.0 / 365.0 + 60.0 / 366.0, epsilon = 1e-14);
        let full = DayCount::ActAct.year_fraction(ymd(2022, 6, 30), ymd(2025, 6, 30));
        assert_abs_diff_eq!(full, 3.0, epsilon = 1e-2);
    }

    #[test]
    fn thirty_360_bond_basis() {
        assert_abs_diff_eq!(DayCount::Thirty360.year_fraction(ymd(2023, 1, 31), ymd(2023, 7, 31)), 0.5);
        assert_abs_diff_eq!(DayCount::Thirty360.year_fraction(ymd(2023, 2, 28), ymd(2023, 8, 31)), 183.0 / 360.0);
    }

    #[test]
    fn names_round_trip() {
        assert_eq!("ACT_ACT".parse::<DayCount>().unwrap(), DayCount::ActAct);
        assert!("ACT_999".parse::<DayCount>().is_err());
        let d: DayCount = serde_json::from_str("\"THIRTY_360\"").unwrap();
        assert_eq!(d, DayCount::Thirty360);
    }
}
