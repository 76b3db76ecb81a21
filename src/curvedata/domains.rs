use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{
    Serialize,
    Deserialize
};

use crate::curveerror::{
    CurveError,
    CurveResult
};
use crate::time::utility::act365_time;

// ─────────────────────────────────────────────────────────────────────────────
// DomainX
// ─────────────────────────────────────────────────────────────────────────────

/// Coordinate a curve is fit against.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum DomainX {
    #[serde(rename = "TIME_ACT_365")]
    TimeAct365,
    #[serde(rename = "TIME_30_360")]
    Time30360,
    #[serde(rename = "MONTH")]
    Month,
}

impl DomainX {
    pub const ALL: [DomainX; 3] = [DomainX::TimeAct365, DomainX::Time30360, DomainX::Month];

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainX::TimeAct365 => "TIME_ACT_365",
            DomainX::Time30360 => "TIME_30_360",
            DomainX::Month => "MONTH",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DomainY
// ─────────────────────────────────────────────────────────────────────────────

/// Quantity a curve stores at its nodes.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum DomainY {
    #[serde(rename = "CPI_LEVEL")]
    CpiLevel,
    #[serde(rename = "TIME_WEIGHTED_ZERO_RATE")]
    TimeWeightedZeroRate,
    #[serde(rename = "ZERO_RATE")]
    ZeroRate,
    #[serde(rename = "INSTANTANEOUS_RATE")]
    InstantaneousRate,
    #[serde(rename = "ADDITIVE_SEASONALITY")]
    AdditiveSeasonality,
}

impl DomainY {
    pub const ALL: [DomainY; 5] = [
        DomainY::CpiLevel,
        DomainY::TimeWeightedZeroRate,
        DomainY::ZeroRate,
        DomainY::InstantaneousRate,
        DomainY::AdditiveSeasonality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainY::CpiLevel => "CPI_LEVEL",
            DomainY::TimeWeightedZeroRate => "TIME_WEIGHTED_ZERO_RATE",
            DomainY::ZeroRate => "ZERO_RATE",
            DomainY::InstantaneousRate => "INSTANTANEOUS_RATE",
            DomainY::AdditiveSeasonality => "ADDITIVE_SEASONALITY",
        }
    }

    /// Zero-rate domains need an anchor level at `t0`.
    pub fn is_rate_domain(&self) -> bool {
        matches!(self, DomainY::TimeWeightedZeroRate | DomainY::ZeroRate)
    }
}

macro_rules! impl_domain_strings {
    ($($domain:ident),*) => {
        $(
            impl fmt::Display for $domain {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl FromStr for $domain {
                type Err = CurveError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    $domain::ALL
                        .into_iter()
                        .find(|d| d.as_str() == s)
                        .ok_or_else(|| CurveError::validation(format!("unknown {} {s}", stringify!($domain))))
                }
            }
        )*
    };
}

impl_domain_strings!(DomainX, DomainY);

/// Years from `start_date` to `end_date` on a time axis.
pub fn time_difference(start_date: NaiveDate, end_date: NaiveDate, domain_x: DomainX) -> CurveResult<f64> {
    match domain_x {
        DomainX::TimeAct365 => Ok(act365_time(start_date, end_date)),
        DomainX::Time30360 => Err(CurveError::not_implemented("TIME_30_360 time domain")),
        DomainX::Month => Err(CurveError::validation(format!("{domain_x} is not a time domain"))),
    }
}
