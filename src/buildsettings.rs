use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{
    Serialize,
    Deserialize
};

use crate::curvedata::domains::{
    DomainX,
    DomainY
};
use crate::curveerror::{
    CurveError,
    CurveResult
};
use crate::math::fitting::fittingmethod::FittingMethodKind;
use crate::math::optimizer::minimizer::OptimizationMethod;

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum ModelType {
    BondCurve,
    #[serde(rename = "CPI")]
    Cpi,
    Seasonality,
    HistDevSeasonality,
}

impl ModelType {
    pub const ALL: [ModelType; 4] = [
        ModelType::BondCurve,
        ModelType::Cpi,
        ModelType::Seasonality,
        ModelType::HistDevSeasonality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::BondCurve => "BondCurve",
            ModelType::Cpi => "CPI",
            ModelType::Seasonality => "Seasonality",
            ModelType::HistDevSeasonality => "HistDevSeasonality",
        }
    }

    /// Curve data point types a model of this type trains on.
    pub fn data_point_types(&self) -> &'static [&'static str] {
        match self {
            ModelType::BondCurve => &["BondPriceDataPoint", "BondYieldDataPoint"],
            ModelType::Cpi => &["CpiLevelDataPoint", "YoYDataPoint"],
            ModelType::Seasonality => &["AdditiveSeasonalityDataPoint"],
            ModelType::HistDevSeasonality => &["CpiLevelDataPoint"],
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = CurveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelType::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| CurveError::validation(format!("unsupported model type {s}")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Usage table
// ─────────────────────────────────────────────────────────────────────────────

/// Legal choices per build option; the first entry of each list is the default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildOptionUsage {
    #[serde(rename = "domainX")]
    pub domain_x: Vec<DomainX>,
    #[serde(rename = "domainY")]
    pub domain_y: Vec<DomainY>,
    #[serde(rename = "fitting_method_str", skip_serializing_if = "Vec::is_empty")]
    pub fitting_method: Vec<FittingMethodKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub opt_method: Vec<OptimizationMethod>,
}

impl BuildOptionUsage {
    pub fn for_model(model_type: ModelType) -> BuildOptionUsage {
        use FittingMethodKind::*;

        let time_axes = vec![DomainX::TimeAct365, DomainX::Time30360];
        match model_type {
            ModelType::BondCurve => BuildOptionUsage {
                domain_x: time_axes,
                domain_y: vec![DomainY::TimeWeightedZeroRate, DomainY::ZeroRate],
                fitting_method: vec![
                    PiecewiseLinear,
                    CubicSpline,
                    PiecewiseConstantLeftCts,
                    PiecewiseConstantRightCts,
                    BestFitLinear,
                    BestFitConstant,
                ],
                opt_method: OptimizationMethod::ALL.to_vec(),
            },
            ModelType::Cpi => BuildOptionUsage {
                domain_x: time_axes,
                domain_y: vec![DomainY::TimeWeightedZeroRate, DomainY::CpiLevel, DomainY::ZeroRate],
                fitting_method: vec![
                    PiecewiseLinear,
                    BestFitLinear,
                    BestFitConstant,
                    PiecewiseConstantLeftCts,
                    PiecewiseConstantRightCts,
                    CubicSpline,
                ],
                opt_method: Vec::new(),
            },
            ModelType::Seasonality | ModelType::HistDevSeasonality => BuildOptionUsage {
                domain_x: vec![DomainX::Month],
                domain_y: vec![DomainY::AdditiveSeasonality],
                fitting_method: Vec::new(),
                opt_method: Vec::new(),
            },
        }
    }
}

fn choose<T>(option: &str, value: Option<T>, choices: &[T]) -> CurveResult<Option<T>>
where
    T: Copy + PartialEq + fmt::Debug,
{
    match value {
        None => Ok(choices.first().copied()),
        Some(v) if choices.contains(&v) => Ok(Some(v)),
        Some(v) => Err(CurveError::validation(format!(
            "BuildSettings: option {option}={v:?} is not in supported choices {choices:?}"
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BuildSettings
// ─────────────────────────────────────────────────────────────────────────────

/// Validated build options; unset options take the first legal choice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildSettings {
    pub model_type: ModelType,
    #[serde(rename = "domainX")]
    pub domain_x: DomainX,
    #[serde(rename = "domainY")]
    pub domain_y: DomainY,
    #[serde(rename = "fitting_method_str", skip_serializing_if = "Option::is_none")]
    pub fitting_method: Option<FittingMethodKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t0_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opt_method: Option<OptimizationMethod>,
}

impl BuildSettings {
    pub fn usage(model_type: ModelType) -> BuildOptionUsage {
        BuildOptionUsage::for_model(model_type)
    }

    pub fn new(
        model_type: ModelType,
        domain_x: Option<DomainX>,
        domain_y: Option<DomainY>,
        fitting_method: Option<FittingMethodKind>,
        t0_date: Option<NaiveDate>,
        opt_method: Option<OptimizationMethod>,
    ) -> CurveResult<BuildSettings> {
        let usage = Self::usage(model_type);
        let missing = |option: &str| CurveError::validation(format!("BuildSettings: {model_type} has no {option}"));

        let domain_x = choose("domainX", domain_x, &usage.domain_x)?.ok_or_else(|| missing("domainX"))?;
        let domain_y = choose("domainY", domain_y, &usage.domain_y)?.ok_or_else(|| missing("domainY"))?;

        Ok(BuildSettings {
            model_type,
            domain_x,
            domain_y,
            fitting_method: choose("fitting_method_str", fitting_method, &usage.fitting_method)?,
            t0_date,
            opt_method: choose("opt_method", opt_method, &usage.opt_method)?,
        })
    }

    /// The fitting method of a curve model.
    pub fn fitting_method(&self) -> CurveResult<FittingMethodKind> {
        self.fitting_method
            .ok_or_else(|| CurveError::validation(format!("BuildSettings: {} takes no fitting method", self.model_type)))
    }

    pub fn t0_date_or(&self, base_date: NaiveDate) -> NaiveDate {
        self.t0_date.unwrap_or(base_date)
    }
}
