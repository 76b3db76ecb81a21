use chrono::NaiveDate;
use serde::{
    Serialize,
    Deserialize
};
use tracing::{
    debug,
    info
};

use crate::buildsettings::{
    BuildSettings,
    ModelType
};
use crate::configuration::Configuration;
use crate::curvedata::curvedata::CurveDataPoint;
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
use crate::model::bondmodel::{
    BondModel,
    CalibrationOptions
};
use crate::model::cpimodel::CpiModel;
use crate::model::curvemodel::CurveModel;
use crate::model::modelresults::ModelResults;
use crate::model::seasonality::SeasonalityModel;

/// JSON body of a model build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub model_type: ModelType,
    pub base_date: NaiveDate,
    #[serde(default)]
    pub model_data: Vec<serde_json::Value>,
    #[serde(rename = "domainX", default, skip_serializing_if = "Option::is_none")]
    pub domain_x: Option<DomainX>,
    #[serde(rename = "domainY", default, skip_serializing_if = "Option::is_none")]
    pub domain_y: Option<DomainY>,
    #[serde(rename = "fitting_method_str", default, skip_serializing_if = "Option::is_none")]
    pub fitting_method: Option<FittingMethodKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t0_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration_tolerance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt_method: Option<OptimizationMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_guess: Option<Vec<f64>>,
}

impl BuildRequest {
    pub fn from_json(json_value: serde_json::Value) -> CurveResult<BuildRequest> {
        Ok(serde_json::from_value(json_value)?)
    }

    /// Settings for the request. Options the model type takes no choice of are
    /// ignored; the optimizer falls back to the configured default.
    pub fn settings(&self, config: &Configuration) -> CurveResult<BuildSettings> {
        let usage = BuildSettings::usage(self.model_type);
        let fitting_method = self.fitting_method.filter(|_| !usage.fitting_method.is_empty());
        let opt_method = if usage.opt_method.is_empty() {
            None
        } else {
            self.opt_method.or(Some(config.defaults().opt_method))
        };
        if fitting_method != self.fitting_method {
            debug!(model_type = %self.model_type, "ignoring fitting_method_str");
        }
        BuildSettings::new(
            self.model_type,
            self.domain_x,
            self.domain_y,
            fitting_method,
            self.t0_date,
            opt_method,
        )
    }
}

/// A built model of any type.
pub enum Model {
    Bond(BondModel),
    Cpi(CpiModel),
    Seasonality(SeasonalityModel),
}

impl Model {
    pub fn curve_model(&self) -> &dyn CurveModel {
        match self {
            Model::Bond(m) => m,
            Model::Cpi(m) => m,
            Model::Seasonality(m) => m,
        }
    }

    pub fn model_type(&self) -> ModelType {
        self.curve_model().model_type()
    }

    pub fn results(&self) -> ModelResults {
        self.curve_model().results()
    }

    pub fn into_seasonality(self) -> CurveResult<SeasonalityModel> {
        match self {
            Model::Seasonality(m) => Ok(m),
            other => Err(CurveError::validation(format!(
                "{} model cannot be used as seasonality",
                other.model_type()
            ))),
        }
    }
}

/// Builds a model from a request. A CPI model may take a seasonality model as reference.
pub fn build_model(
    request: &BuildRequest,
    config: &Configuration,
    seasonality: Option<SeasonalityModel>,
) -> CurveResult<Model> {
    let settings = request.settings(config)?;
    let data = CurveDataPoint::from_json_vec(&request.model_data)?;
    let allowed = request.model_type.data_point_types();
    if let Some(p) = data.iter().find(|p| !allowed.contains(&p.type_name())) {
        return Err(CurveError::validation(format!(
            "{} model cannot train on {} ({})",
            request.model_type,
            p.type_name(),
            p.label()
        )));
    }

    info!(
        model_type = %request.model_type,
        base_date = %request.base_date,
        points = data.len(),
        "building model"
    );
    let defaults = config.defaults();
    match request.model_type {
        ModelType::BondCurve => {
            let options = CalibrationOptions {
                tolerance: request.calibration_tolerance.unwrap_or(defaults.calibration_tolerance),
                max_iters: defaults.max_iters,
                initial_guess: request.initial_guess.clone(),
            };
            Ok(Model::Bond(BondModel::build(request.base_date, &data, &settings, config, &options)?))
        }
        ModelType::Cpi => Ok(Model::Cpi(CpiModel::build(
            request.base_date,
            &data,
            &settings,
            seasonality,
            defaults.zero_tolerance,
        )?)),
        ModelType::Seasonality | ModelType::HistDevSeasonality => Ok(Model::Seasonality(SeasonalityModel::build(
            request.base_date,
            &data,
            &settings,
            defaults.zero_tolerance,
        )?)),
    }
}
