use chrono::NaiveDate;

use crate::buildsettings::ModelType;
use crate::model::modelresults::{
    ModelResults,
    result_dates
};
use crate::objectwithuuid::ObjectWithUUID;

/// A model built once from curve data and queried by date afterwards.
pub trait CurveModel: ObjectWithUUID {
    fn model_type(&self) -> ModelType;

    fn base_date(&self) -> NaiveDate;

    /// Metrics sampled on `dates`.
    fn results_on(&self, dates: &[NaiveDate]) -> ModelResults;

    /// Metrics sampled on the standard grid from the base date.
    fn results(&self) -> ModelResults {
        self.results_on(&result_dates(self.base_date()))
    }
}
