use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::buildsettings::ModelType;
use crate::curveerror::CurveResult;
use crate::time::period::Period;

/// A named series evaluated on every result date.
pub type Metric<'a> = (&'a str, &'a dyn Fn(NaiveDate) -> CurveResult<f64>);

/// Dates a model reports on: daily for 3 years, weekly to year 10, monthly to year 31.
pub fn result_dates(base_date: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut d = base_date;

    let daily_end = base_date + Period::years(3);
    while d < daily_end {
        dates.push(d);
        d = d + Period::days(1);
    }

    let weekly_end = base_date + Period::years(10);
    while d < weekly_end {
        dates.push(d);
        d = d + Period::weeks(1);
    }

    // 月頻以 base_date 加 n 個月計算，避免月底日期漂移
    let monthly_end = base_date + Period::years(31);
    let mut n = 1;
    let mut m = base_date + Period::months(120);
    while m <= monthly_end {
        if m >= d {
            dates.push(m);
        }
        m = base_date + Period::months(120 + n);
        n += 1;
    }
    dates
}

/// Sampled output of a built model, keyed by metric name.
#[derive(Debug, Clone, Serialize)]
pub struct ModelResults {
    pub model_id: Uuid,
    pub model_type: ModelType,
    pub base_date: NaiveDate,
    pub results: BTreeMap<String, Vec<(String, f64)>>,
}

impl ModelResults {
    /// Evaluates every metric on `dates`. A failing date is logged and left out.
    pub fn sample(
        model_id: Uuid,
        model_type: ModelType,
        base_date: NaiveDate,
        dates: &[NaiveDate],
        metrics: &[Metric<'_>],
    ) -> ModelResults {
        let mut results: BTreeMap<String, Vec<(String, f64)>> = metrics
            .iter()
            .map(|(name, _)| (name.to_string(), Vec::with_capacity(dates.len())))
            .collect();

        for &d in dates {
            for (name, f) in metrics {
                match f(d) {
                    Ok(value) => {
                        if let Some(series) = results.get_mut(*name) {
                            series.push((d.to_string(), value));
                        }
                    }
                    Err(e) => warn!(%model_type, metric = name, date = %d, error = %e, "skipped result date"),
                }
            }
        }

        ModelResults { model_id, model_type, base_date, results }
    }

    pub fn series(&self, metric: &str) -> Option<&[(String, f64)]> {
        self.results.get(metric).map(Vec::as_slice)
    }
}
