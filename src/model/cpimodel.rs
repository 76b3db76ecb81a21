use chrono::{
    Datelike,
    NaiveDate
};
use nalgebra::{
    DMatrix,
    DVector
};
use tracing::{
    debug,
    info
};
use uuid::Uuid;

use crate::buildsettings::{
    BuildSettings,
    ModelType
};
use crate::curvedata::curvedata::{
    CpiLevelDataPoint,
    CurveDataPoint,
    YoYDataPoint
};
use crate::curvedata::domains::{
    DomainX,
    DomainY,
    time_difference
};
use crate::curveerror::{
    CurveError,
    CurveResult
};
use crate::math::fitting::fittingmethod::Interpolator;
use crate::model::curvemodel::CurveModel;
use crate::model::modelresults::{
    Metric,
    ModelResults
};
use crate::model::seasonality::SeasonalityModel;
use crate::objectwithuuid::ObjectWithUUID;
use crate::time::period::Period;

/// CPI curve: seasonality-stripped levels fit in one of the CPI y-domains.
pub struct CpiModel {
    id: Uuid,
    base_date: NaiveDate,
    domain_x: DomainX,
    domain_y: DomainY,
    t0_date: NaiveDate,
    t0_cpi: Option<f64>,
    zero_tolerance: f64,
    seasonality: SeasonalityModel,
    training_data: Vec<(f64, f64)>,
    interpolator: Box<dyn Interpolator>,
}

impl CpiModel {
    pub fn build(
        base_date: NaiveDate,
        data: &[CurveDataPoint],
        settings: &BuildSettings,
        seasonality: Option<SeasonalityModel>,
        zero_tolerance: f64,
    ) -> CurveResult<CpiModel> {
        if settings.model_type != ModelType::Cpi {
            return Err(CurveError::validation(format!(
                "CpiModel: build settings are for {}",
                settings.model_type
            )));
        }
        let t0_date = settings.t0_date_or(base_date);
        let seasonality = seasonality.unwrap_or_else(|| SeasonalityModel::none(base_date));

        let mut levels: Vec<CpiLevelDataPoint> = Vec::new();
        let mut yoys: Vec<&YoYDataPoint> = Vec::new();
        for p in data {
            match p {
                CurveDataPoint::CpiLevelDataPoint(q) => levels.push(q.clone()),
                CurveDataPoint::YoYDataPoint(q) => yoys.push(q),
                other => {
                    return Err(CurveError::validation(format!(
                        "CpiModel: received unsupported curve data point {}",
                        other.label()
                    )))
                }
            }
        }
        levels.sort_by_key(|p| p.date);

        // YoY 的起點 CPI 只從原始的 level 資料找
        let mut implied = Vec::with_capacity(yoys.len());
        for yoy in yoys {
            let start = levels
                .iter()
                .find(|q| q.date == yoy.start_date)
                .ok_or_else(|| {
                    CurveError::validation(format!("CpiModel: no CPI level on start date for {}", yoy.label()))
                })?;
            implied.push(yoy.to_cpi_level(start.value)?);
        }
        levels.extend(implied);
        levels.sort_by_key(|p| p.date);

        for p in levels.iter_mut() {
            p.value = seasonality.strip(t0_date, p.date, p.value)?;
        }

        let t0_cpi = levels.iter().find(|q| q.date == t0_date).map(|q| q.value);
        if t0_cpi.is_none() && settings.domain_y.is_rate_domain() {
            return Err(CurveError::validation(format!(
                "CpiModel: CPI level on t0_date={t0_date} required when domainY={}",
                settings.domain_y
            )));
        }

        let training_data = levels
            .iter()
            .map(|p| p.convert(settings.domain_x, settings.domain_y, t0_date, t0_cpi))
            .collect::<CurveResult<Vec<_>>>()?;
        let (xs, ys): (Vec<f64>, Vec<f64>) = training_data.iter().copied().unzip();

        let fitting_method = settings.fitting_method()?;
        let mut interpolator = fitting_method.build();
        interpolator.fit(&xs, &ys)?;
        info!(
            %fitting_method,
            domain_y = %settings.domain_y,
            points = training_data.len(),
            %t0_date,
            "built CPI model"
        );

        Ok(CpiModel {
            id: Uuid::new_v4(),
            base_date,
            domain_x: settings.domain_x,
            domain_y: settings.domain_y,
            t0_date,
            t0_cpi,
            zero_tolerance,
            seasonality,
            training_data,
            interpolator,
        })
    }

    pub fn t0_date(&self) -> NaiveDate {
        self.t0_date
    }

    pub fn t0_cpi(&self) -> Option<f64> {
        self.t0_cpi
    }

    pub fn seasonality(&self) -> &SeasonalityModel {
        &self.seasonality
    }

    /// Fitted `(t, y)` nodes in date order.
    pub fn training_data(&self) -> &[(f64, f64)] {
        &self.training_data
    }

    pub fn clamped_date(&self, date: NaiveDate, clamp_date: bool) -> NaiveDate {
        if clamp_date {
            date.with_day(1).unwrap_or(date)
        } else {
            date
        }
    }

    pub fn clamped_time(&self, date: NaiveDate, clamp_date: bool) -> CurveResult<f64> {
        time_difference(self.t0_date, self.clamped_date(date, clamp_date), self.domain_x)
    }

    fn anchor_cpi(&self) -> CurveResult<f64> {
        self.t0_cpi.ok_or_else(|| {
            CurveError::validation(format!("CpiModel: no CPI level on t0_date={}", self.t0_date))
        })
    }

    pub fn predict_at_date(&self, date: NaiveDate, clamp_date: bool) -> CurveResult<f64> {
        self.interpolator.predict(self.clamped_time(date, clamp_date)?)
    }

    /// Seasonally adjusted CPI, floored at the zero tolerance.
    pub fn cpi_trend(&self, date: NaiveDate, clamp_date: bool) -> CurveResult<f64> {
        let y = self.predict_at_date(date, clamp_date)?;
        let level = match self.domain_y {
            DomainY::CpiLevel => y,
            DomainY::TimeWeightedZeroRate => self.anchor_cpi()? * y.exp(),
            DomainY::ZeroRate => self.anchor_cpi()? * (self.clamped_time(date, clamp_date)? * y).exp(),
            other => return Err(CurveError::validation(format!("CpiModel: unsupported domain {other}"))),
        };
        Ok(level.max(self.zero_tolerance))
    }

    /// CPI with seasonality applied, unless `trend` asks for the adjusted level.
    pub fn cpi(&self, date: NaiveDate, clamp_date: bool, trend: bool) -> CurveResult<f64> {
        let date = self.clamped_date(date, clamp_date);
        let cpi_sa = self.cpi_trend(date, false)?;
        if trend {
            Ok(cpi_sa)
        } else {
            self.seasonality.apply(self.t0_date, date, cpi_sa)
        }
    }

    fn reference_cpi(&self, trend: bool) -> CurveResult<f64> {
        match self.t0_cpi {
            Some(c) => Ok(c),
            None => self.cpi(self.t0_date, false, trend),
        }
    }

    /// `ln(cpi(date) / cpi(t0))`
    pub fn time_weighted_zero_rate(&self, date: NaiveDate, clamp_date: bool, trend: bool) -> CurveResult<f64> {
        Ok((self.cpi(date, clamp_date, trend)? / self.reference_cpi(trend)?).ln())
    }

    pub fn zero_rate(&self, date: NaiveDate, clamp_date: bool, trend: bool) -> CurveResult<f64> {
        let t = self.clamped_time(date, clamp_date)?;
        if t == 0.0 {
            return Ok(0.0);
        }
        Ok(self.time_weighted_zero_rate(date, clamp_date, trend)? / t)
    }

    pub fn one_day_forward_rate(&self, date: NaiveDate, clamp_date: bool, trend: bool) -> CurveResult<f64> {
        let d0 = self.clamped_date(date, clamp_date);
        let d1 = d0 + Period::days(1);
        let dt = time_difference(d0, d1, self.domain_x)?;
        let f0 = self.time_weighted_zero_rate(d0, false, trend)?;
        let f1 = self.time_weighted_zero_rate(d1, false, trend)?;
        Ok((f1 - f0) / dt)
    }

    /// Forward rate read off the fitted curve. In the CPI_LEVEL domain this is
    /// `dy/dt / y`, less the month's seasonal rate unless `trend`.
    pub fn instantaneous_forward_rate(&self, date: NaiveDate, clamp_date: bool, trend: bool) -> CurveResult<f64> {
        let t = self.clamped_time(date, clamp_date)?;
        let dydt = self.interpolator.dydx(t)?;
        match self.domain_y {
            DomainY::TimeWeightedZeroRate => Ok(dydt),
            DomainY::ZeroRate => Ok(self.interpolator.predict(t)? + t * dydt),
            DomainY::CpiLevel => {
                let rate = dydt / self.interpolator.predict(t)?;
                if trend {
                    Ok(rate)
                } else {
                    let d = self.clamped_date(date, clamp_date);
                    Ok(rate - self.seasonality.instantaneous_forward_rate(d))
                }
            }
            other => Err(CurveError::validation(format!("CpiModel: unsupported domain {other}"))),
        }
    }

    /// ∂ cpi_trend / ∂ training ys.
    pub fn cpi_gradient(&self, date: NaiveDate, clamp_date: bool) -> CurveResult<DVector<f64>> {
        let t = self.clamped_time(date, clamp_date)?;
        let g = self.interpolator.grad(t)?;
        match self.domain_y {
            DomainY::CpiLevel => Ok(g),
            DomainY::TimeWeightedZeroRate => Ok(g * self.cpi_trend(date, clamp_date)?),
            DomainY::ZeroRate => Ok(g * (self.cpi_trend(date, clamp_date)? * t)),
            other => Err(CurveError::validation(format!("CpiModel: unsupported domain {other}"))),
        }
    }

    pub fn cpi_hessian(&self, date: NaiveDate, clamp_date: bool) -> CurveResult<DMatrix<f64>> {
        let t = self.clamped_time(date, clamp_date)?;
        let h = self.interpolator.hess(t)?;
        if self.domain_y == DomainY::CpiLevel {
            return Ok(h);
        }
        let g = self.interpolator.grad(t)?;
        let c = self.cpi_trend(date, clamp_date)?;
        let outer = &g * g.transpose();
        match self.domain_y {
            DomainY::TimeWeightedZeroRate => Ok((outer + h) * c),
            DomainY::ZeroRate => Ok((outer * t + h) * (c * t)),
            other => Err(CurveError::validation(format!("CpiModel: unsupported domain {other}"))),
        }
    }
}

impl ObjectWithUUID for CpiModel {
    fn uuid(&self) -> &Uuid {
        &self.id
    }
}

impl CurveModel for CpiModel {
    fn model_type(&self) -> ModelType {
        ModelType::Cpi
    }

    fn base_date(&self) -> NaiveDate {
        self.base_date
    }

    fn results_on(&self, dates: &[NaiveDate]) -> ModelResults {
        debug!(dates = dates.len(), "sampling CPI model");
        let cpi = |d| self.cpi(d, false, false);
        let cpi_trend = |d| self.cpi_trend(d, false);
        let twzr = |d| self.time_weighted_zero_rate(d, false, false);
        let zr = |d| self.zero_rate(d, false, false);
        let ifr = |d| self.instantaneous_forward_rate(d, false, false);
        let metrics: [Metric<'_>; 5] = [
            ("cpi", &cpi),
            ("cpi_trend", &cpi_trend),
            ("time_weighted_zero_rate", &twzr),
            ("zero_rate", &zr),
            ("instantaneous_forward_rate", &ifr),
        ];
        ModelResults::sample(self.id, ModelType::Cpi, self.base_date, dates, &metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::math::fitting::fittingmethod::FittingMethodKind;
    use crate::model::seasonality::AdditiveSeasonality;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn level(value: f64, date: NaiveDate) -> CurveDataPoint {
        CurveDataPoint::CpiLevelDataPoint(CpiLevelDataPoint::new(value, date, None).unwrap())
    }

    fn data() -> Vec<CurveDataPoint> {
        vec![
            level(300.0, ymd(2023, 1, 1)),
            level(296.0, ymd(2022, 7, 1)),
            level(290.0, ymd(2022, 1, 1)),
            CurveDataPoint::YoYDataPoint(YoYDataPoint::new(0.025, ymd(2023, 1, 1), Period::years(2), None).unwrap()),
        ]
    }

    fn settings(domain_y: DomainY, fitting_method: FittingMethodKind) -> BuildSettings {
        BuildSettings::new(ModelType::Cpi, None, Some(domain_y), Some(fitting_method), Some(ymd(2022, 1, 1)), None).unwrap()
    }

    #[test]
    fn reproduces_levels_in_every_domain() {
        for domain_y in [DomainY::CpiLevel, DomainY::TimeWeightedZeroRate, DomainY::ZeroRate] {
            let model = CpiModel::build(
                ymd(2022, 1, 1),
                &data(),
                &settings(domain_y, FittingMethodKind::PiecewiseLinear),
                None,
                1e-12,
            )
            .unwrap();
            assert_eq!(model.training_data().len(), 4);
            assert_abs_diff_eq!(model.cpi(ymd(2022, 7, 1), false, false).unwrap(), 296.0, epsilon = 1e-9);
            assert_abs_diff_eq!(model.cpi(ymd(2023, 1, 1), false, false).unwrap(), 300.0, epsilon = 1e-9);
            assert_abs_diff_eq!(model.cpi(ymd(2025, 1, 1), false, true).unwrap(), 300.0 * 1.025f64.powi(2), epsilon = 1e-9);
            assert_abs_diff_eq!(model.zero_rate(ymd(2022, 1, 1), false, false).unwrap(), 0.0);
            assert_abs_diff_eq!(
                model.time_weighted_zero_rate(ymd(2023, 1, 1), false, false).unwrap(),
                (300.0f64 / 290.0).ln(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn clamps_to_the_start_of_the_month() {
        let model = CpiModel::build(
            ymd(2022, 1, 1),
            &data(),
            &settings(DomainY::CpiLevel, FittingMethodKind::PiecewiseLinear),
            None,
            1e-12,
        )
        .unwrap();
        assert_eq!(model.clamped_date(ymd(2022, 7, 19), true), ymd(2022, 7, 1));
        assert_abs_diff_eq!(model.cpi(ymd(2022, 7, 19), true, false).unwrap(), 296.0, epsilon = 1e-9);
        assert!(model.cpi(ymd(2022, 7, 19), false, false).unwrap() > 296.0);
    }

    #[test]
    fn rate_domains_need_a_level_at_t0() {
        let mut s = settings(DomainY::TimeWeightedZeroRate, FittingMethodKind::PiecewiseLinear);
        s.t0_date = Some(ymd(2022, 2, 1));
        let err = CpiModel::build(ymd(2022, 1, 1), &data(), &s, None, 1e-12).err().unwrap();
        assert!(matches!(err, CurveError::Validation(_)));

        s.domain_y = DomainY::CpiLevel;
        let model = CpiModel::build(ymd(2022, 1, 1), &data(), &s, None, 1e-12).unwrap();
        assert_eq!(model.t0_cpi(), None);
    }

    #[test]
    fn yoy_needs_a_start_level() {
        let data = vec![
            level(290.0, ymd(2022, 1, 1)),
            CurveDataPoint::YoYDataPoint(YoYDataPoint::new(0.03, ymd(2022, 6, 1), Period::years(1), None).unwrap()),
        ];
        let s = settings(DomainY::CpiLevel, FittingMethodKind::PiecewiseLinear);
        assert!(matches!(
            CpiModel::build(ymd(2022, 1, 1), &data, &s, None, 1e-12),
            Err(CurveError::Validation(_))
        ));
    }

    #[test]
    fn gradient_and_hessian_match_bumped_fits() {
        let query = ymd(2022, 10, 15);
        for domain_y in [DomainY::CpiLevel, DomainY::TimeWeightedZeroRate, DomainY::ZeroRate] {
            let model = CpiModel::build(
                ymd(2022, 1, 1),
                &data(),
                &settings(domain_y, FittingMethodKind::CubicSpline),
                None,
                1e-12,
            )
            .unwrap();
            let (xs, ys): (Vec<f64>, Vec<f64>) = model.training_data().iter().copied().unzip();
            let t = model.clamped_time(query, false).unwrap();
            let anchor = model.t0_cpi().unwrap_or(1.0);
            let trend_at = |ys: &[f64]| {
                let mut interp = FittingMethodKind::CubicSpline.build();
                interp.fit(&xs, ys).unwrap();
                let y = interp.predict(t).unwrap();
                match domain_y {
                    DomainY::CpiLevel => y,
                    DomainY::TimeWeightedZeroRate => anchor * y.exp(),
                    _ => anchor * (t * y).exp(),
                }
            };

            let g = model.cpi_gradient(query, false).unwrap();
            let h = model.cpi_hessian(query, false).unwrap();
            let bump = 1e-5;
            for i in 0..ys.len() {
                let mut up = ys.clone();
                up[i] += bump;
                let mut down = ys.clone();
                down[i] -= bump;
                let fd = (trend_at(&up) - trend_at(&down)) / (2.0 * bump);
                assert_abs_diff_eq!(g[i], fd, epsilon = 1e-4 * fd.abs().max(1.0));

                let fd2 = (trend_at(&up) - 2.0 * trend_at(&ys) + trend_at(&down)) / (bump * bump);
                assert_abs_diff_eq!(h[(i, i)], fd2, epsilon = 1e-2 * fd2.abs().max(1.0));
            }
        }
    }

    #[test]
    fn seasonality_is_stripped_then_reapplied() {
        let seasonals = [-0.02, 0.01, 0.015, 0.012, 0.008, 0.004, -0.001, -0.002, 0.0, -0.004, -0.012, -0.01];
        let seasonality =
            SeasonalityModel::additive(AdditiveSeasonality::from_seasonals(ymd(2022, 1, 1), seasonals, 1e-12).unwrap());
        let model = CpiModel::build(
            ymd(2022, 1, 1),
            &data(),
            &settings(DomainY::TimeWeightedZeroRate, FittingMethodKind::PiecewiseLinear),
            Some(seasonality),
            1e-12,
        )
        .unwrap();

        let d = ymd(2022, 7, 1);
        assert_abs_diff_eq!(model.cpi(d, false, false).unwrap(), 296.0, epsilon = 1e-9);
        let trend = model.cpi(d, false, true).unwrap();
        let expected = model.seasonality().strip(ymd(2022, 1, 1), d, 296.0).unwrap();
        assert_abs_diff_eq!(trend, expected, epsilon = 1e-9);

        let results = model.results_on(&[ymd(2022, 1, 1), d]);
        assert_eq!(results.series("cpi").unwrap().len(), 2);
        assert_eq!(results.model_type, ModelType::Cpi);
    }

    #[test]
    fn level_domain_forward_nets_out_the_seasonal_rate() {
        let seasonals = [-0.02, 0.01, 0.015, 0.012, 0.008, 0.004, -0.001, -0.002, 0.0, -0.004, -0.012, -0.01];
        let seasonality =
            SeasonalityModel::additive(AdditiveSeasonality::from_seasonals(ymd(2022, 1, 1), seasonals, 1e-12).unwrap());
        let model = CpiModel::build(
            ymd(2022, 1, 1),
            &data(),
            &settings(DomainY::CpiLevel, FittingMethodKind::PiecewiseLinear),
            Some(seasonality),
            1e-12,
        )
        .unwrap();

        // 六月位於前兩個節點之間
        let (t0, y0) = model.training_data()[0];
        let (t1, y1) = model.training_data()[1];
        let query = ymd(2022, 6, 15);
        let t = model.clamped_time(query, false).unwrap();
        let slope = (y1 - y0) / (t1 - t0);
        let trend_rate = slope / (y0 + slope * (t - t0));

        assert_abs_diff_eq!(model.instantaneous_forward_rate(query, false, true).unwrap(), trend_rate, epsilon = 1e-12);
        assert_abs_diff_eq!(
            model.instantaneous_forward_rate(query, false, false).unwrap(),
            trend_rate - 0.004,
            epsilon = 1e-12
        );
    }
}
