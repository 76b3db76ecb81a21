use chrono::{
    Datelike,
    Month,
    NaiveDate
};
use tracing::debug;
use uuid::Uuid;

use crate::buildsettings::{
    BuildSettings,
    ModelType
};
use crate::curvedata::curvedata::{
    AdditiveSeasonalityDataPoint,
    CpiLevelDataPoint,
    CurveDataPoint
};
use crate::curveerror::{
    CurveError,
    CurveResult
};
use crate::model::curvemodel::CurveModel;
use crate::model::modelresults::{
    Metric,
    ModelResults
};
use crate::objectwithuuid::ObjectWithUUID;
use crate::time::period::Period;
use crate::time::utility::{
    days_of_month,
    is_leap,
    months_between
};

const ONE_TWELFTH: f64 = 1.0 / 12.0;

/// Weight of one day inside its month; a leap February counts as 28 days.
fn time_measure(d: NaiveDate) -> f64 {
    if d.month() == 2 && is_leap(d.year()) {
        1.0 / 28.0
    } else {
        1.0 / days_of_month(d.year(), d.month()) as f64
    }
}

fn end_of_month(d: NaiveDate) -> NaiveDate {
    d.with_day(days_of_month(d.year(), d.month())).unwrap_or(d)
}

/// `(month, day)` of `d` moved into `year`, clamped to the month end.
fn in_year(d: NaiveDate, year: i32) -> NaiveDate {
    let day = d.day().min(days_of_month(year, d.month()));
    NaiveDate::from_ymd_opt(year, d.month(), day).unwrap_or(d)
}

fn next_month(m: u32) -> u32 {
    m % 12 + 1
}

// ─────────────────────────────────────────────────────────────────────────────
// AdditiveSeasonality
// ─────────────────────────────────────────────────────────────────────────────

/// Twelve additive log seasonals, January first, summing to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct AdditiveSeasonality {
    base_date: NaiveDate,
    seasonals: [f64; 12],
}

impl AdditiveSeasonality {
    pub fn from_seasonals(base_date: NaiveDate, seasonals: [f64; 12], zero_tolerance: f64) -> CurveResult<Self> {
        let total: f64 = seasonals.iter().sum();
        if total.abs() > zero_tolerance {
            return Err(CurveError::validation(format!(
                "AdditiveSeasonality: seasonals sum must be 0 but got {total}"
            )));
        }
        Ok(AdditiveSeasonality { base_date, seasonals })
    }

    pub fn from_points(
        base_date: NaiveDate,
        points: &[AdditiveSeasonalityDataPoint],
        zero_tolerance: f64,
    ) -> CurveResult<Self> {
        if points.len() != 12 {
            return Err(CurveError::validation(format!(
                "AdditiveSeasonality: requires exactly 12 seasonality points but got {}",
                points.len()
            )));
        }
        let mut seasonals = [None; 12];
        for p in points {
            let i = p.month()?.number_from_month() as usize - 1;
            seasonals[i] = Some(p.value);
        }

        let mut values = [0.0; 12];
        for (i, v) in seasonals.iter().enumerate() {
            values[i] = v.ok_or_else(|| {
                CurveError::validation(format!("AdditiveSeasonality: no seasonal for month {}", i + 1))
            })?;
        }
        Self::from_seasonals(base_date, values, zero_tolerance)
    }

    /// Seasonals from at least 13 consecutive monthly CPI levels, count ≡ 1 (mod 12):
    /// the month-over-month log growth per calendar month less the long-run
    /// average, annualized.
    pub fn historical_deviation(
        base_date: NaiveDate,
        points: &[CpiLevelDataPoint],
        zero_tolerance: f64,
    ) -> CurveResult<Self> {
        let n = points.len();
        if n < 13 {
            return Err(CurveError::validation(format!(
                "HistoricalDeviation: requires at least 13 CPI levels but got {n}"
            )));
        }
        if n % 12 != 1 {
            return Err(CurveError::validation(format!(
                "HistoricalDeviation: requires 1 (mod 12) CPI levels but got {n}"
            )));
        }

        let mut sorted: Vec<&CpiLevelDataPoint> = points.iter().collect();
        sorted.sort_by_key(|p| p.date);

        let mut sum_growth = [0.0; 12];
        for w in sorted.windows(2) {
            let (last, next) = (w[0], w[1]);
            if months_between(last.date, next.date) != 1 {
                return Err(CurveError::validation(format!(
                    "HistoricalDeviation: requires consecutive months but got gap between {} and {}",
                    last.date, next.date
                )));
            }
            sum_growth[next.date.month0() as usize] += (next.value / last.value).ln();
        }

        let num_years = (n / 12) as f64;
        let long_term_avg = sum_growth.iter().sum::<f64>() / (n - 1) as f64;
        let seasonals = sum_growth.map(|s| 12.0 * (s / num_years - long_term_avg));
        debug!(?seasonals, "historical deviation seasonals");
        Self::from_seasonals(base_date, seasonals, zero_tolerance)
    }

    pub fn seasonals(&self) -> &[f64; 12] {
        &self.seasonals
    }

    /// Time spent in each calendar month over `[start_date, end_date)`, in years.
    /// Spans of a year or more reduce to their final sub-year window.
    pub fn time_with_seasonals(&self, start_date: NaiveDate, end_date: NaiveDate) -> CurveResult<[f64; 12]> {
        if start_date > end_date {
            return Err(CurveError::validation(format!(
                "time_with_seasonals: start date {start_date} is after end date {end_date}"
            )));
        }
        let mut times = [0.0; 12];
        if start_date == end_date {
            return Ok(times);
        }

        let mut start = start_date;
        if start + Period::years(1) <= end_date {
            let same_year = in_year(start, end_date.year());
            start = if same_year <= end_date { same_year } else { in_year(start, end_date.year() - 1) };
        }
        if start == end_date {
            return Ok(times);
        }

        let start_eom = end_of_month(start);
        let tm = time_measure(start);
        let m = start.month();
        if end_date <= start_eom {
            times[m as usize - 1] = ONE_TWELFTH * (end_date.day() - start.day()) as f64 * tm;
            return Ok(times);
        }
        times[m as usize - 1] = ONE_TWELFTH * (1.0 - (start.day() - 1) as f64 * tm);

        let mut m = next_month(m);
        while m != end_date.month() {
            times[m as usize - 1] = ONE_TWELFTH;
            m = next_month(m);
        }
        // 結束月可能與起始月相同（跨年），所以用累加
        times[m as usize - 1] += ONE_TWELFTH * (end_date.day() - 1) as f64 * time_measure(end_date);
        Ok(times)
    }

    /// ∫ seasonal over `[start_date, end_date)`, negated when `end_date` comes first.
    pub fn integrate(&self, start_date: NaiveDate, end_date: NaiveDate) -> CurveResult<f64> {
        if start_date > end_date {
            return Ok(-self.integrate(end_date, start_date)?);
        }
        let times = self.time_with_seasonals(start_date, end_date)?;
        Ok(times.iter().zip(self.seasonals.iter()).map(|(t, s)| t * s).sum())
    }

    pub fn instantaneous_forward_rate(&self, date: NaiveDate) -> f64 {
        self.seasonals[date.month0() as usize]
    }

    pub fn time_weighted_zero_rate(&self, date: NaiveDate) -> CurveResult<f64> {
        self.integrate(self.base_date, date)
    }

    pub fn zero_rate(&self, date: NaiveDate) -> CurveResult<f64> {
        let (start, end, sign) = if date < self.base_date {
            (date, self.base_date, -1.0)
        } else {
            (self.base_date, date, 1.0)
        };
        let time: f64 = self.time_with_seasonals(start, end)?.iter().sum();
        if time > 0.0 {
            Ok(self.time_weighted_zero_rate(date)? / (sign * time))
        } else {
            Ok(0.0)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SeasonalityModel
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum SeasonalityKind {
    None,
    Additive(AdditiveSeasonality),
    HistoricalDeviation(AdditiveSeasonality),
}

/// Multiplicative CPI seasonality `exp(±∫ seasonal)`; `None` is the identity.
#[derive(Debug, Clone)]
pub struct SeasonalityModel {
    id: Uuid,
    base_date: NaiveDate,
    kind: SeasonalityKind,
}

impl SeasonalityModel {
    pub fn none(base_date: NaiveDate) -> SeasonalityModel {
        Self::with_kind(base_date, SeasonalityKind::None)
    }

    pub fn additive(seasonality: AdditiveSeasonality) -> SeasonalityModel {
        Self::with_kind(seasonality.base_date, SeasonalityKind::Additive(seasonality))
    }

    pub fn historical_deviation(seasonality: AdditiveSeasonality) -> SeasonalityModel {
        Self::with_kind(seasonality.base_date, SeasonalityKind::HistoricalDeviation(seasonality))
    }

    fn with_kind(base_date: NaiveDate, kind: SeasonalityKind) -> SeasonalityModel {
        SeasonalityModel { id: Uuid::new_v4(), base_date, kind }
    }

    /// Builds a seasonality or historical deviation model from request data.
    pub fn build(
        base_date: NaiveDate,
        data: &[CurveDataPoint],
        settings: &BuildSettings,
        zero_tolerance: f64,
    ) -> CurveResult<SeasonalityModel> {
        match settings.model_type {
            ModelType::Seasonality => {
                let points = data
                    .iter()
                    .map(|p| match p {
                        CurveDataPoint::AdditiveSeasonalityDataPoint(q) => Ok(q.clone()),
                        other => Err(unsupported_point(settings.model_type, other)),
                    })
                    .collect::<CurveResult<Vec<_>>>()?;
                Ok(Self::additive(AdditiveSeasonality::from_points(base_date, &points, zero_tolerance)?))
            }
            ModelType::HistDevSeasonality => {
                let points = data
                    .iter()
                    .map(|p| match p {
                        CurveDataPoint::CpiLevelDataPoint(q) => Ok(q.clone()),
                        other => Err(unsupported_point(settings.model_type, other)),
                    })
                    .collect::<CurveResult<Vec<_>>>()?;
                Ok(Self::historical_deviation(AdditiveSeasonality::historical_deviation(
                    base_date,
                    &points,
                    zero_tolerance,
                )?))
            }
            other => Err(CurveError::validation(format!("{other} is not a seasonality model"))),
        }
    }

    pub fn kind(&self) -> &SeasonalityKind {
        &self.kind
    }

    fn additive_part(&self) -> Option<&AdditiveSeasonality> {
        match &self.kind {
            SeasonalityKind::None => None,
            SeasonalityKind::Additive(a) | SeasonalityKind::HistoricalDeviation(a) => Some(a),
        }
    }

    pub fn seasonals(&self) -> Option<&[f64; 12]> {
        self.additive_part().map(AdditiveSeasonality::seasonals)
    }

    /// Removes seasonality from a non-seasonally-adjusted level at `end_date`.
    pub fn strip(&self, start_date: NaiveDate, end_date: NaiveDate, end_cpi_nsa: f64) -> CurveResult<f64> {
        match self.additive_part() {
            None => Ok(end_cpi_nsa),
            Some(a) => Ok(end_cpi_nsa * (-a.integrate(start_date, end_date)?).exp()),
        }
    }

    pub fn apply(&self, start_date: NaiveDate, end_date: NaiveDate, end_cpi_trend: f64) -> CurveResult<f64> {
        match self.additive_part() {
            None => Ok(end_cpi_trend),
            Some(a) => Ok(end_cpi_trend * a.integrate(start_date, end_date)?.exp()),
        }
    }

    pub fn instantaneous_forward_rate(&self, date: NaiveDate) -> f64 {
        self.additive_part().map_or(0.0, |a| a.instantaneous_forward_rate(date))
    }

    pub fn time_weighted_zero_rate(&self, date: NaiveDate) -> CurveResult<f64> {
        self.additive_part().map_or(Ok(0.0), |a| a.time_weighted_zero_rate(date))
    }

    pub fn zero_rate(&self, date: NaiveDate) -> CurveResult<f64> {
        self.additive_part().map_or(Ok(0.0), |a| a.zero_rate(date))
    }

    /// `apply` and `strip` undo each other over the span, within `tolerance`.
    pub fn expect_invertible(&self, start_date: NaiveDate, end_date: NaiveDate, cpi: f64, tolerance: f64) -> CurveResult<bool> {
        let round_trip = self.apply(start_date, end_date, self.strip(start_date, end_date, cpi)?)?;
        let reverse_trip = self.strip(start_date, end_date, self.apply(start_date, end_date, cpi)?)?;
        Ok((round_trip - cpi).abs() <= tolerance && (reverse_trip - cpi).abs() <= tolerance)
    }

    /// No net seasonality accrues over `[date, date + 1Y)`.
    pub fn expect_no_net_seasonality(&self, date: NaiveDate, cpi: f64, tolerance: f64) -> CurveResult<bool> {
        let end_date = date + Period::years(1);
        Ok((self.apply(date, end_date, cpi)? - cpi).abs() <= tolerance)
    }
}

fn unsupported_point(model_type: ModelType, point: &CurveDataPoint) -> CurveError {
    CurveError::validation(format!(
        "{model_type}: received unsupported curve data point {}",
        point.label()
    ))
}

impl ObjectWithUUID for SeasonalityModel {
    fn uuid(&self) -> &Uuid {
        &self.id
    }
}

impl CurveModel for SeasonalityModel {
    fn model_type(&self) -> ModelType {
        match self.kind {
            SeasonalityKind::HistoricalDeviation(_) => ModelType::HistDevSeasonality,
            _ => ModelType::Seasonality,
        }
    }

    fn base_date(&self) -> NaiveDate {
        self.base_date
    }

    fn results_on(&self, dates: &[NaiveDate]) -> ModelResults {
        let twzr = |d| self.time_weighted_zero_rate(d);
        let zr = |d| self.zero_rate(d);
        let ifr = |d: NaiveDate| -> CurveResult<f64> { Ok(self.instantaneous_forward_rate(d)) };
        let metrics: [Metric<'_>; 3] = [
            ("time_weighted_zero_rate", &twzr),
            ("zero_rate", &zr),
            ("instantaneous_forward_rate", &ifr),
        ];
        ModelResults::sample(self.id, self.model_type(), self.base_date, dates, &metrics)
    }
}

/// 月份 1..=12 對應的 chrono `Month`
pub fn month_from_number(m: u32) -> CurveResult<Month> {
    u8::try_from(m)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .ok_or_else(|| CurveError::validation(format!("month number {m} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const SEASONALS: [f64; 12] = [-0.02, 0.01, 0.015, 0.012, 0.008, 0.004, -0.001, -0.002, 0.0, -0.004, -0.012, -0.01];

    fn additive() -> SeasonalityModel {
        SeasonalityModel::additive(AdditiveSeasonality::from_seasonals(ymd(2022, 1, 1), SEASONALS, 1e-12).unwrap())
    }

    #[test]
    fn month_weights() {
        let model = AdditiveSeasonality::from_seasonals(ymd(2022, 1, 1), SEASONALS, 1e-12).unwrap();
        let times = model.time_with_seasonals(ymd(2022, 1, 1), ymd(2022, 4, 1)).unwrap();
        assert_eq!(&times[..4], &[ONE_TWELFTH, ONE_TWELFTH, ONE_TWELFTH, 0.0]);

        let times = model.time_with_seasonals(ymd(2022, 1, 11), ymd(2022, 1, 21)).unwrap();
        assert_abs_diff_eq!(times[0], 10.0 / 31.0 / 12.0, epsilon = 1e-15);

        // 2022-11-16 ~ 2023-02-15 跨年
        let times = model.time_with_seasonals(ymd(2022, 11, 16), ymd(2023, 2, 15)).unwrap();
        assert_abs_diff_eq!(times[10], (1.0 - 15.0 / 30.0) / 12.0, epsilon = 1e-15);
        assert_abs_diff_eq!(times[11], ONE_TWELFTH);
        assert_abs_diff_eq!(times[0], ONE_TWELFTH);
        assert_abs_diff_eq!(times[1], 14.0 / 28.0 / 12.0, epsilon = 1e-15);

        let whole_year = model.time_with_seasonals(ymd(2022, 3, 5), ymd(2023, 3, 5)).unwrap();
        assert_eq!(whole_year, [0.0; 12]);
        assert!(model.time_with_seasonals(ymd(2023, 1, 1), ymd(2022, 1, 1)).is_err());
    }

    #[test]
    fn long_spans_reduce_to_the_last_year() {
        let model = AdditiveSeasonality::from_seasonals(ymd(2022, 1, 1), SEASONALS, 1e-12).unwrap();
        let long = model.time_with_seasonals(ymd(2019, 5, 20), ymd(2023, 2, 10)).unwrap();
        let short = model.time_with_seasonals(ymd(2022, 5, 20), ymd(2023, 2, 10)).unwrap();
        assert_eq!(long, short);

        let long = model.time_with_seasonals(ymd(2019, 2, 10), ymd(2023, 5, 20)).unwrap();
        let short = model.time_with_seasonals(ymd(2023, 2, 10), ymd(2023, 5, 20)).unwrap();
        assert_eq!(long, short);
    }

    #[test]
    fn strip_and_apply_are_inverse() {
        let model = additive();
        for (start, end) in [
            (ymd(2022, 1, 1), ymd(2022, 7, 15)),
            (ymd(2021, 12, 20), ymd(2024, 2, 29)),
            (ymd(2022, 3, 3), ymd(2022, 3, 3)),
        ] {
            assert!(model.expect_invertible(start, end, 296.8, 1e-10).unwrap());
        }
        for d in [ymd(2022, 1, 1), ymd(2022, 6, 17), ymd(2024, 2, 29)] {
            assert!(model.expect_no_net_seasonality(d, 296.8, 1e-10).unwrap());
        }
        let forward = model.strip(ymd(2021, 10, 5), ymd(2022, 4, 1), 100.0).unwrap();
        let backward = model.apply(ymd(2022, 4, 1), ymd(2021, 10, 5), 100.0).unwrap();
        assert_abs_diff_eq!(forward, backward, epsilon = 1e-12);
        let stripped = model.strip(ymd(2022, 1, 1), ymd(2022, 4, 1), 100.0).unwrap();
        assert_abs_diff_eq!(stripped, 100.0 * (-(0.005) / 12.0f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn no_seasonality_is_the_identity() {
        let model = SeasonalityModel::none(ymd(2022, 1, 1));
        assert_eq!(model.strip(ymd(2022, 1, 1), ymd(2022, 5, 1), 250.0).unwrap(), 250.0);
        assert_eq!(model.zero_rate(ymd(2023, 1, 1)).unwrap(), 0.0);
        assert!(model.seasonals().is_none());
    }

    #[test]
    fn seasonals_must_cover_every_month_and_net_to_zero() {
        let base = ymd(2022, 1, 1);
        let mut unbalanced = SEASONALS;
        unbalanced[0] += 1e-6;
        assert!(AdditiveSeasonality::from_seasonals(base, unbalanced, 1e-12).is_err());

        let points: Vec<_> = (1..=12)
            .map(|m| AdditiveSeasonalityDataPoint::new(SEASONALS[m - 1], month_from_number(m as u32).unwrap(), None))
            .collect();
        assert_eq!(AdditiveSeasonality::from_points(base, &points, 1e-12).unwrap().seasonals(), &SEASONALS);

        let mut duplicated = points.clone();
        duplicated[1] = AdditiveSeasonalityDataPoint::new(SEASONALS[1], Month::January, None);
        assert!(AdditiveSeasonality::from_points(base, &duplicated, 1e-12).is_err());
        assert!(AdditiveSeasonality::from_points(base, &points[..11], 1e-12).is_err());
    }

    #[test]
    fn historical_deviation_seasonals() {
        let base = ymd(2022, 1, 1);
        // 兩年的月資料：一月固定多漲 1%
        let mut level = 100.0;
        let mut points = vec![CpiLevelDataPoint::new(level, ymd(2020, 1, 1), None).unwrap()];
        for i in 1..=24 {
            let date = ymd(2020, 1, 1) + Period::months(i);
            level *= if date.month() == 1 { 1.012 } else { 1.002 };
            points.push(CpiLevelDataPoint::new(level, date, None).unwrap());
        }
        let model = AdditiveSeasonality::historical_deviation(base, &points, 1e-12).unwrap();
        let s = model.seasonals();
        let avg = (1.012f64.ln() + 11.0 * 1.002f64.ln()) / 12.0;
        assert_abs_diff_eq!(s[0], 12.0 * (1.012f64.ln() - avg), epsilon = 1e-12);
        assert_abs_diff_eq!(s[5], 12.0 * (1.002f64.ln() - avg), epsilon = 1e-12);
        assert_abs_diff_eq!(s.iter().sum::<f64>(), 0.0, epsilon = 1e-12);

        assert!(AdditiveSeasonality::historical_deviation(base, &points[..24], 1e-12).is_err());
        let mut gapped = points.clone();
        gapped.remove(5);
        gapped.push(CpiLevelDataPoint::new(level, ymd(2022, 3, 1), None).unwrap());
        assert!(AdditiveSeasonality::historical_deviation(base, &gapped, 1e-12).is_err());
    }
}
