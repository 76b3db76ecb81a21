use chrono::{
    Month,
    NaiveDate
};
use serde::{
    Serialize,
    Deserialize
};

use crate::configuration::Configuration;
use crate::curvedata::domains::{
    DomainX,
    DomainY,
    time_difference
};
use crate::curveerror::{
    CurveError,
    CurveResult
};
use crate::instrument::bond::bond::{
    Bond,
    BondTerms
};
use crate::time::period::{
    Period,
    TimeUnit
};

const CPI_X_DOMAINS: [DomainX; 1] = [DomainX::TimeAct365];
const CPI_Y_DOMAINS: [DomainY; 3] = [DomainY::CpiLevel, DomainY::TimeWeightedZeroRate, DomainY::ZeroRate];

pub const TYPE_NAMES: [&str; 6] = [
    "CurveDataPoint",
    "CpiLevelDataPoint",
    "YoYDataPoint",
    "BondPriceDataPoint",
    "BondYieldDataPoint",
    "AdditiveSeasonalityDataPoint",
];

fn default_label(label: &Option<String>, type_name: &str, suffix: impl std::fmt::Display) -> String {
    label.clone().unwrap_or_else(|| format!("{type_name}_{suffix}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// CurveDataPoint
// ─────────────────────────────────────────────────────────────────────────────

/// Market observation a model is trained on, tagged by `type` in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CurveDataPoint {
    CurveDataPoint(PlainDataPoint),
    CpiLevelDataPoint(CpiLevelDataPoint),
    YoYDataPoint(YoYDataPoint),
    BondPriceDataPoint(BondPriceDataPoint),
    BondYieldDataPoint(BondYieldDataPoint),
    AdditiveSeasonalityDataPoint(AdditiveSeasonalityDataPoint),
}

impl CurveDataPoint {
    /// Parses and validates one serialized point; unknown tags are `NotImplemented`.
    pub fn from_json(json_value: serde_json::Value) -> CurveResult<CurveDataPoint> {
        let tag = json_value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| CurveError::validation("curve data point must carry a string type"))?;
        if !TYPE_NAMES.contains(&tag) {
            return Err(CurveError::not_implemented(format!("curve data point type {tag}")));
        }
        let point: CurveDataPoint = serde_json::from_value(json_value)?;
        point.validate()?;
        Ok(point)
    }

    pub fn from_json_vec(json_values: &[serde_json::Value]) -> CurveResult<Vec<CurveDataPoint>> {
        json_values.iter().cloned().map(CurveDataPoint::from_json).collect()
    }

    pub fn validate(&self) -> CurveResult<()> {
        match self {
            CurveDataPoint::CpiLevelDataPoint(p) => p.validate(),
            CurveDataPoint::YoYDataPoint(p) => p.validate(),
            CurveDataPoint::AdditiveSeasonalityDataPoint(p) => p.month().map(|_| ()),
            CurveDataPoint::CurveDataPoint(p) => finite("CurveDataPoint", p.value),
            CurveDataPoint::BondPriceDataPoint(p) => finite("BondPriceDataPoint", p.clean_price),
            CurveDataPoint::BondYieldDataPoint(p) => finite("BondYieldDataPoint", p.ytm),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CurveDataPoint::CurveDataPoint(_) => TYPE_NAMES[0],
            CurveDataPoint::CpiLevelDataPoint(_) => TYPE_NAMES[1],
            CurveDataPoint::YoYDataPoint(_) => TYPE_NAMES[2],
            CurveDataPoint::BondPriceDataPoint(_) => TYPE_NAMES[3],
            CurveDataPoint::BondYieldDataPoint(_) => TYPE_NAMES[4],
            CurveDataPoint::AdditiveSeasonalityDataPoint(_) => TYPE_NAMES[5],
        }
    }

    pub fn label(&self) -> String {
        match self {
            CurveDataPoint::CurveDataPoint(p) => p.label.clone(),
            CurveDataPoint::CpiLevelDataPoint(p) => p.label(),
            CurveDataPoint::YoYDataPoint(p) => p.label(),
            CurveDataPoint::BondPriceDataPoint(p) => p.label(),
            CurveDataPoint::BondYieldDataPoint(p) => p.label(),
            CurveDataPoint::AdditiveSeasonalityDataPoint(p) => p.label(),
        }
    }

    /// Bond quotes as a consistent price/yield pair; every other type is rejected.
    pub fn to_bond_price_and_yield(
        &self,
        config: &Configuration,
        base_date: NaiveDate,
    ) -> CurveResult<BondPriceAndYieldDataPoint> {
        match self {
            CurveDataPoint::BondPriceDataPoint(p) => p.to_bond_price_and_yield(config, base_date),
            CurveDataPoint::BondYieldDataPoint(p) => p.to_bond_price_and_yield(config, base_date),
            other => Err(CurveError::validation(format!(
                "{} is not a bond quote",
                other.type_name()
            ))),
        }
    }
}

fn finite(type_name: &str, value: f64) -> CurveResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CurveError::validation(format!("{type_name}: value must be a finite number, got {value}")))
    }
}

fn check_domains(type_name: &str, domain_x: DomainX, domain_y: DomainY) -> CurveResult<()> {
    if !CPI_X_DOMAINS.contains(&domain_x) {
        return Err(CurveError::validation(format!("{type_name}: unsupported X domain {domain_x}")));
    }
    if !CPI_Y_DOMAINS.contains(&domain_y) {
        return Err(CurveError::validation(format!("{type_name}: unsupported Y domain {domain_y}")));
    }
    Ok(())
}

/// Bare value with a label; no model trains on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainDataPoint {
    pub value: f64,
    pub label: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// CPI points
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpiLevelDataPoint {
    pub value: f64,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl CpiLevelDataPoint {
    pub fn new(value: f64, date: NaiveDate, label: Option<String>) -> CurveResult<CpiLevelDataPoint> {
        let point = CpiLevelDataPoint { value, date, label };
        point.validate()?;
        Ok(point)
    }

    fn validate(&self) -> CurveResult<()> {
        finite("CpiLevelDataPoint", self.value)?;
        if self.value <= 0.0 {
            return Err(CurveError::validation(format!(
                "CpiLevelDataPoint: level must be positive but got {}",
                self.value
            )));
        }
        Ok(())
    }

    pub fn label(&self) -> String {
        default_label(&self.label, "CpiLevelDataPoint", self.date)
    }

    /// `(t, y)` with `t` measured from `base_date`. The rate domains need `base_cpi`.
    pub fn convert(
        &self,
        domain_x: DomainX,
        domain_y: DomainY,
        base_date: NaiveDate,
        base_cpi: Option<f64>,
    ) -> CurveResult<(f64, f64)> {
        check_domains("CpiLevelDataPoint", domain_x, domain_y)?;
        let t = time_difference(base_date, self.date, domain_x)?;
        if domain_y == DomainY::CpiLevel {
            return Ok((t, self.value));
        }

        let base_cpi = base_cpi.ok_or_else(|| {
            CurveError::validation(format!("CpiLevelDataPoint: {domain_y} needs a base CPI level"))
        })?;
        let time_weighted_zero_rate = (self.value / base_cpi).ln();
        let y = match domain_y {
            DomainY::ZeroRate if t == 0.0 => 0.0,
            DomainY::ZeroRate => time_weighted_zero_rate / t,
            _ => time_weighted_zero_rate,
        };
        Ok((t, y))
    }
}

/// Year-over-year inflation from `start_date` over a whole number of years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YoYDataPoint {
    pub value: f64,
    pub start_date: NaiveDate,
    pub tenor: Period,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl YoYDataPoint {
    pub fn new(value: f64, start_date: NaiveDate, tenor: Period, label: Option<String>) -> CurveResult<YoYDataPoint> {
        let point = YoYDataPoint { value, start_date, tenor, label };
        point.validate()?;
        Ok(point)
    }

    fn validate(&self) -> CurveResult<()> {
        finite("YoYDataPoint", self.value)?;
        if self.tenor.unit() != TimeUnit::Years {
            return Err(CurveError::validation(format!(
                "YoYDataPoint: tenor must be in years but got {}",
                self.tenor
            )));
        }
        Ok(())
    }

    pub fn label(&self) -> String {
        default_label(&self.label, "YoYDataPoint", format!("{}_{}", self.start_date, self.tenor))
    }

    pub fn end_date(&self) -> NaiveDate {
        self.start_date + self.tenor
    }

    /// CPI at the end date implied by compounding `start_date_cpi`.
    pub fn to_cpi_level(&self, start_date_cpi: f64) -> CurveResult<CpiLevelDataPoint> {
        let years = self.tenor.number();
        CpiLevelDataPoint::new(
            start_date_cpi * (1.0 + self.value).powi(years),
            self.end_date(),
            Some(self.label()),
        )
    }

    pub fn convert(
        &self,
        domain_x: DomainX,
        domain_y: DomainY,
        start_date_cpi: f64,
        base_date: NaiveDate,
        base_cpi: Option<f64>,
    ) -> CurveResult<(f64, f64)> {
        self.to_cpi_level(start_date_cpi)?.convert(domain_x, domain_y, base_date, base_cpi)
    }
}

/// Additive log seasonal for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditiveSeasonalityDataPoint {
    pub value: f64,
    pub month_str: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl AdditiveSeasonalityDataPoint {
    pub fn new(value: f64, month: Month, label: Option<String>) -> AdditiveSeasonalityDataPoint {
        AdditiveSeasonalityDataPoint { value, month_str: month_abbreviation(month), label }
    }

    /// Accepts `Jan`, `january`, `JAN`, ...
    pub fn month(&self) -> CurveResult<Month> {
        self.month_str
            .parse::<Month>()
            .map_err(|_| CurveError::validation(format!("unrecognized month {}", self.month_str)))
    }

    pub fn label(&self) -> String {
        default_label(&self.label, "AdditiveSeasonalityDataPoint", &self.month_str)
    }
}

pub fn month_abbreviation(month: Month) -> String {
    month.name()[..3].to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Bond points
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondPriceDataPoint {
    pub clean_price: f64,
    pub bond: BondTerms,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl BondPriceDataPoint {
    pub fn label(&self) -> String {
        default_label(&self.label, "BondPriceDataPoint", self.bond.maturity_date)
    }

    pub fn to_bond_price_and_yield(
        &self,
        config: &Configuration,
        base_date: NaiveDate,
    ) -> CurveResult<BondPriceAndYieldDataPoint> {
        let bond = self.bond.create_bond(config)?;
        BondPriceAndYieldDataPoint::from_clean_price(
            bond,
            self.clean_price,
            self.base_date.unwrap_or(base_date),
            format!("Consistent_{}", self.label()),
        )
    }

    /// Same quote expressed as a yield.
    pub fn to_yield_point(&self, config: &Configuration, base_date: NaiveDate) -> CurveResult<BondYieldDataPoint> {
        let base_date = self.base_date.unwrap_or(base_date);
        let ytm = self.bond.create_bond(config)?.clean_price_to_yield(self.clean_price, base_date)?;
        Ok(BondYieldDataPoint {
            ytm,
            bond: self.bond.clone(),
            base_date: Some(base_date),
            label: Some(format!("Converted_{}", self.label())),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondYieldDataPoint {
    pub ytm: f64,
    pub bond: BondTerms,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl BondYieldDataPoint {
    pub fn label(&self) -> String {
        default_label(&self.label, "BondYieldDataPoint", self.bond.maturity_date)
    }

    pub fn to_bond_price_and_yield(
        &self,
        config: &Configuration,
        base_date: NaiveDate,
    ) -> CurveResult<BondPriceAndYieldDataPoint> {
        let bond = self.bond.create_bond(config)?;
        BondPriceAndYieldDataPoint::from_yield(
            bond,
            self.ytm,
            self.base_date.unwrap_or(base_date),
            format!("Consistent_{}", self.label()),
        )
    }

    /// Same quote expressed as a clean price.
    pub fn to_price_point(&self, config: &Configuration, base_date: NaiveDate) -> CurveResult<BondPriceDataPoint> {
        let base_date = self.base_date.unwrap_or(base_date);
        let clean_price = self.bond.create_bond(config)?.yield_to_clean_price(self.ytm, base_date)?;
        Ok(BondPriceDataPoint {
            clean_price,
            bond: self.bond.clone(),
            base_date: Some(base_date),
            label: Some(format!("Converted_{}", self.label())),
        })
    }
}

/// A built bond with a clean price and yield that agree with each other.
#[derive(Clone)]
pub struct BondPriceAndYieldDataPoint {
    pub bond: Bond,
    pub ytm: f64,
    pub clean_price: f64,
    pub base_date: NaiveDate,
    pub label: String,
}

impl BondPriceAndYieldDataPoint {
    pub fn from_clean_price(bond: Bond, clean_price: f64, base_date: NaiveDate, label: String) -> CurveResult<Self> {
        let ytm = bond.clean_price_to_yield(clean_price, base_date)?;
        Ok(BondPriceAndYieldDataPoint { bond, ytm, clean_price, base_date, label })
    }

    /// 價格由殖利率反推，兩者保持一致
    pub fn from_yield(bond: Bond, ytm: f64, base_date: NaiveDate, label: String) -> CurveResult<Self> {
        let clean_price = bond.yield_to_clean_price(ytm, base_date)?;
        Ok(BondPriceAndYieldDataPoint { bond, ytm, clean_price, base_date, label })
    }

    pub fn ctsly_compounded_yield(&self) -> CurveResult<f64> {
        self.bond.annual_yield_to_ctsly_compounded(self.ytm, self.base_date)
    }
}
