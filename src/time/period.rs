use std::fmt;
use std::ops::{Add, Sub};
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{
    Datelike,
    Duration,
    NaiveDate
};
use serde::{
    Serialize,
    Deserialize
};
use thiserror::Error;

use crate::time::utility::days_of_month;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum TimeUnit {
    Days,
    Weeks,
    Months,
    Years
}

impl TimeUnit {
    pub fn to_char(&self) -> char {
        match self {
            TimeUnit::Days => 'D',
            TimeUnit::Weeks => 'W',
            TimeUnit::Months => 'M',
            TimeUnit::Years => 'Y'
        }
    }
}

#[derive(Debug, Error)]
pub enum ParsePeriodError {
    #[error("empty tenor string")]
    Empty,

    #[error("unknown time unit '{0}' found")]
    UnknownTimeUnit(char),

    #[error(transparent)]
    Parse(#[from] ParseIntError)
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Period {
    number: i32,
    unit: TimeUnit
}

impl Period {
    pub fn new(number: i32, unit: TimeUnit) -> Period {
        Period { number, unit }
    }

    pub fn days(number: i32) -> Period {
        Period::new(number, TimeUnit::Days)
    }

    pub fn weeks(number: i32) -> Period {
        Period::new(number, TimeUnit::Weeks)
    }

    pub fn months(number: i32) -> Period {
        Period::new(number, TimeUnit::Months)
    }

    pub fn years(number: i32) -> Period {
        Period::new(number, TimeUnit::Years)
    }

    /// 解析 "3M"、"10Y" 這類 tenor 字串，單位大小寫皆可。
    pub fn parse(period_str: &str) -> Result<Period, ParsePeriodError> {
        let period_str = period_str.trim();
        let unit_chr = period_str.chars().last().ok_or(ParsePeriodError::Empty)?;
        let number = period_str[..period_str.len() - unit_chr.len_utf8()].parse::<i32>()?;
        match unit_chr.to_ascii_uppercase() {
            'D' => Ok(Period::days(number)),
            'W' => Ok(Period::weeks(number)),
            'M' => Ok(Period::months(number)),
            'Y' => Ok(Period::years(number)),
            _ => Err(ParsePeriodError::UnknownTimeUnit(unit_chr))
        }
    }

    pub fn number(&self) -> i32 {
        self.number
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }
}

impl FromStr for Period {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::parse(s)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.number, self.unit.to_char())
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Period::parse(&s).map_err(serde::de::Error::custom)
    }
}

// 月底日要夾回新月份的最後一天，例如 1/31 + 1M = 2/28
fn shift_months(horizon: NaiveDate, number: i32) -> NaiveDate {
    let total = horizon.month0() as i32 + number;
    let new_year = horizon.year() + total.div_euclid(12);
    let new_month = total.rem_euclid(12) as u32 + 1;
    let last = days_of_month(new_year, new_month);
    NaiveDate::from_ymd_opt(new_year, new_month, last.min(horizon.day())).unwrap_or(NaiveDate::MAX)
}

fn shift_years(horizon: NaiveDate, number: i32) -> NaiveDate {
    shift_months(horizon, 12 * number)
}

impl Add<Period> for NaiveDate {
    type Output = Self;

    fn add(self, period: Period) -> Self {
        match period.unit {
            TimeUnit::Days => self + Duration::days(period.number as i64),
            TimeUnit::Weeks => self + Duration::days(7 * period.number as i64),
            TimeUnit::Months => shift_months(self, period.number),
            TimeUnit::Years => shift_years(self, period.number)
        }
    }
}

impl Sub<Period> for NaiveDate {
    type Output = Self;

    fn sub(self, period: Period) -> Self {
        self + Period::new(-period.number, period.unit)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DateFrequency
// ─────────────────────────────────────────────────────────────────────────────

/// Coupon and sampling frequencies.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DateFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Semiannually,
    Yearly
}

impl DateFrequency {
    pub fn period(&self) -> Period {
        match self {
            DateFrequency::Daily => Period::days(1),
            DateFrequency::Weekly => Period::weeks(1),
            DateFrequency::Monthly => Period::months(1),
            DateFrequency::Quarterly => Period::months(3),
            DateFrequency::Semiannually => Period::months(6),
            DateFrequency::Yearly => Period::years(1)
        }
    }

    pub fn periods_per_year(&self) -> f64 {
        match self {
            DateFrequency::Daily => 365.0,
            DateFrequency::Weekly => 52.0,
            DateFrequency::Monthly => 12.0,
            DateFrequency::Quarterly => 4.0,
            DateFrequency::Semiannually => 2.0,
            DateFrequency::Yearly => 1.0
        }
    }
}
