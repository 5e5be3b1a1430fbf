// src/normalize/mod.rs

use chrono::{DateTime, Datelike, Utc};
use serde_json::{Map, Number, Value as Json};
use std::collections::BTreeMap;

use crate::fetch::openweather::AirReading;
use crate::fetch::world_bank::Observation;

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A slot in an indicator series: one calendar month or one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Period {
    /// `month` is 1-based.
    Month { year: i32, month: u32 },
    Year(i32),
}

impl Period {
    /// Key used when the period is written into a record: the English month
    /// name, or the year in decimal. A month outside 1..=12 keys by its number.
    pub fn key(&self) -> String {
        match *self {
            Period::Month { month, .. } => match MONTH_NAMES.get(month.wrapping_sub(1) as usize) {
                Some(name) => name.to_string(),
                None => month.to_string(),
            },
            Period::Year(year) => year.to_string(),
        }
    }
}

/// Sorted, duplicate-free set of periods a series is normalised over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodSet(Vec<Period>);

impl PeriodSet {
    /// January through December of `year`.
    pub fn months_of(year: i32) -> Self {
        PeriodSet((1..=12).map(|month| Period::Month { year, month }).collect())
    }

    /// Every year in `start..=end`; empty when `start > end`.
    pub fn years(start: i32, end: i32) -> Self {
        PeriodSet((start..=end).map(Period::Year).collect())
    }

    pub fn contains(&self, period: &Period) -> bool {
        self.0.binary_search(period).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Period> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Decimal(f64),
    Count(i64),
}

impl Value {
    pub fn to_json(self) -> Json {
        match self {
            Value::Decimal(v) => Number::from_f64(v).map(Json::Number).unwrap_or(Json::Null),
            Value::Count(n) => Json::Number(n.into()),
        }
    }
}

/// Unit rounding applied to provider values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    OneDecimal,
    Integer,
}

impl Rounding {
    /// Non-finite input has no meaningful rounding and becomes absent.
    pub fn apply(self, raw: f64) -> Option<Value> {
        if !raw.is_finite() {
            return None;
        }
        Some(match self {
            Rounding::OneDecimal => Value::Decimal(round1(raw)),
            Rounding::Integer => Value::Count(raw.round() as i64),
        })
    }
}

/// One decimal place, ties to even (`2.25` -> `2.2`, `2.75` -> `2.8`).
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round_ties_even() / 10.0
}

/// Dense mapping from every period of a [`PeriodSet`] to a value or `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    points: BTreeMap<Period, Option<Value>>,
}

impl Series {
    fn from_fn(periods: &PeriodSet, mut value_of: impl FnMut(&Period) -> Option<Value>) -> Self {
        let points = periods.iter().map(|p| (*p, value_of(p))).collect();
        Series { points }
    }

    /// `None` when `period` is outside the series; `Some(None)` when it is in
    /// range but has no data.
    pub fn get(&self, period: &Period) -> Option<Option<Value>> {
        self.points.get(period).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Period, &Option<Value>)> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of periods that carry a value.
    pub fn present(&self) -> usize {
        self.points.values().filter(|v| v.is_some()).count()
    }

    /// `{ period_key: value | null }` in period order.
    pub fn to_json(&self) -> Map<String, Json> {
        self.points
            .iter()
            .map(|(p, v)| (p.key(), v.map(Value::to_json).unwrap_or(Json::Null)))
            .collect()
    }
}

/// Mean of `pollutant` per UTC calendar month. Readings outside `periods`, or
/// without that component, are ignored; a month with no readings is absent.
pub fn monthly_mean(readings: &[AirReading], pollutant: &str, periods: &PeriodSet) -> Series {
    let mut sums: BTreeMap<Period, (f64, u32)> = BTreeMap::new();

    for reading in readings {
        let value = match reading.components.get(pollutant) {
            Some(v) if v.is_finite() => *v,
            _ => continue,
        };
        let at = match DateTime::<Utc>::from_timestamp(reading.dt, 0) {
            Some(at) => at,
            None => continue,
        };
        let period = Period::Month {
            year: at.year(),
            month: at.month(),
        };
        if !periods.contains(&period) {
            continue;
        }
        let slot = sums.entry(period).or_insert((0.0, 0));
        slot.0 += value;
        slot.1 += 1;
    }

    Series::from_fn(periods, |p| {
        sums.get(p)
            .map(|(sum, n)| Value::Decimal(round1(sum / f64::from(*n))))
    })
}

/// One value per year. The first observation for a year wins, a `null`
/// value stays absent and years outside `periods` are dropped.
pub fn yearly(observations: &[Observation], periods: &PeriodSet, rounding: Rounding) -> Series {
    let mut by_year: BTreeMap<Period, Option<Value>> = BTreeMap::new();

    for obs in observations {
        let year: i32 = match obs.date.trim().parse() {
            Ok(y) => y,
            Err(_) => continue,
        };
        let period = Period::Year(year);
        if !periods.contains(&period) {
            continue;
        }
        by_year
            .entry(period)
            .or_insert_with(|| obs.value.and_then(|v| rounding.apply(v)));
    }

    Series::from_fn(periods, |p| by_year.get(p).copied().flatten())
}
