// src/config/mod.rs

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::fetch::{openweather, rest_countries, world_bank};
use crate::normalize::PeriodSet;

/// Run configuration. Built from defaults, then an optional YAML file, then
/// command-line overrides. No input or output path is assumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// File the records are read from.
    pub input_path: Option<PathBuf>,
    /// File the enriched records are written to; the input file when unset.
    pub output_path: Option<PathBuf>,
    /// Air-quality provider credential.
    pub api_key: Option<String>,
    /// First year of economic queries, inclusive.
    pub start_year: i32,
    /// Last year of economic queries, inclusive.
    pub end_year: i32,
    /// Year whose months the air-quality series covers; `end_year` when unset.
    pub air_quality_year: Option<i32>,
    /// Pollution component averaged per month.
    pub pollutant: String,
    pub timeout_secs: u64,
    /// Spaces per indentation level in the written JSON.
    pub indent: usize,
    pub openweather_url: String,
    pub world_bank_url: String,
    pub rest_countries_url: String,
}

impl Default for Config {
    fn default() -> Self {
        let this_year = Utc::now().year();
        Self {
            input_path: None,
            output_path: None,
            api_key: None,
            start_year: this_year - 10,
            end_year: this_year - 1,
            air_quality_year: None,
            pollutant: "pm2_5".to_string(),
            timeout_secs: 30,
            indent: 4,
            openweather_url: openweather::DEFAULT_BASE_URL.to_string(),
            world_bank_url: world_bank::DEFAULT_BASE_URL.to_string(),
            rest_countries_url: rest_countries::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Values supplied on the command line; `None` leaves the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub input_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub api_key: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub air_quality_year: Option<i32>,
    pub pollutant: Option<String>,
    pub timeout_secs: Option<u64>,
    pub indent: Option<usize>,
}

impl Config {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("parsing YAML config")
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Defaults, overlaid with `file` when given, then with `overrides`.
    pub fn load(file: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        Ok(config)
    }

    pub fn apply(&mut self, o: Overrides) {
        if o.input_path.is_some() {
            self.input_path = o.input_path;
        }
        if o.output_path.is_some() {
            self.output_path = o.output_path;
        }
        if o.api_key.is_some() {
            self.api_key = o.api_key;
        }
        if let Some(y) = o.start_year {
            self.start_year = y;
        }
        if let Some(y) = o.end_year {
            self.end_year = y;
        }
        if o.air_quality_year.is_some() {
            self.air_quality_year = o.air_quality_year;
        }
        if let Some(p) = o.pollutant {
            self.pollutant = p;
        }
        if let Some(t) = o.timeout_secs {
            self.timeout_secs = t;
        }
        if let Some(i) = o.indent {
            self.indent = i;
        }
    }

    /// Checks shared by every pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.input_path.is_none() {
            bail!("no input path configured (use --input or `input_path`)");
        }
        if self.start_year > self.end_year {
            bail!(
                "start_year {} is after end_year {}",
                self.start_year,
                self.end_year
            );
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }
        if self.pollutant.trim().is_empty() {
            bail!("pollutant must not be empty");
        }
        Ok(())
    }

    pub fn input(&self) -> Result<&Path> {
        self.input_path
            .as_deref()
            .context("no input path configured")
    }

    /// Output path, falling back to the input path for in-place runs.
    pub fn output(&self) -> Result<&Path> {
        match self.output_path.as_deref() {
            Some(p) => Ok(p),
            None => self.input(),
        }
    }

    /// The air-quality credential; required only by that pipeline.
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => bail!("air-quality pipeline needs an API key (--api-key or OPENWEATHER_API_KEY)"),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn air_quality_year(&self) -> i32 {
        self.air_quality_year.unwrap_or(self.end_year)
    }

    pub fn years(&self) -> PeriodSet {
        PeriodSet::years(self.start_year, self.end_year)
    }
}
