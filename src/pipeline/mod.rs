// src/pipeline/mod.rs

//! Generic fetch → normalise → merge pass over a record store.
//!
//! An [`Enricher`] knows how to find a record's lookup key, fetch raw data for
//! it and fold the result back into the record. [`enrich_all`] drives one
//! enricher over every record, strictly one request at a time, and [`run`]
//! wraps that with loading and persisting the store.

pub mod air_quality;
pub mod country;
pub mod indicator;

pub use air_quality::AirQualityEnricher;
pub use country::CountryEnricher;
pub use indicator::IndicatorEnricher;

use anyhow::{Context, Result};
use std::fmt;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::FetchError;
use crate::merge::MergeReport;
use crate::store::{Record, RecordStore};

pub trait Enricher {
    /// What the provider is queried by (country code, coordinates).
    type Key: fmt::Display;
    /// Provider payload before normalisation.
    type Raw;

    fn name(&self) -> &str;

    /// `None` when the record lacks what the provider needs.
    fn key(&self, record: &Record) -> Option<Self::Key>;

    /// Exactly one blocking request.
    fn fetch(&self, key: &Self::Key) -> Result<Self::Raw, FetchError>;

    /// Normalise `raw` and merge it into `record`.
    fn apply(&self, record: &mut Record, raw: Self::Raw) -> MergeReport;

    /// Called for records without a key. Default leaves the record untouched.
    fn apply_missing(&self, _record: &mut Record) {}
}

/// A record whose fetch failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub index: usize,
    pub key: String,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub total: usize,
    pub enriched: usize,
    pub skipped: usize,
    pub failed: Vec<Failure>,
    pub periods_written: usize,
    pub periods_skipped: usize,
}

/// How a run ended, so "ran but changed nothing" is not reported as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Enriched(usize),
    NothingToDo,
    NoEnrichments,
}

impl RunReport {
    pub fn outcome(&self) -> Outcome {
        if self.total == 0 {
            Outcome::NothingToDo
        } else if self.enriched == 0 {
            Outcome::NoEnrichments
        } else {
            Outcome::Enriched(self.enriched)
        }
    }
}

/// Run `enricher` over every record in order. Fetch errors are logged and
/// recorded; the failing record is left as it was.
pub fn enrich_all<E: Enricher>(store: &mut RecordStore, enricher: &E) -> RunReport {
    let mut report = RunReport {
        total: store.len(),
        ..RunReport::default()
    };

    for (index, record) in store.iter_mut().enumerate() {
        let name = record.name().unwrap_or("<unnamed>").to_string();

        let key = match enricher.key(record) {
            Some(key) => key,
            None => {
                warn!(
                    enricher = enricher.name(),
                    index,
                    record = %name,
                    "record has no lookup key; skipping"
                );
                enricher.apply_missing(record);
                report.skipped += 1;
                continue;
            }
        };

        match enricher.fetch(&key) {
            Ok(raw) => {
                let merged = enricher.apply(record, raw);
                report.enriched += 1;
                report.periods_written += merged.written;
                report.periods_skipped += merged.skipped;
                info!(
                    enricher = enricher.name(),
                    record = %name,
                    key = %key,
                    written = merged.written,
                    skipped = merged.skipped,
                    "enriched"
                );
            }
            Err(e) => {
                warn!(
                    enricher = enricher.name(),
                    record = %name,
                    key = %key,
                    kind = e.kind(),
                    error = %e,
                    "fetch failed; record left unchanged"
                );
                report.failed.push(Failure {
                    index,
                    key: key.to_string(),
                    kind: e.kind(),
                    message: e.to_string(),
                });
            }
        }
    }

    report
}

/// Load the configured input, enrich it and write it to the configured output.
/// The store is written even when some or all records failed.
pub fn run<E: Enricher>(config: &Config, enricher: &E) -> Result<RunReport> {
    run_keeping(config, enricher).map(|(_, report)| report)
}

/// [`run`], handing back the enriched store for follow-up outputs.
pub fn run_keeping<E: Enricher>(config: &Config, enricher: &E) -> Result<(RecordStore, RunReport)> {
    let input = config.input()?;
    let output = config.output()?;

    let mut store = RecordStore::load(input)
        .with_context(|| format!("loading records from {}", input.display()))?;
    info!(
        enricher = enricher.name(),
        records = store.len(),
        input = %input.display(),
        "loaded records"
    );

    let report = enrich_all(&mut store, enricher);

    store
        .save(output, config.indent)
        .with_context(|| format!("writing records to {}", output.display()))?;
    info!(
        enricher = enricher.name(),
        output = %output.display(),
        enriched = report.enriched,
        skipped = report.skipped,
        failed = report.failed.len(),
        "saved records"
    );

    Ok((store, report))
}
