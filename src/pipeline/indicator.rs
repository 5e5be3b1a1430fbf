// src/pipeline/indicator.rs

use super::Enricher;
use crate::error::FetchError;
use crate::fetch::world_bank::{Indicator, Observation, WorldBankClient};
use crate::merge::{merge, MergeReport, MergeTarget};
use crate::normalize::{yearly, PeriodSet};
use crate::store::Record;

/// One World Bank indicator over a year range, written as a top-level
/// `{ year: value }` mapping keyed by the indicator name.
pub struct IndicatorEnricher {
    client: WorldBankClient,
    indicator: Indicator,
    id_field: String,
    start_year: i32,
    end_year: i32,
    periods: PeriodSet,
    target: MergeTarget,
}

impl IndicatorEnricher {
    /// `id_field` names the record field holding the country code (`code` in
    /// the city store, `country` in the economy store).
    pub fn new(
        client: WorldBankClient,
        indicator: Indicator,
        id_field: &str,
        start_year: i32,
        end_year: i32,
    ) -> Self {
        Self {
            client,
            indicator,
            id_field: id_field.to_string(),
            start_year,
            end_year,
            periods: PeriodSet::years(start_year, end_year),
            target: MergeTarget::top_level(indicator.record_key()),
        }
    }
}

impl Enricher for IndicatorEnricher {
    type Key = String;
    type Raw = Vec<Observation>;

    fn name(&self) -> &str {
        self.indicator.record_key()
    }

    fn key(&self, record: &Record) -> Option<String> {
        record.identifier(&self.id_field).map(str::to_string)
    }

    fn fetch(&self, key: &String) -> Result<Vec<Observation>, FetchError> {
        self.client
            .indicator(key, self.indicator, self.start_year, self.end_year)
    }

    fn apply(&self, record: &mut Record, raw: Vec<Observation>) -> MergeReport {
        let series = yearly(&raw, &self.periods, self.indicator.rounding());
        merge(record, &series, &self.target)
    }
}
