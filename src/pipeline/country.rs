// src/pipeline/country.rs

use serde_json::json;

use super::Enricher;
use crate::error::FetchError;
use crate::fetch::rest_countries::{CountryInfo, RestCountriesClient};
use crate::merge::{set_field, MergeReport};
use crate::store::Record;

/// Written to `iso3` when no alpha-3 code can be attached.
pub const UNKNOWN_ISO3: &str = "Unknown";

/// Fills `country_name` and `iso3` from the country code.
pub struct CountryEnricher {
    client: RestCountriesClient,
    id_field: String,
}

impl CountryEnricher {
    pub fn new(client: RestCountriesClient, id_field: &str) -> Self {
        Self {
            client,
            id_field: id_field.to_string(),
        }
    }
}

impl Enricher for CountryEnricher {
    type Key = String;
    type Raw = CountryInfo;

    fn name(&self) -> &str {
        "country"
    }

    fn key(&self, record: &Record) -> Option<String> {
        record.identifier(&self.id_field).map(str::to_string)
    }

    fn fetch(&self, key: &String) -> Result<CountryInfo, FetchError> {
        self.client.lookup(key)
    }

    fn apply(&self, record: &mut Record, raw: CountryInfo) -> MergeReport {
        let iso3 = raw.cca3.unwrap_or_else(|| UNKNOWN_ISO3.to_string());
        set_field(record, "country_name", json!(raw.common_name));
        set_field(record, "iso3", json!(iso3));
        MergeReport {
            written: 2,
            skipped: 0,
        }
    }

    fn apply_missing(&self, record: &mut Record) {
        set_field(record, "iso3", json!(UNKNOWN_ISO3));
    }
}
