// src/fetch/openweather.rs

use anyhow::Result;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};
use url::Url;

use super::{decode, endpoint, get_json, parse_base, redacted};
use crate::error::FetchError;
use crate::store::Coordinates;

pub const DEFAULT_BASE_URL: &str = "http://api.openweathermap.org";

/// One timestamped set of pollutant concentrations (μg/m³).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AirReading {
    /// Unix seconds, UTC.
    pub dt: i64,
    #[serde(default)]
    pub components: HashMap<String, f64>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    list: Vec<AirReading>,
}

/// Client for the OpenWeatherMap air-pollution history endpoint.
pub struct AirPollutionClient {
    client: Client,
    base: Url,
    api_key: String,
}

impl AirPollutionClient {
    pub fn new(client: Client, base_url: &str, api_key: &str) -> Result<Self> {
        Ok(Self {
            client,
            base: parse_base(base_url)?,
            api_key: api_key.to_string(),
        })
    }

    fn history_url(&self, coords: Coordinates, start: i64, end: i64) -> Url {
        let mut url = endpoint(&self.base, &["data", "2.5", "air_pollution", "history"]);
        url.query_pairs_mut()
            .append_pair("lat", &coords.lat.to_string())
            .append_pair("lon", &coords.lon.to_string())
            .append_pair("start", &start.to_string())
            .append_pair("end", &end.to_string())
            .append_pair("appid", &self.api_key);
        url
    }

    /// All readings between `start` and `end` (Unix seconds) at `coords`.
    #[instrument(level = "debug", skip(self))]
    pub fn history(
        &self,
        coords: Coordinates,
        start: i64,
        end: i64,
    ) -> Result<Vec<AirReading>, FetchError> {
        let url = self.history_url(coords, start, end);
        let doc = get_json(&self.client, &url)?;
        if doc.get("list").is_none() {
            return Err(FetchError::shape(
                &redacted(&url),
                "missing `list` of readings",
            ));
        }
        let resp: HistoryResponse = decode(&url, doc)?;
        debug!(readings = resp.list.len(), "air pollution history");
        Ok(resp.list)
    }
}
