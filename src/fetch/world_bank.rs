// src/fetch/world_bank.rs

use anyhow::Result;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{decode, endpoint, get_json, is_well_formed_code, parse_base, redacted};
use crate::error::FetchError;
use crate::normalize::Rounding;

pub const DEFAULT_BASE_URL: &str = "https://api.worldbank.org";

/// Rows requested per call. Only the first page is read.
const PER_PAGE: u32 = 100;

/// World Bank indicators the pipelines know how to merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    GdpPerCapita,
    Population,
}

impl Indicator {
    /// World Bank indicator id.
    pub fn code(self) -> &'static str {
        match self {
            Indicator::GdpPerCapita => "NY.GDP.PCAP.CD",
            Indicator::Population => "SP.POP.TOTL",
        }
    }

    /// Top-level record key the series is merged under.
    pub fn record_key(self) -> &'static str {
        match self {
            Indicator::GdpPerCapita => "gdp_per_capita",
            Indicator::Population => "population",
        }
    }

    pub fn rounding(self) -> Rounding {
        match self {
            Indicator::GdpPerCapita => Rounding::OneDecimal,
            Indicator::Population => Rounding::Integer,
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.record_key())
    }
}

/// One `{date, value}` row of an indicator payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Observation {
    pub date: String,
    pub value: Option<f64>,
}

pub struct WorldBankClient {
    client: Client,
    base: Url,
}

impl WorldBankClient {
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            base: parse_base(base_url)?,
        })
    }

    fn indicator_url(&self, code: &str, indicator: Indicator, start: i32, end: i32) -> Url {
        let mut url = endpoint(
            &self.base,
            &["v2", "country", code, "indicator", indicator.code()],
        );
        url.query_pairs_mut()
            .append_pair("date", &format!("{}:{}", start, end))
            .append_pair("format", "json")
            .append_pair("per_page", &PER_PAGE.to_string());
        url
    }

    /// Yearly observations of `indicator` for `code` between `start` and
    /// `end` inclusive, in provider order.
    #[instrument(level = "debug", skip(self))]
    pub fn indicator(
        &self,
        code: &str,
        indicator: Indicator,
        start: i32,
        end: i32,
    ) -> Result<Vec<Observation>, FetchError> {
        if !is_well_formed_code(code) {
            debug!(code, "code is not 2-3 letters; passing it through");
        }
        let url = self.indicator_url(code, indicator, start, end);
        let doc = get_json(&self.client, &url)?;
        let observations = parse_envelope(&url, doc)?;
        debug!(rows = observations.len(), "indicator payload");
        Ok(observations)
    }
}

/// Unwrap `[metadata, payload]`. A lone `[{"message": [...]}]` is the
/// provider's error form; `payload: null` means no data for the query.
fn parse_envelope(url: &Url, doc: Value) -> Result<Vec<Observation>, FetchError> {
    let shown = redacted(url);
    let mut parts = match doc {
        Value::Array(parts) => parts,
        _ => return Err(FetchError::shape(&shown, "expected a JSON array envelope")),
    };

    if parts.len() == 1 {
        if let Some(msg) = provider_message(&parts[0]) {
            return Err(FetchError::shape(&shown, format!("provider message: {}", msg)));
        }
    }
    if parts.len() != 2 {
        return Err(FetchError::shape(
            &shown,
            format!("expected [metadata, payload], got {} element(s)", parts.len()),
        ));
    }

    let payload = parts.pop().unwrap_or(Value::Null);
    let meta = parts.pop().unwrap_or(Value::Null);
    if !meta.is_object() {
        return Err(FetchError::shape(&shown, "metadata is not an object"));
    }
    let pages = count(meta.get("pages")).unwrap_or(1);
    if pages > 1 {
        warn!(
            url = %shown,
            pages,
            total = count(meta.get("total")),
            "indicator spans several pages; only the first is used"
        );
    }

    match payload {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => decode(url, payload),
        _ => Err(FetchError::shape(&shown, "payload is neither an array nor null")),
    }
}

/// Paging fields arrive as numbers or numeric strings depending on endpoint.
fn count(v: Option<&Value>) -> Option<u64> {
    match v? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn provider_message(meta: &Value) -> Option<String> {
    let messages = meta.get("message")?.as_array()?;
    let text: Vec<&str> = messages
        .iter()
        .filter_map(|m| m.get("value").and_then(Value::as_str))
        .collect();
    Some(if text.is_empty() {
        "unspecified error".to_string()
    } else {
        text.join("; ")
    })
}
