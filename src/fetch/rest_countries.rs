// src/fetch/rest_countries.rs

use anyhow::Result;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use super::{decode, endpoint, get_json, is_well_formed_code, parse_base, redacted};
use crate::error::FetchError;

pub const DEFAULT_BASE_URL: &str = "https://restcountries.com";

/// Names and identifiers for one country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryInfo {
    pub common_name: String,
    pub official_name: Option<String>,
    /// ISO 3166-1 alpha-3.
    pub cca3: Option<String>,
}

#[derive(Deserialize)]
struct RawCountry {
    name: RawName,
    #[serde(default)]
    cca3: Option<String>,
}

#[derive(Deserialize)]
struct RawName {
    common: String,
    #[serde(default)]
    official: Option<String>,
}

pub struct RestCountriesClient {
    client: Client,
    base: Url,
}

impl RestCountriesClient {
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            base: parse_base(base_url)?,
        })
    }

    /// Look a country up by its 2- or 3-letter code.
    #[instrument(level = "debug", skip(self))]
    pub fn lookup(&self, code: &str) -> Result<CountryInfo, FetchError> {
        if !is_well_formed_code(code) {
            debug!(code, "code is not 2-3 letters; passing it through");
        }
        let url = endpoint(&self.base, &["v3.1", "alpha", code]);
        let doc = get_json(&self.client, &url)?;

        // `/alpha/{code}` answers with a one-element array; older mirrors
        // return the object itself.
        let first = match doc {
            Value::Array(items) => items
                .into_iter()
                .next()
                .ok_or_else(|| FetchError::shape(&redacted(&url), "empty country list"))?,
            obj @ Value::Object(_) => obj,
            _ => {
                return Err(FetchError::shape(
                    &redacted(&url),
                    "expected a country object or array",
                ))
            }
        };

        let raw: RawCountry = decode(&url, first)?;
        Ok(CountryInfo {
            common_name: raw.name.common,
            official_name: raw.name.official,
            cca3: raw.cca3.filter(|c| !c.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::build_client;
    use crate::fetch::test_support::blocking;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lookup(base: String, code: &'static str) -> impl FnOnce() -> Result<CountryInfo, FetchError> {
        move || {
            RestCountriesClient::new(build_client(Duration::from_secs(5)).unwrap(), &base)
                .unwrap()
                .lookup(code)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn array_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3.1/alpha/KR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "name": { "common": "South Korea", "official": "Republic of Korea" },
                "cca2": "KR",
                "cca3": "KOR"
            }])))
            .mount(&server)
            .await;

        let info = blocking(lookup(server.uri(), "KR")).await.unwrap();
        assert_eq!(
            info,
            CountryInfo {
                common_name: "South Korea".into(),
                official_name: Some("Republic of Korea".into()),
                cca3: Some("KOR".into()),
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn object_body_and_missing_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3.1/alpha/XK"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "name": { "common": "Kosovo" } })),
            )
            .mount(&server)
            .await;

        let info = blocking(lookup(server.uri(), "XK")).await.unwrap();
        assert_eq!(info.common_name, "Kosovo");
        assert_eq!(info.cca3, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_code_and_bad_shapes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3.1/alpha/ZZ"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "status": 404, "message": "Not Found" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3.1/alpha/QQ"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3.1/alpha/NN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "cca3": "NNN" }])))
            .mount(&server)
            .await;

        let missing = blocking(lookup(server.uri(), "ZZ")).await.unwrap_err();
        assert!(matches!(missing, FetchError::HttpStatus { status: 404, .. }));

        let empty = blocking(lookup(server.uri(), "QQ")).await.unwrap_err();
        assert_eq!(empty.kind(), "ShapeError");

        let nameless = blocking(lookup(server.uri(), "NN")).await.unwrap_err();
        assert_eq!(nameless.kind(), "ShapeError");
    }
}
