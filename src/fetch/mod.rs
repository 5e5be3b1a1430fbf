// src/fetch/mod.rs

//! Blocking clients for the remote data providers.
//!
//! Each call issues exactly one GET and classifies failures into
//! [`FetchError`] variants so the pipeline can log and skip the record.

pub mod openweather;
pub mod rest_countries;
pub mod world_bank;

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::FetchError;

static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{2,3}$").expect("country code regex should compile"));

/// Longest error body kept in an [`FetchError::HttpStatus`].
const MAX_ERROR_BODY: usize = 200;

/// True for a 2- or 3-letter alphabetic country code.
pub fn is_well_formed_code(code: &str) -> bool {
    CODE_RE.is_match(code)
}

/// Shared blocking client. Every request is bounded by `timeout`.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(concat!("cityenrich/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .context("building HTTP client")
}

/// Parse a provider base URL, rejecting ones we cannot append a path to.
pub(crate) fn parse_base(base: &str) -> Result<Url> {
    let url = Url::parse(base).with_context(|| format!("parsing base URL {}", base))?;
    if url.cannot_be_a_base() {
        bail!("base URL {} cannot carry a path", base);
    }
    Ok(url)
}

/// `base` with `segments` appended as percent-encoded path segments.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// URL for logs and errors, with credentials masked.
pub(crate) fn redacted(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == "appid") {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "appid" {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    let mut shown = url.clone();
    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown.to_string()
}

/// GET `url` and parse the body as JSON.
pub(crate) fn get_json(client: &Client, url: &Url) -> Result<Value, FetchError> {
    let shown = redacted(url);
    debug!(url = %shown, "GET");

    let resp = client
        .get(url.clone())
        .send()
        .map_err(|source| FetchError::Network {
            url: shown.clone(),
            source: source.without_url(),
        })?;
    let status = resp.status();
    let body = resp.text().map_err(|source| FetchError::Network {
        url: shown.clone(),
        source: source.without_url(),
    })?;

    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            url: shown,
            status: status.as_u16(),
            body: truncate(body.trim(), MAX_ERROR_BODY),
        });
    }

    serde_json::from_str(&body).map_err(|source| FetchError::Parse { url: shown, source })
}

/// Decode a parsed body into `T`; a mismatch is a shape error, not a parse error.
pub(crate) fn decode<T: DeserializeOwned>(url: &Url, doc: Value) -> Result<T, FetchError> {
    serde_json::from_value(doc).map_err(|e| FetchError::shape(&redacted(url), e.to_string()))
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::blocking;
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn code_shape() {
        assert!(is_well_formed_code("KR"));
        assert!(is_well_formed_code("kor"));
        assert!(!is_well_formed_code("K"));
        assert!(!is_well_formed_code("KORE"));
        assert!(!is_well_formed_code("K1"));
        assert!(!is_well_formed_code(""));
    }

    #[test]
    fn endpoint_appends_and_encodes() {
        let base = parse_base("https://example.org/api/").unwrap();
        let url = endpoint(&base, &["v3.1", "alpha", "a b"]);
        assert_eq!(url.as_str(), "https://example.org/api/v3.1/alpha/a%20b");

        let bare = parse_base("https://example.org").unwrap();
        assert_eq!(endpoint(&bare, &["x"]).as_str(), "https://example.org/x");
    }

    #[test]
    fn base_must_accept_a_path() {
        assert!(parse_base("mailto:someone@example.org").is_err());
        assert!(parse_base("not a url").is_err());
    }

    #[test]
    fn appid_is_masked() {
        let url = Url::parse("http://h/p?lat=1&appid=secret&end=2").unwrap();
        let shown = redacted(&url);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("appid=***") || shown.contains("appid=%2A%2A%2A"));
        assert!(shown.contains("lat=1"));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let long = "x".repeat(500);
        assert_eq!(truncate(&long, 10).chars().count(), 11);
        assert_eq!(truncate("short", 10), "short");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn classifies_status_parse_and_network_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/boom"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"a": 1}"#))
            .mount(&server)
            .await;

        let base = server.uri();
        let (boom, html, ok, unreachable) = blocking(move || {
            let client = build_client(Duration::from_secs(5)).unwrap();
            let base = parse_base(&base).unwrap();
            let dead = Url::parse("http://127.0.0.1:9/").unwrap();
            (
                get_json(&client, &endpoint(&base, &["boom"])),
                get_json(&client, &endpoint(&base, &["html"])),
                get_json(&client, &endpoint(&base, &["ok"])),
                get_json(&client, &dead),
            )
        })
        .await;

        match boom.unwrap_err() {
            FetchError::HttpStatus { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "internal");
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
        assert_eq!(html.unwrap_err().kind(), "ParseError");
        assert_eq!(ok.unwrap()["a"], 1);
        assert_eq!(unreachable.unwrap_err().kind(), "NetworkError");
    }
}
