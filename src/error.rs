// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Failure while fetching one record's data from a remote provider.
///
/// These never abort a run: the pipeline logs them against the record and
/// moves on, leaving that record's indicator untouched.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or timeout failure before a response arrived.
    #[error("network error for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered with a non-2xx status.
    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    /// The body was not valid JSON.
    #[error("invalid JSON from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Valid JSON, but not in the shape the provider documents.
    #[error("unexpected response shape from {url}: {reason}")]
    Shape { url: String, reason: String },
}

impl FetchError {
    /// Short class name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network { .. } => "NetworkError",
            FetchError::HttpStatus { .. } => "HttpStatusError",
            FetchError::Parse { .. } => "ParseError",
            FetchError::Shape { .. } => "ShapeError",
        }
    }

    pub(crate) fn shape(url: &str, reason: impl Into<String>) -> Self {
        FetchError::Shape {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure reading or writing the record store. Always fatal to a run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} must contain a JSON array of records", .path.display())]
    NotAnArray { path: PathBuf },

    #[error("entry {index} in {} is not a JSON object", .path.display())]
    NotAnObject { path: PathBuf, index: usize },
}
