//! Typed access to the statistics/prediction API.
//!
//! Read endpoints return collections whose JSON shape has drifted over time, so every
//! collection goes through [`ResponseShape`] before records are decoded.

use std::io::Read;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::config::{AppConfig, normalize_base_url};
use crate::http_client::http_client;

/// Characters of a failed read response kept for diagnostics.
pub const ERROR_BODY_PREVIEW_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request cancelled")]
    Cancelled,
    #[error("request to {path} failed: {source}")]
    Network {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} ({path})")]
    HttpStatus {
        status: u16,
        path: String,
        body: String,
    },
    #[error("invalid JSON from {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    /// Text shown to the user: the server's own body when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::HttpStatus { body, .. } if !body.trim().is_empty() => body.clone(),
            ApiError::HttpStatus { status, .. } => format!("HTTP {status}"),
            other => other.to_string(),
        }
    }
}

/// The response layouts a collection endpoint is known to produce.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// `[a, b, ...]`
    Sequence(Vec<Value>),
    /// `{"items": [a, b, ...], ...}`
    Wrapped { key: String, items: Vec<Value> },
    /// `{"x": a, "y": b}`, values in insertion order.
    Keyed(Vec<Value>),
    Unrecognized,
}

impl ResponseShape {
    /// Precedence: sequence, then an array under one of `wrapper_keys` (in order), then
    /// the values of an object (an object under a wrapper key first), then nothing.
    pub fn classify(payload: Value, wrapper_keys: &[&str]) -> Self {
        match payload {
            Value::Array(items) => ResponseShape::Sequence(items),
            Value::Object(mut map) => {
                for key in wrapper_keys {
                    if matches!(map.get(*key), Some(Value::Array(_))) {
                        if let Some(Value::Array(items)) = map.remove(*key) {
                            return ResponseShape::Wrapped {
                                key: (*key).to_string(),
                                items,
                            };
                        }
                    }
                }
                for key in wrapper_keys {
                    if matches!(map.get(*key), Some(Value::Object(_))) {
                        if let Some(Value::Object(inner)) = map.remove(*key) {
                            return ResponseShape::Keyed(inner.into_iter().map(|(_, v)| v).collect());
                        }
                    }
                }
                ResponseShape::Keyed(map.into_iter().map(|(_, v)| v).collect())
            }
            _ => ResponseShape::Unrecognized,
        }
    }

    pub fn into_items(self) -> Vec<Value> {
        match self {
            ResponseShape::Sequence(items)
            | ResponseShape::Wrapped { items, .. }
            | ResponseShape::Keyed(items) => items,
            ResponseShape::Unrecognized => Vec::new(),
        }
    }
}

/// `items` first, then the collection named by the last path segment (`/teams` -> `teams`).
pub fn wrapper_keys(path: &str) -> Vec<&str> {
    let mut keys = vec!["items"];
    let name = path
        .trim_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    if !name.is_empty() && name != "items" {
        keys.push(name);
    }
    keys
}

pub fn normalize_collection(payload: Value, path: &str) -> Vec<Value> {
    ResponseShape::classify(payload, &wrapper_keys(path)).into_items()
}

/// Decodes each item independently; items that do not fit `T` are dropped.
pub fn decode_items<T: DeserializeOwned>(items: Vec<Value>) -> Vec<T> {
    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if decoded.len() < total {
        debug!(
            skipped = total - decoded.len(),
            total, "dropped collection items with an unexpected layout"
        );
    }
    decoded
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: &str, client: Client) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            client,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self::new(&cfg.api_url, http_client()?.clone()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn fetch_collection(
        &self,
        path: &str,
        query: &[(&str, &str)],
        token: &CancelToken,
    ) -> Result<Vec<Value>, ApiError> {
        let request = self.client.get(self.url(path)).query(query);
        let resp = self.send(request, path, token)?;
        let resp = ensure_success(resp, path, Some(ERROR_BODY_PREVIEW_CHARS))?;
        let payload = read_json(resp, path, token)?;
        Ok(normalize_collection(payload, path))
    }

    pub fn fetch_records<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        token: &CancelToken,
    ) -> Result<Vec<T>, ApiError> {
        Ok(decode_items(self.fetch_collection(path, query, token)?))
    }

    pub fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        token: &CancelToken,
    ) -> Result<T, ApiError> {
        let request = self.client.post(self.url(path)).json(body);
        let resp = self.send(request, path, token)?;
        let resp = ensure_success(resp, path, None)?;
        let payload = read_json(resp, path, token)?;
        serde_json::from_value(payload).map_err(|source| ApiError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn health(&self, token: &CancelToken) -> Result<bool, ApiError> {
        let path = "/health";
        let resp = self.send(self.client.get(self.url(path)), path, token)?;
        let resp = ensure_success(resp, path, Some(ERROR_BODY_PREVIEW_CHARS))?;
        let payload = read_json(resp, path, token)?;
        let health: HealthResponse =
            serde_json::from_value(payload).map_err(|source| ApiError::Parse {
                path: path.to_string(),
                source,
            })?;
        Ok(health.status.eq_ignore_ascii_case("ok"))
    }

    fn send(
        &self,
        request: RequestBuilder,
        path: &str,
        token: &CancelToken,
    ) -> Result<Response, ApiError> {
        if token.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        debug!(path, token = token.id(), "dispatching request");
        let result = request.header(CACHE_CONTROL, "no-store").send();
        // The transport may have finished after cancellation; drop the response unread.
        if token.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        result.map_err(|source| ApiError::Network {
            path: path.to_string(),
            source,
        })
    }
}

fn ensure_success(
    resp: Response,
    path: &str,
    preview_chars: Option<usize>,
) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = read_error_body(resp, preview_chars);
    warn!(status = status.as_u16(), path, body = %body, "non-success response");
    Err(ApiError::HttpStatus {
        status: status.as_u16(),
        path: path.to_string(),
        body,
    })
}

fn read_error_body(resp: Response, preview_chars: Option<usize>) -> String {
    match preview_chars {
        Some(limit) => {
            // UTF-8 needs at most four bytes per char.
            let mut buf = Vec::new();
            let _ = resp.take((limit as u64) * 4).read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).chars().take(limit).collect()
        }
        None => resp.text().unwrap_or_default(),
    }
}

fn read_json(resp: Response, path: &str, token: &CancelToken) -> Result<Value, ApiError> {
    let bytes = resp.bytes().map_err(|source| ApiError::Network {
        path: path.to_string(),
        source,
    })?;
    if token.is_cancelled() {
        return Err(ApiError::Cancelled);
    }
    parse_json_body(&bytes, path)
}

/// Blank and `null` bodies parse to `Value::Null`.
pub fn parse_json_body(bytes: &[u8], path: &str) -> Result<Value, ApiError> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Value::Null);
    }
    serde_json::from_str(trimmed).map_err(|source| ApiError::Parse {
        path: path.to_string(),
        source,
    })
}
