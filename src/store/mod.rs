//! Postgres-over-REST access to the hosted videos table.

#[cfg(test)]
pub(crate) mod memory;
pub mod query;
pub mod types;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::{ApiKey, Config};
use query::Query;
use types::{ApiError, Rows};

const REST_PATH: &str = "rest/v1";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Requested range not satisfiable")]
    RangeNotSatisfiable,

    #[error("Store error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid store URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected row shape: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Row source for the video catalog.
/// Implemented by `PostgrestClient` for production; an in-memory store is used in tests.
pub trait VideoStore {
    async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<Rows<T>, StoreError>;
}

/// HTTP client for the PostgREST endpoint of the BaaS project.
///
/// Requests carry the anon key as `apikey`; `Authorization` uses the signed-in
/// user's access token when one is attached, else the anon key.
#[derive(Clone, Debug)]
pub struct PostgrestClient {
    http: Client,
    base_url: Url,
    anon_key: ApiKey,
    access_token: Option<ApiKey>,
}

impl PostgrestClient {
    pub fn new(http: Client, config: &Config) -> Self {
        Self {
            http,
            base_url: config.project_url.clone(),
            anon_key: config.anon_key.clone(),
            access_token: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: Url::parse(base_url).expect("test base url"),
            anon_key: ApiKey::new("test-anon-key"),
            access_token: None,
        }
    }

    /// Scope subsequent requests to a user session.
    pub fn with_access_token(mut self, token: &str) -> Self {
        self.access_token = Some(ApiKey::new(token));
        self
    }

    fn table_url(&self, query: &Query) -> Result<Url, StoreError> {
        let mut url = self
            .base_url
            .join(&format!("{REST_PATH}/{}", query.table))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.to_params() {
                pairs.append_pair(&key, &value);
            }
        }
        Ok(url)
    }
}

impl VideoStore for PostgrestClient {
    async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<Rows<T>, StoreError> {
        let url = self.table_url(query)?;
        let bearer = self.access_token.as_ref().unwrap_or(&self.anon_key);

        let mut req = self
            .http
            .get(url)
            .header("apikey", self.anon_key.expose())
            .header("Authorization", format!("Bearer {}", bearer.expose()))
            .header("Accept", "application/json")
            .header("User-Agent", crate::USER_AGENT);
        if query.count {
            req = req.header("Prefer", "count=exact");
        }

        let response = req.send().await?;
        let status = response.status();
        let count = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);

        match status {
            s if s.is_success() => {
                let body = response.text().await?;
                let data: Vec<T> = serde_json::from_str(&body)?;
                debug!(table = %query.table, rows = data.len(), ?count, "select complete");
                Ok(Rows { data, count })
            }
            StatusCode::RANGE_NOT_SATISFIABLE => match count {
                Some(total) => {
                    debug!(table = %query.table, total, "offset past end of results");
                    Ok(Rows {
                        data: Vec::new(),
                        count: Some(total),
                    })
                }
                None => Err(StoreError::RangeNotSatisfiable),
            },
            StatusCode::UNAUTHORIZED => {
                let message = extract_error_message(&response.text().await.unwrap_or_default());
                warn!(%message, "store rejected credentials");
                Err(StoreError::Unauthorized(message))
            }
            _ => {
                let message = extract_error_message(
                    &response
                        .text()
                        .await
                        .unwrap_or_else(|_| format!("HTTP {status}")),
                );
                Err(StoreError::Api {
                    code: status.as_u16(),
                    message,
                })
            }
        }
    }
}

/// Total from a `Content-Range` header: `0-19/45` and `*/45` give 45, `0-19/*` gives `None`.
fn parse_content_range_total(header: &str) -> Option<usize> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

fn extract_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(err) if err.message.is_some() => {
            let mut message = err.message.unwrap_or_default();
            if let Some(code) = err.code {
                message = format!("{message} [{code}]");
            }
            if let Some(details) = err.details.filter(|d| !d.is_empty()) {
                message.push_str(&format!(" ({details})"));
            }
            if let Some(hint) = err.hint.filter(|h| !h.is_empty()) {
                message.push_str(&format!(" hint: {hint}"));
            }
            message
        }
        _ => body.chars().take(200).collect(),
    }
}
