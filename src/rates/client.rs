use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Statuses retried at the transport level.
const RETRY_STATUSES: [u16; 3] = [500, 502, 504];

/// First backoff step; doubles per retry.
const BACKOFF_BASE_MS: u64 = 300;

/// A request that could not produce a decodable body. Providers record this
/// as an account failure; it carries no vendor-specific meaning.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("GET {url} failed after {attempts} attempts")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("failed to decode response body from {url}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// HTTP client shared by a provider's endpoints: retried GETs with
/// exponential backoff on connection/read errors and retryable statuses.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    read_retries: u32,
}

impl ApiClient {
    pub fn new(read_retries: u32) -> Self {
        Self {
            http: Client::new(),
            read_retries,
        }
    }

    /// Perform a GET and decode the JSON body. Bodies of non-retryable error
    /// statuses are still decoded: vendor error envelopes ride on 4xx.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let attempts = self.read_retries.saturating_add(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = Duration::from_millis(BACKOFF_BASE_MS << (attempt - 1));
                tokio::time::sleep(backoff).await;
            }
            debug!(url, attempt, "fetching");

            match self.http.get(url).query(query).send().await {
                Ok(response) if RETRY_STATUSES.contains(&response.status().as_u16()) => {
                    warn!(url, status = %response.status(), "retryable status");
                    last_error = None;
                }
                Ok(response) => {
                    return response.json::<T>().await.map_err(|source| FetchError::Decode {
                        url: url.to_string(),
                        source,
                    });
                }
                Err(source) => {
                    warn!(url, error = %source, "request failed");
                    last_error = Some(source);
                }
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts,
            source: last_error,
        })
    }
}
