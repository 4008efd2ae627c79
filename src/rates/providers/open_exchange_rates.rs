//! Open Exchange Rates historical USD rates.
//!
//! One GET per `(date, account)` against the historical endpoint,
//! authenticated with an `app_id` query parameter. Responses are always
//! pivoted on USD; the error envelope carries `error: true` plus a
//! description.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use crate::credentials::Credential;
use crate::rates::client::ApiClient;
use crate::rates::models::USD;
use crate::rates::provider::RateApi;

const OPEN_EXCHANGE_RATES_BASE_URL: &str = "https://openexchangerates.org/api";

/// Historical-rates envelope. Success carries `base` + `rates`; errors carry
/// `error: true` + `description`.
#[derive(Debug, Deserialize)]
struct HistoricalResponse {
    #[serde(default)]
    error: bool,
    description: Option<String>,
    base: Option<String>,
    rates: Option<HashMap<String, f64>>,
}

pub struct OpenExchangeRatesApi {
    client: ApiClient,
    base_url: String,
}

impl OpenExchangeRatesApi {
    pub fn new(read_retries: u32) -> Self {
        Self {
            client: ApiClient::new(read_retries),
            base_url: OPEN_EXCHANGE_RATES_BASE_URL.to_string(),
        }
    }

    /// Point the integration at a different server (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn parse_historical(response: HistoricalResponse) -> Option<HashMap<String, f64>> {
        if response.error {
            warn!(
                description = response.description.as_deref().unwrap_or("unknown"),
                "openexchangerates rejected the request"
            );
            return None;
        }
        if response.base.as_deref() != Some(USD) {
            warn!(base = ?response.base, "openexchangerates response not pivoted on USD");
            return None;
        }
        response.rates
    }

    fn parse_currencies(value: serde_json::Value) -> Option<Vec<String>> {
        let object = value.as_object()?;
        if object.contains_key("error") {
            warn!("openexchangerates rejected the currency listing request");
            return None;
        }
        Some(object.keys().cloned().collect())
    }
}

#[async_trait::async_trait]
impl RateApi for OpenExchangeRatesApi {
    async fn historical(
        &self,
        credential: &Credential,
        date: NaiveDate,
        symbols: &[String],
    ) -> Option<HashMap<String, f64>> {
        let url = format!("{}/historical/{date}.json", self.base_url);
        let query = [
            ("app_id", credential.app_id().to_string()),
            ("base", USD.to_string()),
            ("symbols", symbols.join(",")),
        ];
        match self.client.get_json::<HistoricalResponse>(&url, &query).await {
            Ok(response) => Self::parse_historical(response),
            Err(error) => {
                warn!(error = %error, "openexchangerates historical fetch failed");
                None
            }
        }
    }

    async fn currencies(&self, _credential: &Credential) -> Option<Vec<String>> {
        // The currency catalog is a public endpoint; no app id required.
        let url = format!("{}/currencies.json", self.base_url);
        match self.client.get_json::<serde_json::Value>(&url, &[]).await {
            Ok(value) => Self::parse_currencies(value),
            Err(error) => {
                warn!(error = %error, "openexchangerates currency listing failed");
                None
            }
        }
    }

    fn name(&self) -> &str {
        "openexchangerates"
    }
}
