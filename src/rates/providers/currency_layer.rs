//! currencylayer historical USD rates.
//!
//! One GET per `(date, account)` against the historical endpoint,
//! authenticated with an `access_key` query parameter. Quotes come back
//! keyed as `USDEUR`, `USDGBP`, ... with the source currency prefixed; the
//! prefix is stripped before the map is returned. Failures carry
//! `success: false` and a nested error object.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use crate::credentials::Credential;
use crate::rates::client::ApiClient;
use crate::rates::models::USD;
use crate::rates::provider::RateApi;

const CURRENCY_LAYER_BASE_URL: &str = "https://api.currencylayer.com";

#[derive(Debug, Deserialize)]
struct VendorError {
    info: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoricalResponse {
    success: bool,
    source: Option<String>,
    quotes: Option<HashMap<String, f64>>,
    error: Option<VendorError>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    success: bool,
    currencies: Option<HashMap<String, String>>,
    error: Option<VendorError>,
}

pub struct CurrencyLayerApi {
    client: ApiClient,
    base_url: String,
}

impl CurrencyLayerApi {
    pub fn new(read_retries: u32) -> Self {
        Self {
            client: ApiClient::new(read_retries),
            base_url: CURRENCY_LAYER_BASE_URL.to_string(),
        }
    }

    /// Point the integration at a different server (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn parse_historical(response: HistoricalResponse) -> Option<HashMap<String, f64>> {
        if !response.success {
            let info = response
                .error
                .and_then(|error| error.info)
                .unwrap_or_else(|| "unknown".to_string());
            warn!(info, "currencylayer rejected the request");
            return None;
        }
        let source = response.source?;
        if source != USD {
            warn!(source, "currencylayer response not pivoted on USD");
            return None;
        }
        let quotes = response.quotes?;
        Some(
            quotes
                .into_iter()
                .filter_map(|(pair, rate)| {
                    pair.strip_prefix(&source)
                        .map(|symbol| (symbol.to_string(), rate))
                })
                .collect(),
        )
    }

    fn parse_list(response: ListResponse) -> Option<Vec<String>> {
        if !response.success {
            let info = response
                .error
                .and_then(|error| error.info)
                .unwrap_or_else(|| "unknown".to_string());
            warn!(info, "currencylayer rejected the currency listing request");
            return None;
        }
        Some(response.currencies?.into_keys().collect())
    }
}

#[async_trait::async_trait]
impl RateApi for CurrencyLayerApi {
    async fn historical(
        &self,
        credential: &Credential,
        date: NaiveDate,
        symbols: &[String],
    ) -> Option<HashMap<String, f64>> {
        let url = format!("{}/historical", self.base_url);
        let query = [
            ("access_key", credential.app_id().to_string()),
            ("date", date.to_string()),
            ("source", USD.to_string()),
            ("currencies", symbols.join(",")),
        ];
        match self.client.get_json::<HistoricalResponse>(&url, &query).await {
            Ok(response) => Self::parse_historical(response),
            Err(error) => {
                warn!(error = %error, "currencylayer historical fetch failed");
                None
            }
        }
    }

    async fn currencies(&self, credential: &Credential) -> Option<Vec<String>> {
        let url = format!("{}/list", self.base_url);
        let query = [("access_key", credential.app_id().to_string())];
        match self.client.get_json::<ListResponse>(&url, &query).await {
            Ok(response) => Self::parse_list(response),
            Err(error) => {
                warn!(error = %error, "currencylayer currency listing failed");
                None
            }
        }
    }

    fn name(&self) -> &str {
        "currencylayer"
    }
}
