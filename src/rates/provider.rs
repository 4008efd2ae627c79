use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::credentials::Credential;

use super::account::Account;
use super::models::UsdBid;
use super::providers::{CurrencyLayerApi, OpenExchangeRatesApi};

/// A vendor integration: one historical-rates query per `(date, account)`
/// and a currency-catalog query, both parsed down to plain maps.
///
/// Implementations return `None` for anything that is not a usable
/// response: transport failure after client retry, an undecodable body, or
/// a vendor error envelope. Errors never cross this seam.
#[async_trait::async_trait]
pub trait RateApi: Send + Sync {
    /// USD-pivoted rates for one date, or `None` on failure. Symbols the
    /// vendor does not carry are simply absent from the map.
    async fn historical(
        &self,
        credential: &Credential,
        date: NaiveDate,
        symbols: &[String],
    ) -> Option<HashMap<String, f64>>;

    /// The vendor's currency catalog, or `None` on failure.
    async fn currencies(&self, credential: &Credential) -> Option<Vec<String>>;

    fn name(&self) -> &str;
}

/// The supported external rate services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    OpenExchangeRates,
    CurrencyLayer,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::OpenExchangeRates => "openexchangerates",
            ProviderName::CurrencyLayer => "currencylayer",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown rate provider {name:?}")]
pub struct UnknownProvider {
    name: String,
}

impl FromStr for ProviderName {
    type Err = UnknownProvider;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "openexchangerates" => Ok(ProviderName::OpenExchangeRates),
            "currencylayer" => Ok(ProviderName::CurrencyLayer),
            other => Err(UnknownProvider {
                name: other.to_string(),
            }),
        }
    }
}

/// A rate service holding an ordered list of accounts. All mutable state
/// lives in the accounts; the vendor integration behind [`RateApi`] is
/// stateless.
pub struct RateProvider {
    api: Box<dyn RateApi>,
    accounts: Vec<Account>,
    clock: Arc<dyn Clock>,
}

impl RateProvider {
    pub fn new(api: Box<dyn RateApi>, credentials: Vec<Credential>) -> Self {
        Self {
            api,
            accounts: credentials.into_iter().map(Account::new).collect(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Construct the vendor integration selected by name.
    pub fn build(name: ProviderName, credentials: Vec<Credential>, read_retries: u32) -> Self {
        let api: Box<dyn RateApi> = match name {
            ProviderName::OpenExchangeRates => Box::new(OpenExchangeRatesApi::new(read_retries)),
            ProviderName::CurrencyLayer => Box::new(CurrencyLayerApi::new(read_retries)),
        };
        Self::new(api, credentials)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        self.api.name()
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Resolve USD-pivoted rates for a batch of bids.
    ///
    /// Bids are grouped by date: one underlying request fetches all of a
    /// date's symbols against one account. Accounts are tried in configured
    /// order, skipping any with an open circuit; the first usable response
    /// wins. Returns `None` (total failure, not an error) when any date
    /// exhausts every account; symbols missing from a usable response come
    /// back as `None` entries.
    pub async fn rates(&mut self, bids: &[UsdBid]) -> Option<Vec<Option<f64>>> {
        let mut groups: BTreeMap<NaiveDate, BTreeSet<String>> = BTreeMap::new();
        for bid in bids {
            groups.entry(bid.date).or_default().insert(bid.symbol.clone());
        }

        let mut rates_by_date: HashMap<NaiveDate, HashMap<String, f64>> = HashMap::new();
        for (date, symbols) in &groups {
            let symbols: Vec<String> = symbols.iter().cloned().collect();
            let mut fetched = None;
            for account in &mut self.accounts {
                let now = self.clock.now();
                if account.is_open(now) {
                    debug!(provider = self.api.name(), "skipping account with open circuit");
                    continue;
                }
                let response = self.api.historical(account.credential(), *date, &symbols).await;
                match response {
                    Some(rates) => {
                        account.register_success(now);
                        fetched = Some(rates);
                        break;
                    }
                    None => account.register_failure(now),
                }
            }
            rates_by_date.insert(*date, fetched?);
        }

        Some(
            bids.iter()
                .map(|bid| {
                    rates_by_date
                        .get(&bid.date)
                        .and_then(|rates| rates.get(&bid.symbol))
                        .copied()
                })
                .collect(),
        )
    }

    /// The vendor's currency catalog, using the same account iteration as
    /// [`Self::rates`]. Empty on total failure.
    pub async fn symbols(&mut self) -> Vec<String> {
        for account in &mut self.accounts {
            let now = self.clock.now();
            if account.is_open(now) {
                continue;
            }
            let response = self.api.currencies(account.credential()).await;
            match response {
                Some(symbols) => {
                    account.register_success(now);
                    return symbols;
                }
                None => account.register_failure(now),
            }
        }
        Vec::new()
    }
}
