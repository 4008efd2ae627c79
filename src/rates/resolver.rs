use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::lookup::UsdRateLookup;
use super::models::{Bid, RateRecord, UsdBid};
use super::provider::RateProvider;
use super::store::StoreError;

/// Conversion is all-or-nothing: one unresolved USD leg fails the whole
/// batch.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("no USD rate available for {symbol} on {date}")]
    Unresolved { date: NaiveDate, symbol: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn resolved_rate(
    resolved: &HashMap<(NaiveDate, &str), Option<f64>>,
    date: NaiveDate,
    symbol: &str,
) -> Result<f64, ConvertError> {
    resolved
        .get(&(date, symbol))
        .copied()
        .flatten()
        .ok_or_else(|| ConvertError::Unresolved {
            date,
            symbol: symbol.to_string(),
        })
}

/// Decompose bids into their USD legs, deduplicated in first-seen order.
/// Identity bids contribute no legs.
fn usd_bid_set(bids: &[Bid]) -> Vec<UsdBid> {
    let mut seen = HashSet::new();
    let mut legs = Vec::new();
    for bid in bids.iter().filter(|bid| !bid.is_identity()) {
        for symbol in [&bid.base, &bid.quote] {
            let leg = UsdBid::new(bid.date, symbol);
            if seen.insert(leg.clone()) {
                legs.push(leg);
            }
        }
    }
    legs
}

/// Resolves cross rates against the store, falling back to the provider for
/// misses and writing fresh rates back.
///
/// The converter exclusively owns its store connection and provider for the
/// life of the resolution session; dropping it releases the store.
pub struct CurrencyConverter {
    lookup: UsdRateLookup,
    provider: RateProvider,
}

impl CurrencyConverter {
    pub fn new(lookup: UsdRateLookup, provider: RateProvider) -> Self {
        Self { lookup, provider }
    }

    /// Open the store at `path` (which must exist) and wrap it with the
    /// given provider.
    pub fn open(path: &Path, provider: RateProvider) -> Result<Self, StoreError> {
        Ok(Self::new(UsdRateLookup::open(path)?, provider))
    }

    /// Resolve the cross rate for every bid, in input order.
    ///
    /// Each non-identity bid needs both its USD legs; legs shared between
    /// bids are looked up once. Store misses are fetched from the provider
    /// and written back so subsequent calls hit the store. A write-back
    /// failure is logged and does not fail the conversion; an unresolved
    /// leg fails the entire call.
    pub async fn convert(&mut self, bids: &[Bid]) -> Result<Vec<f64>, ConvertError> {
        let usd_bids = usd_bid_set(bids);
        let mut rates = self.lookup.get_rates(&usd_bids)?;

        let missing: Vec<usize> = rates
            .iter()
            .enumerate()
            .filter_map(|(index, rate)| rate.is_none().then_some(index))
            .collect();

        if !missing.is_empty() {
            let wanted: Vec<UsdBid> = missing.iter().map(|&index| usd_bids[index].clone()).collect();
            debug!(misses = wanted.len(), "fetching store misses from provider");

            if let Some(fetched) = self.provider.rates(&wanted).await {
                for (position, &index) in missing.iter().enumerate() {
                    rates[index] = fetched[position];
                }
            }

            let records: Vec<RateRecord> = missing
                .iter()
                .filter_map(|&index| {
                    rates[index].map(|rate| {
                        RateRecord::new(usd_bids[index].date, usd_bids[index].symbol.clone(), rate)
                    })
                })
                .collect();
            if !records.is_empty() {
                if let Err(error) = self.lookup.put_rates(records) {
                    warn!(error = %error, "failed to persist freshly fetched rates");
                }
            }
        }

        let resolved: HashMap<(NaiveDate, &str), Option<f64>> = usd_bids
            .iter()
            .zip(&rates)
            .map(|(leg, rate)| ((leg.date, leg.symbol.as_str()), *rate))
            .collect();

        bids.iter()
            .map(|bid| {
                if bid.is_identity() {
                    return Ok(1.0);
                }
                let base = resolved_rate(&resolved, bid.date, &bid.base)?;
                let quote = resolved_rate(&resolved, bid.date, &bid.quote)?;
                Ok(quote / base)
            })
            .collect()
    }

    /// The interface consumed by reporting layers: convert each total from
    /// its own currency into `target_currency` on its own date.
    pub async fn convert_totals(
        &mut self,
        dates: &[NaiveDate],
        currencies: &[String],
        totals: &[f64],
        target_currency: &str,
    ) -> Result<Vec<f64>, ConvertError> {
        let bids: Vec<Bid> = dates
            .iter()
            .zip(currencies)
            .map(|(&date, currency)| Bid::new(date, target_currency, currency))
            .collect();
        let rates = self.convert(&bids).await?;
        Ok(totals
            .iter()
            .zip(&rates)
            .map(|(total, rate)| total / rate)
            .collect())
    }
}
