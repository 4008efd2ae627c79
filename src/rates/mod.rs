mod account;
mod client;
mod download;
mod lookup;
mod merge;
mod models;
mod provider;
pub mod providers;
mod resolver;
mod store;

pub use account::{Account, OPEN_AFTER_FAILURES};
pub use client::{ApiClient, FetchError};
pub use download::{
    download_rates, download_rates_with, DailyRates, DownloadError, DownloadOptions,
    DownloadSummary, FallbackReader,
};
pub use lookup::{UsdRateLookup, MEMO_CAPACITY};
pub use merge::{copy_rates, merge_stores};
pub use models::{Bid, RateRecord, TaskReport, UsdBid, USD};
pub use provider::{ProviderName, RateApi, RateProvider, UnknownProvider};
pub use resolver::{ConvertError, CurrencyConverter};
pub use store::{create_store, delete_store, setup_store, RateStore, StoreError};
