use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::credentials::Credential;

use super::merge;
use super::models::{RateRecord, TaskReport, UsdBid};
use super::provider::{ProviderName, RateProvider};
use super::store::{create_store, RateStore, StoreError};

/// Precondition violations and fatal failures of a backfill run. Per-day
/// trouble never surfaces here; it becomes a failure [`TaskReport`].
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("target rate store {} does not exist", path.display())]
    MissingTarget { path: PathBuf },

    #[error("begin date {begin} is after end date {end}")]
    InvalidDateRange { begin: NaiveDate, end: NaiveDate },

    #[error("end date {end} is after today {today}")]
    EndDateInFuture { end: NaiveDate, today: NaiveDate },

    #[error("batch size must be a positive number of days")]
    InvalidBatchSize,

    #[error("read retries must be positive")]
    InvalidReadRetries,

    #[error("no providers configured")]
    NoProviders,

    #[error("no credentials configured for provider {provider}")]
    MissingCredentials { provider: ProviderName },

    #[error("none of the configured providers are reachable")]
    AllProvidersDown,

    #[error("failed to collect provider catalogs")]
    Catalog(#[source] anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Parameters of one backfill run over `[begin_date, end_date)`.
pub struct DownloadOptions {
    /// Providers to try, in priority order.
    pub providers: Vec<ProviderName>,
    pub credentials: HashMap<ProviderName, Vec<Credential>>,
    pub begin_date: NaiveDate,
    /// Exclusive.
    pub end_date: NaiveDate,
    /// Symbols to download; `None` downloads the union of all providers'
    /// catalogs.
    pub symbols: Option<Vec<String>>,
    /// Days per staging batch.
    pub batch_size: u32,
    /// Seconds slept between batches.
    pub read_delay: u64,
    /// Transport-level retries per request.
    pub read_retries: u32,
}

/// Everything that happened during a run: one report per day and one per
/// merged staging store. Failures are already logged by the time this is
/// returned.
#[derive(Debug)]
pub struct DownloadSummary {
    pub days: Vec<TaskReport>,
    pub merges: Vec<TaskReport>,
}

impl DownloadSummary {
    pub fn failed_days(&self) -> usize {
        self.days.iter().filter(|report| report.error).count()
    }
}

/// The day-level read seam of the orchestrator. Production uses
/// [`FallbackReader`]; tests inject scripted readers.
#[async_trait::async_trait]
pub trait DailyRates: Send {
    /// All requested rates for one day. Symbols nobody could resolve map to
    /// `None`.
    async fn read(
        &mut self,
        date: NaiveDate,
        symbols: &[String],
    ) -> anyhow::Result<HashMap<String, Option<f64>>>;

    /// Union of the catalogs backing this reader. Consulted only when the
    /// caller requested no explicit symbol set.
    async fn available_symbols(&mut self) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Session-scoped ordered fallback over several providers.
///
/// Distinct from the per-account circuit breaker: a provider that reports
/// total failure once is never asked again for the rest of the run, and the
/// reader errors out once every provider has been marked out.
pub struct FallbackReader {
    providers: Vec<RateProvider>,
    has_access: Vec<bool>,
}

impl FallbackReader {
    pub fn new(providers: Vec<RateProvider>) -> Self {
        let has_access = vec![true; providers.len()];
        Self {
            providers,
            has_access,
        }
    }
}

#[async_trait::async_trait]
impl DailyRates for FallbackReader {
    async fn read(
        &mut self,
        date: NaiveDate,
        symbols: &[String],
    ) -> anyhow::Result<HashMap<String, Option<f64>>> {
        let mut rates: HashMap<String, Option<f64>> =
            symbols.iter().map(|symbol| (symbol.clone(), None)).collect();

        for index in 0..self.providers.len() {
            if !self.has_access.iter().any(|available| *available) {
                return Err(DownloadError::AllProvidersDown.into());
            }
            if !self.has_access[index] {
                continue;
            }

            let outstanding: Vec<UsdBid> = rates
                .iter()
                .filter_map(|(symbol, rate)| rate.is_none().then(|| UsdBid::new(date, symbol)))
                .collect();
            if outstanding.is_empty() {
                break;
            }

            let provider = &mut self.providers[index];
            debug!(provider = provider.name(), date = %date, symbols = outstanding.len(), "reading day rates");
            match provider.rates(&outstanding).await {
                Some(values) => {
                    for (bid, value) in outstanding.iter().zip(values) {
                        if value.is_some() {
                            rates.insert(bid.symbol.clone(), value);
                        }
                    }
                }
                None => {
                    warn!(
                        provider = provider.name(),
                        "provider unavailable for the rest of this run"
                    );
                    self.has_access[index] = false;
                }
            }
        }

        Ok(rates)
    }

    async fn available_symbols(&mut self) -> anyhow::Result<Vec<String>> {
        let mut symbols = BTreeSet::new();
        for provider in &mut self.providers {
            symbols.extend(provider.symbols().await);
        }
        Ok(symbols.into_iter().collect())
    }
}

fn validate(
    target: &Path,
    options: &DownloadOptions,
    today: NaiveDate,
) -> Result<(), DownloadError> {
    if !target.exists() {
        return Err(DownloadError::MissingTarget {
            path: target.to_path_buf(),
        });
    }
    if options.begin_date > options.end_date {
        return Err(DownloadError::InvalidDateRange {
            begin: options.begin_date,
            end: options.end_date,
        });
    }
    if options.end_date > today {
        return Err(DownloadError::EndDateInFuture {
            end: options.end_date,
            today,
        });
    }
    if options.batch_size == 0 {
        return Err(DownloadError::InvalidBatchSize);
    }
    if options.read_retries == 0 {
        return Err(DownloadError::InvalidReadRetries);
    }
    if options.providers.is_empty() {
        return Err(DownloadError::NoProviders);
    }
    Ok(())
}

/// Split `[begin, end)` into contiguous sub-ranges of `batch_size` days,
/// the last possibly shorter.
fn split_date_ranges(
    begin: NaiveDate,
    end: NaiveDate,
    batch_size: u32,
) -> Vec<(NaiveDate, NaiveDate)> {
    let span = chrono::Duration::days(i64::from(batch_size));
    let mut ranges = Vec::new();
    let mut cursor = begin;
    while cursor < end {
        let stop = std::cmp::min(cursor + span, end);
        ranges.push((cursor, stop));
        cursor = stop;
    }
    ranges
}

/// Fetch and persist one day. Every failure is contained here: the run is
/// never aborted over one bad day.
async fn download_day<R: DailyRates + ?Sized>(
    reader: &mut R,
    store: &mut RateStore,
    date: NaiveDate,
    symbols: &[String],
) -> TaskReport {
    info!(date = %date, "downloading rates");
    let result: anyhow::Result<()> = async {
        let rates = reader.read(date, symbols).await?;
        let records = rates
            .into_iter()
            .filter_map(|(symbol, rate)| rate.map(|rate| RateRecord::new(date, symbol, rate)));
        store.put_rates(records)?;
        Ok(())
    }
    .await;

    match result {
        Ok(()) => TaskReport::success(format!("successful download for date {date}")),
        Err(cause) => {
            error!(date = %date, cause = format!("{cause:#}"), "failed to download rates");
            TaskReport::failure(format!("failed to download rates for date {date}"))
        }
    }
}

async fn download_batches<R: DailyRates>(
    reader: &mut R,
    staging_dir: &Path,
    ranges: &[(NaiveDate, NaiveDate)],
    symbols: &[String],
    read_delay: u64,
) -> Result<(Vec<PathBuf>, Vec<TaskReport>), DownloadError> {
    let mut staging_paths = Vec::new();
    let mut reports = Vec::new();

    for (index, &(begin, end)) in ranges.iter().enumerate() {
        info!(begin = %begin, end = %end, "downloading batch, end date exclusive");
        let path = staging_dir.join(format!("rates_{begin}_{end}.db"));
        create_store(&path)?;
        let mut store = RateStore::open(&path)?;

        let mut date = begin;
        while date < end {
            reports.push(download_day(reader, &mut store, date, symbols).await);
            date = date + chrono::Duration::days(1);
        }
        drop(store);
        staging_paths.push(path);

        if read_delay > 0 && index + 1 < ranges.len() {
            info!(seconds = read_delay, "sleeping between batches");
            tokio::time::sleep(Duration::from_secs(read_delay)).await;
        }
    }

    Ok((staging_paths, reports))
}

fn log_failures(stage: &str, reports: &[TaskReport]) {
    let failures: Vec<&TaskReport> = reports.iter().filter(|report| report.error).collect();
    if let Ok(rendered) = serde_json::to_string_pretty(&failures) {
        info!(stage, failures = %rendered, "failure reports");
    }
}

/// Backfill `[begin_date, end_date)` into the target store through an
/// injected reader. Staging stores live in a temporary directory that is
/// discarded after they are merged into the target.
pub async fn download_rates_with<R: DailyRates>(
    target: &Path,
    options: &DownloadOptions,
    reader: &mut R,
) -> Result<DownloadSummary, DownloadError> {
    validate(target, options, SystemClock.today())?;

    let symbols: Vec<String> = match &options.symbols {
        Some(symbols) => symbols
            .iter()
            .map(|symbol| symbol.trim().to_uppercase())
            .collect(),
        None => reader
            .available_symbols()
            .await
            .map_err(DownloadError::Catalog)?,
    };
    info!(
        target = %target.display(),
        begin = %options.begin_date,
        end = %options.end_date,
        symbols = symbols.len(),
        "starting backfill"
    );

    let staging_dir = tempfile::tempdir()?;
    let ranges = split_date_ranges(options.begin_date, options.end_date, options.batch_size);
    let (staging_paths, days) =
        download_batches(reader, staging_dir.path(), &ranges, &symbols, options.read_delay)
            .await?;
    log_failures("download", &days);

    let merges = merge::merge_stores(target, &staging_paths);
    log_failures("merge", &merges);

    Ok(DownloadSummary { days, merges })
}

/// Backfill using providers built from the configured names and
/// credentials, tried in the given priority order.
pub async fn download_rates(
    target: &Path,
    options: &DownloadOptions,
) -> Result<DownloadSummary, DownloadError> {
    validate(target, options, SystemClock.today())?;

    let mut providers = Vec::new();
    for name in &options.providers {
        let credentials = options
            .credentials
            .get(name)
            .cloned()
            .ok_or(DownloadError::MissingCredentials { provider: *name })?;
        providers.push(RateProvider::build(*name, credentials, options.read_retries));
    }
    let mut reader = FallbackReader::new(providers);
    download_rates_with(target, options, &mut reader).await
}
