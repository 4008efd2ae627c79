use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ratebook::config::{default_config_path, Config};
use ratebook::credentials;
use ratebook::rates::{
    create_store, delete_store, download_rates, merge_stores, setup_store, Bid, CurrencyConverter,
    DownloadOptions, ProviderName, RateProvider,
};

#[derive(Parser)]
#[command(name = "ratebook")]
#[command(about = "Historical currency exchange rate store and downloader")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty rate store
    Create { path: PathBuf },

    /// Delete a rate store
    Delete { path: PathBuf },

    /// Create a rate store, optionally seeded from another store
    Setup {
        path: PathBuf,
        /// Store to read data from
        #[arg(long)]
        src: Option<PathBuf>,
    },

    /// Merge rates from other stores into an existing store
    Merge {
        path: PathBuf,
        /// Stores to read data from
        #[arg(long = "src", required = true)]
        src: Vec<PathBuf>,
    },

    /// Download rates from external providers into an existing store
    Download {
        path: PathBuf,
        /// Providers to use, in priority order
        #[arg(long, value_delimiter = ',', required = true)]
        providers: Vec<ProviderName>,
        /// First date to download rates for
        #[arg(long)]
        begin_date: NaiveDate,
        /// One past the last date to download rates for
        #[arg(long)]
        end_date: NaiveDate,
        /// Currencies to download; all available if not specified
        #[arg(long, value_delimiter = ',')]
        symbols: Option<Vec<String>>,
        /// Days downloaded per batch
        #[arg(long)]
        batch_size: Option<u32>,
        /// Seconds to sleep between batches
        #[arg(long)]
        read_delay: Option<u64>,
        /// Retries on a failed request
        #[arg(long)]
        read_retries: Option<u32>,
    },

    /// Resolve one exchange rate through the store and configured provider
    Convert {
        path: PathBuf,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        base: String,
        #[arg(long)]
        quote: String,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = Config::load_or_default(&config_path)?;

    match cli.command {
        Command::Create { path } => {
            create_store(&path)?;
        }
        Command::Delete { path } => {
            delete_store(&path)?;
        }
        Command::Setup { path, src } => {
            setup_store(&path, src.as_deref())?;
        }
        Command::Merge { path, src } => {
            let reports = merge_stores(&path, &src);
            let failures = reports.iter().filter(|report| report.error).count();
            if failures > 0 {
                anyhow::bail!("{failures} of {} merges failed", reports.len());
            }
        }
        Command::Download {
            path,
            providers,
            begin_date,
            end_date,
            symbols,
            batch_size,
            read_delay,
            read_retries,
        } => {
            let mut provider_credentials = HashMap::new();
            for provider in &providers {
                provider_credentials.insert(*provider, credentials::from_env(*provider)?);
            }
            let options = DownloadOptions {
                providers,
                credentials: provider_credentials,
                begin_date,
                end_date,
                symbols,
                batch_size: batch_size.unwrap_or(config.download.batch_size),
                read_delay: read_delay.unwrap_or(config.download.read_delay),
                read_retries: read_retries.unwrap_or(config.download.read_retries),
            };
            let summary = download_rates(&path, &options).await?;
            println!(
                "downloaded {} days ({} failed), merged {} batches",
                summary.days.len(),
                summary.failed_days(),
                summary.merges.len()
            );
        }
        Command::Convert {
            path,
            date,
            base,
            quote,
        } => {
            let provider = RateProvider::build(
                config.rates.provider,
                credentials::from_env(config.rates.provider)?,
                config.rates.read_retries,
            );
            let mut converter = CurrencyConverter::open(&path, provider)?;
            let bid = Bid::new(date, &base, &quote);
            let rates = converter.convert(std::slice::from_ref(&bid)).await?;
            println!("{} {}/{} = {}", date, bid.base, bid.quote, rates[0]);
        }
    }

    Ok(())
}
