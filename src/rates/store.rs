use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::models::{RateRecord, UsdBid};

/// Store lifecycle violations and SQL failures. These are never retried.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("rate store {} does not exist", path.display())]
    Missing { path: PathBuf },

    #[error("rate store {} already exists", path.display())]
    AlreadyExists { path: PathBuf },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

const CREATE_TABLE: &str = "CREATE TABLE usd_rates (
    date TEXT NOT NULL,
    symbol TEXT NOT NULL,
    rate REAL NOT NULL,
    UNIQUE(date, symbol)
)";

const READ_RATE: &str = "SELECT rate FROM usd_rates WHERE date = ?1 AND symbol = ?2";

const READ_ALL: &str = "SELECT date, symbol, rate FROM usd_rates";

const WRITE_RATE: &str =
    "INSERT OR IGNORE INTO usd_rates(date, symbol, rate) VALUES (?1, ?2, ?3)";

/// Create an empty rate store at `path`.
///
/// Stores have a two-phase lifecycle: created exactly once, then opened any
/// number of times. Creating over an existing store is an error.
pub fn create_store(path: &Path) -> Result<(), StoreError> {
    if path.exists() {
        return Err(StoreError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    info!(path = %path.display(), "creating empty rate store");
    let connection = Connection::open(path)?;
    connection.execute(CREATE_TABLE, [])?;
    Ok(())
}

/// Remove a rate store. Missing stores are not an error.
pub fn delete_store(path: &Path) -> Result<(), StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error.into()),
    }
}

/// Create a store and optionally seed it from an existing one.
pub fn setup_store(path: &Path, src: Option<&Path>) -> Result<(), StoreError> {
    create_store(path)?;
    if let Some(src) = src {
        super::merge::copy_rates(path, src)?;
    }
    Ok(())
}

/// A durable table of `(date, symbol) -> rate` rows with insert-or-ignore
/// write semantics. The connection is held for the lifetime of the value and
/// released on drop, on every exit path.
pub struct RateStore {
    connection: Connection,
    path: PathBuf,
}

impl RateStore {
    /// Open an existing store. Opening a store that was never created is an
    /// error.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::Missing {
                path: path.to_path_buf(),
            });
        }
        debug!(path = %path.display(), "connecting to rate store");
        let connection = Connection::open(path)?;
        Ok(Self {
            connection,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Point lookups, preserving input order. Absent keys yield `None`.
    pub fn get_rates(&self, bids: &[UsdBid]) -> Result<Vec<Option<f64>>, StoreError> {
        let mut statement = self.connection.prepare(READ_RATE)?;
        let mut rates = Vec::with_capacity(bids.len());
        for bid in bids {
            let rate = statement
                .query_row(params![bid.date, bid.symbol], |row| row.get::<_, f64>(0))
                .optional()?;
            rates.push(rate);
        }
        Ok(rates)
    }

    /// Insert-or-ignore writes inside one transaction. Duplicate keys are
    /// silently dropped; the first successful write for a key wins. Returns
    /// the number of rows actually inserted.
    pub fn put_rates(
        &mut self,
        records: impl IntoIterator<Item = RateRecord>,
    ) -> Result<usize, StoreError> {
        let transaction = self.connection.transaction()?;
        let mut inserted = 0;
        {
            let mut statement = transaction.prepare(WRITE_RATE)?;
            for record in records {
                inserted +=
                    statement.execute(params![record.date, record.symbol, record.rate])?;
            }
        }
        transaction.commit()?;
        Ok(inserted)
    }

    /// Every row in the store, in no particular order.
    pub fn read_all(&self) -> Result<Vec<RateRecord>, StoreError> {
        let mut statement = self.connection.prepare(READ_ALL)?;
        let rows = statement.query_map([], |row| {
            Ok(RateRecord {
                date: row.get(0)?,
                symbol: row.get(1)?,
                rate: row.get(2)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
