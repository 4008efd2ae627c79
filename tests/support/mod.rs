use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use ratebook::credentials::Credential;
use ratebook::rates::{create_store, RateApi, RateProvider, RateRecord, RateStore};
use tempfile::TempDir;

/// Vendor seam stub backed by a per-date rate table. Dates absent from the
/// table are total failures; symbols absent from a date are simply missing
/// from the response. Every historical call is recorded for assertions.
#[derive(Clone)]
pub struct TableApi {
    inner: Arc<TableApiInner>,
}

struct TableApiInner {
    rates: HashMap<NaiveDate, HashMap<String, f64>>,
    calls: Mutex<Vec<(NaiveDate, Vec<String>)>>,
}

impl TableApi {
    pub fn new(rates: HashMap<NaiveDate, HashMap<String, f64>>) -> Self {
        Self {
            inner: Arc::new(TableApiInner {
                rates,
                calls: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn empty() -> Self {
        Self::new(HashMap::new())
    }

    pub fn calls(&self) -> Vec<(NaiveDate, Vec<String>)> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl RateApi for TableApi {
    async fn historical(
        &self,
        _credential: &Credential,
        date: NaiveDate,
        symbols: &[String],
    ) -> Option<HashMap<String, f64>> {
        self.inner
            .calls
            .lock()
            .unwrap()
            .push((date, symbols.to_vec()));
        self.inner.rates.get(&date).map(|table| {
            symbols
                .iter()
                .filter_map(|symbol| table.get(symbol).map(|rate| (symbol.clone(), *rate)))
                .collect()
        })
    }

    async fn currencies(&self, _credential: &Credential) -> Option<Vec<String>> {
        let mut symbols: Vec<String> = self
            .inner
            .rates
            .values()
            .flat_map(|table| table.keys().cloned())
            .collect();
        symbols.sort();
        symbols.dedup();
        Some(symbols)
    }

    fn name(&self) -> &str {
        "table"
    }
}

pub fn provider_for(api: &TableApi) -> RateProvider {
    RateProvider::new(Box::new(api.clone()), vec![Credential::new("test-key")])
}

/// A created-but-possibly-empty store inside its own temp dir.
pub struct StoreFixture {
    pub dir: TempDir,
    pub path: PathBuf,
}

pub fn new_store() -> StoreFixture {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("rates.db");
    create_store(&path).expect("create store");
    StoreFixture { dir, path }
}

pub fn seed_store(fixture: &StoreFixture, records: &[RateRecord]) {
    let mut store = RateStore::open(&fixture.path).expect("open store");
    store.put_rates(records.to_vec()).expect("seed store");
}

pub fn store_contents(fixture: &StoreFixture) -> Vec<RateRecord> {
    let mut records = RateStore::open(&fixture.path)
        .expect("open store")
        .read_all()
        .expect("read store");
    records.sort_by(|a, b| (a.date, &a.symbol).cmp(&(b.date, &b.symbol)));
    records
}
