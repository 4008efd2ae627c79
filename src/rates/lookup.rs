use std::collections::{HashMap, VecDeque};
use std::path::Path;

use super::models::{RateRecord, UsdBid, USD};
use super::store::{RateStore, StoreError};

/// Memo capacity. Rates are immutable once written, so entries never need
/// invalidation; the bound only caps memory over very long sessions.
pub const MEMO_CAPACITY: usize = 65536;

/// Read path over a [`RateStore`] that applies the USD policy and an
/// in-process memo.
///
/// A lookup for the pivot symbol itself never touches storage and always
/// yields `1.0`. Known rates are memoized on read; misses are not, so rates
/// written back later in the session become visible to subsequent reads.
pub struct UsdRateLookup {
    store: RateStore,
    memo: BoundedMemo,
}

impl UsdRateLookup {
    /// Open the underlying store (which must exist) with the default memo
    /// capacity.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::with_memo_capacity(path, MEMO_CAPACITY)
    }

    pub fn with_memo_capacity(path: &Path, capacity: usize) -> Result<Self, StoreError> {
        Ok(Self {
            store: RateStore::open(path)?,
            memo: BoundedMemo::new(capacity),
        })
    }

    /// Point lookups, preserving input order.
    pub fn get_rates(&mut self, bids: &[UsdBid]) -> Result<Vec<Option<f64>>, StoreError> {
        let mut rates = Vec::with_capacity(bids.len());
        for bid in bids {
            rates.push(self.get_rate(bid)?);
        }
        Ok(rates)
    }

    fn get_rate(&mut self, bid: &UsdBid) -> Result<Option<f64>, StoreError> {
        if bid.symbol == USD {
            return Ok(Some(1.0));
        }
        if let Some(rate) = self.memo.get(bid) {
            return Ok(Some(rate));
        }
        let rate = self
            .store
            .get_rates(std::slice::from_ref(bid))?
            .pop()
            .flatten();
        if let Some(rate) = rate {
            self.memo.insert(bid.clone(), rate);
        }
        Ok(rate)
    }

    /// Write-back path; same insert-or-ignore semantics as the store.
    pub fn put_rates(
        &mut self,
        records: impl IntoIterator<Item = RateRecord>,
    ) -> Result<usize, StoreError> {
        self.store.put_rates(records)
    }
}

/// Fixed-capacity memo with insertion-order eviction.
struct BoundedMemo {
    entries: HashMap<UsdBid, f64>,
    order: VecDeque<UsdBid>,
    capacity: usize,
}

impl BoundedMemo {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn get(&self, key: &UsdBid) -> Option<f64> {
        self.entries.get(key).copied()
    }

    fn insert(&mut self, key: UsdBid, rate: f64) {
        if self.capacity == 0 || self.entries.contains_key(&key) {
            return;
        }
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, rate);
    }
}
