use std::path::{Path, PathBuf};

use tracing::{error, info};

use super::models::TaskReport;
use super::store::{RateStore, StoreError};

/// Copy every row of `source` into `target` through the insert-or-ignore
/// write path. Returns the number of rows actually inserted.
pub fn copy_rates(target: &Path, source: &Path) -> Result<usize, StoreError> {
    let source_store = RateStore::open(source)?;
    let mut target_store = RateStore::open(target)?;
    target_store.put_rates(source_store.read_all()?)
}

/// Fold one or more source stores into the target, idempotently and
/// order-independently. A source that fails to merge is reported and does
/// not block the remaining sources.
pub fn merge_stores(target: &Path, sources: &[PathBuf]) -> Vec<TaskReport> {
    sources
        .iter()
        .map(|source| {
            info!(source = %source.display(), target = %target.display(), "merging rates");
            match copy_rates(target, source) {
                Ok(inserted) => {
                    info!(source = %source.display(), inserted, "merge complete");
                    TaskReport::success(format!(
                        "successful merge from {} to {}",
                        source.display(),
                        target.display()
                    ))
                }
                Err(cause) => {
                    error!(source = %source.display(), cause = %cause, "merge failed");
                    TaskReport::failure(format!(
                        "failed to merge {} into {}",
                        source.display(),
                        target.display()
                    ))
                }
            }
        })
        .collect()
}
