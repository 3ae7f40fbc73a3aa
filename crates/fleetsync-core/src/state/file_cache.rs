// ── Printer file cache ──
//
// Last known file list and storage figures per printer, plus a running
// total of cached file references.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::bus::BusSubscriber;
use crate::cache::{CacheKey, KeyDiffCache};
use crate::error::CoreError;
use crate::model::{
    FileList, FilePurgeOutcome, PrinterFileStorage, PrinterId, PrintersDeleted, StorageInfo,
};
use crate::repository::PrinterLookup;

pub struct FileCache {
    cache: KeyDiffCache<PrinterId, PrinterFileStorage>,
    total_file_count: AtomicUsize,
    printers: Arc<dyn PrinterLookup>,
}

impl FileCache {
    pub fn new(printers: Arc<dyn PrinterLookup>, diff_capacity: usize) -> Self {
        Self {
            cache: KeyDiffCache::with_diff_capacity(diff_capacity),
            total_file_count: AtomicUsize::new(0),
            printers,
        }
    }

    // ── Writes ───────────────────────────────────────────────────────

    pub fn cache_printer_file_storage(
        &self,
        printer_id: PrinterId,
        storage: PrinterFileStorage,
    ) -> Result<(), CoreError> {
        self.cache.set_key_value(printer_id, storage, false)?;
        self.update_file_count();
        Ok(())
    }

    pub fn cache_printer_files(
        &self,
        printer_id: PrinterId,
        file_list: FileList,
    ) -> Result<(), CoreError> {
        self.cache
            .update(printer_id, |entry| entry.file_list = file_list)?;
        self.update_file_count();
        Ok(())
    }

    pub fn cache_printer_storage(
        &self,
        printer_id: PrinterId,
        storage: StorageInfo,
    ) -> Result<(), CoreError> {
        self.cache
            .update(printer_id, |entry| entry.storage = Some(storage))?;
        Ok(())
    }

    /// Forget one printer. A printer with nothing cached is logged, not
    /// an error; returns whether anything was removed.
    pub fn purge_printer_id(&self, printer_id: &PrinterId) -> Result<bool, CoreError> {
        if !printer_id.is_valid_key() {
            return Err(CoreError::InvalidKey {
                key: printer_id.to_string(),
            });
        }
        if !self.cache.delete_key_value(printer_id) {
            warn!(printer_id = %printer_id, "no file storage cached for printer, nothing purged");
            return Ok(false);
        }
        info!(printer_id = %printer_id, "purged printer file cache");
        self.update_file_count();
        Ok(true)
    }

    /// Remove one file, by path, from a printer's cached list.
    pub fn purge_file(&self, printer_id: &PrinterId, path: &str) -> FilePurgeOutcome {
        let removed = self.cache.modify_existing(printer_id, |entry| {
            let before = entry.file_list.files.len();
            entry.file_list.files.retain(|f| f.path != path);
            entry.file_list.files.len() != before
        });

        if removed {
            self.update_file_count();
            FilePurgeOutcome::Removed
        } else {
            warn!(
                printer_id = %printer_id,
                path,
                "file removal requested but file is not in the cached list"
            );
            FilePurgeOutcome::FileNotFound
        }
    }

    pub fn handle_printers_deleted(&self, notice: &PrintersDeleted) -> usize {
        let removed = self.cache.delete_keys_batch(&notice.printer_ids);
        if removed > 0 {
            self.update_file_count();
        }
        removed
    }

    /// Drop the entries of printers the registry no longer knows.
    pub async fn reconcile(&self) -> Result<usize, CoreError> {
        let stale = self.printers.unregistered(self.cache.keys()).await?;
        let removed = self.handle_printers_deleted(&PrintersDeleted {
            printer_ids: stale,
        });
        if removed > 0 {
            info!(removed, "dropped files of unregistered printers");
        }
        Ok(removed)
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get_printer_file_storage(&self, printer_id: &PrinterId) -> Option<Arc<PrinterFileStorage>> {
        self.cache.get_value(printer_id)
    }

    pub fn get_printer_files(&self, printer_id: &PrinterId) -> Option<FileList> {
        self.cache
            .get_value(printer_id)
            .map(|entry| entry.file_list.clone())
    }

    pub fn get_printer_storage(&self, printer_id: &PrinterId) -> Option<StorageInfo> {
        self.cache.get_value(printer_id).and_then(|entry| entry.storage)
    }

    pub fn total_file_count(&self) -> usize {
        self.total_file_count.load(Ordering::Acquire)
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn update_file_count(&self) {
        let total: usize = self
            .cache
            .snapshot()
            .values()
            .map(|entry| entry.value.file_list.files.len())
            .sum();
        let previous = self.total_file_count.swap(total, Ordering::AcqRel);
        if previous != total {
            info!(total, "file cache updated");
        }
    }
}

#[async_trait]
impl BusSubscriber for FileCache {
    fn name(&self) -> &'static str {
        "file-cache"
    }

    async fn on_printers_deleted(&self, notice: &PrintersDeleted) {
        self.handle_printers_deleted(notice);
    }

    async fn on_lagged(&self, _skipped: u64) {
        if let Err(e) = self.reconcile().await {
            warn!(error = %e, "failed to reconcile file cache after lag");
        }
    }
}
