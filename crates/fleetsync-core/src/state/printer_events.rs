// ── Printer event cache ──
//
// Aggregates live telegrams into one labelled-slot record per printer.
// Each telegram is applied with a single atomic read-modify-write on the
// printer's key, so concurrent telegrams for one printer never lose a
// slot and telegrams for different printers never touch each other.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::bus::BusSubscriber;
use crate::cache::{CacheStream, DiffBatch, KeyDiffCache};
use crate::error::CoreError;
use crate::model::{
    PrinterEventsCacheDto, PrinterId, PrinterMessage, PrinterTelegram, PrintersDeleted,
};
use crate::repository::PrinterLookup;
use crate::state::SettingsStore;

pub struct EventCache {
    cache: KeyDiffCache<PrinterId, PrinterEventsCacheDto>,
    settings: Arc<SettingsStore>,
    printers: Arc<dyn PrinterLookup>,
}

impl EventCache {
    pub fn new(
        settings: Arc<SettingsStore>,
        printers: Arc<dyn PrinterLookup>,
        diff_capacity: usize,
    ) -> Self {
        Self {
            cache: KeyDiffCache::with_diff_capacity(diff_capacity),
            settings,
            printers,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get_printer_socket_events(
        &self,
        printer_id: &PrinterId,
    ) -> Option<Arc<PrinterEventsCacheDto>> {
        self.cache.get_value(printer_id)
    }

    /// Return the printer's record, creating an empty one if needed.
    pub fn get_or_create_events(
        &self,
        printer_id: &PrinterId,
    ) -> Result<Arc<PrinterEventsCacheDto>, CoreError> {
        self.cache
            .get_or_insert(printer_id.clone(), PrinterEventsCacheDto::default())
    }

    pub fn get_all(&self) -> Vec<Arc<PrinterEventsCacheDto>> {
        self.cache.get_all_values()
    }

    pub fn printer_ids(&self) -> Vec<PrinterId> {
        self.cache.keys()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn subscribe(&self) -> CacheStream<PrinterId, PrinterEventsCacheDto> {
        self.cache.subscribe()
    }

    pub fn subscribe_diffs(&self) -> tokio::sync::broadcast::Receiver<DiffBatch<PrinterId>> {
        self.cache.subscribe_diffs()
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Store one telegram into its slot and return the updated record.
    ///
    /// Unknown labels and malformed `event`/`plugin` payloads are
    /// rejected with `Validation` before anything is written.
    pub fn handle_telegram(
        &self,
        telegram: PrinterTelegram,
    ) -> Result<Arc<PrinterEventsCacheDto>, CoreError> {
        let printer_id = telegram.printer_id.clone();
        let event = telegram.event.clone();
        let message = PrinterMessage::try_from(telegram)?;
        // Measured after parsing, so `history` reports its pruned size.
        let size = self.debug_enabled().then(|| payload_size(message.payload()));
        let event_type = match &message {
            PrinterMessage::Event { event_type, .. } => Some(event_type.clone()),
            _ => None,
        };

        let stored = self.cache.update(printer_id.clone(), |record| record.apply(message))?;

        if let Some(bytes) = size {
            match event_type {
                Some(event_type) => {
                    info!(printer_id = %printer_id, "Event '{event_type}' received");
                }
                None if event != "plugin" => {
                    info!(
                        printer_id = %printer_id,
                        "Message '{event}' received, size {}",
                        format_kb(bytes)
                    );
                }
                None => {}
            }
        }
        Ok(stored)
    }

    /// Drop every listed printer in one batch. Returns how many had records.
    pub fn handle_printers_deleted(&self, notice: &PrintersDeleted) -> usize {
        let removed = self.cache.delete_keys_batch(&notice.printer_ids);
        debug!(
            requested = notice.printer_ids.len(),
            removed, "printer events purged"
        );
        removed
    }

    /// Drop the records of printers the registry no longer knows.
    pub async fn reconcile(&self) -> Result<usize, CoreError> {
        let stale = self.printers.unregistered(self.cache.keys()).await?;
        let removed = self.cache.delete_keys_batch(&stale);
        if removed > 0 {
            info!(removed, "dropped events of unregistered printers");
        }
        Ok(removed)
    }

    pub fn purge_all(&self) {
        self.cache.purge_all();
    }

    fn debug_enabled(&self) -> bool {
        // Before settings load the flag is simply off.
        self.settings.debug_socket_messages().unwrap_or(false)
    }
}

#[async_trait]
impl BusSubscriber for EventCache {
    fn name(&self) -> &'static str {
        "printer-events"
    }

    async fn on_telegram(&self, telegram: &PrinterTelegram) {
        if let Err(e) = self.handle_telegram(telegram.clone()) {
            debug!(
                printer_id = %telegram.printer_id,
                event = %telegram.event,
                error = %e,
                "telegram dropped"
            );
        }
    }

    async fn on_printers_deleted(&self, notice: &PrintersDeleted) {
        self.handle_printers_deleted(notice);
    }

    async fn on_lagged(&self, _skipped: u64) {
        if let Err(e) = self.reconcile().await {
            warn!(error = %e, "failed to reconcile printer events after lag");
        }
    }
}

fn payload_size(payload: &Value) -> usize {
    serde_json::to_vec(payload).map_or(0, |bytes| bytes.len())
}

/// Kilobytes (1000 bytes) with two decimals.
fn format_kb(bytes: usize) -> String {
    format!("{}.{:02} KB", bytes / 1000, (bytes % 1000) / 10)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::repository::{InMemoryPrinterRegistry, InMemorySettingsRepository};
    use crate::service::SettingsService;

    fn cache() -> EventCache {
        cache_with_registry(Arc::new(InMemoryPrinterRegistry::new()))
    }

    fn cache_with_registry(registry: Arc<InMemoryPrinterRegistry>) -> EventCache {
        let settings = Arc::new(SettingsStore::new(SettingsService::new(Arc::new(
            InMemorySettingsRepository::new(),
        ))));
        EventCache::new(settings, registry, 16)
    }

    #[test]
    fn kb_formatting() {
        assert_eq!(format_kb(0), "0.00 KB");
        assert_eq!(format_kb(1234), "1.23 KB");
        assert_eq!(format_kb(20_050), "20.05 KB");
    }

    #[test]
    fn history_size_is_measured_after_pruning() {
        let logs = vec!["Recv: T:210.0 /210.0 B:60.0 /60.0"; 200];
        let payload = json!({
            "logs": logs,
            "state": { "text": "Printing" }
        });
        let message =
            PrinterMessage::try_from(PrinterTelegram::new("p1", "history", payload.clone()))
                .unwrap();

        let stored = payload_size(message.payload());
        assert!(stored < payload_size(&payload));
        assert_eq!(stored, payload_size(&json!({ "state": { "text": "Printing" } })));
    }

    #[test]
    fn first_telegram_creates_record() {
        let c = cache();
        assert!(c.get_printer_socket_events(&"p1".into()).is_none());

        c.handle_telegram(PrinterTelegram::new("p1", "current", json!({ "temp": 200 })))
            .unwrap();

        let record = c.get_printer_socket_events(&"p1".into()).unwrap();
        assert_eq!(record.current.as_ref().unwrap().payload, json!({ "temp": 200 }));
        assert!(record.history.is_none());
    }

    #[test]
    fn get_or_create_returns_empty_record() {
        let c = cache();
        let record = c.get_or_create_events(&"p1".into()).unwrap();
        assert_eq!(*record, PrinterEventsCacheDto::default());
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn event_subtypes_do_not_clobber_each_other() {
        let c = cache();
        for kind in ["PrintStarted", "PrintDone"] {
            c.handle_telegram(PrinterTelegram::new(
                "p1",
                "event",
                json!({ "type": kind, "payload": { "kind": kind } }),
            ))
            .unwrap();
        }
        let record = c.get_printer_socket_events(&"p1".into()).unwrap();
        assert_eq!(record.event.len(), 2);
        assert_eq!(record.event["PrintDone"].payload, json!({ "kind": "PrintDone" }));
    }

    #[test]
    fn unknown_label_writes_nothing() {
        let c = cache();
        assert!(c
            .handle_telegram(PrinterTelegram::new("p1", "reauthRequired", json!({})))
            .is_err());
        assert!(c.is_empty());
    }

    #[test]
    fn blank_printer_id_is_invalid_key() {
        let c = cache();
        let err = c
            .handle_telegram(PrinterTelegram::new("", "current", json!({})))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidKey { .. }));
    }

    #[test]
    fn deletion_of_unknown_printers_is_harmless() {
        let c = cache();
        c.handle_telegram(PrinterTelegram::new("p1", "current", json!({})))
            .unwrap();
        let removed = c.handle_printers_deleted(&PrintersDeleted {
            printer_ids: vec!["p1".into(), "p2".into()],
        });
        assert_eq!(removed, 1);
        assert!(c.is_empty());
    }

    #[tokio::test]
    async fn concurrent_telegrams_for_one_printer_keep_every_slot() {
        let c = Arc::new(cache());
        let mut tasks = Vec::new();
        for i in 0..32 {
            let c = Arc::clone(&c);
            tasks.push(tokio::spawn(async move {
                c.handle_telegram(PrinterTelegram::new(
                    "p1",
                    "plugin",
                    json!({ "plugin": format!("plugin-{i}") }),
                ))
                .unwrap();
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        let record = c.get_printer_socket_events(&"p1".into()).unwrap();
        assert_eq!(record.plugin.len(), 32);
    }

    #[tokio::test]
    async fn reconcile_drops_only_unregistered_printers() {
        let registry = Arc::new(InMemoryPrinterRegistry::with_printers(["p1", "p2"]));
        let c = cache_with_registry(Arc::clone(&registry));
        for id in ["p1", "p2"] {
            c.handle_telegram(PrinterTelegram::new(id, "current", json!({})))
                .unwrap();
        }

        registry.deregister(&"p1".into());
        assert_eq!(c.reconcile().await.unwrap(), 1);
        assert_eq!(c.printer_ids(), vec![PrinterId::from("p2")]);
    }
}
