// ── Fleet state facade ──
//
// Owns every store, the event bus and the bridge tasks between them.
// Construction wires things up; `start` hydrates and begins consuming
// the bus; `shutdown` stops the bridges. Stores stay readable throughout.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bus::{EventBus, spawn_bridge};
use crate::config::FleetConfig;
use crate::error::CoreError;
use crate::model::{PrinterTelegram, PrintersDeleted};
use crate::repository::{
    FloorRepository, InMemoryFloorRepository, InMemoryPrinterRegistry, InMemorySettingsRepository,
    PrinterLookup, SettingsRepository,
};
use crate::service::{FloorService, SettingsService};
use crate::state::{EventCache, FileCache, FloorStore, SettingsStore};

// ── FleetStatus ──────────────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FleetStatus {
    Stopped,
    Starting,
    Running,
    Failed,
}

// ── Repositories ─────────────────────────────────────────────────────

/// Backing stores injected into a [`FleetState`].
#[derive(Clone)]
pub struct FleetRepositories {
    pub floors: Arc<dyn FloorRepository>,
    pub printers: Arc<dyn PrinterLookup>,
    pub settings: Arc<dyn SettingsRepository>,
}

impl FleetRepositories {
    /// Empty in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            floors: Arc::new(InMemoryFloorRepository::new()),
            printers: Arc::new(InMemoryPrinterRegistry::new()),
            settings: Arc::new(InMemorySettingsRepository::new()),
        }
    }
}

// ── FleetState ───────────────────────────────────────────────────────

/// Cheaply cloneable handle to the whole state layer.
#[derive(Clone)]
pub struct FleetState {
    inner: Arc<FleetInner>,
}

struct FleetInner {
    config: FleetConfig,
    bus: EventBus,
    settings: Arc<SettingsStore>,
    events: Arc<EventCache>,
    files: Arc<FileCache>,
    floors: Arc<FloorStore>,
    status: watch::Sender<FleetStatus>,
    cancel: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl FleetState {
    /// Wire up all stores. Does not load anything; call
    /// [`start()`](Self::start) for that.
    pub fn new(config: FleetConfig, repositories: FleetRepositories) -> Self {
        let diff_capacity = config.diff_channel_capacity;
        let settings = Arc::new(SettingsStore::new(SettingsService::new(
            repositories.settings,
        )));
        let events = Arc::new(EventCache::new(
            Arc::clone(&settings),
            Arc::clone(&repositories.printers),
            diff_capacity,
        ));
        let files = Arc::new(FileCache::new(
            Arc::clone(&repositories.printers),
            diff_capacity,
        ));
        let floors = Arc::new(FloorStore::new(
            FloorService::new(repositories.floors, repositories.printers),
            diff_capacity,
        ));
        let (status, _) = watch::channel(FleetStatus::Stopped);

        Self {
            inner: Arc::new(FleetInner {
                bus: EventBus::new(config.event_channel_capacity),
                config,
                settings,
                events,
                files,
                floors,
                status,
                cancel: Mutex::new(CancellationToken::new()),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &FleetConfig {
        &self.inner.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.inner.settings
    }

    pub fn events(&self) -> &Arc<EventCache> {
        &self.inner.events
    }

    pub fn files(&self) -> &Arc<FileCache> {
        &self.inner.files
    }

    pub fn floors(&self) -> &Arc<FloorStore> {
        &self.inner.floors
    }

    pub fn status(&self) -> FleetStatus {
        *self.inner.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<FleetStatus> {
        self.inner.status.subscribe()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Load settings, hydrate floors and start consuming the bus.
    ///
    /// Calling this while already running is a no-op.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            return Ok(());
        }
        self.inner.status.send_replace(FleetStatus::Starting);

        if let Err(e) = self.hydrate().await {
            self.inner.status.send_replace(FleetStatus::Failed);
            return Err(e);
        }

        let cancel = self.inner.cancel.lock().await.clone();
        let bus = &self.inner.bus;
        // Subscribe before spawning so nothing published after `start`
        // returns is missed.
        handles.push(spawn_bridge(
            Arc::clone(&self.inner.events),
            bus.subscribe(),
            cancel.clone(),
        ));
        handles.push(spawn_bridge(
            Arc::clone(&self.inner.files),
            bus.subscribe(),
            cancel.clone(),
        ));
        handles.push(spawn_bridge(
            Arc::clone(&self.inner.floors),
            bus.subscribe(),
            cancel,
        ));

        self.inner.status.send_replace(FleetStatus::Running);
        info!(bridges = handles.len(), "fleet state running");
        Ok(())
    }

    /// Wait until every bridge has handled everything published so far.
    ///
    /// Returns immediately when not running.
    pub async fn flush(&self) {
        let bridges = self.inner.task_handles.lock().await.len();
        if bridges == 0 {
            return;
        }
        let (ack_tx, mut ack_rx) = mpsc::channel(bridges);
        let reached = self.inner.bus.send_flush(ack_tx);
        for _ in 0..reached.min(bridges) {
            match ack_rx.recv().await {
                Some(bridge) => debug!(bridge, "bridge flushed"),
                None => break,
            }
        }
    }

    /// Stop the bridges and wait for them. Stores keep their contents.
    pub async fn shutdown(&self) {
        {
            let mut cancel = self.inner.cancel.lock().await;
            cancel.cancel();
            *cancel = CancellationToken::new();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        self.inner.status.send_replace(FleetStatus::Stopped);
        debug!("fleet state stopped");
    }

    // ── Publishing shortcuts ─────────────────────────────────────────

    pub fn publish_telegram(&self, telegram: PrinterTelegram) -> usize {
        self.inner.bus.publish_telegram(telegram)
    }

    pub fn publish_printers_deleted(&self, notice: PrintersDeleted) -> usize {
        self.inner.bus.publish_printers_deleted(notice)
    }

    async fn hydrate(&self) -> Result<(), CoreError> {
        let settings = &self.inner.settings;
        settings.load_settings().await?;
        settings
            .persist_optional_credential_settings(self.inner.config.credential_overrides.clone())
            .await?;
        self.inner.floors.load_store().await
    }
}
