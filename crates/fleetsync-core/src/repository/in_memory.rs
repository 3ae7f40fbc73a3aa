// ── In-memory repositories ──
//
// Reference backing stores for tests and the replay binary. Each one can
// be switched into an "unavailable" mode to exercise outage paths.

use std::collections::HashSet;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use indexmap::IndexMap;

use super::{FloorRepository, PrinterLookup, SettingsRepository};
use crate::error::RepositoryError;
use crate::model::{Floor, FloorId, PrinterId, Settings};

fn lock_failed() -> RepositoryError {
    RepositoryError::Unavailable {
        reason: "lock poisoned".into(),
    }
}

fn check_online(offline: &AtomicBool) -> Result<(), RepositoryError> {
    if offline.load(Ordering::Acquire) {
        Err(RepositoryError::Unavailable {
            reason: "store offline".into(),
        })
    } else {
        Ok(())
    }
}

// ── Floors ───────────────────────────────────────────────────────────

/// Floor documents in insertion order.
#[derive(Default)]
pub struct InMemoryFloorRepository {
    floors: RwLock<IndexMap<FloorId, Floor>>,
    offline: AtomicBool,
}

impl InMemoryFloorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with documents as-is, without any validation. Lets tests and
    /// the replay binary load stores that already contain bad data.
    pub fn with_floors(floors: impl IntoIterator<Item = Floor>) -> Self {
        let map = floors.into_iter().map(|f| (f.id.clone(), f)).collect();
        Self {
            floors: RwLock::new(map),
            offline: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail with `Unavailable` until reset.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }

    /// Raw stored documents, bypassing the offline switch.
    pub fn documents(&self) -> Vec<Floor> {
        self.floors
            .read()
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FloorRepository for InMemoryFloorRepository {
    async fn find_all(&self) -> Result<Vec<Floor>, RepositoryError> {
        check_online(&self.offline)?;
        let map = self.floors.read().map_err(|_| lock_failed())?;
        Ok(map.values().cloned().collect())
    }

    async fn find_one(&self, id: &FloorId) -> Result<Option<Floor>, RepositoryError> {
        check_online(&self.offline)?;
        let map = self.floors.read().map_err(|_| lock_failed())?;
        Ok(map.get(id).cloned())
    }

    async fn create(&self, floor: Floor) -> Result<Floor, RepositoryError> {
        check_online(&self.offline)?;
        let mut map = self.floors.write().map_err(|_| lock_failed())?;
        if map.contains_key(&floor.id) {
            return Err(RepositoryError::Conflict {
                message: format!("floor {} already exists", floor.id),
            });
        }
        map.insert(floor.id.clone(), floor.clone());
        Ok(floor)
    }

    async fn save(&self, floor: Floor) -> Result<Floor, RepositoryError> {
        check_online(&self.offline)?;
        let mut map = self.floors.write().map_err(|_| lock_failed())?;
        map.insert(floor.id.clone(), floor.clone());
        Ok(floor)
    }

    async fn pull_printer_from_all(
        &self,
        printer_id: &PrinterId,
    ) -> Result<usize, RepositoryError> {
        check_online(&self.offline)?;
        let mut map = self.floors.write().map_err(|_| lock_failed())?;
        let mut matched = 0;
        for floor in map.values_mut() {
            let before = floor.positions.len();
            floor.positions.retain(|p| &p.printer_id != printer_id);
            if floor.positions.len() != before {
                matched += 1;
            }
        }
        Ok(matched)
    }

    async fn delete_one(&self, id: &FloorId) -> Result<bool, RepositoryError> {
        check_online(&self.offline)?;
        let mut map = self.floors.write().map_err(|_| lock_failed())?;
        Ok(map.shift_remove(id).is_some())
    }
}

// ── Printers ─────────────────────────────────────────────────────────

/// Set of registered printer ids.
#[derive(Default)]
pub struct InMemoryPrinterRegistry {
    printers: RwLock<HashSet<PrinterId>>,
}

impl InMemoryPrinterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_printers<I, P>(ids: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PrinterId>,
    {
        Self {
            printers: RwLock::new(ids.into_iter().map(Into::into).collect()),
        }
    }

    pub fn register(&self, id: impl Into<PrinterId>) {
        if let Ok(mut set) = self.printers.write() {
            set.insert(id.into());
        }
    }

    /// Returns whether the printer was registered.
    pub fn deregister(&self, id: &PrinterId) -> bool {
        self.printers
            .write()
            .map(|mut set| set.remove(id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl PrinterLookup for InMemoryPrinterRegistry {
    async fn printer_exists(&self, id: &PrinterId) -> Result<bool, RepositoryError> {
        let set = self.printers.read().map_err(|_| lock_failed())?;
        Ok(set.contains(id))
    }
}

// ── Settings ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemorySettingsRepository {
    document: RwLock<Option<Settings>>,
    offline: AtomicBool,
}

impl InMemorySettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(settings: Settings) -> Self {
        Self {
            document: RwLock::new(Some(settings)),
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }
}

#[async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn get_or_create(&self) -> Result<Settings, RepositoryError> {
        check_online(&self.offline)?;
        let mut doc = self.document.write().map_err(|_| lock_failed())?;
        Ok(doc.get_or_insert_with(Settings::default).clone())
    }

    async fn save(&self, settings: Settings) -> Result<Settings, RepositoryError> {
        check_online(&self.offline)?;
        let mut doc = self.document.write().map_err(|_| lock_failed())?;
        *doc = Some(settings.clone());
        Ok(settings)
    }
}
