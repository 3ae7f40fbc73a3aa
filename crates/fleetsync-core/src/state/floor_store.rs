// ── Floor store ──
//
// Cache-first floor reads over the floor service. Every mutation lands in
// the backing store first; the authoritative result is then mirrored into
// the cache. Mutations of one floor are serialized by a per-floor lock,
// and a full reload excludes all write-throughs while it runs.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::bus::BusSubscriber;
use crate::cache::{CacheStream, DiffBatch, KeyDiffCache, KeyedLocks};
use crate::error::CoreError;
use crate::model::{
    CreateFloorRequest, Floor, FloorId, PrinterId, PrinterPosition, PrintersDeleted,
    UpdateFloorRequest,
};
use crate::service::FloorService;

pub struct FloorStore {
    service: FloorService,
    cache: KeyDiffCache<FloorId, Floor>,
    locks: KeyedLocks<FloorId>,
    reload: RwLock<()>,
}

impl FloorStore {
    pub fn new(service: FloorService, diff_capacity: usize) -> Self {
        Self {
            service,
            cache: KeyDiffCache::with_diff_capacity(diff_capacity),
            locks: KeyedLocks::new(),
            reload: RwLock::new(()),
        }
    }

    // ── Hydration ────────────────────────────────────────────────────

    /// Replace the cache with the backing store's floors, in one batch.
    ///
    /// An empty store gets a default floor first.
    pub async fn load_store(&self) -> Result<(), CoreError> {
        let _reload = self.reload.write().await;

        let mut floors = self.service.list().await?;
        if floors.is_empty() {
            info!("no floors stored, creating default floor");
            floors.push(self.service.create_default_floor().await?);
        }

        let count = floors.len();
        self.cache
            .replace_all(floors.into_iter().map(|f| (f.id.clone(), f)), false)?;
        info!(count, "floor store loaded");
        Ok(())
    }

    /// Cached floors, loading the store on first access.
    pub async fn list_cache(&self) -> Result<Vec<Arc<Floor>>, CoreError> {
        if self.cache.is_empty() {
            self.load_store().await?;
        }
        Ok(self.cache.get_all_values())
    }

    /// Cache first; a miss is fetched from the backing store and cached.
    pub async fn get_floor(&self, id: &FloorId) -> Result<Arc<Floor>, CoreError> {
        if let Some(floor) = self.cache.get_value(id) {
            return Ok(floor);
        }
        debug!(floor_id = %id, "floor cache miss");

        // A miss is a write-through too: it must not mirror a document
        // older than one a concurrent mutation already mirrored.
        let _reload = self.reload.read().await;
        let _guard = self.locks.lock(id).await;
        if let Some(floor) = self.cache.get_value(id) {
            return Ok(floor);
        }
        let floor = self.service.get(id).await?;
        self.mirror(floor)
    }

    // ── Write-through mutations ──────────────────────────────────────

    pub async fn create(&self, request: CreateFloorRequest) -> Result<Arc<Floor>, CoreError> {
        let _reload = self.reload.read().await;
        let floor = self.service.create(request).await?;
        self.cache.set_key_value(floor.id.clone(), floor, false)
    }

    pub async fn update(
        &self,
        id: &FloorId,
        request: UpdateFloorRequest,
    ) -> Result<Arc<Floor>, CoreError> {
        let _reload = self.reload.read().await;
        let _guard = self.locks.lock(id).await;
        let floor = self.service.update(id, request).await?;
        self.mirror(floor)
    }

    pub async fn update_name(&self, id: &FloorId, name: String) -> Result<Arc<Floor>, CoreError> {
        let _reload = self.reload.read().await;
        let _guard = self.locks.lock(id).await;
        let floor = self.service.update_name(id, name).await?;
        self.mirror(floor)
    }

    pub async fn update_floor_number(
        &self,
        id: &FloorId,
        level: u32,
    ) -> Result<Arc<Floor>, CoreError> {
        let _reload = self.reload.read().await;
        let _guard = self.locks.lock(id).await;
        let floor = self.service.update_level(id, level).await?;
        self.mirror(floor)
    }

    pub async fn add_or_update_printer(
        &self,
        id: &FloorId,
        position: PrinterPosition,
    ) -> Result<Arc<Floor>, CoreError> {
        let _reload = self.reload.read().await;
        let _guard = self.locks.lock(id).await;
        let floor = self.service.add_or_update_printer(id, position).await?;
        self.mirror(floor)
    }

    /// Take a printer off a floor. The floor's cache entry is dropped
    /// rather than patched; the next read refetches it.
    pub async fn remove_printer(
        &self,
        id: &FloorId,
        printer_id: &PrinterId,
    ) -> Result<Floor, CoreError> {
        let _reload = self.reload.read().await;
        let _guard = self.locks.lock(id).await;
        let floor = self.service.remove_printer(id, printer_id).await?;
        self.cache.delete_key_value(id);
        Ok(floor)
    }

    /// Delete a floor. Returns whether the backing store had it.
    pub async fn delete(&self, id: &FloorId) -> Result<bool, CoreError> {
        let _reload = self.reload.read().await;
        let guard = self.locks.lock(id).await;
        let deleted = self.service.delete(id).await?;
        self.cache.delete_key_value(id);
        drop(guard);
        self.locks.forget(id);
        Ok(deleted)
    }

    /// Pull a printer from every floor, then reload the whole cache.
    ///
    /// The store-side update does not say which floors changed, so no
    /// cached floor is patched in place.
    pub async fn remove_printer_from_any_floor(
        &self,
        printer_id: &PrinterId,
    ) -> Result<(), CoreError> {
        let matched = self.service.delete_printer_from_any_floor(printer_id).await?;
        debug!(printer_id = %printer_id, matched, "printer pulled from floors");
        self.load_store().await
    }

    /// Pull every deleted printer, then reload once.
    pub async fn handle_printers_deleted(&self, notice: &PrintersDeleted) -> Result<(), CoreError> {
        for printer_id in &notice.printer_ids {
            self.service.delete_printer_from_any_floor(printer_id).await?;
        }
        self.load_store().await
    }

    /// Pull every unregistered printer off the floors, then reload.
    pub async fn reconcile(&self) -> Result<usize, CoreError> {
        let stale = self.service.unregistered_placements().await?;
        let count = stale.len();
        self.handle_printers_deleted(&PrintersDeleted { printer_ids: stale })
            .await?;
        Ok(count)
    }

    // ── Cache access ─────────────────────────────────────────────────

    /// Drop every cached floor. The next `list_cache` reloads.
    pub fn purge_cache(&self) {
        self.cache.purge_all();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn subscribe(&self) -> CacheStream<FloorId, Floor> {
        self.cache.subscribe()
    }

    pub fn subscribe_diffs(&self) -> tokio::sync::broadcast::Receiver<DiffBatch<FloorId>> {
        self.cache.subscribe_diffs()
    }

    fn mirror(&self, floor: Floor) -> Result<Arc<Floor>, CoreError> {
        self.cache.set_key_value(floor.id.clone(), floor, false)
    }
}

#[async_trait]
impl BusSubscriber for FloorStore {
    fn name(&self) -> &'static str {
        "floor-store"
    }

    async fn on_printers_deleted(&self, notice: &PrintersDeleted) {
        if let Err(e) = self.handle_printers_deleted(notice).await {
            warn!(
                error = %e,
                printers = notice.printer_ids.len(),
                "failed to remove deleted printers from floors"
            );
        }
    }

    async fn on_lagged(&self, _skipped: u64) {
        match self.reconcile().await {
            Ok(pulled) => debug!(pulled, "floors reconciled after lag"),
            Err(e) => warn!(error = %e, "failed to reconcile floors after lag"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tokio::sync::Notify;

    use super::*;
    use crate::error::RepositoryError;
    use crate::repository::{FloorRepository, InMemoryFloorRepository, InMemoryPrinterRegistry};

    fn store_with(
        floors: Vec<Floor>,
        printers: &[&str],
    ) -> (FloorStore, Arc<InMemoryFloorRepository>) {
        let repo = Arc::new(InMemoryFloorRepository::with_floors(floors));
        let registry = Arc::new(InMemoryPrinterRegistry::with_printers(printers.iter().copied()));
        let service = FloorService::new(Arc::clone(&repo) as Arc<dyn FloorRepository>, registry);
        (FloorStore::new(service, 16), repo)
    }

    fn floor(id: &str, level: u32) -> Floor {
        Floor {
            id: FloorId::new(id),
            name: format!("Floor {level}"),
            level,
            positions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn list_cache_hydrates_lazily() {
        let (store, _) = store_with(vec![floor("f1", 1), floor("f2", 2)], &[]);
        assert_eq!(store.cached_len(), 0);

        let floors = store.list_cache().await.unwrap();
        assert_eq!(floors.len(), 2);
        assert_eq!(store.cached_len(), 2);
    }

    #[tokio::test]
    async fn load_store_is_one_diff_batch() {
        let (store, _) = store_with(vec![floor("f1", 1), floor("f2", 2), floor("f3", 3)], &[]);
        let mut rx = store.subscribe_diffs();

        store.load_store().await.unwrap();

        assert_eq!(rx.try_recv().unwrap().len(), 3);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn get_floor_populates_cache_on_miss() {
        let (store, _) = store_with(vec![floor("f1", 1)], &[]);
        let floor = store.get_floor(&"f1".into()).await.unwrap();
        assert_eq!(floor.level, 1);
        assert_eq!(store.cached_len(), 1);
    }

    #[tokio::test]
    async fn get_unknown_floor_is_not_found() {
        let (store, _) = store_with(vec![], &[]);
        assert!(matches!(
            store.get_floor(&"nope".into()).await,
            Err(CoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn failed_mutation_leaves_cache_untouched() {
        let (store, repo) = store_with(vec![floor("f1", 1)], &[]);
        store.load_store().await.unwrap();

        repo.set_offline(true);
        let err = store
            .update_name(&"f1".into(), "Renamed".into())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Repository(_)));

        let cached = store.get_floor(&"f1".into()).await.unwrap();
        assert_eq!(cached.name, "Floor 1");
    }

    #[tokio::test]
    async fn remove_printer_drops_cache_entry() {
        let mut f1 = floor("f1", 1);
        f1.positions.push(PrinterPosition::new(0, 0, "p1"));
        let (store, _) = store_with(vec![f1], &["p1"]);
        store.load_store().await.unwrap();

        let updated = store
            .remove_printer(&"f1".into(), &"p1".into())
            .await
            .unwrap();
        assert!(updated.positions.is_empty());
        assert_eq!(store.cached_len(), 0);

        let refetched = store.get_floor(&"f1".into()).await.unwrap();
        assert!(refetched.positions.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_from_cache() {
        let (store, _) = store_with(vec![floor("f1", 1), floor("f2", 2)], &[]);
        store.load_store().await.unwrap();

        assert!(store.delete(&"f1".into()).await.unwrap());
        assert!(!store.delete(&"f1".into()).await.unwrap());
        assert_eq!(store.cached_len(), 1);
    }

    #[tokio::test]
    async fn concurrent_placements_on_one_floor_all_land() {
        let printers: Vec<String> = (0..8).map(|i| format!("p{i}")).collect();
        let ids: Vec<&str> = printers.iter().map(String::as_str).collect();
        let (store, repo) = store_with(vec![floor("f1", 1)], &ids);
        let store = Arc::new(store);

        let mut tasks = Vec::new();
        for (i, printer) in printers.iter().enumerate() {
            let store = Arc::clone(&store);
            let position = PrinterPosition::new(u32::try_from(i).unwrap(), 0, printer.as_str());
            tasks.push(tokio::spawn(async move {
                store
                    .add_or_update_printer(&"f1".into(), position)
                    .await
                    .unwrap();
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        let cached = store.get_floor(&"f1".into()).await.unwrap();
        assert_eq!(cached.positions.len(), 8);
        assert_eq!(repo.documents()[0], *cached);
    }

    /// Parks the first `find_one` after reading, until released.
    struct ParkingFloors {
        inner: InMemoryFloorRepository,
        armed: AtomicBool,
        parked: Notify,
        release: Notify,
    }

    #[async_trait]
    impl FloorRepository for ParkingFloors {
        async fn find_all(&self) -> Result<Vec<Floor>, RepositoryError> {
            self.inner.find_all().await
        }

        async fn find_one(&self, id: &FloorId) -> Result<Option<Floor>, RepositoryError> {
            let found = self.inner.find_one(id).await;
            if self.armed.swap(false, Ordering::AcqRel) {
                self.parked.notify_one();
                self.release.notified().await;
            }
            found
        }

        async fn create(&self, floor: Floor) -> Result<Floor, RepositoryError> {
            self.inner.create(floor).await
        }

        async fn save(&self, floor: Floor) -> Result<Floor, RepositoryError> {
            self.inner.save(floor).await
        }

        async fn pull_printer_from_all(
            &self,
            printer_id: &PrinterId,
        ) -> Result<usize, RepositoryError> {
            self.inner.pull_printer_from_all(printer_id).await
        }

        async fn delete_one(&self, id: &FloorId) -> Result<bool, RepositoryError> {
            self.inner.delete_one(id).await
        }
    }

    #[tokio::test]
    async fn slow_miss_does_not_overwrite_a_newer_placement() {
        let repo = Arc::new(ParkingFloors {
            inner: InMemoryFloorRepository::with_floors(vec![floor("f1", 1)]),
            armed: AtomicBool::new(true),
            parked: Notify::new(),
            release: Notify::new(),
        });
        let registry = Arc::new(InMemoryPrinterRegistry::with_printers(["p1"]));
        let service = FloorService::new(Arc::clone(&repo) as Arc<dyn FloorRepository>, registry);
        let store = Arc::new(FloorStore::new(service, 16));

        let reader = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get_floor(&"f1".into()).await.unwrap() })
        };
        // The miss has read the empty floor and is now suspended.
        repo.parked.notified().await;

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .add_or_update_printer(&"f1".into(), PrinterPosition::new(0, 0, "p1"))
                    .await
                    .unwrap()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        repo.release.notify_one();

        reader.await.unwrap();
        let placed = writer.await.unwrap();
        assert_eq!(placed.positions.len(), 1);

        let cached = store.get_floor(&"f1".into()).await.unwrap();
        assert_eq!(cached.positions, vec![PrinterPosition::new(0, 0, "p1")]);
        assert_eq!(repo.inner.documents()[0], *cached);
    }
}
