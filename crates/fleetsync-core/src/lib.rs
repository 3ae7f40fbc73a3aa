// fleetsync-core: Real-time state layer between printer connections and consumers.

pub mod bus;
pub mod cache;
pub mod config;
pub mod error;
pub mod fleet;
pub mod model;
pub mod repository;
pub mod service;
pub mod state;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bus::{BusSubscriber, EventBus, FleetEvent, spawn_bridge};
pub use cache::{CacheDiff, CacheKey, CacheStream, DiffBatch, DiffKind, KeyDiffCache};
pub use config::FleetConfig;
pub use error::{CoreError, RepositoryError};
pub use fleet::{FleetRepositories, FleetState, FleetStatus};
pub use repository::{
    FloorRepository, InMemoryFloorRepository, InMemoryPrinterRegistry, InMemorySettingsRepository,
    PrinterLookup, SettingsRepository,
};
pub use service::{FloorService, SettingsService};
pub use state::{EventCache, FileCache, FloorStore, SettingsStore};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    // Identity
    FloorId, PrinterId,
    // Events
    EventSlot, PrinterEventsCacheDto, PrinterMessage, PrinterTelegram, PrintersDeleted, SlotLabel,
    // Floors
    CreateFloorRequest, Floor, PrinterPosition, UpdateFloorRequest,
    // Files
    FileList, FilePurgeOutcome, PrinterFile, PrinterFileStorage, StorageInfo,
    // Settings
    PublicSettings, SensitiveSettings, Settings,
};
