// ── Domain model ──

pub mod events;
pub mod files;
pub mod floor;
pub mod ids;
pub mod settings;

pub use events::{
    EventSlot, PrinterEventsCacheDto, PrinterMessage, PrinterTelegram, PrintersDeleted, SlotLabel,
};
pub use files::{
    FileList, FilePurgeOutcome, PrinterFile, PrinterFileStorage, PrinterFolder, StorageInfo,
};
pub use floor::{
    CreateFloorRequest, Floor, PrinterPosition, RemovePrinterRequest, UpdateFloorLevelRequest,
    UpdateFloorNameRequest, UpdateFloorRequest,
};
pub use ids::{FloorId, PrinterId};
pub use settings::{
    CURRENT_WIZARD_VERSION, CredentialSettings, CredentialSettingsPatch, DebugSettings,
    FileCleanSettings, FileCleanSettingsPatch, FrontendSettings, PublicSettings,
    SensitiveSettings, ServerSettings, ServerSettingsPatch, Settings, TimeoutSettings,
    WizardSettings, WizardState,
};
