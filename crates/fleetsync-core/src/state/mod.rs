// ── Stateful stores over the key-diff cache ──

mod file_cache;
mod floor_store;
mod printer_events;
mod settings_store;

pub use file_cache::FileCache;
pub use floor_store::FloorStore;
pub use printer_events::EventCache;
pub use settings_store::SettingsStore;
