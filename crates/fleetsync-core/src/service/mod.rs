// ── Domain services over the repositories ──

mod floor_service;
mod settings_service;

pub use floor_service::{DEFAULT_FLOOR_LEVEL, DEFAULT_FLOOR_NAME, FloorService};
pub use settings_service::SettingsService;
