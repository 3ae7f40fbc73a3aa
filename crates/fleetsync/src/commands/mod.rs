pub mod config_cmd;
pub mod replay;
pub mod settings;

use std::sync::Arc;

use fleetsync_config::Config;
use fleetsync_core::{
    FleetRepositories, FleetState, Floor, InMemoryFloorRepository, InMemoryPrinterRegistry,
    InMemorySettingsRepository,
};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve config from `--config` or the platform path.
pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let cfg = match &global.config {
        Some(path) => fleetsync_config::load_config_from(path)?,
        None => fleetsync_config::load_config()?,
    };
    Ok(cfg)
}

/// Build and start a fleet over in-memory stores seeded from `cfg`.
pub async fn start_fleet(
    cfg: &Config,
    floors: Vec<Floor>,
    printers: Vec<String>,
) -> Result<FleetState, CliError> {
    let repositories = FleetRepositories {
        floors: Arc::new(InMemoryFloorRepository::with_floors(floors)),
        printers: Arc::new(InMemoryPrinterRegistry::with_printers(printers)),
        settings: Arc::new(InMemorySettingsRepository::with_document(
            cfg.settings.to_settings(),
        )),
    };
    let fleet = FleetState::new(fleetsync_config::to_fleet_config(cfg)?, repositories);
    fleet.start().await?;
    Ok(fleet)
}

pub fn read_file(path: &std::path::Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.display().to_string(),
        source,
    })
}
