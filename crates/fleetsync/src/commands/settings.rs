//! `fleetsync settings`: the document a fresh start would load.

use crate::cli::{GlobalOpts, SettingsArgs};
use crate::commands::{load_config, start_fleet};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: &SettingsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = load_config(global)?;
    let fleet = start_fleet(&cfg, Vec::new(), Vec::new()).await?;

    let store = fleet.settings();
    let rendered = if args.sensitive {
        output::render_single(&global.output, &store.get_settings_sensitive()?)?
    } else {
        output::render_single(&global.output, &store.get_settings()?)?
    };
    fleet.shutdown().await;

    output::print_output(&rendered, global.quiet);
    Ok(())
}
