//! `fleetsync replay`: push a telegram recording through the bus.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;
use tracing::{debug, warn};

use fleetsync_core::{FleetState, Floor, PrinterEventsCacheDto, PrinterId};

use crate::cli::{GlobalOpts, ReplayArgs, ReplayView};
use crate::commands::{load_config, read_file, start_fleet};
use crate::error::CliError;
use crate::output::{self, mark};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrinterRecord {
    printer_id: PrinterId,
    #[serde(flatten)]
    events: Arc<PrinterEventsCacheDto>,
}

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Printer")]
    printer: String,
    #[tabled(rename = "Current")]
    current: &'static str,
    #[tabled(rename = "History")]
    history: &'static str,
    #[tabled(rename = "Timelapse")]
    timelapse: &'static str,
    #[tabled(rename = "Events")]
    events: usize,
    #[tabled(rename = "Plugins")]
    plugins: usize,
}

#[derive(Tabled)]
struct FloorRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Level")]
    level: u32,
    #[tabled(rename = "Printers")]
    printers: String,
}

#[derive(Debug, Default)]
struct ReplayStats {
    published: usize,
    skipped: usize,
}

pub async fn handle(args: ReplayArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = load_config(global)?;
    let recording = read_file(&args.recording)?;
    let floors: Vec<Floor> = match &args.floors {
        Some(path) => serde_json::from_str(&read_file(path)?)?,
        None => Vec::new(),
    };

    let fleet = start_fleet(&cfg, floors, args.printers).await?;
    let stats = replay(&fleet, &recording).await;
    if !global.quiet {
        eprintln!(
            "replayed {} messages ({} skipped)",
            stats.published, stats.skipped
        );
    }

    let rendered = match args.view {
        ReplayView::Events => render_events(&fleet, global)?,
        ReplayView::Floors => render_floors(&fleet, global).await?,
    };
    fleet.shutdown().await;

    output::print_output(&rendered, global.quiet);
    Ok(())
}

async fn replay(fleet: &FleetState, recording: &str) -> ReplayStats {
    // Flush before the bridges could fall a whole buffer behind.
    let window = (fleet.config().event_channel_capacity / 2).max(1);
    let mut stats = ReplayStats::default();

    for (index, line) in recording.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if fleet.bus().publish_raw(line) {
            stats.published += 1;
            if stats.published % window == 0 {
                fleet.flush().await;
            }
        } else {
            warn!(line = index + 1, "skipping unrecognised message");
            stats.skipped += 1;
        }
    }

    fleet.flush().await;
    debug!(?stats, "replay complete");
    stats
}

fn render_events(fleet: &FleetState, global: &GlobalOpts) -> Result<String, CliError> {
    let events = fleet.events();
    let mut ids = events.printer_ids();
    ids.sort();
    let records: Vec<PrinterRecord> = ids
        .into_iter()
        .filter_map(|printer_id| {
            events
                .get_printer_socket_events(&printer_id)
                .map(|events| PrinterRecord { printer_id, events })
        })
        .collect();

    output::render_list(
        &global.output,
        &records,
        |r| EventRow {
            printer: r.printer_id.to_string(),
            current: mark(r.events.current.is_some()),
            history: mark(r.events.history.is_some()),
            timelapse: mark(r.events.timelapse.is_some()),
            events: r.events.event.len(),
            plugins: r.events.plugin.len(),
        },
        |r| r.printer_id.to_string(),
    )
}

async fn render_floors(fleet: &FleetState, global: &GlobalOpts) -> Result<String, CliError> {
    let mut floors = fleet.floors().list_cache().await?;
    floors.sort_by_key(|f| f.level);

    output::render_list(
        &global.output,
        &floors,
        |f| FloorRow {
            id: f.id.to_string(),
            name: f.name.clone(),
            level: f.level,
            printers: f
                .positions
                .iter()
                .map(|p| format!("{}@{},{}", p.printer_id, p.x, p.y))
                .collect::<Vec<_>>()
                .join(" "),
        },
        |f| f.id.to_string(),
    )
}
