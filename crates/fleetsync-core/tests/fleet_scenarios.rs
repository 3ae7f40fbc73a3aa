#![allow(clippy::unwrap_used)]

// End-to-end scenarios: telegrams and fleet notices go through the bus
// into the stores, exactly as a live deployment wires them.

use std::sync::Arc;

use fleetsync_core::model::{DebugSettings, ServerSettingsPatch};
use fleetsync_core::{
    CreateFloorRequest, Floor, FleetConfig, FleetRepositories, FleetState, FloorId,
    InMemoryFloorRepository, InMemoryPrinterRegistry, InMemorySettingsRepository, PrinterFile,
    PrinterFileStorage, PrinterPosition, PrinterTelegram, PrintersDeleted, StorageInfo,
};
use pretty_assertions::assert_eq;
use serde_json::json;

struct Harness {
    fleet: FleetState,
    floors: Arc<InMemoryFloorRepository>,
    printers: Arc<InMemoryPrinterRegistry>,
}

async fn harness(floors: Vec<Floor>, printers: &[&str]) -> Harness {
    harness_with(FleetConfig::default(), floors, printers).await
}

async fn harness_with(config: FleetConfig, floors: Vec<Floor>, printers: &[&str]) -> Harness {
    let floor_repo = Arc::new(InMemoryFloorRepository::with_floors(floors));
    let registry = Arc::new(InMemoryPrinterRegistry::with_printers(printers.iter().copied()));
    let repos = FleetRepositories {
        floors: floor_repo.clone(),
        printers: registry.clone(),
        settings: Arc::new(InMemorySettingsRepository::new()),
    };
    let fleet = FleetState::new(config, repos);
    fleet.start().await.unwrap();
    Harness {
        fleet,
        floors: floor_repo,
        printers: registry,
    }
}

#[tokio::test]
async fn current_then_plugin_builds_one_record() {
    let h = harness(Vec::new(), &[]).await;

    h.fleet
        .publish_telegram(PrinterTelegram::new("p1", "current", json!({ "temp": 200 })));
    h.fleet.publish_telegram(PrinterTelegram::new(
        "p1",
        "plugin",
        json!({ "plugin": "x", "data": 1 }),
    ));
    h.fleet.flush().await;

    let record = h
        .fleet
        .events()
        .get_printer_socket_events(&"p1".into())
        .unwrap();
    assert_eq!(record.current.as_ref().unwrap().payload, json!({ "temp": 200 }));
    assert_eq!(
        record.plugin["x"].payload,
        json!({ "plugin": "x", "data": 1 })
    );
    assert!(record.history.is_none());
    assert!(record.timelapse.is_none());
    assert!(record.event.is_empty());

    h.fleet.shutdown().await;
}

#[tokio::test]
async fn fleet_deletion_removes_known_and_unknown_printers() {
    let h = harness(Vec::new(), &[]).await;

    h.fleet
        .publish_telegram(PrinterTelegram::new("p1", "current", json!({})));
    h.fleet.publish_printers_deleted(PrintersDeleted {
        printer_ids: vec!["p1".into(), "p2".into()],
    });
    h.fleet.flush().await;

    let events = h.fleet.events();
    assert!(events.get_printer_socket_events(&"p1".into()).is_none());
    assert!(events.get_printer_socket_events(&"p2".into()).is_none());
    assert!(events.is_empty());

    h.fleet.shutdown().await;
}

#[tokio::test]
async fn history_payload_is_pruned() {
    let h = harness(Vec::new(), &[]).await;

    h.fleet.publish_telegram(PrinterTelegram::new(
        "p1",
        "history",
        json!({
            "logs": ["Send: M105"],
            "temps": [{ "tool0": 200 }],
            "messages": ["ok"],
            "state": { "text": "Operational" }
        }),
    ));
    h.fleet.flush().await;

    let record = h
        .fleet
        .events()
        .get_printer_socket_events(&"p1".into())
        .unwrap();
    let payload = &record.history.as_ref().unwrap().payload;
    for field in ["logs", "temps", "messages"] {
        assert!(payload.get(field).is_none(), "{field} survived pruning");
    }
    assert_eq!(payload["state"]["text"], "Operational");

    h.fleet.shutdown().await;
}

#[tokio::test]
async fn interleaved_printers_do_not_contaminate_each_other() {
    let h = harness(Vec::new(), &[]).await;

    for i in 0..20 {
        let (printer, other) = if i % 2 == 0 { ("p1", "p2") } else { ("p2", "p1") };
        h.fleet.publish_telegram(PrinterTelegram::new(
            printer,
            "current",
            json!({ "seq": i, "printer": printer }),
        ));
        h.fleet.publish_telegram(PrinterTelegram::new(
            printer,
            "event",
            json!({ "type": format!("from-{printer}"), "payload": { "not": other } }),
        ));
    }
    h.fleet.flush().await;

    for printer in ["p1", "p2"] {
        let record = h
            .fleet
            .events()
            .get_printer_socket_events(&printer.into())
            .unwrap();
        assert_eq!(record.current.as_ref().unwrap().payload["printer"], printer);
        assert_eq!(record.event.len(), 1);
        assert!(record.event.contains_key(&format!("from-{printer}")));
    }

    h.fleet.shutdown().await;
}

#[tokio::test]
async fn empty_store_gets_default_floor() {
    let h = harness(Vec::new(), &[]).await;

    let floors = h.fleet.floors().list_cache().await.unwrap();
    assert_eq!(floors.len(), 1);
    assert_eq!(floors[0].name, "Default Floor");
    assert_eq!(floors[0].level, 1);
    assert_eq!(h.floors.documents().len(), 1);

    h.fleet.shutdown().await;
}

#[tokio::test]
async fn same_coordinate_keeps_later_printer() {
    let h = harness(Vec::new(), &["a", "b"]).await;
    let floors = h.fleet.floors();

    let floor = floors
        .create(CreateFloorRequest::new("Workshop", 2))
        .await
        .unwrap();
    floors
        .add_or_update_printer(&floor.id, PrinterPosition::new(1, 1, "a"))
        .await
        .unwrap();
    let updated = floors
        .add_or_update_printer(&floor.id, PrinterPosition::new(1, 1, "b"))
        .await
        .unwrap();

    assert_eq!(updated.positions, vec![PrinterPosition::new(1, 1, "b")]);
    let cached = floors.get_floor(&floor.id).await.unwrap();
    assert_eq!(cached.positions, updated.positions);

    h.fleet.shutdown().await;
}

#[tokio::test]
async fn stored_duplicates_are_repaired_in_cache_only() {
    let damaged = Floor {
        id: FloorId::new("f1"),
        name: "Ground".into(),
        level: 0,
        positions: vec![
            PrinterPosition::new(0, 0, "old"),
            PrinterPosition::new(0, 0, "new"),
        ],
    };
    let h = harness(vec![damaged], &[]).await;

    let cached = h.fleet.floors().get_floor(&"f1".into()).await.unwrap();
    assert_eq!(cached.positions, vec![PrinterPosition::new(0, 0, "new")]);
    assert_eq!(h.floors.documents()[0].positions.len(), 2);

    h.fleet.shutdown().await;
}

#[tokio::test]
async fn printer_deletion_cascades_to_floors_and_files() {
    let mut f1 = Floor {
        id: FloorId::new("f1"),
        name: "Ground".into(),
        level: 0,
        positions: vec![PrinterPosition::new(0, 0, "p1")],
    };
    let mut f2 = f1.clone();
    f2.id = FloorId::new("f2");
    f2.level = 1;
    f1.positions.push(PrinterPosition::new(1, 0, "p2"));
    let h = harness(vec![f1, f2], &["p1", "p2"]).await;

    h.fleet
        .files()
        .cache_printer_file_storage(
            "p1".into(),
            PrinterFileStorage {
                file_list: fleetsync_core::FileList {
                    files: vec![PrinterFile::new("cube.gcode")],
                    folders: Vec::new(),
                },
                storage: Some(StorageInfo {
                    free: 1,
                    total: 2,
                }),
            },
        )
        .unwrap();
    assert_eq!(h.fleet.files().total_file_count(), 1);

    h.printers.deregister(&"p1".into());
    h.fleet.publish_printers_deleted(PrintersDeleted {
        printer_ids: vec!["p1".into()],
    });
    h.fleet.flush().await;

    let floors = h.fleet.floors().list_cache().await.unwrap();
    assert_eq!(floors.len(), 2);
    assert!(floors.iter().all(|f| !f.has_printer(&"p1".into())));
    assert!(floors[0].has_printer(&"p2".into()));
    assert_eq!(h.fleet.files().total_file_count(), 0);

    h.fleet.shutdown().await;
}

#[tokio::test]
async fn lagged_bridges_still_drop_deleted_printers() {
    let config = FleetConfig {
        event_channel_capacity: 2,
        ..FleetConfig::default()
    };
    let floor = Floor {
        id: FloorId::new("f1"),
        name: "Ground".into(),
        level: 0,
        positions: vec![PrinterPosition::new(0, 0, "p1"), PrinterPosition::new(1, 0, "p2")],
    };
    let h = harness_with(config, vec![floor], &["p1", "p2"]).await;

    h.fleet
        .publish_telegram(PrinterTelegram::new("p1", "current", json!({})));
    h.fleet.flush().await;
    h.fleet
        .files()
        .cache_printer_files(
            "p1".into(),
            fleetsync_core::FileList {
                files: vec![PrinterFile::new("cube.gcode")],
                folders: Vec::new(),
            },
        )
        .unwrap();

    // The notice is overwritten before any bridge gets to run.
    h.printers.deregister(&"p1".into());
    h.fleet.publish_printers_deleted(PrintersDeleted {
        printer_ids: vec!["p1".into()],
    });
    for temp in 0..4 {
        h.fleet
            .publish_telegram(PrinterTelegram::new("p2", "current", json!({ "temp": temp })));
    }
    h.fleet.flush().await;

    let events = h.fleet.events();
    assert!(events.get_printer_socket_events(&"p1".into()).is_none());
    let p2 = events.get_printer_socket_events(&"p2".into()).unwrap();
    assert_eq!(p2.current.as_ref().unwrap().payload, json!({ "temp": 3 }));

    assert!(h.fleet.files().get_printer_file_storage(&"p1".into()).is_none());
    assert_eq!(h.fleet.files().total_file_count(), 0);

    let floors = h.fleet.floors().list_cache().await.unwrap();
    assert!(!floors[0].has_printer(&"p1".into()));
    assert!(floors[0].has_printer(&"p2".into()));
    assert!(!h.floors.documents()[0].has_printer(&"p1".into()));

    h.fleet.shutdown().await;
}

#[tokio::test]
async fn debug_flag_can_be_toggled_while_running() {
    let h = harness(Vec::new(), &[]).await;
    let settings = h.fleet.settings();

    settings
        .update_server_settings(ServerSettingsPatch {
            debug_settings: Some(DebugSettings {
                debug_socket_messages: true,
            }),
            ..ServerSettingsPatch::default()
        })
        .await
        .unwrap();
    assert!(settings.debug_socket_messages().unwrap());

    h.fleet
        .publish_telegram(PrinterTelegram::new("p1", "current", json!({ "temp": 1 })));
    h.fleet.flush().await;
    assert_eq!(h.fleet.events().len(), 1);

    h.fleet.shutdown().await;
}

#[tokio::test]
async fn outage_keeps_cached_reads_servable() {
    let h = harness(
        vec![Floor {
            id: FloorId::new("f1"),
            name: "Ground".into(),
            level: 0,
            positions: Vec::new(),
        }],
        &[],
    )
    .await;

    h.floors.set_offline(true);
    assert!(h
        .fleet
        .floors()
        .update_name(&"f1".into(), "Basement".into())
        .await
        .is_err());

    let cached = h.fleet.floors().get_floor(&"f1".into()).await.unwrap();
    assert_eq!(cached.name, "Ground");

    h.fleet.shutdown().await;
}
