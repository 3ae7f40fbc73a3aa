// ── Floor domain types ──

use serde::{Deserialize, Serialize};

use super::ids::{FloorId, PrinterId};

/// A printer placed at a grid coordinate on a floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterPosition {
    pub x: u32,
    pub y: u32,
    pub printer_id: PrinterId,
}

impl PrinterPosition {
    pub fn new(x: u32, y: u32, printer_id: impl Into<PrinterId>) -> Self {
        Self {
            x,
            y,
            printer_id: printer_id.into(),
        }
    }

    pub fn coordinate(&self) -> (u32, u32) {
        (self.x, self.y)
    }
}

/// Denormalized floor record.
///
/// No two positions share a coordinate; `level` is unique across floors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Floor {
    pub id: FloorId,
    pub name: String,
    pub level: u32,
    #[serde(default)]
    pub positions: Vec<PrinterPosition>,
}

impl Floor {
    pub fn has_printer(&self, printer_id: &PrinterId) -> bool {
        self.positions.iter().any(|p| &p.printer_id == printer_id)
    }
}

// ── Requests ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFloorRequest {
    pub name: String,
    pub level: u32,
    #[serde(default)]
    pub positions: Vec<PrinterPosition>,
}

impl CreateFloorRequest {
    pub fn new(name: impl Into<String>, level: u32) -> Self {
        Self {
            name: name.into(),
            level,
            positions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFloorRequest {
    pub name: String,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFloorNameRequest {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFloorLevelRequest {
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovePrinterRequest {
    pub printer_id: PrinterId,
}
