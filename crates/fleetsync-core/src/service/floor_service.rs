// ── Floor business rules ──
//
// Validation and mutation of floor documents over the repository. The
// store above mirrors whatever this returns into the cache.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{
    CreateFloorRequest, Floor, FloorId, PrinterId, PrinterPosition, UpdateFloorRequest,
};
use crate::repository::{FloorRepository, PrinterLookup};

pub const DEFAULT_FLOOR_NAME: &str = "Default Floor";
pub const DEFAULT_FLOOR_LEVEL: u32 = 1;

pub struct FloorService {
    floors: Arc<dyn FloorRepository>,
    printers: Arc<dyn PrinterLookup>,
}

impl FloorService {
    pub fn new(floors: Arc<dyn FloorRepository>, printers: Arc<dyn PrinterLookup>) -> Self {
        Self { floors, printers }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// All floors, with duplicate positions repaired in the returned copy.
    pub async fn list(&self) -> Result<Vec<Floor>, CoreError> {
        let mut floors = self.floors.find_all().await?;
        for floor in &mut floors {
            repair_floor(floor);
        }
        Ok(floors)
    }

    pub async fn get(&self, id: &FloorId) -> Result<Floor, CoreError> {
        let mut floor = self
            .floors
            .find_one(id)
            .await?
            .ok_or_else(|| CoreError::not_found("floor", id))?;
        repair_floor(&mut floor);
        Ok(floor)
    }

    /// Printers placed on some floor that the registry no longer knows.
    pub async fn unregistered_placements(&self) -> Result<Vec<PrinterId>, CoreError> {
        let mut placed = Vec::new();
        for floor in self.floors.find_all().await? {
            for position in floor.positions {
                if !placed.contains(&position.printer_id) {
                    placed.push(position.printer_id);
                }
            }
        }
        Ok(self.printers.unregistered(placed).await?)
    }

    // ── Creation ─────────────────────────────────────────────────────

    pub async fn create(&self, request: CreateFloorRequest) -> Result<Floor, CoreError> {
        validate_name(&request.name)?;
        self.ensure_level_free(request.level, None).await?;

        let mut seen = HashMap::new();
        for position in &request.positions {
            if let Some(other) = seen.insert(position.coordinate(), &position.printer_id) {
                return Err(CoreError::validation(
                    "positions",
                    format!(
                        "printers {other} and {} share ({}, {})",
                        position.printer_id, position.x, position.y
                    ),
                ));
            }
            self.ensure_printer_exists(&position.printer_id).await?;
        }

        let floor = Floor {
            id: FloorId::generate(),
            name: request.name,
            level: request.level,
            positions: request.positions,
        };
        debug!(floor_id = %floor.id, level = floor.level, "creating floor");
        Ok(self.floors.create(floor).await?)
    }

    pub async fn create_default_floor(&self) -> Result<Floor, CoreError> {
        self.create(CreateFloorRequest::new(
            DEFAULT_FLOOR_NAME,
            DEFAULT_FLOOR_LEVEL,
        ))
        .await
    }

    // ── Updates ──────────────────────────────────────────────────────

    pub async fn update(
        &self,
        id: &FloorId,
        request: UpdateFloorRequest,
    ) -> Result<Floor, CoreError> {
        validate_name(&request.name)?;
        let mut floor = self.get(id).await?;
        self.ensure_level_free(request.level, Some(id)).await?;
        floor.name = request.name;
        floor.level = request.level;
        Ok(self.floors.save(floor).await?)
    }

    pub async fn update_name(&self, id: &FloorId, name: String) -> Result<Floor, CoreError> {
        validate_name(&name)?;
        let mut floor = self.get(id).await?;
        floor.name = name;
        Ok(self.floors.save(floor).await?)
    }

    pub async fn update_level(&self, id: &FloorId, level: u32) -> Result<Floor, CoreError> {
        let mut floor = self.get(id).await?;
        self.ensure_level_free(level, Some(id)).await?;
        floor.level = level;
        Ok(self.floors.save(floor).await?)
    }

    /// Place a printer on a floor.
    ///
    /// Whatever sits on the target coordinate is evicted. An existing
    /// placement of the same printer is moved; otherwise one is appended.
    pub async fn add_or_update_printer(
        &self,
        id: &FloorId,
        position: PrinterPosition,
    ) -> Result<Floor, CoreError> {
        let mut floor = self.get(id).await?;
        self.ensure_printer_exists(&position.printer_id).await?;

        floor
            .positions
            .retain(|p| p.coordinate() != position.coordinate() || p.printer_id == position.printer_id);

        match floor
            .positions
            .iter_mut()
            .find(|p| p.printer_id == position.printer_id)
        {
            Some(existing) => *existing = position,
            None => floor.positions.push(position),
        }

        Ok(self.floors.save(floor).await?)
    }

    /// Take a printer off a floor. A printer that is not placed there
    /// leaves the floor unchanged.
    pub async fn remove_printer(
        &self,
        id: &FloorId,
        printer_id: &PrinterId,
    ) -> Result<Floor, CoreError> {
        let mut floor = self.get(id).await?;
        self.ensure_printer_exists(printer_id).await?;

        if !floor.has_printer(printer_id) {
            return Ok(floor);
        }
        floor.positions.retain(|p| &p.printer_id != printer_id);
        Ok(self.floors.save(floor).await?)
    }

    /// Pull a printer from every floor. Returns how many floors matched.
    pub async fn delete_printer_from_any_floor(
        &self,
        printer_id: &PrinterId,
    ) -> Result<usize, CoreError> {
        Ok(self.floors.pull_printer_from_all(printer_id).await?)
    }

    pub async fn delete(&self, id: &FloorId) -> Result<bool, CoreError> {
        Ok(self.floors.delete_one(id).await?)
    }

    // ── Validation helpers ───────────────────────────────────────────

    async fn ensure_level_free(&self, level: u32, except: Option<&FloorId>) -> Result<(), CoreError> {
        let taken = self
            .floors
            .find_all()
            .await?
            .into_iter()
            .any(|f| f.level == level && Some(&f.id) != except);
        if taken {
            return Err(CoreError::validation(
                "level",
                format!("a floor with level {level} already exists"),
            ));
        }
        Ok(())
    }

    async fn ensure_printer_exists(&self, printer_id: &PrinterId) -> Result<(), CoreError> {
        if self.printers.printer_exists(printer_id).await? {
            Ok(())
        } else {
            Err(CoreError::not_found("printer", printer_id))
        }
    }
}

fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::validation("name", "must not be empty"));
    }
    Ok(())
}

/// Drop every position whose coordinate is reused later in the list.
fn repair_floor(floor: &mut Floor) {
    let dropped = dedupe_positions(&mut floor.positions);
    if dropped > 0 {
        warn!(
            floor_id = %floor.id,
            dropped,
            "floor had printers sharing a coordinate; keeping the last of each"
        );
    }
}

/// Keep the last position per coordinate, preserving order. Returns how
/// many were removed.
pub(crate) fn dedupe_positions(positions: &mut Vec<PrinterPosition>) -> usize {
    let last: HashMap<(u32, u32), usize> = positions
        .iter()
        .enumerate()
        .map(|(i, p)| (p.coordinate(), i))
        .collect();

    let before = positions.len();
    let mut index = 0;
    positions.retain(|p| {
        let keep = last.get(&p.coordinate()) == Some(&index);
        index += 1;
        keep
    });
    before - positions.len()
}
