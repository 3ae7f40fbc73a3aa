// ── Backing-store boundary ──
//
// The core only ever talks to persistence through these traits. Every
// method returns `RepositoryError`; the stores above pass it through
// unchanged.

mod in_memory;

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::model::{Floor, FloorId, PrinterId, Settings};

pub use in_memory::{InMemoryFloorRepository, InMemoryPrinterRegistry, InMemorySettingsRepository};

/// Floor document store.
#[async_trait]
pub trait FloorRepository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Floor>, RepositoryError>;

    async fn find_one(&self, id: &FloorId) -> Result<Option<Floor>, RepositoryError>;

    /// Insert a new document. Fails with `Conflict` if the id is taken.
    async fn create(&self, floor: Floor) -> Result<Floor, RepositoryError>;

    /// Overwrite (or insert) a document and return what was stored.
    async fn save(&self, floor: Floor) -> Result<Floor, RepositoryError>;

    /// Remove every placement of `printer_id` across all floors.
    ///
    /// Returns how many documents matched; which ones is not reported.
    async fn pull_printer_from_all(&self, printer_id: &PrinterId)
    -> Result<usize, RepositoryError>;

    /// Returns whether a document was deleted.
    async fn delete_one(&self, id: &FloorId) -> Result<bool, RepositoryError>;
}

/// Answers whether a printer is registered in the fleet.
#[async_trait]
pub trait PrinterLookup: Send + Sync {
    async fn printer_exists(&self, id: &PrinterId) -> Result<bool, RepositoryError>;

    /// The subset of `ids` that is not registered, in input order.
    async fn unregistered(&self, ids: Vec<PrinterId>) -> Result<Vec<PrinterId>, RepositoryError> {
        let mut missing = Vec::new();
        for id in ids {
            if !self.printer_exists(&id).await? {
                missing.push(id);
            }
        }
        Ok(missing)
    }
}

/// Single-document settings store.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Return the stored document, creating it with defaults if absent.
    async fn get_or_create(&self) -> Result<Settings, RepositoryError>;

    async fn save(&self, settings: Settings) -> Result<Settings, RepositoryError>;
}
