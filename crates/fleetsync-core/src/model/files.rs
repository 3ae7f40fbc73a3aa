// ── Printer file storage types ──

use serde::{Deserialize, Serialize};

/// One file reported by a printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterFile {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    /// Upload time, Unix seconds.
    #[serde(default)]
    pub date: Option<i64>,
}

impl PrinterFile {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(&path).to_owned();
        Self {
            path,
            name,
            display: None,
            size: None,
            date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterFolder {
    pub path: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<PrinterFile>,
    #[serde(default)]
    pub folders: Vec<PrinterFolder>,
}

/// Storage capacity figures, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInfo {
    pub free: u64,
    pub total: u64,
}

/// Last known file list and storage of one printer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterFileStorage {
    pub file_list: FileList,
    pub storage: Option<StorageInfo>,
}

/// Result of removing one file from a printer's cached list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilePurgeOutcome {
    Removed,
    FileNotFound,
}
