use anyhow::Context;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::window_list::WindowEntry;
use crate::window_system::WindowHandle;

const ORDER_FILE_NAME: &str = "window_order.txt";

#[derive(Debug, Error)]
pub enum OrderStoreError {
    #[error("failed to create directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write window order to {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read window order from {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedEntry {
    pub handle: WindowHandle,
    pub title: String,
}

/// Snapshot of the list order as it was last saved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedOrder {
    pub entries: Vec<PersistedEntry>,
}

impl PersistedOrder {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Saved window order: a count line, then one `handle|title` line per entry.
/// Handles are raw OS identities and must be re-validated after loading.
pub struct OrderStore {
    path: PathBuf,
}

impl OrderStore {
    pub fn new(path: PathBuf) -> Self {
        OrderStore { path }
    }

    /// `<data_local_dir>/tabs-controller/window_order.txt`
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .context("Could not determine data directory")?;

        Ok(data_dir.join("tabs-controller").join(ORDER_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the order of `entries`.
    ///
    /// An empty list is never written, so a transient enumeration failure
    /// cannot clobber a good saved order. Returns whether a file was written.
    pub fn save(&self, entries: &[WindowEntry]) -> Result<bool, OrderStoreError> {
        if entries.is_empty() {
            debug!("Window list is empty, keeping saved order untouched");
            return Ok(false);
        }

        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).map_err(|source| OrderStoreError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        // Write-then-rename so an interrupted save leaves the old file intact
        let tmp_path = self.path.with_extension("tmp");
        let write_err = |source| OrderStoreError::Write {
            path: self.path.clone(),
            source,
        };
        fs::write(&tmp_path, encode(entries)).map_err(write_err)?;
        fs::rename(&tmp_path, &self.path).map_err(write_err)?;

        debug!("Saved order of {} windows to {}", entries.len(), self.path.display());
        Ok(true)
    }

    /// Load the saved order.
    ///
    /// A missing file or malformed content yields an empty order; only real
    /// I/O failures are reported as errors.
    pub fn load(&self) -> Result<PersistedOrder, OrderStoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No saved window order at {}", self.path.display());
                return Ok(PersistedOrder::default());
            }
            Err(source) => {
                return Err(OrderStoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let order = decode(&bytes);
        info!("Read {} saved window entries from {}", order.len(), self.path.display());
        Ok(order)
    }
}

/// Line breaks inside a title would split the record, so they become spaces.
fn sanitize_title(title: &str) -> String {
    title.replace(['\r', '\n'], " ")
}

pub fn encode(entries: &[WindowEntry]) -> String {
    let mut out = format!("{}\n", entries.len());
    for entry in entries {
        out.push_str(&format!("{}|{}\n", entry.handle, sanitize_title(&entry.title)));
    }
    out
}

/// Parse a saved order, skipping every record that does not decode cleanly.
///
/// The record is split at the first `|`, so titles may contain the
/// delimiter. At most `count` records are accepted, and a repeated handle
/// keeps its first occurrence.
pub fn decode(bytes: &[u8]) -> PersistedOrder {
    let mut lines = bytes.split(|b| *b == b'\n');

    let count = lines
        .next()
        .and_then(|line| std::str::from_utf8(line).ok())
        .and_then(|line| line.trim().parse::<i64>().ok());
    let count = match count {
        Some(n) if n > 0 => n as usize,
        _ => {
            warn!("Saved window order has no valid count, ignoring it");
            return PersistedOrder::default();
        }
    };

    let mut entries: Vec<PersistedEntry> = Vec::new();
    for line in lines {
        if entries.len() >= count {
            break;
        }

        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let Some(delimiter) = line.iter().position(|b| *b == b'|') else {
            continue;
        };

        let handle = std::str::from_utf8(&line[..delimiter])
            .ok()
            .and_then(|s| s.parse::<WindowHandle>().ok());
        let Some(handle) = handle else {
            debug!("Skipping saved entry with invalid handle");
            continue;
        };

        let Ok(title) = String::from_utf8(line[delimiter + 1..].to_vec()) else {
            debug!("Skipping saved entry {} with undecodable title", handle);
            continue;
        };

        if entries.iter().any(|e| e.handle == handle) {
            continue;
        }
        entries.push(PersistedEntry { handle, title });
    }

    PersistedOrder { entries }
}
