//! Persistence of the configured entry
//!
//! The entry (token, price zone, metering point, currency) survives restarts
//! so discovery runs only once. The price cache itself is never persisted.

use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};
use crate::setup::EntryData;
use std::path::{Path, PathBuf};

/// JSON file holding the configured entry
pub struct EntryStore {
    file_path: PathBuf,
    logger: StructuredLogger,
}

impl EntryStore {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            logger: get_logger("persistence"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Load the stored entry; `None` when nothing was stored yet
    pub fn load(&self) -> Result<Option<EntryData>> {
        if !self.file_path.exists() {
            self.logger.info("No stored entry found");
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.file_path)?;
        let entry: EntryData = serde_json::from_str(&contents)?;
        self.logger
            .info(&format!("Loaded stored entry for {}", entry.title));
        Ok(Some(entry))
    }

    pub fn save(&self, entry: &EntryData) -> Result<()> {
        if let Some(parent) = self.file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entry)?;
        std::fs::write(&self.file_path, contents)?;
        self.logger.debug("Saved entry to disk");
        Ok(())
    }

    /// Forget the entry
    pub fn remove(&self) -> Result<()> {
        if self.file_path.exists() {
            std::fs::remove_file(&self.file_path)?;
            self.logger.info("Removed stored entry");
        }
        Ok(())
    }
}
