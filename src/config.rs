//! Configuration for SlotDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, SlotError};

/// Main configuration for a record store instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for the store's files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── {name}.db     (record data file)
    ///     └── {name}.idx    (B+Tree index file)
    pub data_dir: PathBuf,

    /// Base name shared by the data and index files
    pub name: String,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// fsync both files after every mutating operation
    ///
    /// Writes always reach the OS before an operation returns; this only
    /// controls whether they are also forced to stable storage.
    pub sync_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./slotdb_data"),
            name: "records".to_string(),
            sync_writes: false,
        }
    }
}

impl Config {
    const DATA_EXTENSION: &'static str = "db";
    const INDEX_EXTENSION: &'static str = "idx";

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Path of the record data file
    pub fn data_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", self.name, Self::DATA_EXTENSION))
    }

    /// Path of the B+Tree index file
    pub fn index_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", self.name, Self::INDEX_EXTENSION))
    }

    /// Reject configurations that cannot name a file
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SlotError::Config("store name must not be empty".to_string()));
        }
        if self.name.contains(|c| c == '/' || c == '\\') {
            return Err(SlotError::Config(format!(
                "store name must not contain path separators: {:?}",
                self.name
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the base file name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Force an fsync after every mutating operation
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.config.sync_writes = sync;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
