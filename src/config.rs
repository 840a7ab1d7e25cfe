//! Export configuration
//!
//! Options are plain serde structs so they can be kept next to a project as
//! JSON and handed to the CLI with `--config`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrimlineError};

/// Default copy buffer used when exporting
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Export configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Bytes copied per read while exporting (default: 8192)
    pub buffer_size: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ExportOptions {
    /// Create options with the given copy buffer size
    pub fn new(buffer_size: usize) -> Self {
        ExportOptions { buffer_size }
    }

    /// Small buffers, for exporting next to a playback thread
    pub fn low_memory() -> Self {
        ExportOptions { buffer_size: 1024 }
    }

    /// Large buffers, for batch exports
    pub fn throughput() -> Self {
        ExportOptions {
            buffer_size: 64 * 1024,
        }
    }

    /// Load options from a JSON file; missing fields take their defaults.
    ///
    /// # Errors
    /// * `FileNotFound` - if `path` does not exist
    /// * `Serialization` - if the file is not valid JSON
    /// * `InvalidArgument` - if the options fail validation
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(TrimlineError::FileNotFound {
                path: path.display().to_string(),
                source: None,
            });
        }

        let file = File::open(path)?;
        let options: ExportOptions = serde_json::from_reader(BufReader::new(file))?;
        options.validate()?;

        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(TrimlineError::invalid_argument(
                "export buffer size must be at least 1 byte",
            ));
        }
        Ok(())
    }
}
