//! On-disk completion flag.
//!
//! The flag is a one-line text file. Writes go through `write_atomic`, so a
//! crash never leaves a half-written flag behind.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::{BootstrapError, Result};
use crate::fsutil::{write_atomic, WriteOptions};
use crate::types::flag::CompletionFlag;
use crate::types::outcome::ResourceStatus;

const FLAG_MODE: u32 = 0o644;

#[derive(Debug, Clone)]
pub struct FlagFile {
    path: PathBuf,
}

impl FlagFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FlagFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state. A missing file reads as `NotInitialized`.
    pub fn read(&self) -> Result<CompletionFlag> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(CompletionFlag::NotInitialized)
            }
            Err(source) => {
                return Err(BootstrapError::FlagRead {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        content.parse().map_err(|_| BootstrapError::FlagCorrupt {
            path: self.path.clone(),
            content: content.trim().to_string(),
        })
    }

    pub fn write(&self, flag: CompletionFlag) -> Result<ResourceStatus> {
        let content = format!("{}\n", flag);
        write_atomic(&self.path, content.as_bytes(), &WriteOptions::mode(FLAG_MODE)).map_err(
            |source| BootstrapError::RenderWriteFailure {
                path: self.path.clone(),
                source,
            },
        )
    }

    /// Create the flag as `NotInitialized` if it does not exist yet. An
    /// existing flag is never touched.
    pub fn ensure_present(&self) -> Result<ResourceStatus> {
        if self.path.exists() {
            return Ok(ResourceStatus::Unchanged);
        }
        self.write(CompletionFlag::NotInitialized)
    }
}
