//! Error types for xenia-manager

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for xenia-manager
#[derive(Error, Debug)]
pub enum XmError {
    #[error("VFS error: {0}")]
    Vfs(#[from] VfsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

/// Virtual file system errors (disc images, packages, executables)
#[derive(Error, Debug)]
pub enum VfsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file extension: {0:?}")]
    UnsupportedExtension(PathBuf),

    #[error("File not found: {0:?}")]
    FileNotFound(PathBuf),

    /// Disc information was requested before layout detection succeeded.
    #[error("Sector decoder is not initialized")]
    NotInitialized,

    #[error("Container is not mounted")]
    NotMounted,

    #[error("No file has been opened")]
    NotOpened,

    #[error("Container has been disposed")]
    Disposed,

    #[error("Truncated {what}: need {needed} bytes at offset 0x{offset:x}, {available} available")]
    Truncated {
        what: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Failed to read sector {sector}")]
    SectorRead { sector: u64 },

    #[error("No known XGD layout found")]
    UnknownLayout,

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Invalid {what} magic: {found}")]
    InvalidMagic { what: &'static str, found: String },
}

impl VfsError {
    /// Build a [`VfsError::Truncated`] for a read of `needed` bytes at `offset`
    pub fn truncated(what: &'static str, offset: usize, needed: usize, available: usize) -> Self {
        Self::Truncated {
            what,
            offset,
            needed,
            available,
        }
    }
}

/// Result type alias for xenia-manager operations
pub type Result<T> = std::result::Result<T, XmError>;
