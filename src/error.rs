//! Crate-wide error taxonomy.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DamError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid magic number — not a DAM archive")]
    BadMagic,

    #[error("Unsupported format version {found} (this build supports {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("source path {0:?} does not fit in the fixed-size header")]
    PathTooLong(std::path::PathBuf),

    #[error("read id {0:?} not found in archive")]
    NotFound(String),

    #[error("external tool {command} exited with status {status}{stderr_tail}")]
    ExternalToolError {
        command: String,
        status: String,
        /// Empty when no stderr was captured; otherwise formatted as " — <tail>" by the caller.
        stderr_tail: String,
    },

    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    #[error("unrecognized sequence source extension: {0:?}")]
    UnknownExtension(std::path::PathBuf),
}

pub type Result<T> = std::result::Result<T, DamError>;
