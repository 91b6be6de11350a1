//! Error types returned by the volume manager.
//!
//! The core exposes a single error enum covering the five kinds a caller can
//! observe; none of them are retried internally (propagation policy is the
//! caller's responsibility).

use thiserror::Error;

/// Errors produced by [`crate::manager::VolumeManager`] operations.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// The supplied filename failed validation (empty, too long, blank, or
    /// not printable ASCII).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No live entry exists with the given name.
    #[error("not found")]
    NotFound,

    /// A live entry with the given name already exists.
    #[error("already exists")]
    AlreadyExists,

    /// No free inode slot, or not enough free blocks to satisfy the request.
    #[error("no space")]
    NoSpace,

    /// A chain walk encountered an impossible node value.
    #[error("corrupt volume: {0}")]
    Corrupt(String),

    /// The backing file's positional read/write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VolumeError>;
