//! # Skyscreen Error Types
//!
//! All errors that can occur while mapping, signalling or streaming frames.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the frame synchronization layer.
#[derive(Error, Debug)]
pub enum SkyError {
    /// The backing region of a shared mapping does not exist.
    #[error("shared frame not found: {}", path.display())]
    NotFound {
        /// Path of the missing backing file.
        path: PathBuf,
    },

    /// An existing backing region has the wrong size for the geometry.
    #[error("frame size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch {
        /// Size required by the geometry.
        expected: usize,
        /// Size actually found.
        actual: usize,
    },

    /// A session was entered while already open.
    #[error("session is already open")]
    AlreadyOpen,

    /// A buffer or session was used after it was closed.
    #[error("buffer or session is closed")]
    AlreadyClosed,

    /// The read protocol was broken by the caller.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// Mutable access was requested through a read-only mapping.
    #[error("frame buffer is mapped read-only")]
    ReadOnly,

    /// Socket bind/connect/send/receive failure.
    #[error("transport error while {context}: {source}")]
    Transport {
        /// What the transport was doing.
        context: &'static str,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// An incomplete chunk set was discarded by the stream receiver.
    #[error("partial frame {frame_id} dropped: {received}/{expected} chunks")]
    PartialFrameDropped {
        /// Id of the discarded frame.
        frame_id: u32,
        /// Chunks that did arrive.
        received: usize,
        /// Chunks the frame needed.
        expected: usize,
    },

    /// Geometry dimensions are unusable.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A network destination could not be parsed or resolved.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// File-system failure on a backing file.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Backing file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl SkyError {
    /// Wraps a socket error with what was being attempted.
    #[must_use]
    pub fn transport(context: &'static str, source: io::Error) -> Self {
        Self::Transport { context, source }
    }

    /// Maps a file error, turning `NotFound` into [`SkyError::NotFound`].
    #[must_use]
    pub fn from_fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    /// True for errors the stream receiver absorbs instead of surfacing.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::PartialFrameDropped { .. })
    }
}

/// Result type for frame synchronization operations.
pub type SkyResult<T> = Result<T, SkyError>;
