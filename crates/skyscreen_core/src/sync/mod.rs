//! # Frame-Ready Signalling
//!
//! The writer says "a full frame is in the buffer"; the reader waits for
//! that before looking. The buffer carries the data, the signal only
//! carries the fact that something changed.
//!
//! ## Backends
//!
//! ```text
//!   NoSync        offline/profiling. Signals are dropped, reads never wait.
//!   MessageBus    TCP publish/subscribe of a generation counter.
//!   NoneRequired  the transport frames itself (network stream).
//! ```
//!
//! The backend is picked at runtime from [`SyncMode`], so pattern code runs
//! unchanged against any of them.

mod message_bus;

pub use message_bus::{MessageBusPublisher, MessageBusSubscriber, PublisherStats};

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SkyError, SkyResult};

/// Which signalling backend a session uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// No cross-process coordination.
    NoSync,
    /// Publish/subscribe over TCP.
    #[default]
    MessageBus,
    /// The transport carries its own framing.
    NoneRequired,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NoSync => "no_sync",
            Self::MessageBus => "message_bus",
            Self::NoneRequired => "none_required",
        })
    }
}

impl std::str::FromStr for SyncMode {
    type Err = SkyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no_sync" => Ok(Self::NoSync),
            "message_bus" => Ok(Self::MessageBus),
            "none_required" => Ok(Self::NoneRequired),
            other => Err(SkyError::InvalidConfig(format!("unknown sync mode '{other}'"))),
        }
    }
}

/// Writer half of a signalling backend.
pub trait WriterSync: Send {
    /// The backend kind.
    fn mode(&self) -> SyncMode;

    /// Announces a complete frame. Must not block.
    ///
    /// # Errors
    ///
    /// Backend-specific transport failures.
    fn frame_ready(&mut self) -> SkyResult<()>;

    /// Number of frames announced so far.
    fn generation(&self) -> u64;
}

/// Reader half of a signalling backend.
pub trait ReaderSync: Send {
    /// The backend kind.
    fn mode(&self) -> SyncMode;

    /// Waits for a frame announced since the last release.
    ///
    /// `None` waits forever. Returns `Ok(false)` if the timeout elapsed.
    ///
    /// # Errors
    ///
    /// Backend-specific transport failures.
    fn wait_for_frame(&mut self, timeout: Option<Duration>) -> SkyResult<bool>;

    /// Marks the current frame consumed.
    ///
    /// # Errors
    ///
    /// Backend-specific transport failures.
    fn release_frame(&mut self) -> SkyResult<()>;
}

/// Offline backend: counts frames, never coordinates.
///
/// Frame contents are the caller's responsibility.
#[derive(Debug, Default)]
pub struct NoSync {
    generation: u64,
}

impl NoSync {
    /// Creates the backend.
    #[must_use]
    pub const fn new() -> Self {
        Self { generation: 0 }
    }
}

impl WriterSync for NoSync {
    fn mode(&self) -> SyncMode {
        SyncMode::NoSync
    }

    fn frame_ready(&mut self) -> SkyResult<()> {
        self.generation += 1;
        Ok(())
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

impl ReaderSync for NoSync {
    fn mode(&self) -> SyncMode {
        SyncMode::NoSync
    }

    fn wait_for_frame(&mut self, _timeout: Option<Duration>) -> SkyResult<bool> {
        Ok(true)
    }

    fn release_frame(&mut self) -> SkyResult<()> {
        Ok(())
    }
}

/// Backend for transports that deliver whole frames themselves.
#[derive(Debug, Default)]
pub struct NoneRequired {
    generation: u64,
}

impl NoneRequired {
    /// Creates the backend.
    #[must_use]
    pub const fn new() -> Self {
        Self { generation: 0 }
    }
}

impl WriterSync for NoneRequired {
    fn mode(&self) -> SyncMode {
        SyncMode::NoneRequired
    }

    fn frame_ready(&mut self) -> SkyResult<()> {
        self.generation += 1;
        Ok(())
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

impl ReaderSync for NoneRequired {
    fn mode(&self) -> SyncMode {
        SyncMode::NoneRequired
    }

    fn wait_for_frame(&mut self, _timeout: Option<Duration>) -> SkyResult<bool> {
        Ok(true)
    }

    fn release_frame(&mut self) -> SkyResult<()> {
        Ok(())
    }
}
