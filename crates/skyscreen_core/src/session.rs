//! # Writer/Reader Sessions
//!
//! A session binds one frame buffer to one signalling backend for the
//! span between `enter()` and `exit()`.
//!
//! ## State Machine
//!
//! ```text
//!            enter()                  exit() / drop
//!   Closed ───────────▶ Open ──────────────────────▶ Closed
//!                        │
//!   (reader only)        │  start_read()     finish_read()
//!                      Idle ─────────▶ Reading ─────────▶ Idle
//! ```
//!
//! - Entering an open session is `AlreadyOpen`.
//! - Using a closed session is `AlreadyClosed`.
//! - `start_read` while `Reading`, or `finish_read` while `Idle`, is a
//!   `ProtocolViolation`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut writer = WriterSession::new(geometry, BufferTarget::shared(path), config.writer_sync()?);
//! writer.scoped(|w| loop {
//!     w.frame_mut()?.fill(7);
//!     w.frame_ready()?;
//! })?;
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::buffer::{BufferMode, FrameBuffer, FrameView, FrameViewMut};
use crate::config::SyncConfig;
use crate::error::{SkyError, SkyResult};
use crate::geometry::Geometry;
use crate::sync::{ReaderSync, SyncMode, WriterSync};

/// Where a session's frame lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BufferTarget {
    /// Process-local memory. Only useful with no-sync runs.
    Local,
    /// A backing file shared with other processes.
    Shared {
        /// Backing file.
        path: PathBuf,
        /// Open mode. `None` uses the session's default.
        mode: Option<BufferMode>,
    },
}

impl BufferTarget {
    /// Shared target at `path`, opened with the session's default mode.
    #[must_use]
    pub fn shared(path: impl Into<PathBuf>) -> Self {
        Self::Shared { path: path.into(), mode: None }
    }

    /// Shared target at `path` with an explicit mode.
    #[must_use]
    pub fn shared_with_mode(path: impl Into<PathBuf>, mode: BufferMode) -> Self {
        Self::Shared { path: path.into(), mode: Some(mode) }
    }

    fn open(&self, default_mode: BufferMode, geometry: Geometry) -> SkyResult<FrameBuffer> {
        match self {
            Self::Local => {
                geometry.validate()?;
                Ok(FrameBuffer::local(geometry))
            }
            Self::Shared { path, mode } => {
                FrameBuffer::open(path, mode.unwrap_or(default_mode), geometry)
            }
        }
    }

    fn mode_or(&self, default_mode: BufferMode) -> BufferMode {
        match self {
            Self::Shared { mode: Some(mode), .. } => *mode,
            _ => default_mode,
        }
    }
}

/// Anything a pattern generator can draw into.
///
/// Implemented by [`WriterSession`], the network stream writer and the
/// flat-space transform, so generators never care about the transport.
pub trait FrameSink {
    /// Shape of the frames this sink accepts.
    fn geometry(&self) -> Geometry;

    /// Mutable view of the frame being drawn.
    ///
    /// # Errors
    ///
    /// Fails if the sink is closed.
    fn frame_mut(&mut self) -> SkyResult<FrameViewMut<'_>>;

    /// Declares the frame complete. Call once per full frame, never mid-write.
    ///
    /// # Errors
    ///
    /// Fails if the sink is closed or its transport fails.
    fn frame_ready(&mut self) -> SkyResult<()>;
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
    fn geometry(&self) -> Geometry {
        (**self).geometry()
    }

    fn frame_mut(&mut self) -> SkyResult<FrameViewMut<'_>> {
        (**self).frame_mut()
    }

    fn frame_ready(&mut self) -> SkyResult<()> {
        (**self).frame_ready()
    }
}

/// Producer side of the shared frame.
pub struct WriterSession {
    geometry: Geometry,
    target: BufferTarget,
    sync: Box<dyn WriterSync>,
    buffer: Option<FrameBuffer>,
    frames_written: u64,
}

impl WriterSession {
    /// Creates a closed session. Shared targets are created read-write on `enter()`.
    #[must_use]
    pub fn new(geometry: Geometry, target: BufferTarget, sync: Box<dyn WriterSync>) -> Self {
        Self {
            geometry,
            target,
            sync,
            buffer: None,
            frames_written: 0,
        }
    }

    /// Creates a closed session with the backend described by `config`.
    ///
    /// # Errors
    ///
    /// Fails if the backend cannot be built (e.g. the bus port is taken).
    pub fn from_config(geometry: Geometry, target: BufferTarget, config: &SyncConfig) -> SkyResult<Self> {
        Ok(Self::new(geometry, target, config.writer_sync()?))
    }

    /// Opens the buffer.
    ///
    /// # Errors
    ///
    /// [`SkyError::AlreadyOpen`] if open, [`SkyError::ReadOnly`] for a
    /// read-only mode, or any buffer open error.
    pub fn enter(&mut self) -> SkyResult<()> {
        if self.buffer.is_some() {
            return Err(SkyError::AlreadyOpen);
        }
        if !self.target.mode_or(BufferMode::CreateReadWrite).is_writable() {
            return Err(SkyError::ReadOnly);
        }
        self.buffer = Some(self.target.open(BufferMode::CreateReadWrite, self.geometry)?);
        tracing::debug!("writer session entered ({})", self.sync.mode());
        Ok(())
    }

    /// Releases the buffer. No-op when already closed.
    pub fn exit(&mut self) {
        if let Some(mut buffer) = self.buffer.take() {
            if let Err(e) = buffer.flush() {
                tracing::warn!("flushing frame on exit failed: {}", e);
            }
            buffer.close();
            tracing::debug!("writer session exited after {} frame(s)", self.frames_written);
        }
    }

    /// Runs `f` inside `enter()`/`exit()`. Exit happens even when `f` fails.
    ///
    /// # Errors
    ///
    /// Propagates the enter error or `f`'s error.
    pub fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> SkyResult<T>) -> SkyResult<T> {
        self.enter()?;
        let result = f(self);
        self.exit();
        result
    }

    /// Whether the session is open.
    #[inline]
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.buffer.is_some()
    }

    /// The open buffer, if any.
    #[inline]
    #[must_use]
    pub const fn buffer(&self) -> Option<&FrameBuffer> {
        self.buffer.as_ref()
    }

    /// Backend kind.
    #[must_use]
    pub fn sync_mode(&self) -> SyncMode {
        self.sync.mode()
    }

    /// Frames announced through this session.
    #[inline]
    #[must_use]
    pub const fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl FrameSink for WriterSession {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn frame_mut(&mut self) -> SkyResult<FrameViewMut<'_>> {
        self.buffer.as_mut().ok_or(SkyError::AlreadyClosed)?.view_mut()
    }

    fn frame_ready(&mut self) -> SkyResult<()> {
        if self.buffer.is_none() {
            return Err(SkyError::AlreadyClosed);
        }
        self.sync.frame_ready()?;
        self.frames_written += 1;
        Ok(())
    }
}

impl Drop for WriterSession {
    fn drop(&mut self) {
        self.exit();
    }
}

/// Where a reader is in the read protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadState {
    /// Between frames.
    Idle,
    /// Holding a frame from `start_read()`.
    Reading,
}

/// Consumer side of the shared frame.
pub struct ReaderSession {
    geometry: Geometry,
    target: BufferTarget,
    sync: Box<dyn ReaderSync>,
    buffer: Option<FrameBuffer>,
    state: ReadState,
    frames_read: u64,
}

impl ReaderSession {
    /// Creates a closed session. Shared targets are mapped read-only on `enter()`.
    #[must_use]
    pub fn new(geometry: Geometry, target: BufferTarget, sync: Box<dyn ReaderSync>) -> Self {
        Self {
            geometry,
            target,
            sync,
            buffer: None,
            state: ReadState::Idle,
            frames_read: 0,
        }
    }

    /// Creates a closed session with the backend described by `config`.
    ///
    /// # Errors
    ///
    /// Fails if the backend cannot be built.
    pub fn from_config(geometry: Geometry, target: BufferTarget, config: &SyncConfig) -> SkyResult<Self> {
        Ok(Self::new(geometry, target, config.reader_sync()?))
    }

    /// Opens the buffer.
    ///
    /// # Errors
    ///
    /// [`SkyError::AlreadyOpen`] if open, or any buffer open error
    /// (`NotFound`, `SizeMismatch`, ...).
    pub fn enter(&mut self) -> SkyResult<()> {
        if self.buffer.is_some() {
            return Err(SkyError::AlreadyOpen);
        }
        self.buffer = Some(self.target.open(BufferMode::OpenReadOnly, self.geometry)?);
        self.state = ReadState::Idle;
        tracing::debug!("reader session entered ({})", self.sync.mode());
        Ok(())
    }

    /// Releases the buffer, abandoning any frame being read.
    pub fn exit(&mut self) {
        if let Some(mut buffer) = self.buffer.take() {
            if self.state == ReadState::Reading {
                let _ = self.sync.release_frame();
                self.state = ReadState::Idle;
            }
            buffer.close();
            tracing::debug!("reader session exited after {} frame(s)", self.frames_read);
        }
    }

    /// Runs `f` inside `enter()`/`exit()`. Exit happens even when `f` fails.
    ///
    /// # Errors
    ///
    /// Propagates the enter error or `f`'s error.
    pub fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> SkyResult<T>) -> SkyResult<T> {
        self.enter()?;
        let result = f(self);
        self.exit();
        result
    }

    fn begin_read(&mut self, timeout: Option<Duration>) -> SkyResult<bool> {
        if self.buffer.is_none() {
            return Err(SkyError::AlreadyClosed);
        }
        if self.state == ReadState::Reading {
            return Err(SkyError::ProtocolViolation("start_read called while already reading"));
        }
        if !self.sync.wait_for_frame(timeout)? {
            return Ok(false);
        }
        self.state = ReadState::Reading;
        self.frames_read += 1;
        Ok(true)
    }

    /// Waits for a new frame and returns it.
    ///
    /// Blocks under the message bus until a frame is announced; returns
    /// immediately otherwise.
    ///
    /// # Errors
    ///
    /// [`SkyError::AlreadyClosed`], [`SkyError::ProtocolViolation`] when
    /// already reading, or a transport failure.
    pub fn start_read(&mut self) -> SkyResult<FrameView<'_>> {
        self.begin_read(None)?;
        self.frame()
    }

    /// Like [`ReaderSession::start_read`], but gives up after `timeout`.
    ///
    /// Returns `Ok(None)` and stays `Idle` when no frame arrived.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ReaderSession::start_read`].
    pub fn start_read_timeout(&mut self, timeout: Duration) -> SkyResult<Option<FrameView<'_>>> {
        if self.begin_read(Some(timeout))? {
            self.frame().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Current buffer contents, without touching the protocol state.
    ///
    /// # Errors
    ///
    /// [`SkyError::AlreadyClosed`] when the session is closed.
    pub fn frame(&self) -> SkyResult<FrameView<'_>> {
        self.buffer.as_ref().ok_or(SkyError::AlreadyClosed)?.view()
    }

    /// Finishes the frame from the last `start_read()`.
    ///
    /// # Errors
    ///
    /// [`SkyError::AlreadyClosed`], or [`SkyError::ProtocolViolation`]
    /// without a matching `start_read()`.
    pub fn finish_read(&mut self) -> SkyResult<()> {
        if self.buffer.is_none() {
            return Err(SkyError::AlreadyClosed);
        }
        if self.state == ReadState::Idle {
            return Err(SkyError::ProtocolViolation("finish_read without start_read"));
        }
        self.sync.release_frame()?;
        self.state = ReadState::Idle;
        Ok(())
    }

    /// Whether the session is open.
    #[inline]
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.buffer.is_some()
    }

    /// Protocol state.
    #[inline]
    #[must_use]
    pub const fn read_state(&self) -> ReadState {
        self.state
    }

    /// Frame geometry.
    #[inline]
    #[must_use]
    pub const fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Backend kind.
    #[must_use]
    pub fn sync_mode(&self) -> SyncMode {
        self.sync.mode()
    }

    /// Frames obtained through `start_read()`.
    #[inline]
    #[must_use]
    pub const fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        self.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::NoSync;

    fn geometry() -> Geometry {
        Geometry::new(4, 4, 3).unwrap()
    }

    fn writer() -> WriterSession {
        WriterSession::new(geometry(), BufferTarget::Local, Box::new(NoSync::new()))
    }

    fn reader() -> ReaderSession {
        ReaderSession::new(geometry(), BufferTarget::Local, Box::new(NoSync::new()))
    }

    #[test]
    fn test_double_enter_is_already_open() {
        let mut session = writer();
        session.enter().unwrap();
        assert!(matches!(session.enter(), Err(SkyError::AlreadyOpen)));
    }

    #[test]
    fn test_closed_writer_rejects_use() {
        let mut session = writer();
        assert!(matches!(session.frame_mut(), Err(SkyError::AlreadyClosed)));
        assert!(matches!(session.frame_ready(), Err(SkyError::AlreadyClosed)));

        session.enter().unwrap();
        session.exit();
        session.exit();
        assert!(!session.is_open());
        assert!(matches!(session.frame_ready(), Err(SkyError::AlreadyClosed)));
    }

    #[test]
    fn test_scoped_exits_on_error() {
        let mut session = writer();
        let result: SkyResult<()> = session.scoped(|w| {
            w.frame_mut()?.fill(1);
            w.frame_ready()?;
            Err(SkyError::ProtocolViolation("pattern gave up"))
        });
        assert!(matches!(result, Err(SkyError::ProtocolViolation(_))));
        assert!(!session.is_open());
        assert_eq!(session.frames_written(), 1);

        // Can be entered again afterwards.
        session.enter().unwrap();
    }

    #[test]
    fn test_read_only_writer_refuses_to_enter() {
        let mut session = WriterSession::new(
            geometry(),
            BufferTarget::shared_with_mode("/nonexistent/frame", BufferMode::OpenReadOnly),
            Box::new(NoSync::new()),
        );
        assert!(matches!(session.enter(), Err(SkyError::ReadOnly)));
    }

    #[test]
    fn test_reader_protocol_state_machine() {
        let mut session = reader();
        assert!(matches!(session.start_read(), Err(SkyError::AlreadyClosed)));

        session.enter().unwrap();
        assert!(matches!(session.finish_read(), Err(SkyError::ProtocolViolation(_))));

        assert_eq!(session.start_read().unwrap().len(), 48);
        assert_eq!(session.read_state(), ReadState::Reading);
        assert!(matches!(session.start_read(), Err(SkyError::ProtocolViolation(_))));

        session.finish_read().unwrap();
        assert_eq!(session.read_state(), ReadState::Idle);
        assert!(session.start_read_timeout(Duration::ZERO).unwrap().is_some());
        assert_eq!(session.frames_read(), 2);
    }

    #[test]
    fn test_exit_abandons_read() {
        let mut session = reader();
        session.enter().unwrap();
        let _ = session.start_read().unwrap();
        session.exit();
        assert_eq!(session.read_state(), ReadState::Idle);
        assert!(matches!(session.finish_read(), Err(SkyError::AlreadyClosed)));
    }

    #[test]
    fn test_sink_through_mut_reference() {
        fn draw(mut sink: impl FrameSink) -> SkyResult<()> {
            sink.frame_mut()?.fill(3);
            sink.frame_ready()
        }

        let mut session = writer();
        session.enter().unwrap();
        draw(&mut session).unwrap();
        assert!(session.buffer().unwrap().as_bytes().unwrap().iter().all(|&b| b == 3));
    }
}
