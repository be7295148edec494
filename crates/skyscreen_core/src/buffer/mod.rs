//! # Frame Buffer
//!
//! One frame of bytes, either in process memory or in a memory-mapped file
//! that other processes map too.
//!
//! ## Safety Note
//!
//! Mapping a file is unsafe because another process may change or truncate
//! it underneath us. The writer owns the file's size; readers verify it on
//! open and never resize it.
//!
//! ## Modes
//!
//! ```text
//!   CreateReadWrite  writer: create/truncate, size to frame, zero-fill
//!   OpenReadWrite    existing file, must already be frame-sized
//!   OpenReadOnly     existing file, must already be frame-sized
//! ```
//!
//! Byte-level mutual exclusion is not provided. A reader mapping the same
//! file as a live writer may observe a frame that is half old, half new.

#![allow(unsafe_code)]

mod view;

pub use view::{FrameView, FrameViewMut};

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapMut, MmapOptions};

use crate::error::{SkyError, SkyResult};
use crate::geometry::Geometry;

/// How a shared mapping is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferMode {
    /// Create or truncate the backing file and zero it. Writer side.
    CreateReadWrite,
    /// Map an existing backing file for writing.
    OpenReadWrite,
    /// Map an existing backing file for reading only.
    OpenReadOnly,
}

impl BufferMode {
    /// Whether buffers opened in this mode can be written.
    #[inline]
    #[must_use]
    pub const fn is_writable(self) -> bool {
        !matches!(self, Self::OpenReadOnly)
    }
}

/// Storage behind a frame buffer.
enum Backing {
    /// Process-local heap bytes.
    Local(Box<[u8]>),
    /// Shared read-write mapping.
    Mapped(MmapMut),
    /// Shared read-only mapping.
    MappedReadOnly(Mmap),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Self::Local(bytes) => &bytes[..],
            Self::Mapped(map) => &map[..],
            Self::MappedReadOnly(map) => &map[..],
        }
    }
}

/// A handle to exactly one frame of bytes.
///
/// ## Usage
///
/// ```rust,ignore
/// let mut writer = FrameBuffer::open("/tmp/sky", BufferMode::CreateReadWrite, geometry)?;
/// writer.view_mut()?.fill(7);
///
/// let reader = FrameBuffer::open("/tmp/sky", BufferMode::OpenReadOnly, geometry)?;
/// assert_eq!(reader.view()?.get(0, 0, 0), Some(7));
/// ```
pub struct FrameBuffer {
    geometry: Geometry,
    /// `None` once closed.
    backing: Option<Backing>,
    /// Backing file for shared buffers.
    path: Option<PathBuf>,
    /// `None` for local buffers.
    mode: Option<BufferMode>,
}

impl FrameBuffer {
    /// Allocates a zeroed process-local frame.
    #[must_use]
    pub fn local(geometry: Geometry) -> Self {
        Self {
            geometry,
            backing: Some(Backing::Local(vec![0u8; geometry.frame_byte_size()].into_boxed_slice())),
            path: None,
            mode: None,
        }
    }

    /// Opens a shared mapping backed by the file at `path`.
    ///
    /// # Errors
    ///
    /// - [`SkyError::NotFound`] if an open mode is used and the file is missing.
    /// - [`SkyError::SizeMismatch`] if an existing file is not frame-sized.
    /// - [`SkyError::InvalidGeometry`] for an unusable geometry.
    /// - [`SkyError::Io`] for any other file or mapping failure.
    pub fn open(path: impl AsRef<Path>, mode: BufferMode, geometry: Geometry) -> SkyResult<Self> {
        geometry.validate()?;
        let path = path.as_ref().to_path_buf();
        let size = geometry.frame_byte_size();

        let backing = match mode {
            BufferMode::CreateReadWrite => {
                let file = OpenOptions::new()
                    .create(true)
                    .read(true)
                    .write(true)
                    .truncate(true)
                    .open(&path)
                    .map_err(|e| SkyError::from_fs(&path, e))?;
                // Extending a truncated file zero-fills it.
                file.set_len(size as u64).map_err(|e| SkyError::from_fs(&path, e))?;
                Backing::Mapped(Self::map_rw(&file, size, &path)?)
            }
            BufferMode::OpenReadWrite => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(&path)
                    .map_err(|e| SkyError::from_fs(&path, e))?;
                Self::check_size(&file, size, &path)?;
                Backing::Mapped(Self::map_rw(&file, size, &path)?)
            }
            BufferMode::OpenReadOnly => {
                let file = File::open(&path).map_err(|e| SkyError::from_fs(&path, e))?;
                Self::check_size(&file, size, &path)?;
                // SAFETY: the file has been checked to be frame-sized, and the
                // writer never resizes it while mapped. Concurrent writes are
                // the accepted torn-read case.
                let map = unsafe { MmapOptions::new().len(size).map(&file) }
                    .map_err(|e| SkyError::from_fs(&path, e))?;
                Backing::MappedReadOnly(map)
            }
        };

        tracing::info!("mapped shared frame {} ({:?}, {} bytes)", path.display(), mode, size);

        Ok(Self {
            geometry,
            backing: Some(backing),
            path: Some(path),
            mode: Some(mode),
        })
    }

    fn check_size(file: &File, expected: usize, path: &Path) -> SkyResult<()> {
        let actual = file.metadata().map_err(|e| SkyError::from_fs(path, e))?.len();
        if actual != expected as u64 {
            return Err(SkyError::SizeMismatch {
                expected,
                actual: usize::try_from(actual).unwrap_or(usize::MAX),
            });
        }
        Ok(())
    }

    fn map_rw(file: &File, size: usize, path: &Path) -> SkyResult<MmapMut> {
        // SAFETY: the file is exactly `size` bytes and this process is the
        // only one that resizes it.
        unsafe { MmapOptions::new().len(size).map_mut(file) }.map_err(|e| SkyError::from_fs(path, e))
    }

    /// Removes a backing file. Missing files are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::Io`] if the file exists but cannot be removed.
    pub fn remove(path: impl AsRef<Path>) -> SkyResult<()> {
        let path = path.as_ref();
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SkyError::from_fs(path, e)),
        }
    }

    /// The frame geometry.
    #[inline]
    #[must_use]
    pub const fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Frame length in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.geometry.frame_byte_size()
    }

    /// Always false for a valid geometry.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open mode, or `None` for a local buffer.
    #[inline]
    #[must_use]
    pub const fn mode(&self) -> Option<BufferMode> {
        self.mode
    }

    /// Backing file, or `None` for a local buffer.
    #[inline]
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the buffer lives in a shared mapping.
    #[inline]
    #[must_use]
    pub const fn is_shared(&self) -> bool {
        self.mode.is_some()
    }

    /// Whether the buffer has been closed.
    #[inline]
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.backing.is_none()
    }

    /// Whether the buffer accepts writes.
    #[inline]
    #[must_use]
    pub fn is_writable(&self) -> bool {
        match &self.backing {
            Some(Backing::Local(_) | Backing::Mapped(_)) => true,
            Some(Backing::MappedReadOnly(_)) | None => false,
        }
    }

    /// Raw frame bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::AlreadyClosed`] after [`FrameBuffer::close`].
    pub fn as_bytes(&self) -> SkyResult<&[u8]> {
        self.backing.as_ref().map(Backing::bytes).ok_or(SkyError::AlreadyClosed)
    }

    /// Raw frame bytes, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::AlreadyClosed`] after close and
    /// [`SkyError::ReadOnly`] for read-only mappings.
    pub fn as_bytes_mut(&mut self) -> SkyResult<&mut [u8]> {
        match self.backing.as_mut() {
            Some(Backing::Local(bytes)) => Ok(&mut bytes[..]),
            Some(Backing::Mapped(map)) => Ok(&mut map[..]),
            Some(Backing::MappedReadOnly(_)) => Err(SkyError::ReadOnly),
            None => Err(SkyError::AlreadyClosed),
        }
    }

    /// Polar view over the frame.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::AlreadyClosed`] after close.
    pub fn view(&self) -> SkyResult<FrameView<'_>> {
        let geometry = self.geometry;
        self.as_bytes().map(|bytes| FrameView::new(bytes, geometry))
    }

    /// Mutable polar view over the frame.
    ///
    /// # Errors
    ///
    /// Same conditions as [`FrameBuffer::as_bytes_mut`].
    pub fn view_mut(&mut self) -> SkyResult<FrameViewMut<'_>> {
        let geometry = self.geometry;
        self.as_bytes_mut().map(|bytes| FrameViewMut::new(bytes, geometry))
    }

    /// Pushes dirty pages of a writable mapping to the backing file.
    ///
    /// No-op for local and read-only buffers.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::AlreadyClosed`] after close, or [`SkyError::Io`].
    pub fn flush(&self) -> SkyResult<()> {
        match &self.backing {
            Some(Backing::Mapped(map)) => map.flush().map_err(|e| {
                SkyError::from_fs(self.path.clone().unwrap_or_default(), e)
            }),
            Some(_) => Ok(()),
            None => Err(SkyError::AlreadyClosed),
        }
    }

    /// Releases the mapping. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.backing.take().is_some() {
            if let Some(path) = &self.path {
                tracing::debug!("unmapped shared frame {}", path.display());
            }
        }
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("geometry", &self.geometry)
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("closed", &self.is_closed())
            .finish()
    }
}
