//! # Skyscreen Core
//!
//! Frame synchronization between a pattern generator and a renderer for
//! the spinning Skyscreen display.
//!
//! - One frame buffer of `vane_count × vane_length × channel_count` bytes
//! - One writer, any number of readers
//! - `frame_ready()` never blocks the producer
//!
//! ## Architecture
//!
//! ```text
//!   pattern ──▶ WriterSession ──▶ FrameBuffer (shared mapping) ◀── ReaderSession ──▶ renderer
//!                    │                                                  ▲
//!                    └──────── WriterSync ─── frame ready ─── ReaderSync ┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use skyscreen_core::{BufferTarget, FrameSink, Geometry, SyncConfig, WriterSession};
//!
//! let config = SyncConfig::default();
//! let mut writer = WriterSession::from_config(Geometry::SKYSCREEN, BufferTarget::shared(path), &config)?;
//! writer.scoped(|w| {
//!     w.frame_mut()?.fill(0xff);
//!     w.frame_ready()
//! })?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod buffer;
pub mod config;
pub mod error;
pub mod flatspace;
pub mod geometry;
pub mod session;
pub mod sync;

pub use buffer::{BufferMode, FrameBuffer, FrameView, FrameViewMut};
pub use config::{SyncConfig, DEFAULT_SYNC_HOST, DEFAULT_SYNC_PORT};
pub use error::{SkyError, SkyResult};
pub use flatspace::{FlatSpace, FlatSpaceTransform, FlatViewMut};
pub use geometry::Geometry;
pub use session::{BufferTarget, FrameSink, ReadState, ReaderSession, WriterSession};
pub use sync::{
    MessageBusPublisher, MessageBusSubscriber, NoSync, NoneRequired, PublisherStats, ReaderSync,
    SyncMode, WriterSync,
};
