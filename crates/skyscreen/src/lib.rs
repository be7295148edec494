//! # Skyscreen
//!
//! Application layer over the frame synchronization core: a fixed-rate
//! pattern player, built-in test patterns, output selection and renderer
//! supervision.
//!
//! ## Binaries
//!
//! ```text
//!   pattern_player   drives a pattern into shared / udp / fake output
//!   frame_monitor    reads the shared frame and logs a checksum per frame
//!   stream_receiver  reassembles a UDP stream and logs its statistics
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod clock;
pub mod config;
pub mod patterns;
pub mod player;
pub mod renderer;

pub use clock::{FrameClock, FrameStats, DEFAULT_FRAME_RATE};
pub use config::{OutputMode, PlayerConfig, RendererConfig};
pub use patterns::PatternKind;
pub use player::{run, run_for, PlayerSummary, StopReason};
pub use renderer::RendererProcess;
