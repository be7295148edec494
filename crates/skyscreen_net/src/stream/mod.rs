//! # Frame Streaming
//!
//! ```text
//!   pattern ──▶ NetworkStreamWriter ──UDP chunks──▶ NetworkStreamReceiver ──▶ consumer
//! ```
//!
//! The writer is a [`skyscreen_core::FrameSink`], so any pattern that runs
//! against a shared mapping runs unchanged against the network.

mod receiver;
mod writer;

pub use receiver::NetworkStreamReceiver;
pub use writer::NetworkStreamWriter;
