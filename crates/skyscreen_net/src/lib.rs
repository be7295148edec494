//! # Skyscreen Net
//!
//! Streams frames over UDP for renderers that cannot map the writer's
//! frame file, e.g. on another machine.
//!
//! - **Protocol**: 12-byte chunk header, fixed stride (< 1200 byte datagrams)
//! - **Transport**: plain UDP, no retransmission
//! - **Reassembly**: whole frames only; incomplete frames are dropped
//!
//! ## Example
//!
//! ```rust,ignore
//! use skyscreen_core::{FrameSink, Geometry};
//! use skyscreen_net::{NetworkStreamWriter, StreamConfig};
//!
//! let mut writer = NetworkStreamWriter::connect(&StreamConfig::default(), Geometry::SKYSCREEN)?;
//! writer.frame_mut()?.fill(0x20);
//! writer.frame_ready()?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod protocol;
pub mod stream;
pub mod transport;

pub use config::{StreamConfig, StreamTarget, DEFAULT_MAX_DATAGRAM_SIZE, DEFAULT_STREAM_PORT};
pub use protocol::{
    ChunkHeader, ChunkLayout, ChunkOutcome, ChunkSerializer, FrameReassembler, ReassemblyStats,
};
pub use stream::{NetworkStreamReceiver, NetworkStreamWriter};
pub use transport::{TransportStats, UdpTransport};
