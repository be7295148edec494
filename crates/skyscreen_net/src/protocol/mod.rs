//! # Chunk Protocol
//!
//! A frame is cut into fixed-stride chunks, one per datagram.
//!
//! ## Datagram Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (12 bytes, little-endian)                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Magic (2) │ Index (2) │ Count (2) │ Stride (2) │ FrameId (4) │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Payload (stride bytes, final chunk may be shorter)           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Chunk `i` carries frame bytes `[i·stride, min((i+1)·stride, frame_size))`.
//! There is no retransmission: a lost chunk loses its frame.

mod chunk;
mod reassembly;
mod serialization;

pub use chunk::{is_newer, ChunkHeader, ChunkLayout, CHUNK_MAGIC};
pub use reassembly::{ChunkOutcome, FrameReassembler, ReassemblyStats};
pub use serialization::{decode_chunk, ChunkSerializer};
