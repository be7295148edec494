//! # Chunk Serialization
//!
//! - The serializer reuses one datagram buffer for every chunk
//! - The header is copied as a Pod, payload follows unaltered

use bytemuck::bytes_of;

use super::chunk::{ChunkHeader, ChunkLayout};

/// Writes chunks into a pre-allocated datagram buffer.
///
/// Designed to be reused across frames to avoid allocations.
pub struct ChunkSerializer {
    layout: ChunkLayout,
    buffer: Vec<u8>,
}

impl ChunkSerializer {
    /// Creates a serializer for frames of `layout`.
    #[must_use]
    pub fn new(layout: ChunkLayout) -> Self {
        Self { layout, buffer: Vec::with_capacity(ChunkHeader::SIZE + layout.stride()) }
    }

    /// The layout in use.
    #[inline]
    #[must_use]
    pub const fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    /// Returns the current datagram.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Serializes chunk `index` of `frame` and returns the datagram.
    ///
    /// # Panics
    ///
    /// Panics if `frame` is not exactly one frame long.
    pub fn serialize(&mut self, frame: &[u8], frame_id: u32, index: usize) -> &[u8] {
        assert_eq!(frame.len(), self.layout.frame_size(), "frame has wrong size");
        let header = self.layout.header(index, frame_id).to_wire();
        self.buffer.clear();
        self.buffer.extend_from_slice(bytes_of(&header));
        self.buffer.extend_from_slice(&frame[self.layout.chunk_range(index)]);
        &self.buffer
    }
}

/// Splits a datagram into header and payload.
///
/// Returns `None` if it is too short to hold a header. The header is not
/// validated beyond that.
#[must_use]
pub fn decode_chunk(datagram: &[u8]) -> Option<(ChunkHeader, &[u8])> {
    if datagram.len() < ChunkHeader::SIZE {
        return None;
    }
    let (head, payload) = datagram.split_at(ChunkHeader::SIZE);
    let header: ChunkHeader = bytemuck::try_pod_read_unaligned(head).ok()?;
    Some((header.from_wire(), payload))
}
