//! # Chunk Definitions
//!
//! One datagram carries one slice of one frame. The header is plain old
//! data so it can be copied straight in and out of the datagram.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use skyscreen_core::{SkyError, SkyResult};

/// Marks a datagram as a Skyscreen chunk ("SS").
pub const CHUNK_MAGIC: u16 = 0x5353;

/// Chunk header - present in every datagram.
///
/// Total size: 12 bytes, little-endian on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ChunkHeader {
    /// Always [`CHUNK_MAGIC`].
    pub magic: u16,
    /// Position of this chunk within its frame.
    pub chunk_index: u16,
    /// Chunks in the frame.
    pub chunk_count: u16,
    /// Payload bytes of every chunk but the last.
    pub stride: u16,
    /// Wrapping frame counter.
    pub frame_id: u32,
}

impl ChunkHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 12;

    /// Creates a header with the magic set.
    #[inline]
    #[must_use]
    pub const fn new(chunk_index: u16, chunk_count: u16, stride: u16, frame_id: u32) -> Self {
        Self { magic: CHUNK_MAGIC, chunk_index, chunk_count, stride, frame_id }
    }

    /// Whether the magic matches.
    #[inline]
    #[must_use]
    pub const fn has_magic(&self) -> bool {
        self.magic == CHUNK_MAGIC
    }

    /// Byte-swaps to wire order. Identity on little-endian hosts.
    #[inline]
    #[must_use]
    pub const fn to_wire(self) -> Self {
        Self {
            magic: self.magic.to_le(),
            chunk_index: self.chunk_index.to_le(),
            chunk_count: self.chunk_count.to_le(),
            stride: self.stride.to_le(),
            frame_id: self.frame_id.to_le(),
        }
    }

    /// Inverse of [`ChunkHeader::to_wire`].
    #[inline]
    #[must_use]
    pub const fn from_wire(self) -> Self {
        Self {
            magic: u16::from_le(self.magic),
            chunk_index: u16::from_le(self.chunk_index),
            chunk_count: u16::from_le(self.chunk_count),
            stride: u16::from_le(self.stride),
            frame_id: u32::from_le(self.frame_id),
        }
    }
}

/// How a frame of a given size is cut into chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkLayout {
    frame_size: usize,
    stride: usize,
    chunk_count: usize,
}

impl ChunkLayout {
    /// Layout for `frame_size` bytes in datagrams of at most `max_datagram_size`.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::InvalidConfig`] if the datagram cannot hold a
    /// header plus payload, or if the header fields would overflow.
    pub fn new(frame_size: usize, max_datagram_size: usize) -> SkyResult<Self> {
        if frame_size == 0 {
            return Err(SkyError::InvalidConfig("frame size must be non-zero".to_string()));
        }
        if max_datagram_size <= ChunkHeader::SIZE {
            return Err(SkyError::InvalidConfig(format!(
                "max datagram size {max_datagram_size} leaves no room for payload"
            )));
        }
        let stride = max_datagram_size - ChunkHeader::SIZE;
        if stride > usize::from(u16::MAX) {
            return Err(SkyError::InvalidConfig(format!("chunk stride {stride} exceeds 65535")));
        }
        let chunk_count = frame_size.div_ceil(stride);
        if chunk_count > usize::from(u16::MAX) {
            return Err(SkyError::InvalidConfig(format!(
                "{chunk_count} chunks per frame exceeds 65535"
            )));
        }
        Ok(Self { frame_size, stride, chunk_count })
    }

    /// Frame size in bytes.
    #[inline]
    #[must_use]
    pub const fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Payload bytes per non-final chunk.
    #[inline]
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Chunks per frame.
    #[inline]
    #[must_use]
    pub const fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Frame bytes carried by chunk `index`.
    #[inline]
    #[must_use]
    pub fn chunk_range(&self, index: usize) -> Range<usize> {
        let start = (index * self.stride).min(self.frame_size);
        let end = (start + self.stride).min(self.frame_size);
        start..end
    }

    /// Header for chunk `index` of frame `frame_id`.
    #[inline]
    #[must_use]
    pub fn header(&self, index: usize, frame_id: u32) -> ChunkHeader {
        // Both fit in u16, checked in `new`.
        ChunkHeader::new(index as u16, self.chunk_count as u16, self.stride as u16, frame_id)
    }

    /// Whether a received header and payload belong to a frame of this layout.
    #[must_use]
    pub fn accepts(&self, header: &ChunkHeader, payload_len: usize) -> bool {
        let index = usize::from(header.chunk_index);
        header.has_magic()
            && usize::from(header.chunk_count) == self.chunk_count
            && usize::from(header.stride) == self.stride
            && index < self.chunk_count
            && self.chunk_range(index).len() == payload_len
    }
}

/// Whether frame id `a` comes after `b`, allowing for wrap-around.
#[inline]
#[must_use]
pub const fn is_newer(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}
