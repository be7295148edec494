//! # Frame Reassembly
//!
//! Collects chunks into whole frames on the receiving side.
//!
//! ## Rules
//!
//! ```text
//!   bad magic / shape         → malformed, ignored
//!   id ≤ latest completed     → stale, ignored
//!   id == pending             → stored (duplicates ignored)
//!   id  > pending             → pending frame dropped, new frame started
//!   all chunks present        → becomes the latest frame
//! ```
//!
//! Only whole frames are ever published; a frame with a missing chunk is
//! simply never completed.

use skyscreen_core::{FrameView, Geometry, SkyError, SkyResult};

use super::chunk::{is_newer, ChunkLayout};
use super::serialization::decode_chunk;

/// Reassembly counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReassemblyStats {
    /// Frames fully reassembled.
    pub frames_completed: u64,
    /// Incomplete frames discarded for a newer one.
    pub frames_dropped: u64,
    /// Chunks stored.
    pub chunks_accepted: u64,
    /// Datagrams with a bad header or shape.
    pub chunks_malformed: u64,
    /// Chunks of frames older than the latest one.
    pub chunks_stale: u64,
    /// Chunks already stored for the pending frame.
    pub chunks_duplicate: u64,
}

/// What happened to one datagram.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Stored; its frame is still incomplete.
    Stored,
    /// Stored and completed the frame with this id.
    Completed(u32),
    /// Ignored (malformed, stale or duplicate).
    Ignored,
}

struct PendingFrame {
    frame_id: u32,
    received: Vec<bool>,
    received_count: usize,
}

/// Reassembles chunked frames of one geometry.
pub struct FrameReassembler {
    geometry: Geometry,
    layout: ChunkLayout,
    pending_bytes: Box<[u8]>,
    pending: Option<PendingFrame>,
    latest_bytes: Box<[u8]>,
    latest_id: Option<u32>,
    stats: ReassemblyStats,
}

impl FrameReassembler {
    /// Creates a reassembler for frames of `geometry` cut by `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::InvalidConfig`] if the layout does not describe
    /// frames of `geometry`.
    pub fn new(geometry: Geometry, layout: ChunkLayout) -> SkyResult<Self> {
        if layout.frame_size() != geometry.frame_byte_size() {
            return Err(SkyError::InvalidConfig(format!(
                "chunk layout is for {} byte frames, geometry needs {}",
                layout.frame_size(),
                geometry.frame_byte_size()
            )));
        }
        let size = geometry.frame_byte_size();
        Ok(Self {
            geometry,
            layout,
            pending_bytes: vec![0u8; size].into_boxed_slice(),
            pending: None,
            latest_bytes: vec![0u8; size].into_boxed_slice(),
            latest_id: None,
            stats: ReassemblyStats::default(),
        })
    }

    /// Feeds one datagram.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::PartialFrameDropped`] when this datagram started
    /// a newer frame while an older one was incomplete. The datagram itself
    /// has still been stored, and may even have completed its frame; check
    /// [`FrameReassembler::latest_frame_id`].
    pub fn push(&mut self, datagram: &[u8]) -> SkyResult<ChunkOutcome> {
        let Some((header, payload)) = decode_chunk(datagram) else {
            self.stats.chunks_malformed += 1;
            return Ok(ChunkOutcome::Ignored);
        };
        if !self.layout.accepts(&header, payload.len()) {
            self.stats.chunks_malformed += 1;
            return Ok(ChunkOutcome::Ignored);
        }

        let frame_id = header.frame_id;
        if let Some(latest) = self.latest_id {
            if !is_newer(frame_id, latest) {
                self.stats.chunks_stale += 1;
                return Ok(ChunkOutcome::Ignored);
            }
        }

        let mut dropped = None;
        match self.pending.as_ref().map(|p| (p.frame_id, p.received_count)) {
            Some((pending_id, _)) if pending_id == frame_id => {}
            Some((pending_id, _)) if !is_newer(frame_id, pending_id) => {
                self.stats.chunks_stale += 1;
                return Ok(ChunkOutcome::Ignored);
            }
            Some((pending_id, received)) => {
                dropped = Some(SkyError::PartialFrameDropped {
                    frame_id: pending_id,
                    received,
                    expected: self.layout.chunk_count(),
                });
                self.stats.frames_dropped += 1;
                self.pending = Some(self.start_frame(frame_id));
            }
            None => self.pending = Some(self.start_frame(frame_id)),
        }

        let outcome = self.store(usize::from(header.chunk_index), payload);
        match dropped {
            Some(err) => Err(err),
            None => Ok(outcome),
        }
    }

    fn start_frame(&self, frame_id: u32) -> PendingFrame {
        PendingFrame {
            frame_id,
            received: vec![false; self.layout.chunk_count()],
            received_count: 0,
        }
    }

    fn store(&mut self, index: usize, payload: &[u8]) -> ChunkOutcome {
        let Some(pending) = self.pending.as_mut() else {
            return ChunkOutcome::Ignored;
        };
        if pending.received[index] {
            self.stats.chunks_duplicate += 1;
            return ChunkOutcome::Ignored;
        }

        self.pending_bytes[self.layout.chunk_range(index)].copy_from_slice(payload);
        pending.received[index] = true;
        pending.received_count += 1;
        self.stats.chunks_accepted += 1;

        if pending.received_count < self.layout.chunk_count() {
            return ChunkOutcome::Stored;
        }

        let frame_id = pending.frame_id;
        self.pending = None;
        std::mem::swap(&mut self.pending_bytes, &mut self.latest_bytes);
        self.latest_id = Some(frame_id);
        self.stats.frames_completed += 1;
        ChunkOutcome::Completed(frame_id)
    }

    /// Last fully reassembled frame.
    #[must_use]
    pub fn latest_frame(&self) -> Option<FrameView<'_>> {
        self.latest_id.map(|_| FrameView::new(&self.latest_bytes, self.geometry))
    }

    /// Id of the last fully reassembled frame.
    #[inline]
    #[must_use]
    pub const fn latest_frame_id(&self) -> Option<u32> {
        self.latest_id
    }

    /// Id of the frame currently being collected.
    #[must_use]
    pub fn pending_frame_id(&self) -> Option<u32> {
        self.pending.as_ref().map(|p| p.frame_id)
    }

    /// Chunk layout in use.
    #[inline]
    #[must_use]
    pub const fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    /// Counters.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> &ReassemblyStats {
        &self.stats
    }
}
