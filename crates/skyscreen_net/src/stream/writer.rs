//! Sending side of the UDP stream.

use std::net::SocketAddr;

use skyscreen_core::{
    FrameSink, FrameViewMut, Geometry, NoneRequired, SkyResult, SyncMode, WriterSync,
};

use crate::config::StreamConfig;
use crate::protocol::ChunkSerializer;
use crate::transport::{TransportStats, UdpTransport};

/// Streams every announced frame to one destination.
///
/// Patterns draw into a local frame; `frame_ready()` cuts it into chunks
/// and sends them all. The datagrams carry their own framing, so no
/// separate signalling is needed.
pub struct NetworkStreamWriter {
    geometry: Geometry,
    transport: UdpTransport,
    destination: SocketAddr,
    serializer: ChunkSerializer,
    frame: Box<[u8]>,
    sync: NoneRequired,
    frame_id: u32,
}

impl NetworkStreamWriter {
    /// Opens a socket for sending frames of `geometry` to `config.target`.
    ///
    /// # Errors
    ///
    /// - [`skyscreen_core::SkyError::InvalidAddress`] for a bad target.
    /// - [`skyscreen_core::SkyError::InvalidConfig`] for an unusable datagram size.
    /// - [`skyscreen_core::SkyError::Transport`] if no socket can be bound.
    pub fn connect(config: &StreamConfig, geometry: Geometry) -> SkyResult<Self> {
        geometry.validate()?;
        let destination = config.destination()?.resolve()?;
        let layout = config.layout(geometry)?;
        let transport = UdpTransport::bind_for(destination)?;

        tracing::info!(
            "streaming {} byte frames to {} in {} chunk(s)",
            layout.frame_size(),
            destination,
            layout.chunk_count()
        );

        Ok(Self {
            geometry,
            transport,
            destination,
            serializer: ChunkSerializer::new(layout),
            frame: vec![0u8; geometry.frame_byte_size()].into_boxed_slice(),
            sync: NoneRequired::new(),
            frame_id: 0,
        })
    }

    /// Where frames are sent.
    #[inline]
    #[must_use]
    pub const fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Id the next frame will carry.
    #[inline]
    #[must_use]
    pub const fn next_frame_id(&self) -> u32 {
        self.frame_id
    }

    /// Frames sent so far.
    #[must_use]
    pub fn frames_sent(&self) -> u64 {
        self.sync.generation()
    }

    /// Backend kind; always none-required.
    #[must_use]
    pub fn sync_mode(&self) -> SyncMode {
        WriterSync::mode(&self.sync)
    }

    /// Socket counters.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> &TransportStats {
        self.transport.stats()
    }
}

impl FrameSink for NetworkStreamWriter {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn frame_mut(&mut self) -> SkyResult<FrameViewMut<'_>> {
        Ok(FrameViewMut::new(&mut self.frame, self.geometry))
    }

    fn frame_ready(&mut self) -> SkyResult<()> {
        for index in 0..self.serializer.layout().chunk_count() {
            let datagram = self.serializer.serialize(&self.frame, self.frame_id, index);
            self.transport.send_to(datagram, self.destination)?;
        }
        self.frame_id = self.frame_id.wrapping_add(1);
        self.sync.frame_ready()
    }
}
