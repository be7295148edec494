//! Receiving side of the UDP stream.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use skyscreen_core::{FrameView, Geometry, SkyError, SkyResult};

use crate::config::StreamConfig;
use crate::protocol::{FrameReassembler, ReassemblyStats};
use crate::transport::{TransportStats, UdpTransport};

/// Receives chunked frames and hands out whole ones.
pub struct NetworkStreamReceiver {
    transport: UdpTransport,
    reassembler: FrameReassembler,
    poll_interval: Duration,
}

impl NetworkStreamReceiver {
    /// Binds `config.bind` and waits for frames of `geometry`.
    ///
    /// # Errors
    ///
    /// - [`SkyError::InvalidConfig`] for an unusable datagram size.
    /// - [`SkyError::Transport`] if the address cannot be bound.
    pub fn bind(config: &StreamConfig, geometry: Geometry) -> SkyResult<Self> {
        geometry.validate()?;
        let layout = config.layout(geometry)?;
        let reassembler = FrameReassembler::new(geometry, layout)?;
        let transport = UdpTransport::bind(config.bind.as_str())?;
        let poll_interval = config.read_timeout().max(Duration::from_millis(1));

        tracing::info!(
            "receiving {} byte frames on {} ({} chunk(s) each)",
            layout.frame_size(),
            transport.local_addr(),
            layout.chunk_count()
        );

        Ok(Self { transport, reassembler, poll_interval })
    }

    /// Bound address.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Blocks until the next complete frame arrives.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::Transport`] on socket failure.
    pub fn recv_frame(&mut self) -> SkyResult<FrameView<'_>> {
        while !self.pump(None)? {}
        self.reassembler.latest_frame().ok_or(SkyError::ProtocolViolation("frame completed without data"))
    }

    /// Waits at most `timeout` for the next complete frame.
    ///
    /// Returns `Ok(None)` if none completed in time.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::Transport`] on socket failure.
    pub fn recv_frame_timeout(&mut self, timeout: Duration) -> SkyResult<Option<FrameView<'_>>> {
        let completed = self.pump(Some(Instant::now() + timeout))?;
        Ok(if completed { self.reassembler.latest_frame() } else { None })
    }

    /// Reads datagrams until a frame completes or `deadline` passes.
    fn pump(&mut self, deadline: Option<Instant>) -> SkyResult<bool> {
        let before = self.reassembler.latest_frame_id();
        loop {
            let wait = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(false);
                    }
                    remaining.min(self.poll_interval)
                }
                None => self.poll_interval,
            };
            self.transport.set_read_timeout(Some(wait))?;

            let Some((datagram, _from)) = self.transport.recv()? else {
                if deadline.is_none() {
                    return Ok(false);
                }
                continue;
            };

            match self.reassembler.push(datagram) {
                Ok(_) => {}
                Err(SkyError::PartialFrameDropped { frame_id, received, expected }) => {
                    tracing::debug!(
                        "dropped partial frame {} ({}/{} chunks)",
                        frame_id,
                        received,
                        expected
                    );
                }
                Err(e) => return Err(e),
            }

            if self.reassembler.latest_frame_id() != before {
                return Ok(true);
            }
        }
    }

    /// Last fully reassembled frame, if any.
    #[must_use]
    pub fn latest_frame(&self) -> Option<FrameView<'_>> {
        self.reassembler.latest_frame()
    }

    /// Id of the last fully reassembled frame.
    #[must_use]
    pub const fn latest_frame_id(&self) -> Option<u32> {
        self.reassembler.latest_frame_id()
    }

    /// Reassembly counters.
    #[must_use]
    pub const fn stats(&self) -> &ReassemblyStats {
        self.reassembler.stats()
    }

    /// Socket counters.
    #[must_use]
    pub const fn transport_stats(&self) -> &TransportStats {
        self.transport.stats()
    }
}
