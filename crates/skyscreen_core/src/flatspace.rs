//! # Flat-Space Addressing
//!
//! Some generators are easier to write on a square Cartesian image than on
//! the polar frame. Flat space is a `side × side × channel_count` image with
//! `side = vane_count`, centred on the hub:
//!
//! ```text
//!            col →
//!      ┌───────────────┐
//!  row │    .-"""-.    │   vane v  → angle θ = 2π (v + ½) / vane_count
//!   ↓  │   /   ·   \   │   radial r → ρ = (r + ½) / vane_length · side/2
//!      │   \       /   │
//!      │    '-...-'    │   col = ⌊side/2 + ρ cos θ⌋, row = ⌊side/2 + ρ sin θ⌋
//!      └───────────────┘
//! ```
//!
//! Pixels outside the inscribed disc have no polar counterpart and are
//! never displayed.

use std::f64::consts::TAU;

use crate::buffer::FrameViewMut;
use crate::error::{SkyError, SkyResult};
use crate::geometry::Geometry;
use crate::session::FrameSink;

/// Coordinate transform between polar cells and flat-space pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlatSpace {
    geometry: Geometry,
    side: usize,
    flat_bytes: usize,
}

impl FlatSpace {
    /// Flat space for a display geometry.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::InvalidGeometry`] if the flat image size does
    /// not fit in `usize`.
    pub fn new(geometry: Geometry) -> SkyResult<Self> {
        let side = geometry.vane_count as usize;
        let flat_bytes = side
            .checked_mul(side)
            .and_then(|n| n.checked_mul(geometry.channel_count as usize))
            .ok_or_else(|| {
                SkyError::InvalidGeometry(format!("flat image of side {side} overflows usize"))
            })?;
        Ok(Self { geometry, side, flat_bytes })
    }

    /// Width and height of the flat image.
    #[inline]
    #[must_use]
    pub const fn side(&self) -> usize {
        self.side
    }

    /// Polar geometry this space maps onto.
    #[inline]
    #[must_use]
    pub const fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Bytes in one flat image.
    #[inline]
    #[must_use]
    pub const fn flat_byte_size(&self) -> usize {
        self.flat_bytes
    }

    /// Flat `(row, col)` of a polar cell's centre, or `None` for an
    /// out-of-range cell.
    #[must_use]
    pub fn polar_to_flat(&self, vane: usize, radial: usize) -> Option<(usize, usize)> {
        let vanes = self.geometry.vane_count as usize;
        let length = self.geometry.vane_length as usize;
        if vane >= vanes || radial >= length {
            return None;
        }

        let half = self.side as f64 / 2.0;
        let theta = TAU * (vane as f64 + 0.5) / vanes as f64;
        let rho = (radial as f64 + 0.5) / length as f64 * half;

        let col = clamp_floor(half + rho * theta.cos(), self.side);
        let row = clamp_floor(half + rho * theta.sin(), self.side);
        Some((row, col))
    }

    /// Polar `(vane, radial)` under a flat pixel's centre, or `None`
    /// outside the inscribed disc.
    #[must_use]
    pub fn flat_to_polar(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        if row >= self.side || col >= self.side {
            return None;
        }

        let half = self.side as f64 / 2.0;
        let dx = col as f64 + 0.5 - half;
        let dy = row as f64 + 0.5 - half;
        let rho = dx.hypot(dy);
        if rho > half {
            return None;
        }

        let vanes = self.geometry.vane_count as usize;
        let length = self.geometry.vane_length as usize;
        let theta = dy.atan2(dx).rem_euclid(TAU);
        let vane = ((theta / TAU * vanes as f64) as usize) % vanes;
        let radial = ((rho / half * length as f64) as usize).min(length - 1);
        Some((vane, radial))
    }

    /// Flat pixel index for every polar cell, in frame order.
    #[must_use]
    pub fn lookup_table(&self) -> Box<[usize]> {
        let vanes = self.geometry.vane_count as usize;
        let length = self.geometry.vane_length as usize;
        let mut table = Vec::with_capacity(vanes * length);
        for vane in 0..vanes {
            for radial in 0..length {
                // Both indices are in range here.
                let (row, col) = self.polar_to_flat(vane, radial).unwrap_or((0, 0));
                table.push(row * self.side + col);
            }
        }
        table.into_boxed_slice()
    }
}

fn clamp_floor(value: f64, side: usize) -> usize {
    if value <= 0.0 {
        0
    } else {
        (value.floor() as usize).min(side - 1)
    }
}

/// Mutable `[row][col][channel]` view of a flat image.
pub struct FlatViewMut<'a> {
    bytes: &'a mut [u8],
    side: usize,
    channels: usize,
}

impl<'a> FlatViewMut<'a> {
    /// Wraps a flat image.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is not `space.flat_byte_size()` long.
    #[must_use]
    pub fn new(bytes: &'a mut [u8], space: &FlatSpace) -> Self {
        assert_eq!(bytes.len(), space.flat_byte_size(), "flat image has wrong size");
        Self { bytes, side: space.side(), channels: space.geometry().channel_count as usize }
    }

    /// Width and height.
    #[inline]
    #[must_use]
    pub const fn side(&self) -> usize {
        self.side
    }

    /// Channel values of a pixel.
    #[must_use]
    pub fn pixel(&self, row: usize, col: usize) -> Option<&[u8]> {
        let start = self.offset(row, col)?;
        Some(&self.bytes[start..start + self.channels])
    }

    /// Mutable channel values of a pixel.
    pub fn pixel_mut(&mut self, row: usize, col: usize) -> Option<&mut [u8]> {
        let start = self.offset(row, col)?;
        Some(&mut self.bytes[start..start + self.channels])
    }

    /// Writes one channel. Returns `false` when out of range.
    pub fn set(&mut self, row: usize, col: usize, channel: usize, value: u8) -> bool {
        if channel >= self.channels {
            return false;
        }
        match self.offset(row, col) {
            Some(start) => {
                self.bytes[start + channel] = value;
                true
            }
            None => false,
        }
    }

    /// Sets every byte.
    #[inline]
    pub fn fill(&mut self, value: u8) {
        self.bytes.fill(value);
    }

    /// Raw image bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes
    }

    fn offset(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.side && col < self.side).then(|| (row * self.side + col) * self.channels)
    }
}

/// A [`FrameSink`] that is drawn in flat space.
///
/// Generators draw through [`FlatSpaceTransform::flat_mut`]. On
/// `frame_ready()` the flat image is resampled into the wrapped sink's
/// polar frame, which is then announced. Writes made directly through
/// `frame_mut()` are overwritten by that projection.
pub struct FlatSpaceTransform<S: FrameSink> {
    sink: S,
    space: FlatSpace,
    lookup: Box<[usize]>,
    image: Box<[u8]>,
}

impl<S: FrameSink> FlatSpaceTransform<S> {
    /// Wraps `sink`, precomputing the polar lookup table.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::InvalidGeometry`] if the flat image size does
    /// not fit in `usize`.
    pub fn new(sink: S) -> SkyResult<Self> {
        let space = FlatSpace::new(sink.geometry())?;
        let lookup = space.lookup_table();
        let image = vec![0u8; space.flat_byte_size()].into_boxed_slice();
        tracing::debug!("flat-space transform ready ({}x{})", space.side(), space.side());
        Ok(Self { sink, space, lookup, image })
    }

    /// The coordinate transform in use.
    #[inline]
    #[must_use]
    pub const fn space(&self) -> &FlatSpace {
        &self.space
    }

    /// The flat image to draw into.
    pub fn flat_mut(&mut self) -> FlatViewMut<'_> {
        FlatViewMut::new(&mut self.image, &self.space)
    }

    /// The wrapped sink.
    #[inline]
    pub const fn inner(&self) -> &S {
        &self.sink
    }

    /// The wrapped sink, mutably.
    #[inline]
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Unwraps the sink.
    pub fn into_inner(self) -> S {
        self.sink
    }

    /// Resamples the flat image into the sink's frame without announcing it.
    ///
    /// # Errors
    ///
    /// Fails if the sink is closed.
    pub fn project(&mut self) -> SkyResult<()> {
        let channels = self.space.geometry().channel_count as usize;
        let mut frame = self.sink.frame_mut()?;
        let polar = frame.as_bytes_mut();
        for (cell, &pixel) in polar.chunks_exact_mut(channels).zip(self.lookup.iter()) {
            let start = pixel * channels;
            cell.copy_from_slice(&self.image[start..start + channels]);
        }
        Ok(())
    }
}

impl<S: FrameSink> FrameSink for FlatSpaceTransform<S> {
    fn geometry(&self) -> Geometry {
        self.sink.geometry()
    }

    fn frame_mut(&mut self) -> SkyResult<FrameViewMut<'_>> {
        self.sink.frame_mut()
    }

    fn frame_ready(&mut self) -> SkyResult<()> {
        self.project()?;
        self.sink.frame_ready()
    }
}
