//! # Polar Frame Views
//!
//! Zero-copy `[vane][radial][channel]` addressing over a flat byte slice.
//! Views carry no synchronization; they wrap whatever bytes a session or
//! buffer already handed out.

use std::ops::{Index, IndexMut};

use crate::geometry::Geometry;

/// Read-only polar view of one frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameView<'a> {
    bytes: &'a [u8],
    geometry: Geometry,
}

impl<'a> FrameView<'a> {
    /// Wraps a slice of exactly `geometry.frame_byte_size()` bytes.
    ///
    /// # Panics
    ///
    /// Panics if the slice length disagrees with the geometry.
    #[must_use]
    pub fn new(bytes: &'a [u8], geometry: Geometry) -> Self {
        assert_eq!(bytes.len(), geometry.frame_byte_size(), "view length must match geometry");
        Self { bytes, geometry }
    }

    /// The geometry this view is shaped by.
    #[inline]
    #[must_use]
    pub const fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// The raw frame bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Frame length in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for a valid geometry.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// One channel value.
    #[inline]
    #[must_use]
    pub fn get(&self, vane: usize, radial: usize, channel: usize) -> Option<u8> {
        self.geometry.offset(vane, radial, channel).map(|i| self.bytes[i])
    }

    /// All channels of one (vane, radial) cell.
    #[inline]
    #[must_use]
    pub fn pixel(&self, vane: usize, radial: usize) -> Option<&'a [u8]> {
        let start = self.geometry.offset(vane, radial, 0)?;
        Some(&self.bytes[start..start + self.geometry.channel_count as usize])
    }

    /// Every cell of one vane, centre outward.
    #[inline]
    #[must_use]
    pub fn vane(&self, vane: usize) -> Option<&'a [u8]> {
        if vane >= self.geometry.vane_count as usize {
            return None;
        }
        let len = self.geometry.vane_byte_size();
        Some(&self.bytes[vane * len..(vane + 1) * len])
    }

    /// Simple additive checksum, used by monitors to spot frame changes.
    #[must_use]
    pub fn checksum(&self) -> u64 {
        self.bytes.iter().map(|&b| u64::from(b)).sum()
    }
}

impl Index<[usize; 3]> for FrameView<'_> {
    type Output = u8;

    fn index(&self, [vane, radial, channel]: [usize; 3]) -> &u8 {
        let i = self
            .geometry
            .offset(vane, radial, channel)
            .unwrap_or_else(|| panic!("coordinate ({vane}, {radial}, {channel}) out of range"));
        &self.bytes[i]
    }
}

/// Mutable polar view of one frame.
#[derive(Debug)]
pub struct FrameViewMut<'a> {
    bytes: &'a mut [u8],
    geometry: Geometry,
}

impl<'a> FrameViewMut<'a> {
    /// Wraps a mutable slice of exactly `geometry.frame_byte_size()` bytes.
    ///
    /// # Panics
    ///
    /// Panics if the slice length disagrees with the geometry.
    #[must_use]
    pub fn new(bytes: &'a mut [u8], geometry: Geometry) -> Self {
        assert_eq!(bytes.len(), geometry.frame_byte_size(), "view length must match geometry");
        Self { bytes, geometry }
    }

    /// The geometry this view is shaped by.
    #[inline]
    #[must_use]
    pub const fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Reborrows as a read-only view.
    #[inline]
    #[must_use]
    pub fn as_view(&self) -> FrameView<'_> {
        FrameView { bytes: self.bytes, geometry: self.geometry }
    }

    /// The raw frame bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes
    }

    /// The raw frame bytes, mutably.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.bytes
    }

    /// Frame length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for a valid geometry.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// One channel value.
    #[inline]
    #[must_use]
    pub fn get(&self, vane: usize, radial: usize, channel: usize) -> Option<u8> {
        self.geometry.offset(vane, radial, channel).map(|i| self.bytes[i])
    }

    /// Sets one channel value. Returns false when out of range.
    #[inline]
    pub fn set(&mut self, vane: usize, radial: usize, channel: usize, value: u8) -> bool {
        match self.geometry.offset(vane, radial, channel) {
            Some(i) => {
                self.bytes[i] = value;
                true
            }
            None => false,
        }
    }

    /// All channels of one cell, mutably.
    #[inline]
    pub fn pixel_mut(&mut self, vane: usize, radial: usize) -> Option<&mut [u8]> {
        let start = self.geometry.offset(vane, radial, 0)?;
        let channels = self.geometry.channel_count as usize;
        Some(&mut self.bytes[start..start + channels])
    }

    /// Every cell of one vane, mutably.
    #[inline]
    pub fn vane_mut(&mut self, vane: usize) -> Option<&mut [u8]> {
        if vane >= self.geometry.vane_count as usize {
            return None;
        }
        let len = self.geometry.vane_byte_size();
        Some(&mut self.bytes[vane * len..(vane + 1) * len])
    }

    /// Sets every byte of the frame.
    #[inline]
    pub fn fill(&mut self, value: u8) {
        self.bytes.fill(value);
    }

    /// Sets every cell to the same channel values.
    ///
    /// Extra channels in `pixel` are ignored, missing ones are left alone.
    pub fn fill_pixel(&mut self, pixel: &[u8]) {
        let channels = self.geometry.channel_count as usize;
        let n = pixel.len().min(channels);
        for cell in self.bytes.chunks_exact_mut(channels) {
            cell[..n].copy_from_slice(&pixel[..n]);
        }
    }

    /// Copies a whole frame in.
    ///
    /// # Panics
    ///
    /// Panics if `src` is not exactly one frame long.
    pub fn copy_from(&mut self, src: &[u8]) {
        self.bytes.copy_from_slice(src);
    }
}

impl Index<[usize; 3]> for FrameViewMut<'_> {
    type Output = u8;

    fn index(&self, [vane, radial, channel]: [usize; 3]) -> &u8 {
        let i = self
            .geometry
            .offset(vane, radial, channel)
            .unwrap_or_else(|| panic!("coordinate ({vane}, {radial}, {channel}) out of range"));
        &self.bytes[i]
    }
}

impl IndexMut<[usize; 3]> for FrameViewMut<'_> {
    fn index_mut(&mut self, [vane, radial, channel]: [usize; 3]) -> &mut u8 {
        let i = self
            .geometry
            .offset(vane, radial, channel)
            .unwrap_or_else(|| panic!("coordinate ({vane}, {radial}, {channel}) out of range"));
        &mut self.bytes[i]
    }
}
