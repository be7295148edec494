//! # Display Geometry
//!
//! Fixed shape of the spinning display. Every buffer and every wire
//! message is exactly `vane_count * vane_length * channel_count` bytes.
//!
//! ```text
//! byte offset = (vane * vane_length + radial) * channel_count + channel
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{SkyError, SkyResult};

/// Number of angular sectors on the physical display.
pub const DEFAULT_VANE_COUNT: u32 = 360;

/// Number of LEDs along each vane.
pub const DEFAULT_VANE_LENGTH: u32 = 288;

/// Colour channels per LED (RGB).
pub const DEFAULT_CHANNEL_COUNT: u32 = 3;

/// Shape of one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Geometry {
    /// Angular sectors (outermost index).
    pub vane_count: u32,
    /// Positions along a vane, centre outward (middle index).
    pub vane_length: u32,
    /// Bytes per position (innermost index).
    pub channel_count: u32,
}

impl Geometry {
    /// The physical Skyscreen display.
    pub const SKYSCREEN: Self = Self {
        vane_count: DEFAULT_VANE_COUNT,
        vane_length: DEFAULT_VANE_LENGTH,
        channel_count: DEFAULT_CHANNEL_COUNT,
    };

    /// Creates a validated geometry.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::InvalidGeometry`] if any dimension is zero or
    /// the frame size does not fit in `usize`.
    pub fn new(vane_count: u32, vane_length: u32, channel_count: u32) -> SkyResult<Self> {
        let geometry = Self { vane_count, vane_length, channel_count };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Checks the invariants of a geometry that may have come from a config file.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Geometry::new`].
    pub fn validate(&self) -> SkyResult<()> {
        if self.vane_count == 0 || self.vane_length == 0 || self.channel_count == 0 {
            return Err(SkyError::InvalidGeometry(format!(
                "dimensions must be non-zero: {}x{}x{}",
                self.vane_count, self.vane_length, self.channel_count
            )));
        }
        if self.checked_frame_byte_size().is_none() {
            return Err(SkyError::InvalidGeometry("frame size overflows usize".to_string()));
        }
        Ok(())
    }

    fn checked_frame_byte_size(&self) -> Option<usize> {
        (self.vane_count as usize)
            .checked_mul(self.vane_length as usize)?
            .checked_mul(self.channel_count as usize)
    }

    /// Total bytes in one frame.
    #[inline]
    #[must_use]
    pub const fn frame_byte_size(&self) -> usize {
        self.vane_count as usize * self.vane_length as usize * self.channel_count as usize
    }

    /// Bytes in one vane.
    #[inline]
    #[must_use]
    pub const fn vane_byte_size(&self) -> usize {
        self.vane_length as usize * self.channel_count as usize
    }

    /// Number of addressable (vane, radial) cells.
    #[inline]
    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        self.vane_count as usize * self.vane_length as usize
    }

    /// Flat byte offset of a coordinate, or `None` when out of range.
    #[inline]
    #[must_use]
    pub fn offset(&self, vane: usize, radial: usize, channel: usize) -> Option<usize> {
        if vane >= self.vane_count as usize
            || radial >= self.vane_length as usize
            || channel >= self.channel_count as usize
        {
            return None;
        }
        Some((vane * self.vane_length as usize + radial) * self.channel_count as usize + channel)
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::SKYSCREEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_byte_size() {
        let g = Geometry::new(4, 4, 3).unwrap();
        assert_eq!(g.frame_byte_size(), 48);
        assert_eq!(g.vane_byte_size(), 12);
        assert_eq!(Geometry::SKYSCREEN.frame_byte_size(), 360 * 288 * 3);
    }

    #[test]
    fn test_offset_is_row_major() {
        let g = Geometry::new(4, 5, 3).unwrap();
        assert_eq!(g.offset(0, 0, 0), Some(0));
        assert_eq!(g.offset(0, 0, 2), Some(2));
        assert_eq!(g.offset(0, 1, 0), Some(3));
        assert_eq!(g.offset(1, 0, 0), Some(15));
        assert_eq!(g.offset(3, 4, 2), Some(g.frame_byte_size() - 1));
        assert_eq!(g.offset(4, 0, 0), None);
        assert_eq!(g.offset(0, 5, 0), None);
        assert_eq!(g.offset(0, 0, 3), None);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(matches!(Geometry::new(0, 4, 3), Err(SkyError::InvalidGeometry(_))));
        assert!(matches!(Geometry::new(4, 4, 0), Err(SkyError::InvalidGeometry(_))));
    }
}
