//! # Test Patterns
//!
//! Built-in generators for checking that frames arrive intact. They make
//! delivery problems visible, nothing more.
//!
//! ```text
//!   solid  every byte = frame number mod 256
//!   grid   spokes at the quarter turns, a ring at radial 100, a sweeping marker
//!   lines  flat-space gradient with a moving diagonal
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use skyscreen_core::{FlatViewMut, FrameViewMut, SkyError};

/// Radial position of the grid pattern's ring.
pub const GRID_RING_RADIAL: usize = 100;

/// Which built-in pattern to play.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Whole frame one value, incremented each frame.
    #[default]
    Solid,
    /// Polar test card.
    Grid,
    /// Drawn in flat space.
    Lines,
}

impl PatternKind {
    /// Whether the pattern draws through the flat-space transform.
    #[must_use]
    pub const fn is_flat(self) -> bool {
        matches!(self, Self::Lines)
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Solid => "solid",
            Self::Grid => "grid",
            Self::Lines => "lines",
        })
    }
}

impl FromStr for PatternKind {
    type Err = SkyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "solid" => Ok(Self::Solid),
            "grid" => Ok(Self::Grid),
            "lines" => Ok(Self::Lines),
            other => Err(SkyError::InvalidConfig(format!("unknown pattern '{other}'"))),
        }
    }
}

/// Fills every byte with the frame number mod 256.
pub fn draw_solid(frame: &mut FrameViewMut<'_>, frame_index: u64) {
    frame.fill((frame_index % 256) as u8);
}

/// Draws the polar test card.
pub fn draw_grid(frame: &mut FrameViewMut<'_>, frame_index: u64) {
    let geometry = frame.geometry();
    let vanes = geometry.vane_count as usize;
    let length = geometry.vane_length as usize;
    let white = [0xff; 3];

    frame.fill(0);
    for quarter in 0..4 {
        if let Some(vane) = frame.vane_mut(quarter * vanes / 4) {
            vane.fill(0xff);
        }
    }
    if GRID_RING_RADIAL < length {
        for vane in 0..vanes {
            if let Some(pixel) = frame.pixel_mut(vane, GRID_RING_RADIAL) {
                let n = pixel.len().min(white.len());
                pixel[..n].copy_from_slice(&white[..n]);
            }
        }
    }

    // Red marker sweeps one vane per frame so stalls are obvious.
    let marker = (frame_index % vanes as u64) as usize;
    for radial in 0..length {
        frame.set(marker, radial, 0, 0xff);
    }
}

/// Draws a red/green gradient with a white diagonal that shifts each frame.
pub fn draw_lines(flat: &mut FlatViewMut<'_>, frame_index: u64) {
    let side = flat.side();
    let shift = (frame_index % side as u64) as usize;
    for row in 0..side {
        for col in 0..side {
            let Some(pixel) = flat.pixel_mut(row, col) else {
                continue;
            };
            let on_diagonal = (col + shift) % side == row;
            for (channel, value) in pixel.iter_mut().enumerate() {
                *value = match (on_diagonal, channel) {
                    (true, _) => 0xff,
                    (false, 0) => (col * 255 / side) as u8,
                    (false, 1) => (row * 255 / side) as u8,
                    (false, _) => 0,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyscreen_core::{FlatSpace, Geometry};

    fn frame_bytes(geometry: Geometry) -> Vec<u8> {
        vec![0u8; geometry.frame_byte_size()]
    }

    #[test]
    fn test_solid_increments_and_wraps() {
        let geometry = Geometry::new(4, 4, 3).unwrap();
        let mut bytes = frame_bytes(geometry);
        let mut frame = FrameViewMut::new(&mut bytes, geometry);

        draw_solid(&mut frame, 7);
        assert!(frame.as_bytes().iter().all(|&b| b == 7));
        draw_solid(&mut frame, 257);
        assert!(frame.as_bytes().iter().all(|&b| b == 1));
    }

    #[test]
    fn test_grid_matches_test_card() {
        let geometry = Geometry::SKYSCREEN;
        let mut bytes = frame_bytes(geometry);
        let mut frame = FrameViewMut::new(&mut bytes, geometry);
        draw_grid(&mut frame, 45);

        for vane in [0, 90, 180, 270] {
            assert!(frame.as_view().vane(vane).unwrap().iter().all(|&b| b == 0xff));
        }
        assert_eq!(frame.as_view().pixel(33, GRID_RING_RADIAL).unwrap(), &[0xff, 0xff, 0xff]);
        assert_eq!(frame.as_view().pixel(33, 50).unwrap(), &[0, 0, 0]);
        assert_eq!(frame.as_view().pixel(45, 50).unwrap(), &[0xff, 0, 0]);
    }

    #[test]
    fn test_lines_diagonal_moves() {
        let space = FlatSpace::new(Geometry::new(8, 4, 3).unwrap()).unwrap();
        let mut bytes = vec![0u8; space.flat_byte_size()];
        let mut flat = FlatViewMut::new(&mut bytes, &space);

        draw_lines(&mut flat, 0);
        assert_eq!(flat.pixel(3, 3).unwrap(), &[0xff, 0xff, 0xff]);
        draw_lines(&mut flat, 1);
        assert_eq!(flat.pixel(4, 3).unwrap(), &[0xff, 0xff, 0xff]);
        assert_ne!(flat.pixel(3, 3).unwrap(), &[0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_kind_parses() {
        assert_eq!("grid".parse::<PatternKind>().unwrap(), PatternKind::Grid);
        assert!("chaos".parse::<PatternKind>().is_err());
        assert!(PatternKind::Lines.is_flat());
        assert_eq!(PatternKind::default().to_string(), "solid");
    }
}
