//! # Pattern Player
//!
//! Runs a pattern at a fixed rate into the configured output.
//!
//! ```text
//!   shared  WriterSession on the shared file + sync backend (+ renderer child)
//!   udp     NetworkStreamWriter, frames carry their own framing
//!   fake    WriterSession on a local buffer, no sync
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use skyscreen_core::{
    BufferTarget, FlatSpaceTransform, FrameSink, NoSync, SkyResult, WriterSession,
};
use skyscreen_net::NetworkStreamWriter;

use crate::clock::{FrameClock, FrameStats};
use crate::config::{OutputMode, PlayerConfig};
use crate::patterns::{self, PatternKind};
use crate::renderer::RendererProcess;

/// Frames between progress log lines.
const PROGRESS_INTERVAL: u64 = 300;

/// Why the pattern loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// `max_frames` reached.
    FrameLimit,
    /// The stop flag was raised.
    Requested,
    /// The supervised renderer exited.
    RendererExited,
}

/// Outcome of a player run.
#[derive(Clone, Copy, Debug)]
pub struct PlayerSummary {
    /// Frames announced.
    pub frames: u64,
    /// Why the run ended.
    pub stop_reason: StopReason,
    /// Frame timing.
    pub timing: FrameStats,
}

/// Plays `config.pattern` until the frame limit, the stop flag, or the
/// renderer ends the run.
///
/// # Errors
///
/// Any config, buffer, sync or transport error.
pub fn run(config: &PlayerConfig, stop: &AtomicBool) -> SkyResult<PlayerSummary> {
    config.validate()?;
    let mut clock = FrameClock::new(config.frame_rate);
    let mut control = RunControl { max_frames: config.max_frames, stop, renderer: None };

    tracing::info!(
        "playing '{}' to {} output at {} fps ({}x{}x{})",
        config.pattern,
        config.output,
        config.frame_rate,
        config.geometry.vane_count,
        config.geometry.vane_length,
        config.geometry.channel_count
    );

    let (frames, stop_reason) = match config.output {
        OutputMode::Fake => {
            let mut writer =
                WriterSession::new(config.geometry, BufferTarget::Local, Box::new(NoSync::new()));
            writer.scoped(|w| play(config.pattern, w, &mut clock, &mut control))?
        }
        OutputMode::Udp => {
            let mut writer = NetworkStreamWriter::connect(&config.stream, config.geometry)?;
            play(config.pattern, &mut writer, &mut clock, &mut control)?
        }
        OutputMode::Shared => {
            let path = config.shared_path();
            let mut writer =
                WriterSession::from_config(config.geometry, BufferTarget::shared(&path), &config.sync)?;
            writer.enter()?;
            tracing::info!("shared frame at {}", path.display());

            if let Some(renderer) = &config.renderer {
                control.renderer = Some(RendererProcess::spawn(renderer, &path, config.sync.port)?);
            }
            let result = play(config.pattern, &mut writer, &mut clock, &mut control);
            control.renderer = None;
            writer.exit();
            result?
        }
    };

    let summary = PlayerSummary { frames, stop_reason, timing: *clock.stats() };
    tracing::info!(
        "stopped after {} frame(s) ({:?}), {} late, avg draw {}us",
        summary.frames,
        summary.stop_reason,
        summary.timing.late_frames,
        summary.timing.avg_frame_us
    );
    Ok(summary)
}

/// Per-frame stop checks.
struct RunControl<'a> {
    max_frames: Option<u64>,
    stop: &'a AtomicBool,
    renderer: Option<RendererProcess>,
}

impl RunControl<'_> {
    fn check(&mut self, frames: u64) -> SkyResult<Option<StopReason>> {
        if self.max_frames.is_some_and(|max| frames >= max) {
            return Ok(Some(StopReason::FrameLimit));
        }
        if self.stop.load(Ordering::Acquire) {
            return Ok(Some(StopReason::Requested));
        }
        if let Some(renderer) = &mut self.renderer {
            if !renderer.is_running()? {
                return Ok(Some(StopReason::RendererExited));
            }
        }
        Ok(None)
    }
}

fn play<S: FrameSink>(
    kind: PatternKind,
    sink: &mut S,
    clock: &mut FrameClock,
    control: &mut RunControl<'_>,
) -> SkyResult<(u64, StopReason)> {
    if kind.is_flat() {
        let mut transform = FlatSpaceTransform::new(sink)?;
        pace(clock, control, |frame_index| {
            patterns::draw_lines(&mut transform.flat_mut(), frame_index);
            transform.frame_ready()
        })
    } else {
        pace(clock, control, |frame_index| {
            {
                let mut frame = sink.frame_mut()?;
                match kind {
                    PatternKind::Grid => patterns::draw_grid(&mut frame, frame_index),
                    _ => patterns::draw_solid(&mut frame, frame_index),
                }
            }
            sink.frame_ready()
        })
    }
}

fn pace(
    clock: &mut FrameClock,
    control: &mut RunControl<'_>,
    mut draw: impl FnMut(u64) -> SkyResult<()>,
) -> SkyResult<(u64, StopReason)> {
    let mut frames = 0u64;
    loop {
        if let Some(reason) = control.check(frames)? {
            return Ok((frames, reason));
        }
        clock.wait_for_next_frame();

        let start = clock.begin_frame();
        draw(frames)?;
        clock.end_frame(start);
        frames += 1;

        if frames % PROGRESS_INTERVAL == 0 {
            let stats = clock.stats();
            tracing::info!(
                "{} frames, avg draw {}us, max {}us, {} late",
                frames,
                stats.avg_frame_us,
                stats.max_frame_us,
                stats.late_frames
            );
        }
    }
}

/// Convenience for callers without a stop flag of their own.
///
/// # Errors
///
/// Same as [`run`].
pub fn run_for(config: &PlayerConfig, frames: u64) -> SkyResult<PlayerSummary> {
    let mut config = config.clone();
    config.max_frames = Some(frames);
    run(&config, &AtomicBool::new(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyscreen_core::Geometry;

    fn fake(pattern: PatternKind) -> PlayerConfig {
        PlayerConfig {
            geometry: Geometry::new(16, 8, 3).unwrap(),
            output: OutputMode::Fake,
            pattern,
            frame_rate: 1000,
            ..PlayerConfig::default()
        }
    }

    #[test]
    fn test_fake_run_stops_at_frame_limit() {
        for pattern in [PatternKind::Solid, PatternKind::Grid, PatternKind::Lines] {
            let summary = run_for(&fake(pattern), 5).unwrap();
            assert_eq!(summary.frames, 5);
            assert_eq!(summary.stop_reason, StopReason::FrameLimit);
            assert_eq!(summary.timing.total_frames, 5);
        }
    }

    #[test]
    fn test_stop_flag_ends_run() {
        let stop = AtomicBool::new(true);
        let summary = run(&fake(PatternKind::Solid), &stop).unwrap();
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.stop_reason, StopReason::Requested);
    }
}
