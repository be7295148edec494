//! # Frame Clock
//!
//! Fixed-rate pacing for the pattern loop.
//!
//! ## Design
//!
//! The clock must:
//! - Release one frame per period on average
//! - Never try to catch up with a burst after a stall
//! - Record how long frames take to draw

use std::time::{Duration, Instant};

/// Frame rate used when none is configured.
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Fixed-rate frame loop controller.
pub struct FrameClock {
    /// Target frame period.
    frame_duration: Duration,
    /// When the next frame is due.
    next_deadline: Instant,
    /// Frames begun.
    frame_count: u64,
    /// Draw time statistics.
    stats: FrameStats,
}

/// Frame timing statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameStats {
    /// Minimum draw time observed.
    pub min_frame_us: u64,
    /// Maximum draw time observed.
    pub max_frame_us: u64,
    /// Average draw time (rolling).
    pub avg_frame_us: u64,
    /// Frames that took longer than one period.
    pub late_frames: u64,
    /// Deadlines abandoned after a stall.
    pub skipped_deadlines: u64,
    /// Total frames measured.
    pub total_frames: u64,
}

impl FrameStats {
    fn empty(frame_duration: Duration) -> Self {
        Self {
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            avg_frame_us: frame_duration.as_micros() as u64,
            late_frames: 0,
            skipped_deadlines: 0,
            total_frames: 0,
        }
    }
}

impl FrameClock {
    /// Creates a clock at `frame_rate` frames per second (at least 1).
    #[must_use]
    pub fn new(frame_rate: u32) -> Self {
        let frame_duration = Duration::from_micros(1_000_000 / u64::from(frame_rate.max(1)));
        Self {
            frame_duration,
            next_deadline: Instant::now(),
            frame_count: 0,
            stats: FrameStats::empty(frame_duration),
        }
    }

    /// Marks the start of a frame.
    ///
    /// Returns the start time for duration measurement.
    #[must_use]
    pub fn begin_frame(&mut self) -> Instant {
        self.frame_count += 1;
        Instant::now()
    }

    /// Marks the end of a frame and records its draw time.
    pub fn end_frame(&mut self, start: Instant) {
        let duration = start.elapsed();
        let duration_us = duration.as_micros() as u64;

        self.stats.total_frames += 1;
        self.stats.min_frame_us = self.stats.min_frame_us.min(duration_us);
        self.stats.max_frame_us = self.stats.max_frame_us.max(duration_us);
        self.stats.avg_frame_us = (self.stats.avg_frame_us * 15 + duration_us) / 16;

        if duration > self.frame_duration {
            self.stats.late_frames += 1;
        }
    }

    /// Sleeps until the next frame is due, then schedules the one after.
    ///
    /// Sleeps for most of the wait and spins for the last half millisecond.
    pub fn wait_for_next_frame(&mut self) {
        let now = Instant::now();
        if now < self.next_deadline {
            let remaining = self.next_deadline - now;
            if remaining > Duration::from_micros(1000) {
                std::thread::sleep(remaining - Duration::from_micros(500));
            }
            while Instant::now() < self.next_deadline {
                std::hint::spin_loop();
            }
        }

        self.next_deadline += self.frame_duration;
        let now = Instant::now();
        if now > self.next_deadline {
            // Fell more than a period behind; restart the schedule from here.
            self.stats.skipped_deadlines += 1;
            self.next_deadline = now + self.frame_duration;
        }
    }

    /// Frames begun so far.
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Timing statistics.
    #[must_use]
    pub const fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Target frame period.
    #[must_use]
    pub const fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    /// Resets statistics.
    pub fn reset_stats(&mut self) {
        self.stats = FrameStats::empty(self.frame_duration);
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_RATE)
    }
}
