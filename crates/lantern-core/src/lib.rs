// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::time::{Duration, Instant};

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

/// Longest step handed to simulation code. A stall (minimised window,
/// swapchain rebuild) otherwise shows up as one huge jump.
pub const MAX_FRAME_STEP: Duration = Duration::from_millis(100);

/// Wall-clock frame timer with a clamped delta.
#[derive(Debug)]
pub struct FrameClock {
    last: Instant,
    max_step: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            last: start,
            max_step: MAX_FRAME_STEP,
        }
    }

    pub fn with_max_step(mut self, max_step: Duration) -> Self {
        self.max_step = max_step;
        self
    }

    /// Seconds since the previous tick, at most `max_step`.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let dt = now.saturating_duration_since(self.last).min(self.max_step);
        self.last = now;
        dt.as_secs_f32()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts rendered frames and reports once per second.
#[derive(Debug)]
pub struct FpsCounter {
    frames: u32,
    window_start: Instant,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            frames: 0,
            window_start: now,
        }
    }

    pub fn frame(&mut self) {
        self.frames = self.frames.saturating_add(1);
    }

    /// Returns the frame count of the elapsed second, if one has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<u32> {
        if now.duration_since(self.window_start).as_secs_f32() < 1.0 {
            return None;
        }
        let fps = self.frames;
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_reports_elapsed_seconds() {
        let t0 = Instant::now();
        let mut clock = FrameClock::starting_at(t0);
        let dt = clock.tick_at(t0 + Duration::from_millis(16));
        assert!((dt - 0.016).abs() < 1e-6);
    }

    #[test]
    fn tick_is_clamped_after_a_stall() {
        let t0 = Instant::now();
        let mut clock = FrameClock::starting_at(t0).with_max_step(Duration::from_millis(50));
        let dt = clock.tick_at(t0 + Duration::from_secs(3));
        assert!((dt - 0.05).abs() < 1e-6);
    }

    #[test]
    fn fps_counter_reports_once_per_second() {
        let t0 = Instant::now();
        let mut fps = FpsCounter::new(t0);
        for _ in 0..60 {
            fps.frame();
        }
        assert_eq!(fps.poll(t0 + Duration::from_millis(500)), None);
        assert_eq!(fps.poll(t0 + Duration::from_millis(1000)), Some(60));
        assert_eq!(fps.poll(t0 + Duration::from_millis(1200)), None);
    }
}
