//! Frame timing.

use std::fmt;
use std::time::{Duration, Instant};

/// Measures the time between successive frames.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    /// Total time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time since the previous call to `tick()` (or creation).
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        delta
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Averaged frame timing over one reporting window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub ms_per_frame: f64,
    pub fps: f64,
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} ms/frame ({:.1} FPS)", self.ms_per_frame, self.fps)
    }
}

/// Accumulates frame times and yields [`FrameStats`] once per `period`.
#[derive(Debug, Clone)]
pub struct StatsWindow {
    period: Duration,
    accumulated: Duration,
    frames: u32,
}

impl StatsWindow {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            accumulated: Duration::ZERO,
            frames: 0,
        }
    }

    /// Adds one frame. Returns the averages when the window fills, then
    /// starts a new window.
    pub fn record(&mut self, frame_time: Duration) -> Option<FrameStats> {
        self.accumulated += frame_time;
        self.frames += 1;

        if self.accumulated < self.period {
            return None;
        }

        let secs = self.accumulated.as_secs_f64();
        let frames = f64::from(self.frames);
        self.accumulated = Duration::ZERO;
        self.frames = 0;

        Some(FrameStats {
            ms_per_frame: secs * 1000.0 / frames,
            fps: frames / secs,
        })
    }
}

impl Default for StatsWindow {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_is_monotonic() {
        let mut timer = Timer::new();
        let first = timer.tick();
        let second = timer.tick();
        assert!(timer.elapsed() >= first + second);
    }

    #[test]
    fn test_stats_window_reports_once_per_period() {
        let mut window = StatsWindow::new(Duration::from_secs(1));
        let frame = Duration::from_millis(250);

        assert_eq!(window.record(frame), None);
        assert_eq!(window.record(frame), None);
        assert_eq!(window.record(frame), None);

        let stats = window.record(frame).unwrap();
        assert!((stats.ms_per_frame - 250.0).abs() < 1e-9);
        assert!((stats.fps - 4.0).abs() < 1e-9);

        // A fresh window starts after the report.
        assert_eq!(window.record(frame), None);
    }

    #[test]
    fn test_frame_stats_display() {
        let stats = FrameStats {
            ms_per_frame: 16.6667,
            fps: 60.0,
        };
        assert_eq!(stats.to_string(), "16.667 ms/frame (60.0 FPS)");
    }
}
