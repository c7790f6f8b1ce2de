//! Overlay collaborator drawn inside the composite pass.

use std::time::Duration;

use lightfield_core::{FrameStats, StatsWindow};
use lightfield_rhi::command::CommandBuffer;

/// Draws on top of the composited image.
///
/// `render_into` is called inside the composite render pass, after the
/// full-screen draw and before the pass ends.
pub trait Overlay {
    /// Called once per frame before recording.
    fn begin_frame(&mut self, frame_time: Duration);

    /// Records overlay draw commands into the open render pass.
    fn render_into(&mut self, cmd: &CommandBuffer);
}

/// Overlay that draws nothing.
#[derive(Debug, Default)]
pub struct NullOverlay;

impl Overlay for NullOverlay {
    fn begin_frame(&mut self, _frame_time: Duration) {}

    fn render_into(&mut self, _cmd: &CommandBuffer) {}
}

/// Frame-time statistics, refreshed once per averaging period.
///
/// Emits no draw commands; the application shows [`StatsOverlay::text`]
/// in the window title.
#[derive(Debug, Default)]
pub struct StatsOverlay {
    window: StatsWindow,
    latest: Option<FrameStats>,
    refreshed: bool,
}

impl StatsOverlay {
    pub fn new(period: Duration) -> Self {
        Self {
            window: StatsWindow::new(period),
            latest: None,
            refreshed: false,
        }
    }

    /// Stats of the last completed period.
    pub fn latest(&self) -> Option<FrameStats> {
        self.latest
    }

    /// Display text of the last completed period.
    pub fn text(&self) -> Option<String> {
        self.latest.map(|stats| stats.to_string())
    }

    /// Returns true once after each refresh.
    pub fn take_refreshed(&mut self) -> bool {
        std::mem::take(&mut self.refreshed)
    }
}

impl Overlay for StatsOverlay {
    fn begin_frame(&mut self, frame_time: Duration) {
        if let Some(stats) = self.window.record(frame_time) {
            self.latest = Some(stats);
            self.refreshed = true;
        }
    }

    fn render_into(&mut self, _cmd: &CommandBuffer) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_overlay_refreshes_per_period() {
        let mut overlay = StatsOverlay::new(Duration::from_secs(1));
        assert!(overlay.text().is_none());

        for _ in 0..3 {
            overlay.begin_frame(Duration::from_millis(250));
        }
        assert!(!overlay.take_refreshed());
        assert!(overlay.latest().is_none());

        overlay.begin_frame(Duration::from_millis(250));
        assert!(overlay.take_refreshed());
        assert!(!overlay.take_refreshed());
        assert_eq!(
            overlay.text().as_deref(),
            Some("250.000 ms/frame (4.0 FPS)")
        );
    }
}
