use std::time::{Duration, Instant};

/// Frame rate ceiling used when the caller does not pick one.
pub const DEFAULT_MAX_FPS: f32 = 70.0;

const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Paces the render loop and measures the achieved frame rate.
///
/// The clock never schedules work in the past: if a frame overruns its
/// budget the next deadline is "now" rather than a burst of catch-up frames.
#[derive(Debug, Clone)]
pub struct FrameClock {
    interval: Duration,
    next_deadline: Option<Instant>,
    window_start: Option<Instant>,
    window_frames: u32,
    last_fps: f32,
}

impl FrameClock {
    /// Creates a clock capped at `max_fps`. Non-positive values fall back to
    /// [`DEFAULT_MAX_FPS`].
    pub fn new(max_fps: f32) -> Self {
        let fps = if max_fps.is_finite() && max_fps > 0.0 {
            max_fps
        } else {
            DEFAULT_MAX_FPS
        };
        Self {
            interval: Duration::from_secs_f32(1.0 / fps),
            next_deadline: None,
            window_start: None,
            window_frames: 0,
            last_fps: 0.0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the next frame may start. `None` until the first frame ticks.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_deadline
    }

    /// Most recently completed frames-per-second measurement.
    pub fn fps(&self) -> f32 {
        self.last_fps
    }

    /// Records a finished frame.
    ///
    /// Returns the frames-per-second measurement whenever a one second window
    /// closes, so callers can refresh titles and stats at that cadence.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        let scheduled = self
            .next_deadline
            .map(|previous| previous + self.interval)
            .unwrap_or(now + self.interval);
        self.next_deadline = Some(scheduled.max(now));

        let start = *self.window_start.get_or_insert(now);
        self.window_frames = self.window_frames.saturating_add(1);
        let elapsed = now.saturating_duration_since(start);
        if elapsed < FPS_WINDOW {
            return None;
        }

        let fps = self.window_frames as f32 / elapsed.as_secs_f32();
        self.last_fps = fps;
        self.window_start = Some(now);
        self.window_frames = 0;
        Some(fps)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FPS)
    }
}
