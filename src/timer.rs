use std::time::Instant;

/// Elapsed/delta pair handed to the uniform frame, in scaled seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimerTick {
    pub total: f32,
    pub frame: f32,
}

/// Playback clock for the shader.
///
/// Runs from loop start, can be paused and sped up or slowed down. Speed never goes
/// below zero so `fGlobalTime` only moves forward.
#[derive(Debug, Clone)]
pub struct Timer {
    running: bool,
    speed: f64,
    total: f64,
    last: Instant,
}

impl Timer {
    pub fn new(start: Instant) -> Self {
        Self { running: true, speed: 1.0, total: 0.0, last: start }
    }

    /// Advance to `now`. A `now` earlier than the previous tick counts as zero.
    pub fn tick(&mut self, now: Instant) -> TimerTick {
        let diff = now.saturating_duration_since(self.last).as_secs_f64();
        self.last = now.max(self.last);

        let frame = if self.running { diff * self.speed } else { 0.0 };
        self.total += frame;

        TimerTick { total: self.total as f32, frame: frame as f32 }
    }

    pub fn toggle_pause(&mut self) {
        self.running = !self.running;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn adjust_speed(&mut self, delta: f64) {
        // round away float drift from repeated 0.1 steps
        self.speed = ((self.speed + delta) * 100.0).round().max(0.0) / 100.0;
    }

    /// "Speed: 1.0" or "Paused", for the window title.
    pub fn label(&self) -> String {
        if self.running {
            format!("Speed: {:.1}", self.speed)
        } else {
            "Paused".to_string()
        }
    }
}
