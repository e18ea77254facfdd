use std::time::{Duration, Instant};

/// Frame clock feeding `UiService::update`. A fixed step makes runs reproducible.
pub struct Time {
    start: Instant,
    last: Instant,
    fixed: Option<Duration>,
    frames: u64,
    pub delta: Duration,
}

impl Time {
    pub fn new() -> Self {
        let now = Instant::now();
        Self { start: now, last: now, fixed: None, frames: 0, delta: Duration::ZERO }
    }

    pub fn fixed(step_secs: f32) -> Self {
        Self { fixed: Some(Duration::from_secs_f32(step_secs)), ..Self::new() }
    }

    pub fn tick(&mut self) {
        self.frames += 1;
        if let Some(step) = self.fixed {
            self.delta = step;
            self.last += step;
            return;
        }
        let now = Instant::now();
        self.delta = now - self.last;
        self.last = now;
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.last.duration_since(self.start).as_secs_f32()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}
