/// Explicit animation time, advanced once per frame by the caller

use std::time::Duration;

/// Elapsed time and a constant angular speed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationClock {
    elapsed: f32,
    /// Radians per second
    angular_speed: f32,
}

impl AnimationClock {
    pub fn new(angular_speed: f32) -> Self {
        Self { elapsed: 0.0, angular_speed }
    }

    pub fn advance(&mut self, delta: Duration) {
        self.elapsed += delta.as_secs_f32();
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }

    /// Seconds since creation or the last reset
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn angular_speed(&self) -> f32 {
        self.angular_speed
    }

    /// Current rotation angle in radians
    pub fn angle(&self) -> f32 {
        self.elapsed * self.angular_speed
    }
}

impl Default for AnimationClock {
    /// 90 degrees per second
    fn default() -> Self {
        Self::new(std::f32::consts::FRAC_PI_2)
    }
}
