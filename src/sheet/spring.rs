//! Damped spring used for sheet height and animated scrolls

/// Tension/friction pair in origami units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringConfig {
    pub tension: f32,
    pub friction: f32,
}

impl SpringConfig {
    /// Responsive with no visible bounce
    pub const SHEET: SpringConfig = SpringConfig {
        tension: 50.0,
        friction: 10.0,
    };

    pub fn stiffness(&self) -> f32 {
        (self.tension - 30.0) * 3.62 + 194.0
    }

    pub fn damping(&self) -> f32 {
        (self.friction - 8.0) * 3.0 + 25.0
    }
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self::SHEET
    }
}

const STEP_SECS: f64 = 0.001;
const MAX_FRAME_SECS: f64 = 0.064;
const REST_DISPLACEMENT: f64 = 0.01;
const REST_SPEED: f64 = 0.01;

/// State is integrated in f64; f32 steps stall short of the target at panel-sized magnitudes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spring {
    value: f64,
    velocity: f64,
    target: f64,
    config: SpringConfig,
}

impl Spring {
    pub fn new(value: f32, target: f32, velocity: f32, config: SpringConfig) -> Self {
        Self {
            value: f64::from(value),
            velocity: f64::from(velocity),
            target: f64::from(target),
            config,
        }
    }

    pub fn value(&self) -> f32 {
        self.value as f32
    }

    pub fn velocity(&self) -> f32 {
        self.velocity as f32
    }

    pub fn target(&self) -> f32 {
        self.target as f32
    }

    /// Move value and target together, keeping the motion in flight
    pub fn shift(&mut self, delta: f32) {
        self.value += f64::from(delta);
        self.target += f64::from(delta);
    }

    fn is_near_target(&self) -> bool {
        (self.value - self.target).abs() <= REST_DISPLACEMENT
    }

    pub fn is_settled(&self) -> bool {
        self.is_near_target() && self.velocity.abs() <= REST_SPEED
    }

    /// Advance by `dt` seconds; returns true once at rest on the target
    pub fn update(&mut self, dt: f32) -> bool {
        let dt = f64::from(dt).clamp(0.0, MAX_FRAME_SECS);
        let stiffness = f64::from(self.config.stiffness()).max(0.0);
        let damping = f64::from(self.config.damping()).max(0.0);

        let mut stalled = false;
        let mut remaining = dt;
        while remaining > 0.0 {
            let h = remaining.min(STEP_SECS);
            let displacement = self.value - self.target;
            let acceleration = -stiffness * displacement - damping * self.velocity;
            self.velocity += acceleration * h;
            let next = self.value + self.velocity * h;
            if h >= STEP_SECS {
                stalled = next == self.value;
            }
            self.value = next;
            remaining -= h;
        }

        // A step that no longer moves the value cannot get any closer
        if self.is_settled() || (stalled && self.is_near_target()) {
            self.value = self.target;
            self.velocity = 0.0;
            true
        } else {
            false
        }
    }
}
