//! "Shake the globe" input.
//!
//! Impulses decay exponentially and are summed into the external
//! acceleration the integrator adds to every flake.

const MIN_IMPULSE: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ShakeImpulse {
    acceleration: [f32; 3],
}

#[derive(Debug, Clone)]
pub struct ShakeController {
    half_life_seconds: f32,
    impulses: Vec<ShakeImpulse>,
}

impl Default for ShakeController {
    fn default() -> Self {
        Self::new(0.25)
    }
}

impl ShakeController {
    pub fn new(half_life_seconds: f32) -> Self {
        Self {
            half_life_seconds,
            impulses: Vec::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.impulses.is_empty()
    }

    /// Adds a shake along `direction` (need not be normalized) with
    /// acceleration magnitude `strength`.
    pub fn impulse(&mut self, direction: [f32; 3], strength: f32) {
        let len = (direction[0] * direction[0]
            + direction[1] * direction[1]
            + direction[2] * direction[2])
            .sqrt();
        if len <= f32::EPSILON || strength.abs() < MIN_IMPULSE {
            return;
        }
        let s = strength / len;
        log::debug!("shake impulse: dir={direction:?} strength={strength}");
        self.impulses.push(ShakeImpulse {
            acceleration: [direction[0] * s, direction[1] * s, direction[2] * s],
        });
    }

    /// Returns the acceleration for the coming step, then decays every
    /// impulse by `dt` and drops the spent ones.
    pub fn sample(&mut self, dt: f32) -> [f32; 3] {
        let mut total = [0.0f32; 3];
        for impulse in &self.impulses {
            total[0] += impulse.acceleration[0];
            total[1] += impulse.acceleration[1];
            total[2] += impulse.acceleration[2];
        }

        let decay = if self.half_life_seconds > 0.0 {
            0.5f32.powf(dt.max(0.0) / self.half_life_seconds)
        } else {
            0.0
        };
        for impulse in &mut self.impulses {
            for a in &mut impulse.acceleration {
                *a *= decay;
            }
        }
        self.impulses.retain(|impulse| {
            impulse.acceleration.iter().any(|a| a.abs() >= MIN_IMPULSE)
        });

        total
    }
}
