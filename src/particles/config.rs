use std::path::Path;

use serde::{Deserialize, Serialize};

use super::simulation::SimulationParams;

/// Fraction of the dome radius used as the collision sphere. The dome mesh
/// itself is drawn at the full radius.
pub const DOME_COLLISION_MARGIN: f32 = 0.95;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access scene file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid scene json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Scene constants for the snow globe.
///
/// Non-positive `dome_radius` is a caller error and is not checked; it
/// produces degenerate motion rather than a failure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub particle_count: u32,
    pub dome_radius: f32,
    pub dome_center_y: f32,
    pub floor_y: f32,
    /// Magnitude of the downward acceleration.
    pub gravity: f32,
    /// Quadratic drag coefficient.
    pub drag: f32,
    pub turbulence: f32,
    pub noise_scale: f32,
    /// Normal velocity kept after a dome bounce. The floor keeps half of it.
    pub restitution: f32,
    /// Speed below which a flake resting on the floor counts as settled.
    pub settle_speed: f32,
    /// Per-frame chance that a settled flake is respawned.
    pub respawn_probability: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            particle_count: 5_000,
            dome_radius: 2.0,
            dome_center_y: 0.0,
            floor_y: -1.4,
            gravity: 0.35,
            drag: 0.8,
            turbulence: 0.25,
            noise_scale: 1.5,
            restitution: 0.3,
            settle_speed: 0.02,
            respawn_probability: 0.05,
        }
    }
}

impl SceneConfig {
    pub fn collision_radius(&self) -> f32 {
        self.dome_radius * DOME_COLLISION_MARGIN
    }

    pub fn dome_center(&self) -> [f32; 3] {
        [0.0, self.dome_center_y, 0.0]
    }

    /// Builds the per-frame parameter block.
    pub fn params(&self, time: f32, delta_time: f32, shake: [f32; 3]) -> SimulationParams {
        SimulationParams {
            time,
            delta_time,
            dome_radius: self.dome_radius,
            dome_center_y: self.dome_center_y,
            floor_y: self.floor_y,
            gravity: self.gravity,
            drag: self.drag,
            turbulence: self.turbulence,
            shake,
            restitution: self.restitution,
            particle_count: self.particle_count,
            noise_scale: self.noise_scale,
            settle_speed: self.settle_speed,
            respawn_probability: self.respawn_probability,
        }
    }

    pub fn save_json(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }
}

/// Shape of the initial flake population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub size_range: [f32; 2],
    pub alpha_range: [f32; 2],
    /// Lifetime handed to the lifetime variant; the dome physics ignores it.
    pub life_seconds: f32,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size_range: [0.008, 0.025],
            alpha_range: [0.55, 1.0],
            life_seconds: 4.0,
        }
    }
}

/// Point emitter for the lifetime particle variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    pub center: [f32; 3],
    pub radius: f32,
    pub initial_speed: f32,
    pub lifetime_seconds: f32,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0, 0.0],
            radius: 0.25,
            initial_speed: 1.0,
            lifetime_seconds: 3.0,
        }
    }
}
