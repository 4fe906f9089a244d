pub mod compute;
pub mod config;
pub mod gpu;
pub mod math;
pub mod noise;
pub mod simulation;

pub use compute::{ParticleComputePlan, ParticleWorkgroup};
pub use config::{ConfigError, EmitterConfig, PopulationConfig, SceneConfig};
pub use gpu::{request_compute_device, ParticleGpuError, ParticleGpuSim};
pub use simulation::{
    step_lifetime_particle, step_particle, FrameTiming, Particle, ParticleState, SimulationClock,
    SimulationParams, SimulationStats,
};
