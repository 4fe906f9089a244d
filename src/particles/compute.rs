use std::mem::size_of;

use super::simulation::{Particle, SimulationParams};

/// Must match `@workgroup_size` in `shaders/snow_update.wgsl`.
pub const SNOW_WORKGROUP_SIZE: u32 = 64;

#[derive(Debug, Clone, Copy)]
pub struct ParticleWorkgroup {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Default for ParticleWorkgroup {
    fn default() -> Self {
        Self {
            x: SNOW_WORKGROUP_SIZE,
            y: 1,
            z: 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParticleComputePlan {
    pub particle_count: u32,
    pub workgroup: ParticleWorkgroup,
    pub dispatch_x: u32,
}

impl ParticleComputePlan {
    /// The last workgroup may be partially filled; the shader skips
    /// invocations whose index is past `particle_count`.
    pub fn new(particle_count: u32, workgroup: ParticleWorkgroup) -> Self {
        let dispatch_x = if particle_count == 0 {
            0
        } else {
            particle_count.div_ceil(workgroup.x)
        };
        Self {
            particle_count,
            workgroup,
            dispatch_x,
        }
    }

    pub fn invocations(&self) -> u32 {
        self.dispatch_x * self.workgroup.x
    }
}

pub const SNOW_UPDATE_SHADER_PATH: &str = "shaders/snow_update.wgsl";

#[derive(Debug, Clone, Copy)]
pub struct ParticleBufferLayout {
    pub particle_stride_bytes: u64,
    pub sim_uniform_bytes: u64,
}

impl Default for ParticleBufferLayout {
    fn default() -> Self {
        Self {
            // position.xyz + size, velocity.xyz + phase, alpha + life + pad
            particle_stride_bytes: size_of::<Particle>() as u64,
            sim_uniform_bytes: size_of::<SimulationParams>() as u64,
        }
    }
}

impl ParticleBufferLayout {
    pub fn particle_buffer_bytes(&self, particle_count: u32) -> u64 {
        self.particle_stride_bytes * particle_count as u64
    }
}
