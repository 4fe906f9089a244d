use std::borrow::Cow;
use std::mem::size_of;
use std::sync::mpsc;

use bytemuck::{bytes_of, cast_slice};

use super::compute::{ParticleBufferLayout, ParticleComputePlan, ParticleWorkgroup, SNOW_WORKGROUP_SIZE};
use super::config::{PopulationConfig, SceneConfig};
use super::simulation::{Particle, ParticleState, SimulationParams};

#[derive(Debug, thiserror::Error)]
pub enum ParticleGpuError {
    #[error("invalid particle workgroup size: expected {expected}, got {got}")]
    InvalidWorkgroupSize { expected: u32, got: u32 },
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
    #[error("failed to map GPU staging buffer: {0}")]
    MapFailed(#[from] wgpu::BufferAsyncError),
    #[error("staging-map channel closed before completion")]
    ChannelClosed,
}

/// Requests a headless adapter and device for compute work.
pub async fn request_compute_device() -> Result<(wgpu::Device, wgpu::Queue), ParticleGpuError> {
    let instance = wgpu::Instance::default();
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(ParticleGpuError::NoAdapter)?;
    log::debug!("particle compute adapter: {:?}", adapter.get_info());

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("snow.compute.device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        )
        .await?;
    Ok((device, queue))
}

pub struct ParticleGpuSim {
    compute_plan: ParticleComputePlan,
    particle_buffer: wgpu::Buffer,
    sim_uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pipeline: wgpu::ComputePipeline,
}

impl ParticleGpuSim {
    pub fn init(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene: SceneConfig,
        population: PopulationConfig,
        seed: u32,
        workgroup: ParticleWorkgroup,
    ) -> Result<Self, ParticleGpuError> {
        if workgroup.x != SNOW_WORKGROUP_SIZE {
            return Err(ParticleGpuError::InvalidWorkgroupSize {
                expected: SNOW_WORKGROUP_SIZE,
                got: workgroup.x,
            });
        }

        let compute_plan = ParticleComputePlan::new(scene.particle_count, workgroup);
        let layout = ParticleBufferLayout::default();
        // Zero-sized storage bindings are invalid; keep at least one slot.
        let particles_size = layout
            .particle_buffer_bytes(scene.particle_count)
            .max(layout.particle_stride_bytes);
        let initial = ParticleState::seeded(&scene, &population, seed);

        let particle_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("snow.particles.storage"),
            size: particles_size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if !initial.is_empty() {
            queue.write_buffer(&particle_buffer, 0, cast_slice(&initial.particles));
        }

        let initial_uniform = scene.params(0.0, 0.0, [0.0; 3]);
        let sim_uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("snow.params.uniform"),
            size: layout.sim_uniform_bytes,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&sim_uniform_buffer, 0, bytes_of(&initial_uniform));

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("snow.compute.bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(layout.sim_uniform_bytes),
                    },
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("snow.compute.bg"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: particle_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: sim_uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("snow.compute.pl"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let shader_source = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/shaders/snow_update.wgsl"
        ));
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("snow.update.shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(shader_source)),
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("snow.update.pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        log::debug!(
            "snow compute ready: particles={} dispatch_x={}",
            compute_plan.particle_count,
            compute_plan.dispatch_x
        );

        Ok(Self {
            compute_plan,
            particle_buffer,
            sim_uniform_buffer,
            bind_group,
            pipeline,
        })
    }

    pub fn particle_count(&self) -> u32 {
        self.compute_plan.particle_count
    }

    /// Uploads `params` and records one dispatch over every particle.
    ///
    /// The upload goes through `queue.write_buffer`, which lands before the
    /// next submit, so an encoder must carry exactly one step; [`Self::step`]
    /// owns its encoder for that reason.
    ///
    /// `particle_count` is forced to the allocated count so an oversized
    /// value cannot index past the storage buffer.
    fn encode_step(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        params: SimulationParams,
    ) {
        if self.compute_plan.dispatch_x == 0 {
            return;
        }

        let uniform = SimulationParams {
            particle_count: self.compute_plan.particle_count,
            ..params
        };
        queue.write_buffer(&self.sim_uniform_buffer, 0, bytes_of(&uniform));

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("snow.update.pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.dispatch_workgroups(self.compute_plan.dispatch_x, 1, 1);
    }

    pub fn step(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        params: SimulationParams,
    ) -> wgpu::SubmissionIndex {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("snow.step.encoder"),
        });
        self.encode_step(queue, &mut encoder, params);
        queue.submit(Some(encoder.finish()))
    }

    pub fn readback_debug_sample(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        sample_count: u32,
    ) -> Result<Vec<Particle>, ParticleGpuError> {
        let sample_count = sample_count.min(self.compute_plan.particle_count);
        if sample_count == 0 {
            return Ok(Vec::new());
        }

        let bytes_to_copy = (sample_count as u64) * size_of::<Particle>() as u64;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("snow.debug.staging"),
            size: bytes_to_copy,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("snow.debug.copy.encoder"),
        });
        encoder.copy_buffer_to_buffer(&self.particle_buffer, 0, &staging, 0, bytes_to_copy);
        queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        rx.recv().map_err(|_| ParticleGpuError::ChannelClosed)??;

        let data = slice.get_mapped_range();
        let particles: Vec<Particle> = cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();

        Ok(particles)
    }
}
