use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};
use rayon::prelude::*;

use super::config::{EmitterConfig, PopulationConfig, SceneConfig, DOME_COLLISION_MARGIN};
use super::math::{add, dot, length, mul_scalar, sub};
use super::noise::{hash01, hash01_u32, turbulence};

/// Largest frame delta the clock hands to a step.
pub const MAX_DELTA_SECONDS: f32 = 0.1;

const DRAG_MIN_SPEED: f32 = 0.001;
const FLOOR_BOUNCE_DAMPING: f32 = 0.5;
const FLOOR_FRICTION: f32 = 0.9;
const RESPAWN_SPEED: f32 = 0.01;

// Respawn cap, as fractions of the dome radius: a disc of radius
// `RESPAWN_CAP_RADIUS` lifted between `RESPAWN_HEIGHT_MIN` and
// `RESPAWN_HEIGHT_MIN + RESPAWN_HEIGHT_SPAN` above the dome center.
pub const RESPAWN_CAP_RADIUS: f32 = 0.5;
pub const RESPAWN_HEIGHT_MIN: f32 = 0.6;
pub const RESPAWN_HEIGHT_SPAN: f32 = 0.1;

pub const SALT_RESPAWN_ROLL: u32 = 0x5157_0001;
pub const SALT_RESPAWN_ANGLE: u32 = 0x5157_0002;
pub const SALT_RESPAWN_RADIUS: u32 = 0x5157_0003;
pub const SALT_RESPAWN_HEIGHT: u32 = 0x5157_0004;

const SALT_SEED_RADIUS: u32 = 0x5eed_0001;
const SALT_SEED_POLAR: u32 = 0x5eed_0002;
const SALT_SEED_AZIMUTH: u32 = 0x5eed_0003;
const SALT_SEED_SIZE: u32 = 0x5eed_0004;
const SALT_SEED_ALPHA: u32 = 0x5eed_0005;
const SALT_SEED_PHASE: u32 = 0x5eed_0006;

const SALT_EMIT_ANGLE: u32 = 0xe317_0001;
const SALT_EMIT_RADIUS: u32 = 0xe317_0002;
const SALT_EMIT_LIFE: u32 = 0xe317_0003;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub position: [f32; 3],
    pub size: f32,
    pub velocity: [f32; 3],
    /// Turbulence decorrelation offset in `[0, 2π)`.
    pub phase: f32,
    pub alpha: f32,
    /// Remaining lifetime, only consumed by the lifetime variant.
    pub life: f32,
    pub _pad: [f32; 2],
}

impl Particle {
    pub fn at(position: [f32; 3], velocity: [f32; 3]) -> Self {
        Self {
            position,
            size: 0.01,
            velocity,
            phase: 0.0,
            alpha: 1.0,
            life: 0.0,
            _pad: [0.0; 2],
        }
    }

    pub fn speed(&self) -> f32 {
        length(self.velocity)
    }
}

/// Shared per-frame parameters. Written once by the driver before a step,
/// read-only during it. Layout matches the WGSL uniform block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SimulationParams {
    pub time: f32,
    pub delta_time: f32,
    pub dome_radius: f32,
    pub dome_center_y: f32,
    pub floor_y: f32,
    pub gravity: f32,
    pub drag: f32,
    pub turbulence: f32,
    pub shake: [f32; 3],
    pub restitution: f32,
    pub particle_count: u32,
    pub noise_scale: f32,
    pub settle_speed: f32,
    pub respawn_probability: f32,
}

impl SimulationParams {
    fn dome_center(&self) -> [f32; 3] {
        [0.0, self.dome_center_y, 0.0]
    }
}

/// Advances one flake by `params.delta_time` inside the dome.
///
/// Reads and writes only `particle`; the result depends on nothing but the
/// particle, its `index` and `params`, so evaluation order is irrelevant.
pub fn step_particle(index: u32, particle: &mut Particle, params: &SimulationParams) {
    if index >= params.particle_count {
        return;
    }
    let dt = params.delta_time;
    if dt == 0.0 {
        return;
    }

    let mut accel = [0.0, -params.gravity, 0.0];

    let speed = particle.speed();
    if speed > DRAG_MIN_SPEED {
        accel = sub(accel, mul_scalar(particle.velocity, params.drag * speed));
    }

    accel = add(accel, params.shake);
    accel = add(
        accel,
        turbulence(
            particle.position,
            particle.phase,
            params.time,
            params.noise_scale,
            params.turbulence,
        ),
    );

    // Semi-implicit Euler: position uses the updated velocity.
    particle.velocity = add(particle.velocity, mul_scalar(accel, dt));
    particle.position = add(particle.position, mul_scalar(particle.velocity, dt));

    collide_dome(particle, params);
    let on_floor = collide_floor(particle, params);

    if on_floor && particle.speed() < params.settle_speed {
        try_respawn(index, particle, params);
    }
}

fn collide_dome(particle: &mut Particle, params: &SimulationParams) {
    let center = params.dome_center();
    let limit = params.dome_radius * DOME_COLLISION_MARGIN;
    let offset = sub(particle.position, center);
    let distance = length(offset);
    if distance <= limit || distance <= f32::EPSILON {
        return;
    }

    let normal = mul_scalar(offset, distance.recip());
    particle.position = add(center, mul_scalar(normal, limit));

    let normal_speed = dot(particle.velocity, normal);
    if normal_speed > 0.0 {
        // Remove the outward component and add it back reversed and damped.
        let delta = -normal_speed * (1.0 + params.restitution);
        particle.velocity = add(particle.velocity, mul_scalar(normal, delta));
    }
}

fn collide_floor(particle: &mut Particle, params: &SimulationParams) -> bool {
    if particle.position[1] >= params.floor_y {
        return false;
    }

    particle.position[1] = params.floor_y;
    if particle.velocity[1] < 0.0 {
        particle.velocity[1] = -particle.velocity[1] * params.restitution * FLOOR_BOUNCE_DAMPING;
    }
    particle.velocity[0] *= FLOOR_FRICTION;
    particle.velocity[2] *= FLOOR_FRICTION;
    true
}

/// Respawn roll for a settled flake. Exposed so drivers and tests can tell
/// ahead of time whether `(index, time)` will be picked.
pub fn respawn_roll(index: u32, time: f32) -> f32 {
    hash01(index, time, SALT_RESPAWN_ROLL)
}

fn try_respawn(index: u32, particle: &mut Particle, params: &SimulationParams) {
    if respawn_roll(index, params.time) >= params.respawn_probability {
        return;
    }

    let radius = params.dome_radius;
    let angle = hash01(index, params.time, SALT_RESPAWN_ANGLE) * TAU;
    // sqrt keeps the areal density uniform over the disc.
    let radial = hash01(index, params.time, SALT_RESPAWN_RADIUS).sqrt() * radius * RESPAWN_CAP_RADIUS;
    let lift = RESPAWN_HEIGHT_MIN + hash01(index, params.time, SALT_RESPAWN_HEIGHT) * RESPAWN_HEIGHT_SPAN;

    particle.position = [
        radial * angle.cos(),
        params.dome_center_y + lift * radius,
        radial * angle.sin(),
    ];
    particle.velocity = [0.0, -RESPAWN_SPEED, 0.0];
}

/// Lifetime variant: a fountain of short-lived particles recycled at the
/// emitter once `life` runs out. No dome or floor.
pub fn step_lifetime_particle(
    index: u32,
    particle: &mut Particle,
    params: &SimulationParams,
    emitter: &EmitterConfig,
) {
    if index >= params.particle_count {
        return;
    }
    let dt = params.delta_time;
    if dt == 0.0 {
        return;
    }

    particle.life -= dt;
    if particle.life <= 0.0 {
        emit(index, particle, params.time, emitter);
        return;
    }

    let mut accel = [0.0, -params.gravity, 0.0];
    let speed = particle.speed();
    if speed > DRAG_MIN_SPEED {
        accel = sub(accel, mul_scalar(particle.velocity, params.drag * speed));
    }
    accel = add(accel, params.shake);
    accel = add(
        accel,
        turbulence(
            particle.position,
            particle.phase,
            params.time,
            params.noise_scale,
            params.turbulence,
        ),
    );

    particle.velocity = add(particle.velocity, mul_scalar(accel, dt));
    particle.position = add(particle.position, mul_scalar(particle.velocity, dt));
}

fn emit(index: u32, particle: &mut Particle, time: f32, emitter: &EmitterConfig) {
    let angle = hash01(index, time, SALT_EMIT_ANGLE) * TAU;
    let radial = emitter.radius * hash01(index, time, SALT_EMIT_RADIUS).sqrt();
    let offset = [radial * angle.cos(), 0.0, radial * angle.sin()];

    // Upward cone that widens with the spawn offset.
    let spread = if emitter.radius > 0.0 { radial / emitter.radius } else { 0.0 };
    let direction = [angle.cos() * spread * 0.5, 1.0, angle.sin() * spread * 0.5];
    let direction = mul_scalar(direction, length(direction).recip());

    particle.position = add(emitter.center, offset);
    particle.velocity = mul_scalar(direction, emitter.initial_speed);
    particle.life = emitter.lifetime_seconds * (0.5 + 0.5 * hash01(index, time, SALT_EMIT_LIFE));
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimulationStats {
    pub on_floor: usize,
    pub settled: usize,
    pub max_radial_distance: f32,
    pub mean_speed: f32,
}

#[derive(Debug)]
pub struct ParticleState {
    pub particles: Vec<Particle>,
}

impl ParticleState {
    /// Seeds `scene.particle_count` flakes uniformly inside the collision
    /// sphere and above the floor.
    pub fn seeded(scene: &SceneConfig, population: &PopulationConfig, seed: u32) -> Self {
        let particles = (0..scene.particle_count)
            .map(|i| seed_particle(i, seed, scene, population))
            .collect();
        Self { particles }
    }

    /// Seeds an idle fountain; every slot is emitted on its first step.
    pub fn lifetime(count: u32, population: &PopulationConfig, seed: u32) -> Self {
        let scene = SceneConfig {
            particle_count: count,
            ..SceneConfig::default()
        };
        let particles = (0..count)
            .map(|i| Particle {
                life: 0.0,
                ..seed_particle(i, seed, &scene, population)
            })
            .collect();
        Self { particles }
    }

    pub fn from_particles(particles: Vec<Particle>) -> Self {
        Self { particles }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Discards the population and reseeds it, e.g. after a particle-count change.
    pub fn rebuild(&mut self, scene: &SceneConfig, population: &PopulationConfig, seed: u32) {
        log::debug!(
            "rebuilding particle population: {} -> {}",
            self.particles.len(),
            scene.particle_count
        );
        *self = Self::seeded(scene, population, seed);
    }

    pub fn step(&mut self, params: &SimulationParams) {
        for (i, particle) in self.particles.iter_mut().enumerate() {
            step_particle(i as u32, particle, params);
        }
    }

    /// Same result as [`ParticleState::step`], bit for bit.
    pub fn step_parallel(&mut self, params: &SimulationParams) {
        self.particles
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, particle)| step_particle(i as u32, particle, params));
    }

    pub fn step_lifetime(&mut self, params: &SimulationParams, emitter: &EmitterConfig) {
        self.particles
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, particle)| step_lifetime_particle(i as u32, particle, params, emitter));
    }

    pub fn stats(&self, params: &SimulationParams) -> SimulationStats {
        if self.particles.is_empty() {
            return SimulationStats::default();
        }

        let center = params.dome_center();
        let mut stats = SimulationStats::default();
        let mut speed_sum = 0.0f32;
        for particle in &self.particles {
            let speed = particle.speed();
            speed_sum += speed;
            stats.max_radial_distance = stats
                .max_radial_distance
                .max(length(sub(particle.position, center)));
            if particle.position[1] <= params.floor_y {
                stats.on_floor += 1;
                if speed < params.settle_speed {
                    stats.settled += 1;
                }
            }
        }
        stats.mean_speed = speed_sum / self.particles.len() as f32;
        stats
    }
}

fn seed_particle(index: u32, seed: u32, scene: &SceneConfig, population: &PopulationConfig) -> Particle {
    let limit = scene.collision_radius() * 0.98;
    let r = limit * hash01_u32(index, seed, SALT_SEED_RADIUS).cbrt();
    let cos_polar = hash01_u32(index, seed, SALT_SEED_POLAR) * 2.0 - 1.0;
    let sin_polar = (1.0 - cos_polar * cos_polar).max(0.0).sqrt();
    let azimuth = hash01_u32(index, seed, SALT_SEED_AZIMUTH) * TAU;

    let mut position = add(
        scene.dome_center(),
        [
            r * sin_polar * azimuth.cos(),
            r * cos_polar,
            r * sin_polar * azimuth.sin(),
        ],
    );
    position[1] = position[1].max(scene.floor_y);

    let [size_lo, size_hi] = population.size_range;
    let [alpha_lo, alpha_hi] = population.alpha_range;
    Particle {
        position,
        size: size_lo + (size_hi - size_lo) * hash01_u32(index, seed, SALT_SEED_SIZE),
        velocity: [0.0, -RESPAWN_SPEED, 0.0],
        phase: hash01_u32(index, seed, SALT_SEED_PHASE) * TAU,
        alpha: alpha_lo + (alpha_hi - alpha_lo) * hash01_u32(index, seed, SALT_SEED_ALPHA),
        life: population.life_seconds,
        _pad: [0.0; 2],
    }
}

/// Driver-side clock: rolling `time` plus clamped frame delta.
#[derive(Debug, Clone, Copy)]
pub struct SimulationClock {
    pub max_delta_seconds: f32,
    time_seconds: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    pub time: f32,
    pub delta_time: f32,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(MAX_DELTA_SECONDS)
    }
}

impl SimulationClock {
    pub fn new(max_delta_seconds: f32) -> Self {
        Self {
            max_delta_seconds,
            time_seconds: 0.0,
        }
    }

    pub fn time_seconds(&self) -> f32 {
        self.time_seconds
    }

    /// Feeds a wall-clock frame delta. Stalls (tab resume, dropped frames)
    /// are clamped to `max_delta_seconds`; negative or non-finite deltas
    /// count as zero.
    pub fn advance(&mut self, frame_dt_seconds: f32) -> FrameTiming {
        let delta_time = if frame_dt_seconds.is_finite() {
            frame_dt_seconds.clamp(0.0, self.max_delta_seconds)
        } else {
            0.0
        };
        self.time_seconds += delta_time;
        FrameTiming {
            time: self.time_seconds,
            delta_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        step_lifetime_particle, step_particle, Particle, ParticleState, SimulationClock,
        SimulationParams,
    };
    use crate::particles::config::{EmitterConfig, PopulationConfig, SceneConfig};

    fn calm_params(delta_time: f32) -> SimulationParams {
        SceneConfig {
            particle_count: 1,
            turbulence: 0.0,
            drag: 0.0,
            gravity: 0.0,
            ..SceneConfig::default()
        }
        .params(1.0, delta_time, [0.0; 3])
    }

    #[test]
    fn clock_clamps_stalled_frames() {
        let mut clock = SimulationClock::default();
        let frame = clock.advance(2.5);
        assert_eq!(frame.delta_time, 0.1);
        assert_eq!(frame.time, 0.1);
        assert_eq!(clock.advance(-1.0).delta_time, 0.0);
        assert_eq!(clock.advance(f32::NAN).delta_time, 0.0);
        assert!((clock.time_seconds() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn index_past_particle_count_is_untouched() {
        let params = calm_params(0.05);
        let mut particle = Particle::at([0.0, 5.0, 0.0], [1.0, 1.0, 1.0]);
        let before = particle;
        step_particle(1, &mut particle, &params);
        assert_eq!(particle, before);
    }

    #[test]
    fn free_particle_moves_with_velocity() {
        let params = calm_params(0.5);
        let mut particle = Particle::at([0.0, 0.0, 0.0], [0.2, 0.0, -0.2]);
        step_particle(0, &mut particle, &params);
        assert_eq!(particle.position, [0.1, 0.0, -0.1]);
        assert_eq!(particle.velocity, [0.2, 0.0, -0.2]);
    }

    #[test]
    fn drag_is_skipped_below_minimum_speed() {
        let mut params = calm_params(0.01);
        params.drag = 1.0;
        let mut particle = Particle::at([0.0, 0.0, 0.0], [0.0005, 0.0, 0.0]);
        step_particle(0, &mut particle, &params);
        assert_eq!(particle.velocity, [0.0005, 0.0, 0.0]);
    }

    #[test]
    fn drag_applies_just_above_minimum_speed() {
        let mut params = calm_params(0.01);
        params.drag = 1.0;
        let mut particle = Particle::at([0.0, 0.0, 0.0], [0.002, 0.0, 0.0]);
        step_particle(0, &mut particle, &params);
        assert!(particle.velocity[0] < 0.002);
    }

    #[test]
    fn gravity_updates_velocity_before_position() {
        let mut params = calm_params(0.1);
        params.gravity = 1.0;
        let mut particle = Particle::at([0.0, 0.0, 0.0], [0.0; 3]);
        step_particle(0, &mut particle, &params);
        assert!((particle.velocity[1] + 0.1).abs() < 1e-6);
        assert!((particle.position[1] + 0.01).abs() < 1e-6);
    }

    #[test]
    fn floor_bounce_is_weaker_than_dome_bounce() {
        let mut params = calm_params(0.01);
        params.restitution = 0.5;
        let mut particle = Particle::at([0.0, params.floor_y + 0.001, 0.0], [1.0, -1.0, 0.0]);
        step_particle(0, &mut particle, &params);
        assert_eq!(particle.position[1], params.floor_y);
        assert!((particle.velocity[1] - 0.25).abs() < 1e-6);
        assert!((particle.velocity[0] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn seeded_population_fits_inside_the_dome() {
        let scene = SceneConfig::default();
        let state = ParticleState::seeded(&scene, &PopulationConfig::default(), 42);
        assert_eq!(state.len(), scene.particle_count as usize);
        let limit = scene.collision_radius();
        for p in &state.particles {
            let d = (p.position[0].powi(2)
                + (p.position[1] - scene.dome_center_y).powi(2)
                + p.position[2].powi(2))
            .sqrt();
            assert!(d <= limit);
            assert!(p.position[1] >= scene.floor_y);
            assert!((0.0..std::f32::consts::TAU).contains(&p.phase));
        }
    }

    #[test]
    fn rebuild_changes_population_size() {
        let population = PopulationConfig::default();
        let mut scene = SceneConfig {
            particle_count: 100,
            ..SceneConfig::default()
        };
        let mut state = ParticleState::seeded(&scene, &population, 1);
        scene.particle_count = 250;
        state.rebuild(&scene, &population, 1);
        assert_eq!(state.len(), 250);
    }

    #[test]
    fn expired_lifetime_particle_is_reemitted() {
        let params = SceneConfig {
            particle_count: 1,
            ..SceneConfig::default()
        }
        .params(0.5, 0.02, [0.0; 3]);
        let emitter = EmitterConfig::default();
        let mut particle = Particle::at([3.0, -2.0, 1.0], [0.0, -4.0, 0.0]);
        particle.life = 0.01;
        step_lifetime_particle(0, &mut particle, &params, &emitter);

        assert!(particle.life > 0.0);
        assert!(particle.life <= emitter.lifetime_seconds);
        let dx = particle.position[0] - emitter.center[0];
        let dz = particle.position[2] - emitter.center[2];
        assert!((dx * dx + dz * dz).sqrt() <= emitter.radius + 1e-5);
        assert!(particle.velocity[1] > 0.0);
    }

    #[test]
    fn lifetime_state_keeps_slot_count() {
        let params = SceneConfig {
            particle_count: 64,
            ..SceneConfig::default()
        }
        .params(0.0, 1.0 / 60.0, [0.0; 3]);
        let mut state = ParticleState::lifetime(64, &PopulationConfig::default(), 3);
        for frame in 0..240 {
            let params = SimulationParams {
                time: frame as f32 / 60.0,
                ..params
            };
            state.step_lifetime(&params, &EmitterConfig::default());
        }
        assert_eq!(state.len(), 64);
        assert!(state.particles.iter().all(|p| p.life > 0.0));
    }
}
