//! Stateless pseudo-random and noise primitives.
//!
//! Everything here is a pure function of its inputs so that a particle can
//! recompute its own random stream from `(index, time)` on any thread (or on
//! the GPU, see `shaders/snow_update.wgsl`) without carrying generator state.

use std::f32::consts::PI;

use super::math::{add, mul_scalar};

/// Per-axis drift of the noise sample point over time.
const NOISE_TIME_OFFSETS: [f32; 3] = [0.13, 0.17, 0.11];

/// PCG output permutation on a single 32-bit word.
pub fn pcg_hash(seed: u32) -> u32 {
    let state = seed.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Maps a hash to `[0, 1)` using the top 24 bits so the result is exact in `f32`.
pub fn unit_from_bits(bits: u32) -> f32 {
    (bits >> 8) as f32 / 16_777_216.0
}

/// Hash of `(index, seed, salt)` in `[0, 1)`.
pub fn hash01_u32(index: u32, seed: u32, salt: u32) -> f32 {
    unit_from_bits(pcg_hash(index ^ pcg_hash(seed ^ pcg_hash(salt))))
}

/// Hash of `(index, time, salt)` in `[0, 1)`.
///
/// `time` contributes through its bit pattern, so two frames with distinct
/// timestamps yield unrelated streams.
pub fn hash01(index: u32, time: f32, salt: u32) -> f32 {
    hash01_u32(index, time.to_bits(), salt)
}

fn lattice(ix: i32, iy: i32, iz: i32) -> f32 {
    let h = pcg_hash(ix as u32 ^ pcg_hash(iy as u32 ^ pcg_hash(iz as u32)));
    unit_from_bits(h) * 2.0 - 1.0
}

fn fade(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Trilinear value noise in `[-1, 1]`. Continuous in `p`.
pub fn noise3(p: [f32; 3]) -> f32 {
    let base = [p[0].floor(), p[1].floor(), p[2].floor()];
    let (ix, iy, iz) = (base[0] as i32, base[1] as i32, base[2] as i32);
    let fx = fade(p[0] - base[0]);
    let fy = fade(p[1] - base[1]);
    let fz = fade(p[2] - base[2]);

    let x00 = lerp(lattice(ix, iy, iz), lattice(ix + 1, iy, iz), fx);
    let x10 = lerp(lattice(ix, iy + 1, iz), lattice(ix + 1, iy + 1, iz), fx);
    let x01 = lerp(lattice(ix, iy, iz + 1), lattice(ix + 1, iy, iz + 1), fx);
    let x11 = lerp(lattice(ix, iy + 1, iz + 1), lattice(ix + 1, iy + 1, iz + 1), fx);

    lerp(lerp(x00, x10, fy), lerp(x01, x11, fy), fz)
}

/// Turbulence acceleration for one particle.
///
/// The noise value shifts per-axis sinusoids whose phase is the particle's
/// own `phase`, so neighbouring flakes sampling similar noise still drift
/// apart. Each component is bounded by `amplitude`.
pub fn turbulence(
    position: [f32; 3],
    phase: f32,
    time: f32,
    noise_scale: f32,
    amplitude: f32,
) -> [f32; 3] {
    if amplitude == 0.0 {
        return [0.0; 3];
    }

    let sample = add(
        mul_scalar(position, noise_scale),
        mul_scalar(NOISE_TIME_OFFSETS, time),
    );
    let n = noise3(sample) * PI;

    [
        (time * 0.9 + phase + n).sin() * amplitude,
        (time * 0.7 + phase * 1.3 + n).sin() * amplitude * 0.3,
        (time * 0.8 + phase * 0.7 + n).cos() * amplitude,
    ]
}

#[cfg(test)]
mod tests {
    use super::{hash01, hash01_u32, noise3, turbulence};

    #[test]
    fn hash_is_in_unit_range_and_reproducible() {
        for i in 0..2_000u32 {
            let h = hash01(i, 3.25, 7);
            assert!((0.0..1.0).contains(&h));
            assert_eq!(h.to_bits(), hash01(i, 3.25, 7).to_bits());
        }
    }

    #[test]
    fn hash_depends_on_every_input() {
        let base = hash01_u32(10, 20, 30);
        assert_ne!(base, hash01_u32(11, 20, 30));
        assert_ne!(base, hash01_u32(10, 21, 30));
        assert_ne!(base, hash01_u32(10, 20, 31));
    }

    #[test]
    fn hash_is_roughly_uniform() {
        let below = (0..10_000u32).filter(|&i| hash01(i, 1.5, 0) < 0.05).count();
        assert!((300..700).contains(&below), "below={below}");
    }

    #[test]
    fn noise_is_bounded() {
        for i in 0..4_000 {
            let t = i as f32 * 0.137;
            let v = noise3([t, t * 0.61 - 4.0, -t * 1.7 + 2.0]);
            assert!((-1.0..=1.0).contains(&v), "noise out of range: {v}");
        }
    }

    #[test]
    fn noise_is_continuous_across_lattice_cells() {
        let a = noise3([0.9999, 2.0, -1.0]);
        let b = noise3([1.0001, 2.0, -1.0]);
        assert!((a - b).abs() < 1e-3);
    }

    #[test]
    fn zero_amplitude_turbulence_is_zero() {
        assert_eq!(turbulence([0.3, 0.1, 0.2], 1.0, 4.0, 1.5, 0.0), [0.0; 3]);
    }
}
