// src/instancing/sampler.rs
//! Random per-instance placement: uniform position in a cube, uniform Euler
//! angles, isotropic scale.

use std::f32::consts::TAU;
use std::ops::RangeInclusive;

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Half edge of the placement cube, centred on the origin.
pub const POSITION_EXTENT: f32 = 20.0;
pub const SCALE_RANGE: RangeInclusive<f32> = 0.5..=1.0;

/// Raw sample before it is composed into a `Transform`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampledTransform {
    pub position: Vec3,
    /// XYZ Euler angles in radians, each in `[0, TAU)`.
    pub euler: Vec3,
    pub scale: f32,
}

impl SampledTransform {
    pub fn to_transform(self) -> Transform {
        Transform {
            translation: self.position,
            rotation: Quat::from_euler(EulerRot::XYZ, self.euler.x, self.euler.y, self.euler.z),
            scale: Vec3::splat(self.scale),
        }
    }
}

/// Owns the RNG; every call yields a fresh value, nothing is shared between samples.
#[derive(Resource)]
pub struct TransformSampler {
    rng: ChaCha8Rng,
}

impl TransformSampler {
    /// Seeded sampler for reproducible layouts, OS entropy otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_os_rng(),
        };
        Self { rng }
    }

    pub fn sample_parts(&mut self) -> SampledTransform {
        let e = POSITION_EXTENT;
        let position = Vec3::new(
            self.rng.random_range(-e..=e),
            self.rng.random_range(-e..=e),
            self.rng.random_range(-e..=e),
        );
        let euler = Vec3::new(
            self.rng.random_range(0.0..TAU),
            self.rng.random_range(0.0..TAU),
            self.rng.random_range(0.0..TAU),
        );
        let scale = self.rng.random_range(SCALE_RANGE);
        SampledTransform { position, euler, scale }
    }

    #[inline]
    pub fn sample(&mut self) -> Transform {
        self.sample_parts().to_transform()
    }
}

impl Default for TransformSampler {
    fn default() -> Self {
        Self::new(None)
    }
}
