use super::*;

//
// Path sampler
//

// Deterministic stream keyed by (iteration, pixel, depth). Every sample a
// kernel draws comes from one of these, never from thread-local state, which
// is what keeps parallel renders bit-reproducible.
#[derive(Clone)]
pub struct PathSampler {
    state: rand_pcg::Pcg32,
    distribution: rand::distributions::Uniform<f32>,
}

impl PathSampler {
    pub fn seeded(iteration: u32, pixel_index: u32, depth: u32) -> Self {
        let keyed = (depth << 22) | (1 << 31) | iteration;
        let seed = hash_u32(keyed) ^ hash_u32(pixel_index);
        Self {
            state: rand_pcg::Pcg32::seed_from_u64(u64::from(seed)),
            distribution: rand::distributions::Uniform::new(0.0, 1.0),
        }
    }

    // Uniform in [0, 1).
    pub fn sample(&mut self) -> f32 {
        self.distribution.sample(&mut self.state)
    }
}

// Bob Jenkins' 32-bit six-shift integer mix.
fn hash_u32(mut a: u32) -> u32 {
    a = a.wrapping_add(0x7ed55d16).wrapping_add(a << 12);
    a = (a ^ 0xc761c23c) ^ (a >> 19);
    a = a.wrapping_add(0x165667b1).wrapping_add(a << 5);
    a = a.wrapping_add(0xd3a2646c) ^ (a << 9);
    a = a.wrapping_add(0xfd7046c5).wrapping_add(a << 3);
    a = (a ^ 0xb55a4f09) ^ (a >> 16);
    a
}

//
// Sampling
//

// Shirley-Chiu concentric mapping of the unit square onto the unit disk.
pub fn sample_concentric_disk(s: f32, t: f32) -> Vec2 {
    let s = 2.0 * s - 1.0;
    let t = 2.0 * t - 1.0;
    if s == 0.0 && t == 0.0 {
        return vector![0.0, 0.0];
    }

    let (r, theta) = if f32::abs(s) > f32::abs(t) {
        (s, (PI / 4.0) * (t / s))
    } else {
        (t, (PI / 2.0) - (PI / 4.0) * (s / t))
    };

    vector![r * f32::cos(theta), r * f32::sin(theta)]
}

// Cosine-weighted hemisphere about +Y, by lifting a concentric disk sample.
pub fn sample_hemisphere_cosine(s: f32, t: f32) -> Vec3 {
    let d = sample_concentric_disk(s, t);
    let y = f32::sqrt(f32::max(0.0, 1.0 - d.x * d.x - d.y * d.y));
    vector![d.x, y, d.y]
}

//
// Orthonormal basis
//

// Implementation based on "Building an Orthonormal Basis, Revisited".
// https://graphics.pixar.com/library/OrthonormalB/paper.pdf
// Local space is right-handed with the normal along +Y.
#[derive(Clone, Copy)]
pub struct OrthonormalBasis {
    world_from_local: Mat3,
}

impl OrthonormalBasis {
    pub fn new(n: &Vec3) -> Self {
        let sign = f32::copysign(1.0, n.z);
        let a = -1.0 / (sign + n.z);
        let b = n.x * n.y * a;
        let t = vector![1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x];
        let bt = vector![b, sign + n.y * n.y * a, -n.y];
        Self {
            world_from_local: Mat3::from_columns(&[t, *n, bt]),
        }
    }

    #[inline]
    pub fn world_from_local(&self, local: &Vec3) -> Vec3 {
        self.world_from_local * local
    }
}

//
// Tests
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_determinism() {
        let mut a = PathSampler::seeded(7, 1234, 2);
        let mut b = PathSampler::seeded(7, 1234, 2);
        for _ in 0..64 {
            assert_eq!(a.sample().to_bits(), b.sample().to_bits());
        }
    }

    #[test]
    fn test_sampler_key_separation() {
        let stream = |mut s: PathSampler| [s.sample(), s.sample(), s.sample(), s.sample()];
        let base = stream(PathSampler::seeded(7, 1234, 2));
        assert_ne!(base, stream(PathSampler::seeded(8, 1234, 2)));
        assert_ne!(base, stream(PathSampler::seeded(7, 1235, 2)));
        assert_ne!(base, stream(PathSampler::seeded(7, 1234, 3)));
    }

    #[test]
    fn test_sampler_range() {
        let mut sampler = PathSampler::seeded(1, 0, 0);
        for _ in 0..1024 {
            let x = sampler.sample();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn test_concentric_disk() {
        // The origin case maps to the disk center.
        assert_eq!(sample_concentric_disk(0.5, 0.5), vector![0.0, 0.0]);

        // Everything stays inside the unit disk, corners map to radius 1.
        let n = 16;
        for i in 0..=n {
            for j in 0..=n {
                let d = sample_concentric_disk(i as f32 / n as f32, j as f32 / n as f32);
                assert!(d.norm() <= 1.0 + 1e-6);
            }
        }
        assert_abs_diff_eq!(sample_concentric_disk(1.0, 0.5).norm(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_hemisphere_cosine() {
        let mut sampler = PathSampler::seeded(3, 99, 0);
        for _ in 0..256 {
            let d = sample_hemisphere_cosine(sampler.sample(), sampler.sample());
            assert!(d.y >= 0.0);
            assert_abs_diff_eq!(d.norm(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_orthonormal_basis() {
        let mut sampler = PathSampler::seeded(5, 42, 0);
        for _ in 0..64 {
            let n = vector![
                2.0 * sampler.sample() - 1.0,
                2.0 * sampler.sample() - 1.0,
                2.0 * sampler.sample() - 1.0
            ]
            .normalize();
            let onb = OrthonormalBasis::new(&n);
            // +Y maps to the normal, and lengths are preserved.
            assert_abs_diff_eq!(onb.world_from_local(&vector![0.0, 1.0, 0.0]), n, epsilon = 1e-5);
            let v = onb.world_from_local(&vector![0.5, 0.5, -0.5]);
            assert_abs_diff_eq!(v.norm(), f32::sqrt(0.75), epsilon = 1e-5);
        }
    }
}
