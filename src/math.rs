use super::*;

//
// Aliases
//

pub type Vec2 = na::Vector2<f32>;
pub type Vec3 = na::Vector3<f32>;
pub type Point3 = na::Point3<f32>;
pub type Normal = na::Unit<na::Vector3<f32>>;
pub type Mat3 = na::Matrix3<f32>;
pub type Mat4 = na::Matrix4<f32>;

#[macro_export]
macro_rules! normal {
    ($x:expr, $y:expr, $z:expr) => {
        $crate::math::Normal::new_normalize(nalgebra::vector![$x, $y, $z])
    };
    ($v:expr) => {
        $crate::math::Normal::new_normalize($v)
    };
}

//
// Interpolation
//

pub fn lerp_scalar<T: num::Float>(a: T, b: T, t: T) -> T {
    a * (T::one() - t) + b * t
}

//
// Geometric
//

// `v` is the incident direction, `n` the surface normal. Both unit.
pub fn reflect_vector(v: &Vec3, n: &Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

// Snell refraction of incident direction `v` about `n`, with `eta` the ratio
// of indices of refraction on the incident side over the transmitted side.
// `n` must oppose `v`. Returns `None` on total internal reflection.
pub fn refract_vector(v: &Vec3, n: &Vec3, eta: f32) -> Option<Vec3> {
    let cos_i = -v.dot(n);
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i);
    if sin2_t > 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    Some((eta * v + (eta * cos_i - cos_t) * n).normalize())
}

//
// Tests
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_scalar() {
        assert_ulps_eq!(lerp_scalar(0.0, 1.0, 0.0), 0.0, max_ulps = 1);
        assert_ulps_eq!(lerp_scalar(0.0, 1.0, 0.5), 0.5, max_ulps = 1);
        assert_ulps_eq!(lerp_scalar(0.0, 1.0, 1.0), 1.0, max_ulps = 1);
    }

    #[test]
    fn test_lerp_running_mean() {
        // Folding lerp(acc, x, 1/n) over a sequence yields its arithmetic
        // mean, which is what keeps the progressive image unbiased.
        let samples = [1.0_f32, 2.0, 4.0, 8.0, 16.0];
        let mut acc = 0.0;
        for (i, sample) in samples.iter().enumerate() {
            acc = lerp_scalar(acc, *sample, 1.0 / (i + 1) as f32);
        }
        let mean = samples.iter().sum::<f32>() / samples.len() as f32;
        assert_abs_diff_eq!(acc, mean, epsilon = 1e-5);
    }

    #[test]
    fn test_reflect_vector() {
        let v = vector![1.0, -1.0, 0.0].normalize();
        let n = vector![0.0, 1.0, 0.0];
        let r = reflect_vector(&v, &n);
        assert_ulps_eq!(r.x, v.x, max_ulps = 1);
        assert_ulps_eq!(r.y, -v.y, max_ulps = 1);
        assert_ulps_eq!(r.z, v.z, max_ulps = 1);
    }

    #[test]
    fn test_refract_vector_straight_through() {
        let v = vector![0.0, -1.0, 0.0];
        let n = vector![0.0, 1.0, 0.0];
        let t = refract_vector(&v, &n, 1.0).expect("no refraction at eta 1");
        assert_abs_diff_eq!(t, v, epsilon = 1e-6);
    }

    #[test]
    fn test_refract_vector_bends_toward_normal() {
        // Entering a denser medium, the transmitted ray bends toward -n.
        let v = vector![1.0, -1.0, 0.0].normalize();
        let n = vector![0.0, 1.0, 0.0];
        let t = refract_vector(&v, &n, 1.0 / 1.5).expect("below critical angle");
        assert!(t.y < 0.0);
        assert!(t.x.abs() < v.x.abs());
    }

    #[test]
    fn test_refract_vector_total_internal_reflection() {
        // Grazing exit from glass to air is past the critical angle.
        let v = vector![0.9, -0.1, 0.0].normalize();
        let n = vector![0.0, 1.0, 0.0];
        assert!(refract_vector(&v, &n, 1.5).is_none());
    }
}
