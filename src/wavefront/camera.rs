use super::*;

#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub resolution: (u32, u32),
    pub position: Point3,
    pub view: Vec3,
    pub up: Vec3,
    pub right: Vec3,
    pub pixel_length: Vec2,
    pub aperture_radius: f32,
    pub focal_length: f32,
}

impl Camera {
    pub fn new(
        resolution: (u32, u32),
        position: Point3,
        look_at: Point3,
        up: Vec3,
        fov_y_deg: f32,
        aperture_radius: f32,
        focal_length: f32,
    ) -> Result<Self> {
        ensure!(
            resolution.0 > 0 && resolution.1 > 0,
            "Camera resolution must be positive, got {}x{}",
            resolution.0,
            resolution.1
        );
        ensure!(
            fov_y_deg > 0.0 && fov_y_deg < 180.0,
            "Vertical field of view must be in (0, 180) degrees, got {fov_y_deg}"
        );
        ensure!(
            aperture_radius >= 0.0,
            "Aperture radius must be non-negative, got {aperture_radius}"
        );
        ensure!(
            aperture_radius == 0.0 || focal_length > 0.0,
            "A thin-lens camera needs a positive focal length, got {focal_length}"
        );

        let view = look_at - position;
        ensure!(view.norm() > EPSILON, "Camera eye and look-at coincide");
        let view = view.normalize();
        let right = view.cross(&up);
        ensure!(right.norm() > EPSILON, "Camera up is parallel to view");
        let right = right.normalize();
        // Re-orthogonalize so {right, up, view} is exactly orthonormal even
        // for a sloppy UP in the scene file.
        let up = right.cross(&view);

        let half_height = f32::tan(fov_y_deg.to_radians() / 2.0);
        let half_width = half_height * resolution.0 as f32 / resolution.1 as f32;
        let pixel_length = vector![
            2.0 * half_width / resolution.0 as f32,
            2.0 * half_height / resolution.1 as f32
        ];

        Ok(Self {
            resolution,
            position,
            view,
            up,
            right,
            pixel_length,
            aperture_radius,
            focal_length,
        })
    }

    // Primary ray through `pixel_index`, jittered inside the pixel footprint
    // when `stochastic` (the first-bounce cache requires reproducible rays,
    // so it pins the sample to the pixel center and the lens center).
    pub fn generate_ray(
        &self,
        pixel_index: u32,
        sampler: &mut sampling::PathSampler,
        stochastic: bool,
    ) -> Ray {
        let width = self.resolution.0 as f32;
        let height = self.resolution.1 as f32;
        let x = (pixel_index % self.resolution.0) as f32;
        let y = (pixel_index / self.resolution.0) as f32;
        let (jx, jy) = if stochastic {
            (sampler.sample(), sampler.sample())
        } else {
            (0.5, 0.5)
        };

        let dir = (self.view
            - self.right * self.pixel_length.x * (x + jx - 0.5 * width)
            - self.up * self.pixel_length.y * (y + jy - 0.5 * height))
            .normalize();

        if self.aperture_radius == 0.0 {
            return Ray::new(self.position, dir);
        }

        // Thin lens: every lens point aims at the focal point of the pinhole
        // ray, so geometry at the focal distance stays sharp.
        let focal_t = self.focal_length / dir.dot(&self.view);
        let focal_point = self.position + focal_t * dir;
        let lens = if stochastic {
            sampling::sample_concentric_disk(sampler.sample(), sampler.sample())
                * self.aperture_radius
        } else {
            Vec2::zeros()
        };
        let origin = self.position + lens.x * self.right + lens.y * self.up;
        Ray::new(origin, (focal_point - origin).normalize())
    }
}

//
// Tests
//

#[cfg(test)]
mod tests {
    use super::*;

    fn pinhole(resolution: (u32, u32), fov_y_deg: f32) -> Camera {
        Camera::new(
            resolution,
            Point3::new(0.0, 5.0, 9.5),
            Point3::new(0.0, 5.0, 0.0),
            vector![0.0, 1.0, 0.0],
            fov_y_deg,
            0.0,
            0.0,
        )
        .expect("valid camera")
    }

    #[test]
    fn test_orthonormal_basis() {
        let camera = pinhole((8, 8), 45.0);
        assert_abs_diff_eq!(camera.view, vector![0.0, 0.0, -1.0], epsilon = 1e-6);
        assert_abs_diff_eq!(camera.right, vector![1.0, 0.0, 0.0], epsilon = 1e-6);
        assert_abs_diff_eq!(camera.up, vector![0.0, 1.0, 0.0], epsilon = 1e-6);
        assert_abs_diff_eq!(camera.view.dot(&camera.up), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(camera.view.dot(&camera.right), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_center_pixel_looks_along_view() {
        let camera = pinhole((3, 3), 60.0);
        let mut sampler = sampling::PathSampler::seeded(1, 4, 0);
        // Center pixel of a 3x3 image, jitter pinned to the pixel center.
        let ray = camera.generate_ray(4, &mut sampler, false);
        assert_abs_diff_eq!(ray.dir, camera.view, epsilon = 1e-6);
        assert_abs_diff_eq!(
            ray.origin.coords,
            camera.position.coords,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_pixel_angular_extent() {
        let fov_y_deg = 90.0_f32;
        let camera = pinhole((1, 3), fov_y_deg);
        let mut sampler = sampling::PathSampler::seeded(1, 0, 0);
        // Top-row pixel center sits 2/3 of the way to tan(fov/2).
        let ray = camera.generate_ray(0, &mut sampler, false);
        let expected = f32::atan(2.0 * f32::tan(fov_y_deg.to_radians() / 2.0) / 3.0);
        let elevation = f32::asin(ray.dir.dot(&camera.up));
        assert_abs_diff_eq!(elevation, expected, epsilon = 1e-5);
    }

    #[test]
    fn test_thin_lens_rays_converge_at_focal_point() {
        let camera = Camera::new(
            (9, 9),
            Point3::new(0.0, 0.0, 4.0),
            Point3::new(0.0, 0.0, 0.0),
            vector![0.0, 1.0, 0.0],
            45.0,
            0.15,
            4.0,
        )
        .expect("valid camera");

        let pixel_index = 40;
        let mut sampler = sampling::PathSampler::seeded(3, pixel_index, 0);

        // Recompute the pinhole direction with the same jitter stream.
        let mut preview = sampler.clone();
        let (jx, jy) = (preview.sample(), preview.sample());
        let x = (pixel_index % 9) as f32;
        let y = (pixel_index / 9) as f32;
        let dir = (camera.view
            - camera.right * camera.pixel_length.x * (x + jx - 4.5)
            - camera.up * camera.pixel_length.y * (y + jy - 4.5))
            .normalize();
        let focal_point = camera.position + (camera.focal_length / dir.dot(&camera.view)) * dir;

        let ray = camera.generate_ray(pixel_index, &mut sampler, true);
        let to_focal = (focal_point - ray.origin).normalize();
        assert_abs_diff_eq!(ray.dir, to_focal, epsilon = 1e-5);
    }

    #[test]
    fn test_thin_lens_center_sample_is_pinhole() {
        let camera = Camera::new(
            (9, 9),
            Point3::new(0.0, 0.0, 4.0),
            Point3::new(0.0, 0.0, 0.0),
            vector![0.0, 1.0, 0.0],
            45.0,
            0.15,
            4.0,
        )
        .expect("valid camera");
        let mut sampler = sampling::PathSampler::seeded(1, 0, 0);
        let ray = camera.generate_ray(0, &mut sampler, false);
        assert_abs_diff_eq!(ray.origin.coords, camera.position.coords, epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_cameras() {
        let up = vector![0.0, 1.0, 0.0];
        let eye = Point3::new(0.0, 0.0, 1.0);
        let target = Point3::new(0.0, 0.0, 0.0);
        assert!(Camera::new((0, 8), eye, target, up, 45.0, 0.0, 0.0).is_err());
        assert!(Camera::new((8, 8), eye, eye, up, 45.0, 0.0, 0.0).is_err());
        assert!(Camera::new((8, 8), eye, target, up, 0.0, 0.0, 0.0).is_err());
        assert!(Camera::new((8, 8), eye, target, vector![0.0, 0.0, 1.0], 45.0, 0.0, 0.0).is_err());
        assert!(Camera::new((8, 8), eye, target, up, 45.0, -0.1, 0.0).is_err());
        assert!(Camera::new((8, 8), eye, target, up, 45.0, 0.15, 0.0).is_err());
    }
}
