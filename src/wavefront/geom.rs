use super::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeomKind {
    Cube,
    Sphere,
    Mesh {
        tri_start: u32,
        tri_end: u32,
        bvh_root: u32,
    },
}

// One placed instance. Analytic primitives are intersected in their
// canonical object space (unit cube, sphere of radius 0.5) by pulling the
// world ray through the inverse transform; meshes carry their own BVH over
// object-space triangles.
#[derive(Clone, Copy, Debug)]
pub struct Geom {
    pub kind: GeomKind,
    pub material: u32,
    pub transform: Mat4,
    pub inverse_transform: Mat4,
    pub inverse_transpose: Mat4,
}

impl Geom {
    pub fn new(
        kind: GeomKind,
        material: u32,
        translation: Vec3,
        rotation_deg: Vec3,
        scale: Vec3,
    ) -> Result<Self> {
        let transform = build_transform(translation, rotation_deg, scale);
        let inverse_transform = transform
            .try_inverse()
            .context("Object transform is singular")?;
        Ok(Self {
            kind,
            material,
            transform,
            inverse_transform,
            inverse_transpose: inverse_transform.transpose(),
        })
    }

    // Nearest hit along the world ray, as (world t, world normal). The
    // normal is the outward geometric normal; shading orients it.
    pub fn intersect(
        &self,
        ray: &Ray,
        triangles: &[Triangle],
        bvh_nodes: &[bvh::Node],
        use_bvh: bool,
    ) -> Option<(f32, Vec3)> {
        // To object space. A degenerate direction (e.g. squashed away by a
        // zero-ish scale) cannot hit anything.
        let origin = self.inverse_transform.transform_point(&ray.origin);
        let dir = self.inverse_transform.transform_vector(&ray.dir);
        let dir_norm = dir.norm();
        if !dir_norm.is_finite() || dir_norm < EPSILON {
            return None;
        }
        let object_ray = Ray::new(origin, dir / dir_norm);

        let (object_t, object_normal) = match self.kind {
            GeomKind::Cube => cube_hit(&object_ray)?,
            GeomKind::Sphere => sphere_hit(&object_ray)?,
            GeomKind::Mesh {
                tri_start,
                tri_end,
                bvh_root,
            } => {
                let hit = if use_bvh {
                    intersect::ray_bvh_nearest_hit(&object_ray, bvh_nodes, bvh_root, triangles)?
                } else {
                    intersect::ray_triangles_nearest_hit(
                        &object_ray,
                        &triangles[tri_start as usize..tri_end as usize],
                        tri_start,
                    )?
                };
                let triangle = &triangles[hit.triangle as usize];
                (
                    hit.t,
                    triangle.shading_normal(&hit.barycentrics).into_inner(),
                )
            }
        };

        // Back to world space. The returned t is the world distance along
        // the (unit) world ray.
        let world_point = self
            .transform
            .transform_point(&object_ray.point_at(object_t));
        let world_t = (world_point - ray.origin).norm();
        let world_normal = self
            .inverse_transpose
            .transform_vector(&object_normal)
            .normalize();
        Some((world_t, world_normal))
    }
}

// TRANS * ROT_X * ROT_Y * ROT_Z * SCALE, rotations in degrees.
fn build_transform(translation: Vec3, rotation_deg: Vec3, scale: Vec3) -> Mat4 {
    let translation = na::Translation3::from(translation).to_homogeneous();
    let rotation_x =
        na::Rotation3::from_axis_angle(&Vec3::x_axis(), rotation_deg.x.to_radians());
    let rotation_y =
        na::Rotation3::from_axis_angle(&Vec3::y_axis(), rotation_deg.y.to_radians());
    let rotation_z =
        na::Rotation3::from_axis_angle(&Vec3::z_axis(), rotation_deg.z.to_radians());
    let rotation = (rotation_x * rotation_y * rotation_z).to_homogeneous();
    let scale = na::Scale3::from(scale).to_homogeneous();
    translation * rotation * scale
}

// Slab test against the unit cube [-0.5, 0.5]^3. Returns the entry hit, or
// the exit hit when the ray starts inside; the normal is the outward normal
// of the struck face.
fn cube_hit(ray: &Ray) -> Option<(f32, Vec3)> {
    let mut t_min = f32::MIN;
    let mut t_max = f32::MAX;
    let mut t_min_normal = Vec3::zeros();
    let mut t_max_normal = Vec3::zeros();

    for axis in 0..3 {
        let inv = 1.0 / ray.dir[axis];
        let t_lo = (-0.5 - ray.origin[axis]) * inv;
        let t_hi = (0.5 - ray.origin[axis]) * inv;
        let (t_near, t_far) = if t_lo <= t_hi { (t_lo, t_hi) } else { (t_hi, t_lo) };

        let mut normal = Vec3::zeros();
        normal[axis] = if t_hi < t_lo { 1.0 } else { -1.0 };
        if t_near > t_min {
            t_min = t_near;
            t_min_normal = normal;
        }
        if t_far < t_max {
            t_max = t_far;
            t_max_normal = -normal;
        }
    }

    if t_max < t_min || t_max <= EPSILON {
        return None;
    }
    if t_min > EPSILON {
        Some((t_min, t_min_normal))
    } else {
        // Inside the cube; the exit face is the visible one.
        Some((t_max, t_max_normal))
    }
}

// Analytic quadratic against the sphere of radius 0.5 at the origin. The
// normal is the hit point direction, outward regardless of which side the
// ray starts on.
fn sphere_hit(ray: &Ray) -> Option<(f32, Vec3)> {
    const RADIUS: f32 = 0.5;

    let oc = ray.origin.coords;
    let b = 2.0 * oc.dot(&ray.dir);
    let c = oc.dot(&oc) - RADIUS * RADIUS;
    let discriminant = b * b - 4.0 * c;
    if discriminant < 0.0 {
        return None;
    }

    let sqrt_discriminant = discriminant.sqrt();
    let t_near = (-b - sqrt_discriminant) / 2.0;
    let t_far = (-b + sqrt_discriminant) / 2.0;
    let t = if t_near > EPSILON {
        t_near
    } else if t_far > EPSILON {
        t_far
    } else {
        return None;
    };

    let point = ray.point_at(t);
    Some((t, point.coords.normalize()))
}

// Dispatches every instance and keeps the smallest positive world t. Ties
// resolve to the lower geom index. A total miss is `t = -1`.
pub fn intersect_scene(
    ray: &Ray,
    geoms: &[Geom],
    triangles: &[Triangle],
    bvh_nodes: &[bvh::Node],
    use_bvh: bool,
) -> Intersection {
    let mut nearest = Intersection::MISS;
    let mut best_t = f32::MAX;
    for geom in geoms {
        if let Some((t, normal)) = geom.intersect(ray, triangles, bvh_nodes, use_bvh) {
            if t < best_t {
                best_t = t;
                nearest = Intersection {
                    t,
                    normal,
                    material: geom.material,
                };
            }
        }
    }
    nearest
}

//
// Tests
//
