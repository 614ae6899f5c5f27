use super::*;

#[derive(Clone, Copy, Debug)]
pub struct TriangleHit {
    pub t: f32,
    pub barycentrics: Vec3,
    pub triangle: u32,
}

//
// Ray vs triangle
//

// Möller-Trumbore. Rejects hits closer than EPSILON so a ray spawned on a
// surface cannot re-hit it.
pub fn ray_triangle_hit(ray: &Ray, triangle: &Triangle) -> Option<(f32, Vec3)> {
    let e1 = triangle.positions[1] - triangle.positions[0];
    let e2 = triangle.positions[2] - triangle.positions[0];

    let pv = ray.dir.cross(&e2);
    let det = e1.dot(&pv);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;

    let tv = ray.origin - triangle.positions[0];
    let u = tv.dot(&pv) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qv = tv.cross(&e1);
    let v = ray.dir.dot(&qv) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = e2.dot(&qv) * inv_det;
    if t <= EPSILON {
        return None;
    }

    Some((t, vector![1.0 - u - v, u, v]))
}

//
// Ray vs aabb
//

// Precomputed per ray, shared across every box test of one traversal.
pub struct RayAabbIntersector {
    dir_inv: Vec3,
}

impl RayAabbIntersector {
    pub fn new(ray: &Ray) -> Self {
        Self {
            dir_inv: vector![1.0 / ray.dir.x, 1.0 / ray.dir.y, 1.0 / ray.dir.z],
        }
    }

    // Branchless slab test. Returns the parametric overlap, or `None` when
    // the interval is empty or entirely behind the ray.
    pub fn hit(&self, ray: &Ray, aabb: &Aabb) -> Option<(f32, f32)> {
        let t0 = (aabb.lo() - ray.origin.coords).component_mul(&self.dir_inv);
        let t1 = (aabb.hi() - ray.origin.coords).component_mul(&self.dir_inv);
        let t_enter = t0.inf(&t1).max();
        let t_exit = t0.sup(&t1).min();
        (t_enter <= t_exit && t_exit >= 0.0).then_some((t_enter, t_exit))
    }
}

//
// Ray vs bvh
//

// Iterative traversal with an explicit stack; the farther child is pushed
// first so the nearer subtree is searched before it.
pub fn ray_bvh_nearest_hit(
    ray: &Ray,
    nodes: &[bvh::Node],
    root: u32,
    triangles: &[Triangle],
) -> Option<TriangleHit> {
    const STACK_CAPACITY: usize = 64;

    let ray_aabb = RayAabbIntersector::new(ray);
    let mut todo = [0_u32; STACK_CAPACITY];
    let mut todo_len = 1;
    todo[0] = root;

    let mut best: Option<TriangleHit> = None;
    let mut best_t = f32::MAX;

    while todo_len > 0 {
        todo_len -= 1;
        let node = &nodes[todo[todo_len] as usize];

        let Some((t_enter, _)) = ray_aabb.hit(ray, &node.bounds) else {
            continue;
        };
        if t_enter >= best_t {
            continue;
        }

        if node.is_leaf() {
            for triangle_index in node.tri_start..node.tri_start + node.tri_count {
                let triangle = &triangles[triangle_index as usize];
                if let Some((t, barycentrics)) = ray_triangle_hit(ray, triangle) {
                    if t < best_t {
                        best_t = t;
                        best = Some(TriangleHit {
                            t,
                            barycentrics,
                            triangle: triangle_index,
                        });
                    }
                }
            }
        } else {
            let (near, far) = if ray.dir[node.axis as usize] < 0.0 {
                (node.right, node.left)
            } else {
                (node.left, node.right)
            };
            debug_assert!(todo_len + 2 <= STACK_CAPACITY);
            todo[todo_len] = far;
            todo[todo_len + 1] = near;
            todo_len += 2;
        }
    }

    best
}

// Reference path for the ENABLE_BVH=off toggle; must agree with the BVH
// traversal on the nearest hit.
pub fn ray_triangles_nearest_hit(
    ray: &Ray,
    triangles: &[Triangle],
    tri_start: u32,
) -> Option<TriangleHit> {
    let mut best: Option<TriangleHit> = None;
    let mut best_t = f32::MAX;
    for (offset, triangle) in triangles.iter().enumerate() {
        if let Some((t, barycentrics)) = ray_triangle_hit(ray, triangle) {
            if t < best_t {
                best_t = t;
                best = Some(TriangleHit {
                    t,
                    barycentrics,
                    triangle: tri_start + offset as u32,
                });
            }
        }
    }
    best
}

//
// Tests
//

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_z_triangle() -> Triangle {
        Triangle::with_face_normal([
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ])
    }

    #[test]
    fn test_triangle_hit() {
        let ray = Ray::new(Point3::new(0.0, 0.0, -2.0), vector![0.0, 0.0, 1.0]);
        let (t, bary) = ray_triangle_hit(&ray, &unit_z_triangle()).expect("hit");
        assert_abs_diff_eq!(t, 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(bary.x + bary.y + bary.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_triangle_miss_outside() {
        let ray = Ray::new(Point3::new(5.0, 0.0, -2.0), vector![0.0, 0.0, 1.0]);
        assert!(ray_triangle_hit(&ray, &unit_z_triangle()).is_none());
    }

    #[test]
    fn test_triangle_miss_parallel() {
        let ray = Ray::new(Point3::new(0.0, 0.0, -2.0), vector![1.0, 0.0, 0.0]);
        assert!(ray_triangle_hit(&ray, &unit_z_triangle()).is_none());
    }

    #[test]
    fn test_triangle_miss_behind() {
        let ray = Ray::new(Point3::new(0.0, 0.0, 2.0), vector![0.0, 0.0, 1.0]);
        assert!(ray_triangle_hit(&ray, &unit_z_triangle()).is_none());
    }

    #[test]
    fn test_aabb_hit() {
        let aabb = Aabb::from_corners(&Point3::new(-1.0, -1.0, -1.0), &Point3::new(1.0, 1.0, 1.0));
        let ray = Ray::new(Point3::new(0.0, 0.0, -3.0), vector![0.0, 0.0, 1.0]);
        let (t_enter, t_exit) = RayAabbIntersector::new(&ray).hit(&ray, &aabb).expect("hit");
        assert_abs_diff_eq!(t_enter, 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(t_exit, 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_aabb_hit_from_inside() {
        let aabb = Aabb::from_corners(&Point3::new(-1.0, -1.0, -1.0), &Point3::new(1.0, 1.0, 1.0));
        let ray = Ray::new(Point3::new(0.0, 0.0, 0.0), vector![0.0, 0.0, 1.0]);
        let (t_enter, t_exit) = RayAabbIntersector::new(&ray).hit(&ray, &aabb).expect("hit");
        assert!(t_enter <= 0.0);
        assert_abs_diff_eq!(t_exit, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_aabb_miss_behind() {
        let aabb = Aabb::from_corners(&Point3::new(-1.0, -1.0, -1.0), &Point3::new(1.0, 1.0, 1.0));
        let ray = Ray::new(Point3::new(0.0, 0.0, 3.0), vector![0.0, 0.0, 1.0]);
        assert!(RayAabbIntersector::new(&ray).hit(&ray, &aabb).is_none());
    }

    #[test]
    fn test_aabb_axis_parallel_ray() {
        // Division by a zero direction component must not produce a bogus hit.
        let aabb = Aabb::from_corners(&Point3::new(-1.0, -1.0, -1.0), &Point3::new(1.0, 1.0, 1.0));
        let ray = Ray::new(Point3::new(5.0, 0.0, -3.0), vector![0.0, 0.0, 1.0]);
        assert!(RayAabbIntersector::new(&ray).hit(&ray, &aabb).is_none());
    }
}
