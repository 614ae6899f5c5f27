use super::*;

#[derive(Clone, Copy, Debug)]
pub struct Triangle {
    pub positions: [Point3; 3],
    pub normals: [Normal; 3],
    bounds: Aabb,
}

impl Triangle {
    pub fn new(positions: [Point3; 3], normals: [Normal; 3]) -> Self {
        Self {
            positions,
            normals,
            bounds: Aabb::enclosing(&positions),
        }
    }

    // Face normal from the winding order, used when the source mesh carries
    // no vertex normals.
    pub fn with_face_normal(positions: [Point3; 3]) -> Self {
        let e1 = positions[1] - positions[0];
        let e2 = positions[2] - positions[0];
        let normal = normal!(e1.cross(&e2));
        Self::new(positions, [normal; 3])
    }

    #[inline]
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    // Smooth shading normal: the vertex normals blended by the barycentric
    // weights of the hit, renormalised.
    pub fn shading_normal(&self, weights: &Vec3) -> Normal {
        let blended = weights
            .iter()
            .zip(&self.normals)
            .map(|(weight, normal)| *weight * normal.into_inner())
            .sum::<Vec3>();
        normal!(blended)
    }
}
