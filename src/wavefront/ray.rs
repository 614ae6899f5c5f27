use super::*;

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Point3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Point3, dir: Vec3) -> Self {
        Self { origin, dir }
    }

    pub fn point_at(&self, t: f32) -> Point3 {
        self.origin + t * self.dir
    }
}

impl Default for Ray {
    fn default() -> Self {
        Self {
            origin: Point3::origin(),
            dir: Vec3::zeros(),
        }
    }
}
