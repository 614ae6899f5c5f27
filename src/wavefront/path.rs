use super::*;

// One slot of the path pool. `color` is written exactly once, when the path
// terminates; until then the running attenuation lives in `throughput`.
#[derive(Clone, Copy, Debug)]
pub struct PathSegment {
    pub ray: Ray,
    pub throughput: ColorRgb,
    pub color: ColorRgb,
    pub pixel_index: u32,
    pub remaining_bounces: u32,
}

impl PathSegment {
    #[inline]
    pub fn alive(&self) -> bool {
        self.remaining_bounces > 0
    }

    #[inline]
    pub fn terminate(&mut self, color: ColorRgb) {
        self.color = color;
        self.remaining_bounces = 0;
    }
}

impl Default for PathSegment {
    fn default() -> Self {
        Self {
            ray: Ray::default(),
            throughput: ColorRgb::WHITE,
            color: ColorRgb::BLACK,
            pixel_index: 0,
            remaining_bounces: 0,
        }
    }
}

// Per-bounce intersection record, overwritten every bounce. `t < 0` is a
// miss and leaves `normal`/`material` meaningless.
#[derive(Clone, Copy, Debug)]
pub struct Intersection {
    pub t: f32,
    pub normal: Vec3,
    pub material: u32,
}

impl Intersection {
    pub const MISS: Self = Self {
        t: -1.0,
        normal: Vec3::new(0.0, 0.0, 0.0),
        material: 0,
    };

    #[inline]
    pub fn is_hit(&self) -> bool {
        self.t >= 0.0
    }
}

impl Default for Intersection {
    fn default() -> Self {
        Self::MISS
    }
}
