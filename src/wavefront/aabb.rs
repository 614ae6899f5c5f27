use super::*;

// Axis-aligned box stored as componentwise lower/upper corner coordinates.
// `EMPTY` has inverted infinite corners, making it the identity of `union`,
// so bounds are built by folding instead of mutating in place.
#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    lo: Vec3,
    hi: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        lo: Vec3::new(f32::MAX, f32::MAX, f32::MAX),
        hi: Vec3::new(f32::MIN, f32::MIN, f32::MIN),
    };

    // Any two opposite corners, in either order.
    pub fn from_corners(a: &Point3, b: &Point3) -> Self {
        Self {
            lo: a.coords.inf(&b.coords),
            hi: a.coords.sup(&b.coords),
        }
    }

    pub fn enclosing<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Self {
        points
            .into_iter()
            .fold(Self::EMPTY, |bounds, point| bounds.with_point(point))
    }

    #[must_use]
    pub fn with_point(self, point: &Point3) -> Self {
        Self {
            lo: self.lo.inf(&point.coords),
            hi: self.hi.sup(&point.coords),
        }
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            lo: self.lo.inf(&other.lo),
            hi: self.hi.sup(&other.hi),
        }
    }

    #[inline]
    pub fn lo(&self) -> Vec3 {
        self.lo
    }

    #[inline]
    pub fn hi(&self) -> Vec3 {
        self.hi
    }

    #[inline]
    pub fn center(&self) -> Point3 {
        Point3::from(0.5 * (self.lo + self.hi))
    }

    #[inline]
    pub fn diagonal(&self) -> Vec3 {
        self.hi - self.lo
    }

    #[inline]
    pub fn widest_axis(&self) -> usize {
        self.diagonal().imax()
    }

    // A box contains another exactly when absorbing it changes nothing.
    pub fn contains(&self, other: &Aabb) -> bool {
        self.union(*other) == *self
    }
}

//
// Tests
//
