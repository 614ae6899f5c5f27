use std::{fmt, ops};

use super::*;

const DISPLAY_GAMMA: f32 = 2.2;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ColorRgb([f32; 3]);

impl ColorRgb {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self([r, g, b])
    }

    pub const fn r(&self) -> f32 {
        self.0[0]
    }

    pub const fn g(&self) -> f32 {
        self.0[1]
    }

    pub const fn b(&self) -> f32 {
        self.0[2]
    }

    pub fn is_finite(&self) -> bool {
        self.r().is_finite() && self.g().is_finite() && self.b().is_finite()
    }

    pub fn clamp(self) -> Self {
        Self::new(
            self.r().clamp(0.0, 1.0),
            self.g().clamp(0.0, 1.0),
            self.b().clamp(0.0, 1.0),
        )
    }

    pub fn max_channel(self) -> f32 {
        self.r().max(self.g()).max(self.b())
    }

    pub fn min_channel(self) -> f32 {
        self.r().min(self.g()).min(self.b())
    }

    // Reinhard global operator, per channel.
    pub fn tonemap(self) -> Self {
        let reinhard = |x: f32| x / (1.0 + x);
        Self::new(reinhard(self.r()), reinhard(self.g()), reinhard(self.b()))
    }

    pub fn gamma_correct(self) -> Self {
        let gamma = |x: f32| f32::max(x, 0.0).powf(1.0 / DISPLAY_GAMMA);
        Self::new(gamma(self.r()), gamma(self.g()), gamma(self.b()))
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        let quantize = |x: f32| (x.clamp(0.0, 1.0) * 255.0).round() as u8;
        [
            quantize(self.r()),
            quantize(self.g()),
            quantize(self.b()),
            255,
        ]
    }
}

pub fn lerp_color(a: &ColorRgb, b: &ColorRgb, t: f32) -> ColorRgb {
    ColorRgb::new(
        lerp_scalar(a.r(), b.r(), t),
        lerp_scalar(a.g(), b.g(), t),
        lerp_scalar(a.b(), b.b(), t),
    )
}

impl From<ColorRgb> for [f32; 3] {
    fn from(value: ColorRgb) -> Self {
        value.0
    }
}

impl ops::Add for ColorRgb {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.r() + rhs.r(), self.g() + rhs.g(), self.b() + rhs.b())
    }
}

impl ops::AddAssign for ColorRgb {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl ops::Mul for ColorRgb {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self::new(self.r() * rhs.r(), self.g() * rhs.g(), self.b() * rhs.b())
    }
}

impl ops::Mul<f32> for ColorRgb {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self::new(self.r() * rhs, self.g() * rhs, self.b() * rhs)
    }
}

impl ops::Mul<ColorRgb> for f32 {
    type Output = ColorRgb;

    fn mul(self, rhs: ColorRgb) -> Self::Output {
        ColorRgb::new(self * rhs.r(), self * rhs.g(), self * rhs.b())
    }
}

impl ops::MulAssign for ColorRgb {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl ops::Div<f32> for ColorRgb {
    type Output = Self;

    fn div(self, rhs: f32) -> Self::Output {
        Self::new(self.r() / rhs, self.g() / rhs, self.b() / rhs)
    }
}

impl ops::DivAssign<f32> for ColorRgb {
    fn div_assign(&mut self, rhs: f32) {
        *self = *self / rhs;
    }
}

impl fmt::Display for ColorRgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.r(), self.g(), self.b())
    }
}

//
// Tests
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tonemap_range() {
        // Reinhard maps [0, inf) into [0, 1).
        for x in [0.0, 0.25, 1.0, 4.0, 1000.0] {
            let c = ColorRgb::new(x, x, x).tonemap();
            assert!(c.r() >= 0.0 && c.r() < 1.0);
        }
        assert_ulps_eq!(ColorRgb::WHITE.tonemap().r(), 0.5, max_ulps = 1);
    }

    #[test]
    fn test_tonemap_monotonic() {
        let lo = ColorRgb::new(0.2, 0.2, 0.2).tonemap().gamma_correct();
        let hi = ColorRgb::new(0.8, 0.8, 0.8).tonemap().gamma_correct();
        assert!(lo.r() < hi.r());
    }

    #[test]
    fn test_to_rgba8() {
        assert_eq!(ColorRgb::BLACK.to_rgba8(), [0, 0, 0, 255]);
        assert_eq!(ColorRgb::WHITE.to_rgba8(), [255, 255, 255, 255]);
        // Out-of-range values clamp instead of wrapping.
        assert_eq!(ColorRgb::new(2.0, -1.0, 0.5).to_rgba8()[0], 255);
        assert_eq!(ColorRgb::new(2.0, -1.0, 0.5).to_rgba8()[1], 0);
    }

    #[test]
    fn test_lerp_color() {
        let c = lerp_color(&ColorRgb::BLACK, &ColorRgb::WHITE, 0.5);
        assert_ulps_eq!(c.r(), 0.5, max_ulps = 1);
        assert_ulps_eq!(c.g(), 0.5, max_ulps = 1);
        assert_ulps_eq!(c.b(), 0.5, max_ulps = 1);
    }
}
