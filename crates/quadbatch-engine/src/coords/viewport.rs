use glam::Mat4;

/// Viewport size in logical pixels.
///
/// The batch renderer places vertices in this space with the origin at the
/// bottom-left corner (+X right, +Y up) and maps it to clip space with
/// [`Viewport::orthographic`].
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }

    /// Orthographic projection for this viewport.
    ///
    /// Maps `x ∈ [0, width]`, `y ∈ [0, height]`, `z ∈ [-1, 1]` to clip space.
    /// A degenerate viewport (minimized window) is clamped to 1×1 so the
    /// matrix stays invertible.
    pub fn orthographic(self) -> Mat4 {
        let w = if self.width.is_finite() { self.width.max(1.0) } else { 1.0 };
        let h = if self.height.is_finite() { self.height.max(1.0) } else { 1.0 };
        Mat4::orthographic_rh(0.0, w, 0.0, h, -1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn approx(a: Vec4, b: Vec4) -> bool {
        (a - b).abs().max_element() < 1e-5
    }

    #[test]
    fn orthographic_maps_corners_to_clip_space() {
        let m = Viewport::new(800.0, 600.0).orthographic();
        let bl = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let tr = m * Vec4::new(800.0, 600.0, 0.0, 1.0);
        assert!(approx(bl, Vec4::new(-1.0, -1.0, 0.5, 1.0)), "{bl:?}");
        assert!(approx(tr, Vec4::new(1.0, 1.0, 0.5, 1.0)), "{tr:?}");
    }

    #[test]
    fn orthographic_changes_with_size() {
        let a = Viewport::new(800.0, 600.0).orthographic();
        let b = Viewport::new(1024.0, 768.0).orthographic();
        assert_ne!(a, b);
    }

    #[test]
    fn orthographic_clamps_zero_size() {
        let m = Viewport::new(0.0, 0.0).orthographic();
        assert!(m.is_finite());
    }

    #[test]
    fn is_valid_rejects_zero_and_nan() {
        assert!(Viewport::new(1.0, 1.0).is_valid());
        assert!(!Viewport::new(0.0, 1.0).is_valid());
        assert!(!Viewport::new(f32::NAN, 1.0).is_valid());
    }
}
