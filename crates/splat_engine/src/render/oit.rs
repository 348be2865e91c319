//! Weighted-blended order-independent transparency
//!
//! CPU mirror of the math in `oit_accumulate.frag` and `oit_composite.frag`.
//! The GPU performs the same steps through fixed-function blending:
//!
//! - accumulation target, blend `ONE, ONE`: `accum += vec4(rgb * a, a) * w`
//! - revealage target, blend `ZERO, ONE_MINUS_SRC_COLOR`: `reveal *= 1 - a`
//! - composite, blend `ONE, ONE_MINUS_SRC_ALPHA` over the opaque color
//!
//! See McGuire and Bavoil, "Weighted Blended Order-Independent Transparency", JCGT 2013.

/// Guard against division by an empty accumulation
pub const COMPOSITE_EPSILON: f32 = 1e-5;

/// Fragments below this alpha are discarded
pub const MIN_ALPHA: f32 = 1.0 / 255.0;

/// Fragment alpha is clamped to this value
pub const MAX_ALPHA: f32 = 0.99;

/// Clear value of the accumulation target
pub const ACCUMULATION_CLEAR: [f32; 4] = [0.0; 4];

/// Clear value of the revealage target (fully revealed)
pub const REVEALAGE_CLEAR: f32 = 1.0;

/// Depth and coverage weight (McGuire and Bavoil eq. 10 variant)
///
/// `depth` is the window-space depth in [0, 1]; closer fragments weigh more.
pub fn weight(depth: f32, alpha: f32) -> f32 {
    let a = (alpha * 10.0).min(1.0) + 0.01;
    let b = 1.0 - depth * 0.9;
    (a * a * a * 1e8 * b * b * b).clamp(1e-2, 3e3)
}

/// Per-pixel contents of the two OIT targets
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OitPixel {
    /// Weighted premultiplied color and weighted alpha
    pub accumulation: [f32; 4],
    /// Product of `1 - alpha` over all fragments
    pub revealage: f32,
}

impl Default for OitPixel {
    fn default() -> Self {
        Self {
            accumulation: ACCUMULATION_CLEAR,
            revealage: REVEALAGE_CLEAR,
        }
    }
}

impl OitPixel {
    /// Blend one translucent fragment into the pixel
    ///
    /// Order of calls does not change the result beyond float rounding.
    pub fn accumulate(&mut self, color: [f32; 3], alpha: f32, depth: f32) {
        let alpha = alpha.min(MAX_ALPHA);
        if alpha < MIN_ALPHA {
            return;
        }

        let w = weight(depth, alpha);
        let source = [color[0] * alpha, color[1] * alpha, color[2] * alpha, alpha];
        for (dst, src) in self.accumulation.iter_mut().zip(source) {
            *dst += src * w;
        }
        self.revealage *= 1.0 - alpha;
    }

    /// Output of the composite fragment shader: premultiplied color and coverage
    ///
    /// Returns `None` where the shader discards.
    pub fn resolve(&self) -> Option<[f32; 4]> {
        let coverage = 1.0 - self.revealage;
        if coverage < COMPOSITE_EPSILON {
            return None;
        }

        let denominator = self.accumulation[3].max(COMPOSITE_EPSILON);
        Some([
            self.accumulation[0] / denominator * coverage,
            self.accumulation[1] / denominator * coverage,
            self.accumulation[2] / denominator * coverage,
            coverage,
        ])
    }

    /// Final color after compositing over an opaque background
    pub fn composite_over(&self, background: [f32; 3]) -> [f32; 3] {
        match self.resolve() {
            Some(source) => blend_one_one_minus_src_alpha(source, background),
            None => background,
        }
    }
}

/// Fixed-function `ONE, ONE_MINUS_SRC_ALPHA` blend
pub fn blend_one_one_minus_src_alpha(source: [f32; 4], destination: [f32; 3]) -> [f32; 3] {
    let keep = 1.0 - source[3];
    [
        source[0] + destination[0] * keep,
        source[1] + destination[1] * keep,
        source[2] + destination[2] * keep,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_splat_over_background() {
        let background = [0.2, 0.4, 0.8];
        let splat = [1.0, 0.5, 0.0];

        for depth in [0.0, 0.3, 0.99] {
            let mut pixel = OitPixel::default();
            pixel.accumulate(splat, 0.5, depth);
            let out = pixel.composite_over(background);

            for channel in 0..3 {
                let expected = background[channel] * (1.0 - 0.5) + splat[channel] * 0.5;
                assert_relative_eq!(out[channel], expected, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_empty_pixel_leaves_background() {
        let pixel = OitPixel::default();
        assert!(pixel.resolve().is_none());
        assert_eq!(pixel.composite_over([0.1, 0.2, 0.3]), [0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_order_independence() {
        let fragments = [
            ([1.0, 0.0, 0.0], 0.4, 0.2),
            ([0.0, 1.0, 0.0], 0.7, 0.5),
            ([0.0, 0.0, 1.0], 0.2, 0.8),
        ];

        let mut forward = OitPixel::default();
        for (color, alpha, depth) in fragments {
            forward.accumulate(color, alpha, depth);
        }
        let mut backward = OitPixel::default();
        for (color, alpha, depth) in fragments.iter().rev().copied() {
            backward.accumulate(color, alpha, depth);
        }

        let a = forward.composite_over([0.0; 3]);
        let b = backward.composite_over([0.0; 3]);
        for channel in 0..3 {
            assert_relative_eq!(a[channel], b[channel], epsilon = 1e-5);
        }
        assert_relative_eq!(forward.revealage, 0.6 * 0.3 * 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_weight_prefers_near_fragments() {
        assert!(weight(0.1, 0.005) > weight(0.9, 0.005));
        assert!(weight(0.9, 0.001) < weight(0.9, 0.005));
        assert_relative_eq!(weight(0.0, 1.0), 3e3);
        assert!(weight(1.0, MIN_ALPHA) >= 1e-2);
    }

    #[test]
    fn test_faint_fragments_ignored() {
        let mut pixel = OitPixel::default();
        pixel.accumulate([1.0; 3], MIN_ALPHA * 0.5, 0.5);
        assert_eq!(pixel, OitPixel::default());
    }
}
