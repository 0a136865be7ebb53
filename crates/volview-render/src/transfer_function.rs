//! Color and scalar-opacity transfer functions.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use volview_core::VoiRange;

/// Number of samples used to approximate a sigmoid VOI curve.
pub const SIGMOID_APPROXIMATION_NODES: usize = 1024;

/// A color control point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorNode {
    /// Intensity value.
    pub x: f64,
    /// RGB at that value, each channel in [0, 1].
    pub rgb: DVec3,
}

/// Piecewise-linear mapping from intensity to RGB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ColorTransferFunction {
    nodes: Vec<ColorNode>,
    mapping_range: [f64; 2],
}

impl ColorTransferFunction {
    /// Creates an empty function.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Black-to-white ramp over `[lower, upper]`.
    #[must_use]
    pub fn grayscale(lower: f64, upper: f64) -> Self {
        let mut cfun = Self::new();
        cfun.add_rgb_point(lower, DVec3::ZERO);
        cfun.add_rgb_point(upper, DVec3::ONE);
        cfun
    }

    /// Adds (or replaces) a node and keeps nodes sorted.
    pub fn add_rgb_point(&mut self, x: f64, rgb: DVec3) {
        self.nodes.retain(|n| n.x != x);
        self.nodes.push(ColorNode { x, rgb });
        self.sort_and_update_range();
    }

    /// Removes all nodes.
    pub fn remove_all_points(&mut self) {
        self.nodes.clear();
        self.mapping_range = [0.0, 0.0];
    }

    fn sort_and_update_range(&mut self) {
        self.nodes.sort_by(|a, b| a.x.total_cmp(&b.x));
        if let (Some(first), Some(last)) = (self.nodes.first(), self.nodes.last()) {
            self.mapping_range = [first.x, last.x];
        }
    }

    /// Control points in increasing intensity.
    #[must_use]
    pub fn nodes(&self) -> &[ColorNode] {
        &self.nodes
    }

    /// Number of control points.
    #[must_use]
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Current mapping range.
    #[must_use]
    pub fn range(&self) -> [f64; 2] {
        self.mapping_range
    }

    /// Rescales every node affinely so the function spans `[lower, upper]`.
    ///
    /// Zero-width target ranges are rejected and leave the function unchanged.
    pub fn set_mapping_range(&mut self, lower: f64, upper: f64) {
        let [old_lower, old_upper] = self.mapping_range;
        if old_lower == lower && old_upper == upper {
            return;
        }
        if lower == upper {
            log::warn!("attempt to set zero width color range");
            return;
        }
        if old_upper == old_lower {
            self.mapping_range = [lower, upper];
            return;
        }
        let scale = (upper - lower) / (old_upper - old_lower);
        let shift = lower - old_lower * scale;
        for node in &mut self.nodes {
            node.x = node.x * scale + shift;
        }
        self.mapping_range = [lower, upper];
    }

    /// Evaluates the function, clamping outside the node span.
    #[must_use]
    pub fn color(&self, x: f64) -> DVec3 {
        let (Some(first), Some(last)) = (self.nodes.first(), self.nodes.last()) else {
            return DVec3::ZERO;
        };
        if x <= first.x {
            return first.rgb;
        }
        if x >= last.x {
            return last.rgb;
        }
        let upper = self.nodes.partition_point(|n| n.x <= x);
        let (a, b) = (self.nodes[upper - 1], self.nodes[upper]);
        let t = (x - a.x) / (b.x - a.x);
        a.rgb.lerp(b.rgb, t)
    }

    /// Replaces every node color with its complement.
    pub fn invert(&mut self) {
        for node in &mut self.nodes {
            node.rgb = DVec3::ONE - node.rgb;
        }
    }

    /// Replaces the nodes with evenly spaced colors spanning `[0, 1]`.
    pub fn apply_colors(&mut self, colors: &[DVec3]) {
        self.nodes.clear();
        match colors.len() {
            0 => {}
            1 => self.nodes.push(ColorNode { x: 0.0, rgb: colors[0] }),
            n => {
                for (i, &rgb) in colors.iter().enumerate() {
                    self.nodes.push(ColorNode {
                        x: i as f64 / (n - 1) as f64,
                        rgb,
                    });
                }
            }
        }
        self.sort_and_update_range();
    }
}

/// Builds a color function approximating the sampled-sigmoid VOI curve.
///
/// Gray levels `y` are sampled on the open interval (0, 1) and placed at the
/// intensity where the sigmoid reaches them.
#[must_use]
pub fn sigmoid_rgb_transfer_function(voi: VoiRange, approximation_nodes: usize) -> ColorTransferFunction {
    let (center, width) = voi.to_window_level();
    let mut cfun = ColorTransferFunction::new();
    for i in 0..approximation_nodes {
        let y = (i + 1) as f64 / (approximation_nodes + 2) as f64;
        cfun.nodes.push(ColorNode {
            x: logit(y, center, width),
            rgb: DVec3::splat(y),
        });
    }
    cfun.sort_and_update_range();
    cfun
}

fn logit(y: f64, center: f64, width: f64) -> f64 {
    center - (width / 4.0) * ((1.0 - y) / y).ln()
}

/// Recovers the VOI window that produced a sigmoid color function.
///
/// Inverted sigmoids yield the same window.
#[must_use]
pub fn voi_from_sigmoid(cfun: &ColorTransferFunction) -> Option<VoiRange> {
    let (first, last) = (cfun.nodes.first()?, cfun.nodes.last()?);
    let l1 = ((1.0 - first.rgb.x) / first.rgb.x).ln();
    let l2 = ((1.0 - last.rgb.x) / last.rgb.x).ln();
    if !(l1 - l2).is_normal() {
        return None;
    }
    let width = -4.0 * (first.x - last.x) / (l1 - l2);
    let center = first.x + (width / 4.0) * l1;
    Some(VoiRange::from_window_level(center, width.abs()))
}

/// An opacity control point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PiecewisePoint {
    /// Intensity value.
    pub x: f64,
    /// Opacity.
    pub y: f64,
}

/// Piecewise-linear mapping from intensity to opacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PiecewiseFunction {
    points: Vec<PiecewisePoint>,
}

impl PiecewiseFunction {
    /// Creates an empty function.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a point.
    pub fn add_point(&mut self, x: f64, y: f64) {
        self.points.retain(|p| p.x != x);
        self.points.push(PiecewisePoint { x, y });
        self.points.sort_by(|a, b| a.x.total_cmp(&b.x));
    }

    /// Removes all points.
    pub fn remove_all_points(&mut self) {
        self.points.clear();
    }

    /// Control points in increasing intensity.
    #[must_use]
    pub fn points(&self) -> &[PiecewisePoint] {
        &self.points
    }

    /// Intensity span of the points.
    #[must_use]
    pub fn range(&self) -> Option<[f64; 2]> {
        Some([self.points.first()?.x, self.points.last()?.x])
    }

    /// Evaluates the function, clamping outside the point span.
    #[must_use]
    pub fn value(&self, x: f64) -> f64 {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return 0.0;
        };
        if x <= first.x {
            return first.y;
        }
        if x >= last.x {
            return last.y;
        }
        let upper = self.points.partition_point(|p| p.x <= x);
        let (a, b) = (self.points[upper - 1], self.points[upper]);
        a.y + (b.y - a.y) * (x - a.x) / (b.x - a.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grayscale_lookup() {
        let cfun = ColorTransferFunction::grayscale(0.0, 100.0);
        assert_eq!(cfun.range(), [0.0, 100.0]);
        assert!((cfun.color(50.0) - DVec3::splat(0.5)).length() < 1e-12);
        assert_eq!(cfun.color(-10.0), DVec3::ZERO);
        assert_eq!(cfun.color(1000.0), DVec3::ONE);
    }

    #[test]
    fn test_mapping_range_rescales_nodes() {
        let mut cfun = ColorTransferFunction::grayscale(0.0, 100.0);
        cfun.add_rgb_point(25.0, DVec3::new(1.0, 0.0, 0.0));
        cfun.set_mapping_range(-100.0, 100.0);
        assert_eq!(cfun.range(), [-100.0, 100.0]);
        assert_eq!(cfun.nodes()[1].x, -50.0);
    }

    #[test]
    fn test_zero_width_range_rejected() {
        let mut cfun = ColorTransferFunction::grayscale(0.0, 100.0);
        cfun.set_mapping_range(5.0, 5.0);
        assert_eq!(cfun.range(), [0.0, 100.0]);
    }

    #[test]
    fn test_invert_twice_is_identity() {
        let mut cfun = ColorTransferFunction::grayscale(0.0, 1.0);
        let original = cfun.clone();
        cfun.invert();
        assert_eq!(cfun.color(0.0), DVec3::ONE);
        cfun.invert();
        assert_eq!(cfun, original);
    }

    #[test]
    fn test_sigmoid_centered_on_window() {
        let voi = VoiRange::new(-160.0, 240.0);
        let cfun = sigmoid_rgb_transfer_function(voi, SIGMOID_APPROXIMATION_NODES);
        assert_eq!(cfun.size(), SIGMOID_APPROXIMATION_NODES);
        // mid gray sits at the window center
        assert!((cfun.color(40.0).x - 0.5).abs() < 1e-2);
        assert!(cfun.color(-160.0).x < 0.2);
        assert!(cfun.color(240.0).x > 0.8);
    }

    #[test]
    fn test_voi_recovered_from_sigmoid() {
        let voi = VoiRange::new(-160.0, 240.0);
        let cfun = sigmoid_rgb_transfer_function(voi, 64);
        let back = voi_from_sigmoid(&cfun).unwrap();
        assert!((back.lower - voi.lower).abs() < 1e-6);
        assert!((back.upper - voi.upper).abs() < 1e-6);
    }

    #[test]
    fn test_voi_recovered_from_inverted_sigmoid() {
        let voi = VoiRange::new(-160.0, 240.0);
        let mut cfun = sigmoid_rgb_transfer_function(voi, 64);
        cfun.invert();
        let back = voi_from_sigmoid(&cfun).unwrap();
        assert!((back.lower - voi.lower).abs() < 1e-6);
        assert!((back.upper - voi.upper).abs() < 1e-6);
    }

    #[test]
    fn test_apply_colors_spans_unit_range() {
        let mut cfun = ColorTransferFunction::new();
        cfun.apply_colors(&[DVec3::ZERO, DVec3::X, DVec3::ONE]);
        assert_eq!(cfun.range(), [0.0, 1.0]);
        assert_eq!(cfun.nodes()[1].x, 0.5);
    }

    #[test]
    fn test_piecewise_value() {
        let mut ofun = PiecewiseFunction::new();
        ofun.add_point(0.0, 0.0);
        ofun.add_point(10.0, 1.0);
        assert!((ofun.value(2.5) - 0.25).abs() < 1e-12);
        assert_eq!(ofun.range(), Some([0.0, 10.0]));
    }
}
