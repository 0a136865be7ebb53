//! Camera value types exchanged with viewport callers.
//!
//! [`Camera`] is the snapshot a viewport reports; [`CameraUpdate`] is the sparse
//! write accepted by `set_camera`, where only the provided fields change.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// A full camera snapshot, in un-flipped world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    /// Eye position.
    pub position: DVec3,
    /// Point looked at.
    pub focal_point: DVec3,
    /// Unit up vector.
    pub view_up: DVec3,
    /// Unit normal of the view plane, pointing back towards the eye.
    pub view_plane_normal: DVec3,
    /// Near and far clipping distances.
    pub clipping_range: [f64; 2],
    /// Orthographic when true.
    pub parallel_projection: bool,
    /// Half height of the orthographic view, in world units.
    pub parallel_scale: f64,
    /// Perspective field of view in degrees.
    pub view_angle: f64,
    /// Slab thickness reported by the viewport, if any.
    pub slab_thickness: Option<f64>,
    /// Horizontal flip state of the viewport.
    pub flip_horizontal: bool,
    /// Vertical flip state of the viewport.
    pub flip_vertical: bool,
}

impl Camera {
    /// Distance from the eye to the focal point.
    #[must_use]
    pub fn distance(&self) -> f64 {
        self.position.distance(self.focal_point)
    }

    /// Approximate equality used to decide whether a camera actually moved.
    #[must_use]
    pub fn approx_eq(&self, other: &Camera, eps: f64) -> bool {
        self.position.abs_diff_eq(other.position, eps)
            && self.focal_point.abs_diff_eq(other.focal_point, eps)
            && self.view_up.abs_diff_eq(other.view_up, eps)
            && self.view_plane_normal.abs_diff_eq(other.view_plane_normal, eps)
            && (self.clipping_range[0] - other.clipping_range[0]).abs() <= eps
            && (self.clipping_range[1] - other.clipping_range[1]).abs() <= eps
            && self.parallel_projection == other.parallel_projection
            && (self.parallel_scale - other.parallel_scale).abs() <= eps
            && (self.view_angle - other.view_angle).abs() <= eps
            && self.slab_thickness == other.slab_thickness
            && self.flip_horizontal == other.flip_horizontal
            && self.flip_vertical == other.flip_vertical
    }
}

/// A sparse camera write.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraUpdate {
    /// New eye position.
    pub position: Option<DVec3>,
    /// New focal point.
    pub focal_point: Option<DVec3>,
    /// New up vector.
    pub view_up: Option<DVec3>,
    /// New view-plane normal (the direction of projection is its negation).
    pub view_plane_normal: Option<DVec3>,
    /// New clipping range.
    pub clipping_range: Option<[f64; 2]>,
    /// New orthographic scale.
    pub parallel_scale: Option<f64>,
    /// New perspective angle in degrees.
    pub view_angle: Option<f64>,
    /// Requested horizontal flip state.
    pub flip_horizontal: Option<bool>,
    /// Requested vertical flip state.
    pub flip_vertical: Option<bool>,
}

impl CameraUpdate {
    /// Returns a copy of `camera` with the provided fields replaced.
    #[must_use]
    pub fn applied_to(&self, camera: &Camera) -> Camera {
        Camera {
            position: self.position.unwrap_or(camera.position),
            focal_point: self.focal_point.unwrap_or(camera.focal_point),
            view_up: self.view_up.unwrap_or(camera.view_up),
            view_plane_normal: self.view_plane_normal.unwrap_or(camera.view_plane_normal),
            clipping_range: self.clipping_range.unwrap_or(camera.clipping_range),
            parallel_projection: camera.parallel_projection,
            parallel_scale: self.parallel_scale.unwrap_or(camera.parallel_scale),
            view_angle: self.view_angle.unwrap_or(camera.view_angle),
            slab_thickness: camera.slab_thickness,
            flip_horizontal: self.flip_horizontal.unwrap_or(camera.flip_horizontal),
            flip_vertical: self.flip_vertical.unwrap_or(camera.flip_vertical),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Camera {
        Camera {
            position: DVec3::new(0.0, 0.0, 10.0),
            focal_point: DVec3::ZERO,
            view_up: DVec3::Y,
            view_plane_normal: DVec3::Z,
            clipping_range: [0.1, 100.0],
            parallel_projection: true,
            parallel_scale: 5.0,
            view_angle: 30.0,
            slab_thickness: None,
            flip_horizontal: false,
            flip_vertical: false,
        }
    }

    #[test]
    fn test_sparse_update_only_touches_given_fields() {
        let camera = snapshot();
        let update = CameraUpdate {
            parallel_scale: Some(2.0),
            ..Default::default()
        };
        let updated = update.applied_to(&camera);
        assert_eq!(updated.parallel_scale, 2.0);
        assert_eq!(updated.position, camera.position);
        assert_eq!(updated.view_up, camera.view_up);
    }

    #[test]
    fn test_approx_eq() {
        let a = snapshot();
        let mut b = a;
        b.position.x += 1e-12;
        assert!(a.approx_eq(&b, 1e-9));
        b.parallel_scale = 6.0;
        assert!(!a.approx_eq(&b, 1e-9));
        assert!((a.distance() - 10.0).abs() < 1e-12);
    }
}
