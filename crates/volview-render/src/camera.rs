//! Slab-aware camera.
//!
//! [`SlabCamera`] behaves like a regular scene camera but can temporarily swap
//! the near/far range used to build its projection matrix. Volume viewports
//! render with a huge clipping range so no slab gets clipped, yet mapping a
//! screen pixel back into the world needs a razor-thin range sitting exactly
//! at the focal plane, otherwise the inferred depth collapses onto the wrong
//! plane. While a [`CoordinateTransformation`] guard is alive the projection
//! uses `[distance, distance + 0.1]` instead of the visible clipping range.

use std::ops::{Deref, DerefMut};

use glam::{DMat4, DVec2, DVec3, DVec4};
use serde::{Deserialize, Serialize};
use volview_core::{Result, ViewportError};

/// Depth of the synthetic range used during coordinate transformation.
pub const TRANSFORMATION_RANGE_DEPTH: f64 = 0.1;

/// Above this |dot(view_up, direction_of_projection)| the up vector is rebuilt.
pub const PARALLEL_VIEW_UP_THRESHOLD: f64 = 0.999;

/// Camera with a coordinate-transformation projection override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlabCamera {
    position: DVec3,
    focal_point: DVec3,
    view_up: DVec3,
    direction_of_projection: DVec3,
    distance: f64,
    clipping_range: [f64; 2],
    parallel_projection: bool,
    parallel_scale: f64,
    view_angle: f64,
    window_center: DVec2,
    use_horizontal_view_angle: bool,
    use_off_axis_projection: bool,
    physical_scale: f64,
    physical_translation: DVec3,
    slab_thickness: f64,
    #[serde(skip)]
    is_performing_coordinate_transformation: bool,
}

impl Default for SlabCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl SlabCamera {
    /// Creates a camera one unit in front of the origin, looking down -Z.
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: DVec3::new(0.0, 0.0, 1.0),
            focal_point: DVec3::ZERO,
            view_up: DVec3::Y,
            direction_of_projection: DVec3::NEG_Z,
            distance: 1.0,
            clipping_range: [0.01, 1000.01],
            parallel_projection: false,
            parallel_scale: 1.0,
            view_angle: 30.0,
            window_center: DVec2::ZERO,
            use_horizontal_view_angle: false,
            use_off_axis_projection: false,
            physical_scale: 1.0,
            physical_translation: DVec3::ZERO,
            slab_thickness: 0.0,
            is_performing_coordinate_transformation: false,
        }
    }

    /// Eye position.
    #[must_use]
    pub fn position(&self) -> DVec3 {
        self.position
    }

    /// Moves the eye, keeping the focal point.
    pub fn set_position(&mut self, position: DVec3) {
        self.position = position;
        self.update_distance();
    }

    /// Point looked at.
    #[must_use]
    pub fn focal_point(&self) -> DVec3 {
        self.focal_point
    }

    /// Moves the focal point, keeping the eye.
    pub fn set_focal_point(&mut self, focal_point: DVec3) {
        self.focal_point = focal_point;
        self.update_distance();
    }

    fn update_distance(&mut self) {
        let offset = self.focal_point - self.position;
        self.distance = offset.length();
        if let Some(dop) = offset.try_normalize() {
            self.direction_of_projection = dop;
        }
    }

    /// Up vector as last set (unit length).
    #[must_use]
    pub fn view_up(&self) -> DVec3 {
        self.view_up
    }

    /// Sets the up vector. Zero vectors are ignored, and an up vector
    /// parallel to the view direction is reassigned.
    pub fn set_view_up(&mut self, view_up: DVec3) {
        if let Some(up) = view_up.try_normalize() {
            self.view_up = up;
            self.repair_view_up();
        }
    }

    /// Reassigns the up vector when it is (nearly) parallel to the direction
    /// of projection, using `[-u.z, u.x, u.y]`.
    ///
    /// [`set_position`](Self::set_position) and
    /// [`set_focal_point`](Self::set_focal_point) skip this check since a
    /// caller moving both ends passes through intermediate directions; call it
    /// once both are in place.
    pub fn repair_view_up(&mut self) {
        let dop = self.direction_of_projection;
        if self.view_up.dot(dop).abs() <= PARALLEL_VIEW_UP_THRESHOLD {
            return;
        }
        let u = self.view_up;
        let rotated = DVec3::new(-u.z, u.x, u.y);
        // (1, -1, 1) is a fixed direction of the component rotation
        self.view_up = if rotated.dot(dop).abs() > PARALLEL_VIEW_UP_THRESHOLD {
            dop.any_orthonormal_vector()
        } else {
            rotated
        };
    }

    /// Unit vector from eye to focal point.
    #[must_use]
    pub fn direction_of_projection(&self) -> DVec3 {
        self.direction_of_projection
    }

    /// Points the camera along `direction`, keeping the focal point and distance.
    pub fn set_direction_of_projection(&mut self, direction: DVec3) {
        let Some(dop) = direction.try_normalize() else {
            return;
        };
        self.direction_of_projection = dop;
        self.position = self.focal_point - dop * self.distance;
        self.repair_view_up();
    }

    /// Unit normal of the view plane (opposite to the direction of projection).
    #[must_use]
    pub fn view_plane_normal(&self) -> DVec3 {
        -self.direction_of_projection
    }

    /// Eye to focal point distance.
    #[must_use]
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Externally visible clipping range.
    #[must_use]
    pub fn clipping_range(&self) -> [f64; 2] {
        self.clipping_range
    }

    /// Sets the clipping range, swapping the values if given out of order.
    pub fn set_clipping_range(&mut self, near: f64, far: f64) {
        self.clipping_range = if near <= far { [near, far] } else { [far, near] };
    }

    /// Orthographic when true.
    #[must_use]
    pub fn parallel_projection(&self) -> bool {
        self.parallel_projection
    }

    /// Switches between orthographic and perspective projection.
    pub fn set_parallel_projection(&mut self, parallel: bool) {
        self.parallel_projection = parallel;
    }

    /// Half height of the orthographic view volume.
    #[must_use]
    pub fn parallel_scale(&self) -> f64 {
        self.parallel_scale
    }

    /// Sets the orthographic half height.
    pub fn set_parallel_scale(&mut self, scale: f64) {
        self.parallel_scale = scale;
    }

    /// Perspective field of view in degrees.
    #[must_use]
    pub fn view_angle(&self) -> f64 {
        self.view_angle
    }

    /// Sets the perspective field of view in degrees.
    pub fn set_view_angle(&mut self, degrees: f64) {
        self.view_angle = degrees;
    }

    /// Enables the off-axis projection path, which cannot be built.
    pub fn set_use_off_axis_projection(&mut self, enabled: bool) {
        self.use_off_axis_projection = enabled;
    }

    /// World scale used by physical (room-scale) renderers.
    #[must_use]
    pub fn physical_scale(&self) -> f64 {
        self.physical_scale
    }

    /// Sets the physical scale.
    pub fn set_physical_scale(&mut self, scale: f64) {
        self.physical_scale = scale;
    }

    /// World translation used by physical renderers.
    #[must_use]
    pub fn physical_translation(&self) -> DVec3 {
        self.physical_translation
    }

    /// Sets the physical translation.
    pub fn set_physical_translation(&mut self, translation: DVec3) {
        self.physical_translation = translation;
    }

    /// Slab thickness carried by the camera.
    #[must_use]
    pub fn slab_thickness(&self) -> f64 {
        self.slab_thickness
    }

    /// Sets the slab thickness, clamped to be non-negative.
    pub fn set_slab_thickness(&mut self, thickness: f64) {
        self.slab_thickness = thickness.max(0.0);
    }

    /// Whether the projection currently uses the synthetic focal-plane range.
    #[must_use]
    pub fn is_performing_coordinate_transformation(&self) -> bool {
        self.is_performing_coordinate_transformation
    }

    /// Enters coordinate-transformation mode until the guard is dropped.
    ///
    /// The previous flag value is restored on drop, so guards nest.
    pub fn coordinate_transformation(&mut self) -> CoordinateTransformation<'_> {
        let previous = self.is_performing_coordinate_transformation;
        self.is_performing_coordinate_transformation = true;
        CoordinateTransformation {
            camera: self,
            previous,
        }
    }

    /// Runs `f` with the camera in coordinate-transformation mode.
    pub fn with_coordinate_transformation<R>(&mut self, f: impl FnOnce(&SlabCamera) -> R) -> R {
        let guard = self.coordinate_transformation();
        f(&guard)
    }

    /// Near/far range used for projection construction.
    #[must_use]
    pub fn effective_clipping_range(&self) -> [f64; 2] {
        if self.is_performing_coordinate_transformation {
            [self.distance, self.distance + TRANSFORMATION_RANGE_DEPTH]
        } else {
            self.clipping_range
        }
    }

    /// World to camera (view) matrix.
    #[must_use]
    pub fn view_matrix(&self) -> DMat4 {
        DMat4::look_at_rh(self.position, self.focal_point, self.view_up)
    }

    /// Camera to clip-space matrix with OpenGL depth convention.
    ///
    /// `near_z` and `far_z` select a sub-range of the clipping range in
    /// normalized [-1, 1] units; pass `-1.0, 1.0` for the full range.
    pub fn projection_matrix(&self, aspect: f64, near_z: f64, far_z: f64) -> Result<DMat4> {
        let range = self.effective_clipping_range();
        let width = range[1] - range[0];
        let near = range[0] + (near_z + 1.0) * width / 2.0;
        let far = range[0] + (far_z + 1.0) * width / 2.0;

        if self.parallel_projection {
            let half_width = self.parallel_scale * aspect;
            let half_height = self.parallel_scale;
            let xmin = (self.window_center.x - 1.0) * half_width;
            let xmax = (self.window_center.x + 1.0) * half_width;
            let ymin = (self.window_center.y - 1.0) * half_height;
            let ymax = (self.window_center.y + 1.0) * half_height;
            Ok(DMat4::orthographic_rh_gl(xmin, xmax, ymin, ymax, near, far))
        } else if self.use_off_axis_projection {
            Err(ViewportError::UnsupportedProjection(
                "off-axis projection is not supported".into(),
            ))
        } else {
            let tan = (self.view_angle.to_radians() / 2.0).tan();
            let (half_width, half_height) = if self.use_horizontal_view_angle {
                (near * tan, near * tan / aspect)
            } else {
                (near * tan * aspect, near * tan)
            };
            let xmin = (self.window_center.x - 1.0) * half_width;
            let xmax = (self.window_center.x + 1.0) * half_width;
            let ymin = (self.window_center.y - 1.0) * half_height;
            let ymax = (self.window_center.y + 1.0) * half_height;
            Ok(frustum(xmin, xmax, ymin, ymax, near, far))
        }
    }

    /// Projection times view, mapping world space to clip space.
    pub fn composite_projection_matrix(&self, aspect: f64, near_z: f64, far_z: f64) -> Result<DMat4> {
        Ok(self.projection_matrix(aspect, near_z, far_z)? * self.view_matrix())
    }
}

fn frustum(left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) -> DMat4 {
    DMat4::from_cols(
        DVec4::new(2.0 * near / (right - left), 0.0, 0.0, 0.0),
        DVec4::new(0.0, 2.0 * near / (top - bottom), 0.0, 0.0),
        DVec4::new(
            (right + left) / (right - left),
            (top + bottom) / (top - bottom),
            -(far + near) / (far - near),
            -1.0,
        ),
        DVec4::new(0.0, 0.0, -2.0 * far * near / (far - near), 0.0),
    )
}

/// Guard returned by [`SlabCamera::coordinate_transformation`].
#[derive(Debug)]
pub struct CoordinateTransformation<'a> {
    camera: &'a mut SlabCamera,
    previous: bool,
}

impl Deref for CoordinateTransformation<'_> {
    type Target = SlabCamera;

    fn deref(&self) -> &SlabCamera {
        self.camera
    }
}

impl DerefMut for CoordinateTransformation<'_> {
    fn deref_mut(&mut self) -> &mut SlabCamera {
        self.camera
    }
}

impl Drop for CoordinateTransformation<'_> {
    fn drop(&mut self) {
        self.camera.is_performing_coordinate_transformation = self.previous;
    }
}
