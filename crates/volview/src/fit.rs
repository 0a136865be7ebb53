//! Camera fitting.

use glam::DVec3;
use volview_core::geometry::{
    centroid, plane_bounds_intersections, world_distance_view_up_and_right,
};
use volview_core::{Bounds, Plane};

use crate::viewport::{ResetCameraOptions, Viewport};

/// Margin applied to the fitted radius and camera distance.
const FIT_MARGIN: f64 = 1.1;

impl Viewport {
    /// Fits the camera to the renderer's visible bounds, keeping its
    /// orientation.
    pub(crate) fn fit_camera_to_bounds(&mut self, options: ResetCameraOptions) {
        let image = self.default_volume();
        let mut bounds = match self.renderer() {
            Ok(renderer) => renderer.borrow().compute_visible_prop_bounds(),
            Err(_) => Bounds::uninitialized(),
        };
        if !bounds.is_valid() {
            bounds = Bounds::new(DVec3::ZERO, DVec3::ZERO);
        }
        if let Some(image) = &image {
            bounds = bounds.shrink(image.spacing() / 2.0);
        }

        self.camera.set_view_angle(90.0);

        let view_plane_normal = self.camera.view_plane_normal();
        let view_up = self.camera.view_up();

        let mut focal_point = bounds.center();
        if let Some(image) = &image {
            focal_point = image.index_to_world(image.center_index().as_dvec3());
        }

        let (width_world, height_world) =
            world_distance_view_up_and_right(&bounds, view_up, view_plane_normal);
        let (canvas_width, canvas_height) = self.canvas_size();
        let canvas_aspect = if canvas_height > 0 {
            f64::from(canvas_width) / f64::from(canvas_height)
        } else {
            1.0
        };

        let size = bounds.size();
        let diagonal_squared = size.length_squared();
        let sphere_radius = if diagonal_squared == 0.0 { 1.0 } else { diagonal_squared }.sqrt() * 0.5;

        let radius = if width_world > 0.0 && height_world > 0.0 {
            let bounds_aspect = width_world / height_world;
            if bounds_aspect < canvas_aspect {
                height_world / 2.0
            } else {
                height_world * (bounds_aspect / canvas_aspect) / 2.0
            }
        } else {
            sphere_radius
        };
        let distance = FIT_MARGIN * sphere_radius;

        if options.reset_pan_zoom_for_view_plane {
            if let Some(image) = &image {
                let plane = Plane::from_point_normal(self.camera.focal_point(), view_plane_normal);
                let hits = plane_bounds_intersections(&image.bounds(), &plane);
                focal_point = centroid(&hits).unwrap_or(focal_point);
            }
        }

        self.camera.set_focal_point(focal_point);
        self.camera.set_position(focal_point + distance * view_plane_normal);
        self.camera.set_view_up(view_up);
        self.camera.set_clipping_range(distance, distance + 0.1);
        self.camera.set_parallel_scale(FIT_MARGIN * radius);
        self.camera.set_physical_scale(sphere_radius);
        self.camera.set_physical_translation(-focal_point);

        if let Ok(renderer) = self.renderer() {
            renderer.borrow_mut().notify_camera_reset();
        }
    }
}
