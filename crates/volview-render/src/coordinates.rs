//! Canvas <-> world coordinate pipelines.
//!
//! Two pipelines exist. The window pipeline goes through the shared surface:
//! canvas pixels are scaled by the device pixel ratio, offset by the
//! viewport's position on the surface, flipped to y-up and mapped into the
//! renderer's normalized rectangle before unprojection. The renderer pipeline
//! works on the viewport canvas alone and skips the surface entirely.
//!
//! Both run the camera in coordinate-transformation mode so depth 0 lands on
//! the focal plane.

use glam::{DVec2, DVec3};
use volview_core::Result;

use crate::camera::SlabCamera;

/// Which chain of transforms maps canvas pixels into the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CanvasPipeline {
    /// Through the shared surface and the renderer's viewport rectangle.
    #[default]
    Window,
    /// Directly through the renderer's projection and view matrices.
    Renderer,
}

/// Placement of a viewport canvas on the shared surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayGeometry {
    /// Surface size in device pixels.
    pub surface_size: DVec2,
    /// Normalized `[x_min, y_min, x_max, y_max]` rectangle of the renderer.
    pub viewport: [f64; 4],
    /// Offset of the canvas on the surface, in device pixels.
    pub offset: DVec2,
    /// Canvas size in device pixels.
    pub canvas_size: DVec2,
    /// Device pixels per canvas pixel.
    pub device_pixel_ratio: f64,
}

impl DisplayGeometry {
    /// Geometry of a canvas filling a surface of the same size.
    #[must_use]
    pub fn full_surface(width: f64, height: f64) -> Self {
        Self {
            surface_size: DVec2::new(width, height),
            viewport: [0.0, 0.0, 1.0, 1.0],
            offset: DVec2::ZERO,
            canvas_size: DVec2::new(width, height),
            device_pixel_ratio: 1.0,
        }
    }

    fn renderer_aspect(&self) -> f64 {
        let width = (self.viewport[2] - self.viewport[0]) * self.surface_size.x;
        let height = (self.viewport[3] - self.viewport[1]) * self.surface_size.y;
        if height > 0.0 {
            width / height
        } else {
            1.0
        }
    }

    fn canvas_aspect(&self) -> f64 {
        if self.canvas_size.y > 0.0 {
            self.canvas_size.x / self.canvas_size.y
        } else {
            1.0
        }
    }
}

/// Maps a canvas pixel to the world point on the focal plane.
pub fn canvas_to_world(
    camera: &mut SlabCamera,
    geometry: &DisplayGeometry,
    pipeline: CanvasPipeline,
    canvas: DVec2,
) -> Result<DVec3> {
    let camera = camera.coordinate_transformation();
    let (ndc, aspect) = match pipeline {
        CanvasPipeline::Window => {
            let display = canvas * geometry.device_pixel_ratio + geometry.offset;
            let display = DVec2::new(display.x, geometry.surface_size.y - display.y);
            let normalized = display / geometry.surface_size;
            let [x0, y0, x1, y1] = geometry.viewport;
            let local = DVec2::new((normalized.x - x0) / (x1 - x0), (normalized.y - y0) / (y1 - y0));
            (local * 2.0 - DVec2::ONE, geometry.renderer_aspect())
        }
        CanvasPipeline::Renderer => {
            let pixels = canvas * geometry.device_pixel_ratio;
            let normalized = DVec2::new(
                pixels.x / geometry.canvas_size.x,
                1.0 - pixels.y / geometry.canvas_size.y,
            );
            (normalized * 2.0 - DVec2::ONE, geometry.canvas_aspect())
        }
    };
    let projection = camera.projection_matrix(aspect, -1.0, 1.0)?;
    let view = camera.view_matrix();
    let eye = projection.inverse().project_point3(DVec3::new(ndc.x, ndc.y, -1.0));
    Ok(view.inverse().transform_point3(eye))
}

/// Maps a world point to canvas pixels.
pub fn world_to_canvas(
    camera: &mut SlabCamera,
    geometry: &DisplayGeometry,
    pipeline: CanvasPipeline,
    world: DVec3,
) -> Result<DVec2> {
    let camera = camera.coordinate_transformation();
    let aspect = match pipeline {
        CanvasPipeline::Window => geometry.renderer_aspect(),
        CanvasPipeline::Renderer => geometry.canvas_aspect(),
    };
    let ndc = camera.composite_projection_matrix(aspect, -1.0, 1.0)?.project_point3(world);
    let local = (DVec2::new(ndc.x, ndc.y) + DVec2::ONE) / 2.0;
    Ok(match pipeline {
        CanvasPipeline::Window => {
            let [x0, y0, x1, y1] = geometry.viewport;
            let normalized = DVec2::new(x0 + local.x * (x1 - x0), y0 + local.y * (y1 - y0));
            let display = normalized * geometry.surface_size;
            let display = DVec2::new(display.x, geometry.surface_size.y - display.y);
            (display - geometry.offset) / geometry.device_pixel_ratio
        }
        CanvasPipeline::Renderer => {
            let pixels = DVec2::new(local.x, 1.0 - local.y) * geometry.canvas_size;
            pixels / geometry.device_pixel_ratio
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn axial_camera() -> SlabCamera {
        let mut camera = SlabCamera::new();
        camera.set_parallel_projection(true);
        camera.set_focal_point(DVec3::ZERO);
        camera.set_position(DVec3::new(0.0, 0.0, -100.0));
        camera.set_view_up(DVec3::NEG_Y);
        camera.set_clipping_range(-1e5, 1e5);
        camera.set_parallel_scale(100.0);
        camera
    }

    #[test]
    fn test_center_maps_to_focal_point() {
        let mut camera = axial_camera();
        let geometry = DisplayGeometry::full_surface(200.0, 200.0);
        let world = canvas_to_world(&mut camera, &geometry, CanvasPipeline::Window, DVec2::new(100.0, 100.0)).unwrap();
        assert!(world.length() < 1e-6, "{world:?}");
        assert!(!camera.is_performing_coordinate_transformation());
    }

    #[test]
    fn test_corner_spans_parallel_scale() {
        let mut camera = axial_camera();
        let geometry = DisplayGeometry::full_surface(200.0, 200.0);
        // canvas top maps to +view_up, which is -Y for this camera
        let world = canvas_to_world(&mut camera, &geometry, CanvasPipeline::Window, DVec2::new(100.0, 0.0)).unwrap();
        assert!((world - DVec3::new(0.0, -100.0, 0.0)).length() < 1e-6, "{world:?}");
    }

    #[test]
    fn test_pipelines_agree_on_full_surface() {
        let mut camera = axial_camera();
        let geometry = DisplayGeometry::full_surface(300.0, 200.0);
        let p = DVec2::new(40.0, 170.0);
        let a = canvas_to_world(&mut camera, &geometry, CanvasPipeline::Window, p).unwrap();
        let b = canvas_to_world(&mut camera, &geometry, CanvasPipeline::Renderer, p).unwrap();
        assert!((a - b).length() < 1e-6);
    }

    #[test]
    fn test_offset_viewport() {
        let mut camera = axial_camera();
        let geometry = DisplayGeometry {
            surface_size: DVec2::new(400.0, 200.0),
            viewport: [0.5, 0.0, 1.0, 1.0],
            offset: DVec2::new(200.0, 0.0),
            canvas_size: DVec2::new(200.0, 200.0),
            device_pixel_ratio: 1.0,
        };
        let world = canvas_to_world(&mut camera, &geometry, CanvasPipeline::Window, DVec2::new(100.0, 100.0)).unwrap();
        assert!(world.length() < 1e-6, "{world:?}");
    }

    proptest! {
        #[test]
        fn test_window_round_trip(x in 0.0f64..256.0, y in 0.0f64..128.0, dpr in 1.0f64..3.0) {
            let mut camera = axial_camera();
            let geometry = DisplayGeometry {
                surface_size: DVec2::new(512.0 * dpr, 128.0 * dpr),
                viewport: [0.5, 0.0, 1.0, 1.0],
                offset: DVec2::new(256.0 * dpr, 0.0),
                canvas_size: DVec2::new(256.0 * dpr, 128.0 * dpr),
                device_pixel_ratio: dpr,
            };
            let canvas = DVec2::new(x, y);
            let world = canvas_to_world(&mut camera, &geometry, CanvasPipeline::Window, canvas).unwrap();
            let back = world_to_canvas(&mut camera, &geometry, CanvasPipeline::Window, world).unwrap();
            prop_assert!((back - canvas).length() < 1e-6);
        }

        #[test]
        fn test_renderer_round_trip(x in 0.0f64..300.0, y in 0.0f64..150.0) {
            let mut camera = axial_camera();
            let geometry = DisplayGeometry::full_surface(300.0, 150.0);
            let canvas = DVec2::new(x, y);
            let world = canvas_to_world(&mut camera, &geometry, CanvasPipeline::Renderer, canvas).unwrap();
            let back = world_to_canvas(&mut camera, &geometry, CanvasPipeline::Renderer, world).unwrap();
            prop_assert!((back - canvas).length() < 1e-6);
        }
    }
}
