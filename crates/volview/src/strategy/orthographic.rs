//! Orthographic MPR viewports.

use std::cell::Cell;

use volview_core::{
    BlendMode, Camera, ImageVolume, Orientation, OrientationAxis, Plane, RenderingDefaults,
    Result, ViewportEvent, ViewportType,
};

use super::{apply_ray_clipping_range, max_slab_thickness, targeted, ViewportStrategy};
use crate::viewport::{ResetCameraOptions, Viewport};

/// Slab-clipped MPR of one or more fused volumes.
///
/// Each actor carries exactly one pair of clipping planes facing each other
/// across the focal plane, `slab_thickness` away on either side.
#[derive(Debug, Default)]
pub struct OrthographicStrategy {
    use_acquisition_plane: Cell<bool>,
    last_image_index: Cell<Option<usize>>,
}

impl OrthographicStrategy {
    fn track_slice(&self, viewport: &mut Viewport) {
        let Some(image_index) = viewport.current_image_id_index() else {
            return;
        };
        if self.last_image_index.replace(Some(image_index)) == Some(image_index) {
            return;
        }
        let Some(volume_id) = viewport.default_actor().map(|entry| entry.reference_id.clone()) else {
            return;
        };
        let image_id = viewport.current_image_id();
        viewport.emit(ViewportEvent::NewSliceImage {
            viewport_id: viewport.id().to_string(),
            volume_id,
            image_index,
            image_id,
        });
    }
}

/// Applies the configured orientation, deferring the acquisition plane
/// until a volume is available.
pub(super) fn initialize_with_acquisition_default(
    strategy: &dyn ViewportStrategy,
    use_acquisition_plane: &Cell<bool>,
    viewport: &mut Viewport,
) -> Result<()> {
    match viewport.options().orientation {
        Some(Orientation::Axis(OrientationAxis::Acquisition)) | None => {
            use_acquisition_plane.set(true);
            Ok(())
        }
        Some(orientation) => strategy.apply_orientation(viewport, &orientation),
    }
}

/// Points the camera at the first volume's acquisition plane, once.
pub(super) fn apply_deferred_acquisition_plane(
    use_acquisition_plane: &Cell<bool>,
    viewport: &mut Viewport,
    first: &ImageVolume,
) {
    if use_acquisition_plane.replace(false) {
        let vectors = Viewport::acquisition_orientation(first);
        viewport.apply_view_orientation(vectors);
    }
}

impl ViewportStrategy for OrthographicStrategy {
    fn kind(&self) -> ViewportType {
        ViewportType::Orthographic
    }

    fn initialize(&self, viewport: &mut Viewport) -> Result<()> {
        initialize_with_acquisition_default(self, &self.use_acquisition_plane, viewport)
    }

    fn apply_orientation(&self, viewport: &mut Viewport, orientation: &Orientation) -> Result<()> {
        let vectors = viewport.orientation_vectors(orientation)?;
        self.use_acquisition_plane.set(false);
        viewport.apply_view_orientation(vectors);
        Ok(())
    }

    fn prepare_volumes(&self, viewport: &mut Viewport, first: &ImageVolume) {
        apply_deferred_acquisition_plane(&self.use_acquisition_plane, viewport, first);
    }

    fn reset_camera(&self, viewport: &mut Viewport, options: ResetCameraOptions) {
        viewport.fit_camera_to_bounds(options);
        apply_ray_clipping_range(viewport);
        self.compute_clipping_geometry(viewport);
        self.track_slice(viewport);
    }

    fn compute_clipping_geometry(&self, viewport: &mut Viewport) {
        let focal_point = viewport.camera.focal_point();
        let normal = viewport.camera.view_plane_normal();
        for entry in &viewport.actors {
            let thickness = entry
                .slab_thickness
                .unwrap_or(RenderingDefaults::MINIMUM_SLAB_THICKNESS);
            let near = Plane::from_point_normal(focal_point - normal * thickness, normal);
            let far = Plane::from_point_normal(focal_point + normal * thickness, -normal);

            let mut actor = entry.actor.borrow_mut();
            let mapper = actor.mapper_mut();
            if mapper.clipping_planes().len() == 2 {
                let planes = mapper.clipping_planes_mut();
                planes[0] = near;
                planes[1] = far;
            } else {
                mapper.remove_all_clipping_planes();
                mapper.add_clipping_plane(near);
                mapper.add_clipping_plane(far);
            }
        }
    }

    fn camera_updated(&self, viewport: &mut Viewport, _previous: &Camera) {
        self.compute_clipping_geometry(viewport);
        self.track_slice(viewport);
    }

    fn slab_thickness(&self, viewport: &Viewport) -> Option<f64> {
        Some(max_slab_thickness(viewport))
    }

    fn set_slab_thickness(&self, viewport: &mut Viewport, thickness: f64, actor_uids: Option<&[&str]>) {
        let previous = viewport.camera();
        let thickness = thickness.max(0.0);
        for entry in targeted(&mut viewport.actors, actor_uids) {
            entry.slab_thickness = Some(thickness);
        }
        let reported = max_slab_thickness(viewport);
        viewport.camera.set_slab_thickness(reported);
        viewport.camera_changed(&previous);
        viewport.render();
    }

    fn set_blend_mode(&self, viewport: &mut Viewport, mode: BlendMode, actor_uids: Option<&[&str]>) {
        for entry in targeted(&mut viewport.actors, actor_uids) {
            entry.blend_mode = mode;
            entry.actor.borrow_mut().mapper_mut().set_blend_mode(mode);
        }
        viewport.render();
    }
}
