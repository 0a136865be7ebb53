//! Single reslice-plane viewports.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use volview_core::{
    BlendMode, CameraUpdate, ImageVolume, LoadCallbackId, Orientation, Plane, Result,
    ViewportType,
};
use volview_render::{CanvasPipeline, SlabType};

use super::orthographic::{apply_deferred_acquisition_plane, initialize_with_acquisition_default};
use super::{max_slab_thickness, targeted, ViewportStrategy};
use crate::viewport::Viewport;

/// Fraction of the smallest voxel spacing within which a focal point counts
/// as lying on the slice plane.
const ON_PLANE_TOLERANCE: f64 = 1e-3;

/// One reslice plane per image actor, kept on the camera's focal plane.
///
/// Canvas/world conversion runs through the renderer's projection and view
/// matrices, since the viewport is a sub-rectangle of a shared renderer.
#[derive(Debug, Default)]
pub struct VolumeSliceStrategy {
    use_acquisition_plane: Cell<bool>,
    streaming_callbacks: RefCell<HashMap<String, (Weak<ImageVolume>, LoadCallbackId)>>,
}

impl VolumeSliceStrategy {
    fn on_plane_epsilon(viewport: &Viewport) -> f64 {
        viewport
            .default_volume()
            .map_or(ON_PLANE_TOLERANCE, |volume| {
                ON_PLANE_TOLERANCE * volume.spacing().min_element()
            })
    }

    fn attach_streaming_callback(&self, viewport: &Viewport, volume: &Rc<ImageVolume>) {
        let volume_id = volume.volume_id().to_string();
        let mut callbacks = self.streaming_callbacks.borrow_mut();
        if let Some((previous, id)) = callbacks.remove(&volume_id) {
            if let Some(previous) = previous.upgrade() {
                previous.load_status().borrow_mut().remove_callback(id);
            }
        }

        let engine = viewport.engine_handle();
        let viewport_id = viewport.id().to_string();
        let id = volume
            .load_status()
            .borrow_mut()
            .add_callback(move |progress| {
                if let Some(engine) = engine.upgrade() {
                    log::debug!(
                        "volume progress {}/{}, rendering '{viewport_id}'",
                        progress.frames_loaded,
                        progress.total_frames
                    );
                    engine.render_viewport(&viewport_id);
                }
            });
        callbacks.insert(volume_id, (Rc::downgrade(volume), id));
    }
}

fn slab_type_for(mode: BlendMode) -> Option<SlabType> {
    match mode {
        BlendMode::MaximumIntensity => Some(SlabType::Max),
        BlendMode::MinimumIntensity => Some(SlabType::Min),
        BlendMode::AverageIntensity | BlendMode::Composite => Some(SlabType::Mean),
        BlendMode::Additive | BlendMode::RadonTransform => None,
    }
}

impl ViewportStrategy for VolumeSliceStrategy {
    fn kind(&self) -> ViewportType {
        ViewportType::VolumeSlice
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

    fn volumes_set(&self, viewport: &mut Viewport, volumes: &[Rc<ImageVolume>]) {
        for volume in volumes {
            self.attach_streaming_callback(viewport, volume);
        }
    }

    fn compute_clipping_geometry(&self, viewport: &mut Viewport) {
        let plane = Plane::from_point_normal(
            viewport.camera.focal_point(),
            viewport.camera.view_plane_normal(),
        );
        for entry in &viewport.actors {
            entry.actor.borrow_mut().mapper_mut().set_slice_plane(plane);
        }
    }

    /// Pans and zooms arriving together must not move the viewed slice: the
    /// requested focal point is projected back onto the current plane and
    /// the position follows it. A position-only pan moves the focal point
    /// along in-plane so the view direction is kept.
    fn adjust_camera_update(&self, viewport: &Viewport, mut update: CameraUpdate) -> CameraUpdate {
        if update.parallel_scale.is_none() {
            return update;
        }
        let camera = viewport.camera();
        let plane = Plane::from_point_normal(camera.focal_point, camera.view_plane_normal);
        let epsilon = Self::on_plane_epsilon(viewport);
        match (update.focal_point, update.position) {
            (Some(focal_point), _) => {
                let offset = plane.signed_distance(focal_point);
                if offset.abs() <= epsilon {
                    return update;
                }
                let delta = -offset * plane.normal;
                update.focal_point = Some(focal_point + delta);
                update.position = update.position.map(|position| position + delta);
            }
            (None, Some(position)) => {
                let delta = position - camera.position;
                let pan = delta - delta.dot(plane.normal) * plane.normal;
                if pan.length() <= epsilon {
                    return update;
                }
                update.focal_point = Some(camera.focal_point + pan);
                update.position = Some(camera.position + pan);
            }
            (None, None) => {}
        }
        update
    }

    fn slab_thickness(&self, viewport: &Viewport) -> Option<f64> {
        Some(max_slab_thickness(viewport))
    }

    fn set_slab_thickness(&self, viewport: &mut Viewport, thickness: f64, actor_uids: Option<&[&str]>) {
        let previous = viewport.camera();
        let thickness = thickness.max(0.0);
        for entry in targeted(&mut viewport.actors, actor_uids) {
            entry.slab_thickness = Some(thickness);
            entry.actor.borrow_mut().mapper_mut().set_slab_thickness(thickness);
        }
        let reported = max_slab_thickness(viewport);
        viewport.camera.set_slab_thickness(reported);
        viewport.camera_changed(&previous);
        viewport.render();
    }

    fn set_blend_mode(&self, viewport: &mut Viewport, mode: BlendMode, actor_uids: Option<&[&str]>) {
        let Some(slab_type) = slab_type_for(mode) else {
            log::debug!("blend mode {mode:?} has no slab equivalent, ignoring");
            return;
        };
        for entry in targeted(&mut viewport.actors, actor_uids) {
            entry.blend_mode = mode;
            let mut actor = entry.actor.borrow_mut();
            let mapper = actor.mapper_mut();
            mapper.set_blend_mode(mode);
            mapper.set_slab_type(slab_type);
        }
        viewport.render();
    }

    fn canvas_pipeline(&self) -> CanvasPipeline {
        CanvasPipeline::Renderer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slab_type_table() {
        assert_eq!(slab_type_for(BlendMode::MaximumIntensity), Some(SlabType::Max));
        assert_eq!(slab_type_for(BlendMode::MinimumIntensity), Some(SlabType::Min));
        assert_eq!(slab_type_for(BlendMode::AverageIntensity), Some(SlabType::Mean));
        assert_eq!(slab_type_for(BlendMode::Composite), Some(SlabType::Mean));
        assert_eq!(slab_type_for(BlendMode::Additive), None);
    }
}
