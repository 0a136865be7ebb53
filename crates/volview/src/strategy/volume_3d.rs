//! Full 3D volume rendering viewports.

use volview_core::{
    BlendMode, Orientation, OrientationAxis, Result, ViewportProperties, ViewportType,
};

use super::{apply_ray_clipping_range, ViewportStrategy};
use crate::viewport::{ResetCameraOptions, Viewport};

/// Perspective volume rendering of whole volumes. There is a single
/// conceptual slice, so slab thickness and blend mode have no effect.
#[derive(Debug, Default)]
pub struct Volume3dStrategy;

impl ViewportStrategy for Volume3dStrategy {
    fn kind(&self) -> ViewportType {
        ViewportType::Volume3d
    }

    fn default_parallel_projection(&self) -> bool {
        false
    }

    fn initialize(&self, viewport: &mut Viewport) -> Result<()> {
        match viewport.options().orientation {
            None | Some(Orientation::Axis(OrientationAxis::Acquisition)) => Ok(()),
            Some(orientation) => self.apply_orientation(viewport, &orientation),
        }
    }

    fn reset_camera(&self, viewport: &mut Viewport, options: ResetCameraOptions) {
        viewport.fit_camera_to_bounds(options);
        apply_ray_clipping_range(viewport);
    }

    fn compute_clipping_geometry(&self, _viewport: &mut Viewport) {}

    fn slab_thickness(&self, _viewport: &Viewport) -> Option<f64> {
        None
    }

    fn set_slab_thickness(&self, viewport: &mut Viewport, thickness: f64, _actor_uids: Option<&[&str]>) {
        log::debug!("ignoring slab thickness {thickness} on 3D viewport '{}'", viewport.id());
    }

    fn set_blend_mode(&self, viewport: &mut Viewport, mode: BlendMode, _actor_uids: Option<&[&str]>) {
        log::debug!("ignoring blend mode {mode:?} on 3D viewport '{}'", viewport.id());
    }

    fn supports_rotation(&self) -> bool {
        false
    }

    fn reset_properties(&self, viewport: &mut Viewport, volume_id: Option<&str>) -> Result<()> {
        let entry = viewport.applicable_actor(volume_id)?;
        entry.actor.borrow_mut().restore_initial_transfer_functions();
        *viewport.properties.current_mut() = ViewportProperties::default();
        viewport.reset_camera();
        viewport.render();
        Ok(())
    }
}
