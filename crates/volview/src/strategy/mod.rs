//! Per-kind viewport behaviour.
//!
//! A [`Viewport`] delegates camera fitting, orientation, clipping geometry
//! and slab handling to the strategy selected by its [`ViewportType`].

mod orthographic;
mod volume_3d;
mod volume_slice;

use std::fmt;
use std::rc::Rc;

use volview_core::{
    BlendMode, Camera, CameraUpdate, ImageVolume, Orientation, RenderingDefaults, Result,
    ViewportType,
};
use volview_render::CanvasPipeline;

use crate::viewport::{ActorEntry, ResetCameraOptions, Viewport};

pub use orthographic::OrthographicStrategy;
pub use volume_3d::Volume3dStrategy;
pub use volume_slice::VolumeSliceStrategy;

/// Behaviour that differs between viewport kinds.
pub trait ViewportStrategy: fmt::Debug {
    /// Kind handled by this strategy.
    fn kind(&self) -> ViewportType;

    /// Projection used when the options do not choose one.
    fn default_parallel_projection(&self) -> bool {
        true
    }

    /// Applies the configured orientation right after construction.
    fn initialize(&self, viewport: &mut Viewport) -> Result<()>;

    /// Points the camera along an orientation and fits it.
    fn apply_orientation(&self, viewport: &mut Viewport, orientation: &Orientation) -> Result<()> {
        let vectors = viewport.orientation_vectors(orientation)?;
        viewport.apply_view_orientation(vectors);
        Ok(())
    }

    /// Runs before `set_volumes` replaces the actors.
    fn prepare_volumes(&self, _viewport: &mut Viewport, _first: &ImageVolume) {}

    /// Runs after volumes were set or added.
    fn volumes_set(&self, _viewport: &mut Viewport, _volumes: &[Rc<ImageVolume>]) {}

    /// Fits the camera, then derives clipping geometry.
    fn reset_camera(&self, viewport: &mut Viewport, options: ResetCameraOptions) {
        viewport.fit_camera_to_bounds(options);
        self.compute_clipping_geometry(viewport);
    }

    /// Derives per-actor clipping or slicing state from the camera.
    fn compute_clipping_geometry(&self, viewport: &mut Viewport);

    /// Rewrites a camera update before it is applied.
    fn adjust_camera_update(&self, _viewport: &Viewport, update: CameraUpdate) -> CameraUpdate {
        update
    }

    /// Runs after every camera change.
    fn camera_updated(&self, viewport: &mut Viewport, _previous: &Camera) {
        self.compute_clipping_geometry(viewport);
    }

    /// Slab thickness reported for the viewport, if the kind has one.
    fn slab_thickness(&self, viewport: &Viewport) -> Option<f64>;

    /// Sets slab thickness on the listed actors, or all actors.
    fn set_slab_thickness(&self, viewport: &mut Viewport, thickness: f64, actor_uids: Option<&[&str]>);

    /// Sets the blend mode on the listed actors, or all actors.
    fn set_blend_mode(&self, viewport: &mut Viewport, mode: BlendMode, actor_uids: Option<&[&str]>);

    /// Canvas <-> world pipeline.
    fn canvas_pipeline(&self) -> CanvasPipeline {
        CanvasPipeline::Window
    }

    /// Whether in-plane rotation is tracked.
    fn supports_rotation(&self) -> bool {
        true
    }

    /// Restores default properties.
    fn reset_properties(&self, viewport: &mut Viewport, volume_id: Option<&str>) -> Result<()> {
        viewport.reset_to_default_properties(volume_id)
    }
}

/// Creates the strategy for a viewport kind.
pub fn for_kind(kind: ViewportType) -> Rc<dyn ViewportStrategy> {
    match kind {
        ViewportType::Orthographic => Rc::new(OrthographicStrategy::default()),
        ViewportType::Volume3d => Rc::new(Volume3dStrategy),
        ViewportType::VolumeSlice => Rc::new(VolumeSliceStrategy::default()),
    }
}

/// Clipping range that keeps every slab visible: symmetric around the
/// focal plane for parallel projection, in front of the eye otherwise.
pub(crate) fn apply_ray_clipping_range(viewport: &mut Viewport) {
    let max = RenderingDefaults::MAXIMUM_RAY_DISTANCE;
    if viewport.camera.parallel_projection() {
        viewport.camera.set_clipping_range(-max, max);
    } else {
        viewport
            .camera
            .set_clipping_range(RenderingDefaults::MINIMUM_SLAB_THICKNESS, max);
    }
}

/// Largest actor slab thickness, never below the minimum.
pub(crate) fn max_slab_thickness(viewport: &Viewport) -> f64 {
    viewport
        .actors
        .iter()
        .map(|entry| entry.slab_thickness.unwrap_or(RenderingDefaults::MINIMUM_SLAB_THICKNESS))
        .fold(RenderingDefaults::MINIMUM_SLAB_THICKNESS, f64::max)
}

/// Actors selected by an optional uid allow-list.
pub(crate) fn targeted<'a>(
    actors: &'a mut [ActorEntry],
    actor_uids: Option<&'a [&'a str]>,
) -> impl Iterator<Item = &'a mut ActorEntry> {
    actors
        .iter_mut()
        .filter(move |entry| actor_uids.map_or(true, |uids| uids.contains(&entry.uid.as_str())))
}
