//! Volume loading, fusion checks and slice/reference queries.

use std::cell::RefCell;
use std::rc::Rc;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use volview_core::{BlendMode, ImageVolume, Result, ViewportError, ViewportEvent};
use volview_render::VolumeActor;

use crate::viewport::{ActorEntry, Viewport};

/// Tolerance on `1 - |cos|` between the view-plane normal and the
/// acquisition normal for a slice index to be defined.
const IMAGE_INDEX_EPSILON: f64 = 1e-3;

/// A volume to display, with optional per-actor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInput {
    /// Volume id in the cache.
    pub volume_id: String,
    /// Actor uid; defaults to the volume id.
    pub actor_uid: Option<String>,
    /// Slab thickness for the actor.
    pub slab_thickness: Option<f64>,
    /// Blend mode for the actor.
    pub blend_mode: Option<BlendMode>,
    /// Whether the actor is drawn.
    #[serde(default = "default_visibility")]
    pub visibility: bool,
}

fn default_visibility() -> bool {
    true
}

impl VolumeInput {
    /// A visible volume with default settings.
    pub fn new(volume_id: impl Into<String>) -> Self {
        Self {
            volume_id: volume_id.into(),
            actor_uid: None,
            slab_thickness: None,
            blend_mode: None,
            visibility: true,
        }
    }

    /// Sets the actor uid.
    #[must_use]
    pub fn with_actor_uid(mut self, uid: impl Into<String>) -> Self {
        self.actor_uid = Some(uid.into());
        self
    }

    /// Sets the slab thickness.
    #[must_use]
    pub fn with_slab_thickness(mut self, thickness: f64) -> Self {
        self.slab_thickness = Some(thickness);
        self
    }

    /// Sets the blend mode.
    #[must_use]
    pub fn with_blend_mode(mut self, mode: BlendMode) -> Self {
        self.blend_mode = Some(mode);
        self
    }

    fn to_entry(&self, volume: &Rc<ImageVolume>) -> ActorEntry {
        let actor = Rc::new(RefCell::new(VolumeActor::new(Rc::clone(volume))));
        let uid = self.actor_uid.clone().unwrap_or_else(|| self.volume_id.clone());
        let mut entry = ActorEntry::new(uid, actor, self.volume_id.clone());
        entry.slab_thickness = self.slab_thickness.map(|t| t.max(0.0));
        entry.blend_mode = self.blend_mode.unwrap_or_default();
        entry.visibility = self.visibility;
        entry
    }
}

/// Where the viewport is looking, in terms of its data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewReference {
    /// Frame of reference of the displayed data.
    #[serde(rename = "FrameOfReferenceUID")]
    pub frame_of_reference_uid: Option<String>,
    /// Focal point in world coordinates.
    pub camera_focal_point: DVec3,
    /// View-plane normal.
    pub view_plane_normal: DVec3,
    /// Displayed volume.
    pub volume_id: Option<String>,
    /// Slice index along the acquisition axis, when aligned with it.
    pub slice_index: Option<usize>,
}

impl Viewport {
    /// Replaces the displayed volumes and fits the camera.
    ///
    /// The first volume must already be cached; the others are loaded and
    /// must share its frame of reference. Nothing changes on error.
    pub async fn set_volumes(&mut self, inputs: &[VolumeInput], immediate: bool) -> Result<()> {
        let Some((first_input, rest)) = inputs.split_first() else {
            self.remove_all_actors();
            self.emit(ViewportEvent::NewVolumeSet {
                viewport_id: self.id().to_string(),
                volume_ids: Vec::new(),
            });
            if immediate {
                self.render();
            }
            return Ok(());
        };

        let cache = Rc::clone(&self.volume_cache);
        let first = cache
            .get_volume(&first_input.volume_id)
            .ok_or_else(|| ViewportError::VolumeNotFound(first_input.volume_id.clone()))?;
        let expected = first.metadata().frame_of_reference_uid.clone();

        let mut volumes = vec![Rc::clone(&first)];
        for input in rest {
            let volume = cache.load_volume(&input.volume_id).await?;
            self.check_frame_of_reference(&expected, &volume)?;
            volumes.push(volume);
        }

        let strategy = Rc::clone(&self.strategy);
        strategy.prepare_volumes(self, &first);

        let entries = inputs
            .iter()
            .zip(&volumes)
            .map(|(input, volume)| input.to_entry(volume))
            .collect();
        self.set_actors(entries);
        strategy.volumes_set(self, &volumes);

        let volume_ids: Vec<String> = inputs.iter().map(|input| input.volume_id.clone()).collect();
        log::debug!("viewport '{}' displays volumes {volume_ids:?}", self.id());
        self.emit(ViewportEvent::NewVolumeSet {
            viewport_id: self.id().to_string(),
            volume_ids,
        });
        if immediate {
            self.render();
        }
        Ok(())
    }

    /// Adds volumes next to the current ones without refitting the camera.
    pub async fn add_volumes(&mut self, inputs: &[VolumeInput], immediate: bool) -> Result<()> {
        let cache = Rc::clone(&self.volume_cache);
        let mut expected = self.frame_of_reference_uid();
        let mut volumes = Vec::with_capacity(inputs.len());
        for input in inputs {
            let volume = cache.load_volume(&input.volume_id).await?;
            match &expected {
                Some(expected) => self.check_frame_of_reference(expected, &volume)?,
                None => expected = Some(volume.metadata().frame_of_reference_uid.clone()),
            }
            volumes.push(volume);
        }

        let entries = inputs
            .iter()
            .zip(&volumes)
            .map(|(input, volume)| input.to_entry(volume))
            .collect();
        self.add_actors(entries, false);
        let strategy = Rc::clone(&self.strategy);
        strategy.compute_clipping_geometry(self);
        strategy.volumes_set(self, &volumes);
        if immediate {
            self.render();
        }
        Ok(())
    }

    fn check_frame_of_reference(&self, expected: &str, volume: &ImageVolume) -> Result<()> {
        let actual = &volume.metadata().frame_of_reference_uid;
        if actual == expected {
            Ok(())
        } else {
            Err(ViewportError::FrameOfReferenceMismatch {
                viewport_id: self.id().to_string(),
                expected: expected.to_string(),
                actual: actual.clone(),
            })
        }
    }

    /// Frame of reference of the default volume.
    pub fn frame_of_reference_uid(&self) -> Option<String> {
        self.default_volume()
            .map(|volume| volume.metadata().frame_of_reference_uid.clone())
    }

    /// Whether an actor displays `volume_id`.
    pub fn has_volume_id(&self, volume_id: &str) -> bool {
        self.actors.iter().any(|entry| entry.reference_id == volume_id)
    }

    /// Reference string `volumeId:<id>` for a displayed volume, or for the
    /// default volume when `volume_id` is `None`.
    pub fn reference_id(&self, volume_id: Option<&str>) -> Result<String> {
        let entry = match volume_id {
            Some(id) => self.actors.iter().find(|entry| entry.reference_id == id),
            None => self.default_actor(),
        };
        entry
            .map(|entry| format!("volumeId:{}", entry.reference_id))
            .ok_or_else(|| ViewportError::ActorNotFound(volume_id.unwrap_or("default").to_string()))
    }

    /// Describes the current view plane and the data behind it.
    pub fn view_reference(&self) -> ViewReference {
        let camera = self.camera();
        ViewReference {
            frame_of_reference_uid: self.frame_of_reference_uid(),
            camera_focal_point: camera.focal_point,
            view_plane_normal: camera.view_plane_normal,
            volume_id: self.default_actor().map(|entry| entry.reference_id.clone()),
            slice_index: self.current_image_id_index(),
        }
    }

    /// Slice index of the focal point along the acquisition axis.
    ///
    /// `None` when no volume is shown or the view is oblique to the
    /// acquisition plane.
    pub fn current_image_id_index(&self) -> Option<usize> {
        let volume = self.default_volume()?;
        let camera = self.camera();
        let normal = camera.view_plane_normal;
        if 1.0 - volume.acquisition_normal().dot(normal).abs() > IMAGE_INDEX_EPSILON {
            return None;
        }
        let distance = (camera.focal_point - volume.origin()).dot(normal).abs();
        Some((distance / volume.spacing().z).round() as usize)
    }

    /// Image id at [`Viewport::current_image_id_index`].
    pub fn current_image_id(&self) -> Option<String> {
        let index = self.current_image_id_index()?;
        let volume = self.default_volume()?;
        volume.image_ids().get(index).cloned()
    }

    /// Nearest-voxel intensity of the default volume at a rendered world
    /// point, as returned by [`Viewport::canvas_to_world`].
    pub fn intensity_from_world(&self, point: DVec3) -> Option<f32> {
        self.default_actor()
            .and_then(|entry| entry.actor.borrow().value_at_world(point))
    }
}
