//! Image volumes and the cache/loader seam viewports read them through.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use glam::{DMat3, DVec3, UVec3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewportError};
use crate::geometry::Bounds;
use crate::properties::{VoiLutFunction, VoiRange};

/// Descriptive metadata carried by a volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeMetadata {
    /// Coordinate-system identity shared by volumes that can be fused.
    #[serde(rename = "FrameOfReferenceUID")]
    pub frame_of_reference_uid: String,
    /// Acquisition modality (CT, MR, PT, ...).
    pub modality: Option<String>,
    /// Default window center.
    pub window_center: Option<f64>,
    /// Default window width.
    pub window_width: Option<f64>,
    /// Default VOI curve.
    #[serde(rename = "VOILUTFunction")]
    pub voi_lut_function: Option<VoiLutFunction>,
}

/// Progress reported to load-status listeners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadProgress {
    /// Frames loaded so far.
    pub frames_loaded: usize,
    /// Total frames expected.
    pub total_frames: usize,
}

impl LoadProgress {
    /// Whether every frame has arrived.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.frames_loaded >= self.total_frames
    }
}

/// Handle for a registered load callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadCallbackId(u64);

type LoadCallback = Box<dyn FnMut(&LoadProgress)>;

/// Streaming state of a progressively loaded volume.
#[derive(Default)]
pub struct LoadStatus {
    loaded: bool,
    loading: bool,
    callbacks: Vec<(LoadCallbackId, LoadCallback)>,
    next_id: u64,
}

impl LoadStatus {
    /// Whether the volume is fully loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Whether frames are still arriving.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Registers a progress callback.
    pub fn add_callback(&mut self, callback: impl FnMut(&LoadProgress) + 'static) -> LoadCallbackId {
        let id = LoadCallbackId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Removes a callback. Returns whether it was registered.
    pub fn remove_callback(&mut self, id: LoadCallbackId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(cid, _)| *cid != id);
        before != self.callbacks.len()
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Records progress and invokes every callback.
    pub fn notify(&mut self, progress: LoadProgress) {
        self.loading = !progress.is_complete();
        self.loaded = progress.is_complete();
        for (_, callback) in &mut self.callbacks {
            callback(&progress);
        }
    }
}

impl fmt::Debug for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadStatus")
            .field("loaded", &self.loaded)
            .field("loading", &self.loading)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// A regular 3D image grid in world space.
///
/// The direction matrix holds the world directions of the i, j, k index axes
/// as its columns; the third column is the acquisition-plane normal.
#[derive(Debug)]
pub struct ImageVolume {
    volume_id: String,
    metadata: VolumeMetadata,
    dimensions: UVec3,
    spacing: DVec3,
    origin: DVec3,
    direction: DMat3,
    image_ids: Vec<String>,
    scalar_data: Vec<f32>,
    scalar_range: (f64, f64),
    load_status: RefCell<LoadStatus>,
}

impl ImageVolume {
    /// Creates a volume with identity direction and no scalar data.
    pub fn new(
        volume_id: impl Into<String>,
        metadata: VolumeMetadata,
        dimensions: UVec3,
        spacing: DVec3,
        origin: DVec3,
    ) -> Self {
        Self {
            volume_id: volume_id.into(),
            metadata,
            dimensions,
            spacing,
            origin,
            direction: DMat3::IDENTITY,
            image_ids: Vec::new(),
            scalar_data: Vec::new(),
            scalar_range: (0.0, 0.0),
            load_status: RefCell::new(LoadStatus::default()),
        }
    }

    /// Sets the index-to-world direction cosines (columns are i, j, k).
    #[must_use]
    pub fn with_direction(mut self, direction: DMat3) -> Self {
        self.direction = direction;
        self
    }

    /// Sets one image id per slice along k.
    #[must_use]
    pub fn with_image_ids(mut self, image_ids: Vec<String>) -> Self {
        self.image_ids = image_ids;
        self
    }

    /// Attaches voxel data (x fastest, then y, then z) and computes its range.
    #[must_use]
    pub fn with_scalar_data(mut self, data: Vec<f32>) -> Self {
        self.scalar_range = data.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(f64::from(v)), hi.max(f64::from(v)))
        });
        if data.is_empty() {
            self.scalar_range = (0.0, 0.0);
        }
        self.scalar_data = data;
        self
    }

    /// Overrides the scalar range (for volumes whose data is not resident).
    #[must_use]
    pub fn with_scalar_range(mut self, lower: f64, upper: f64) -> Self {
        self.scalar_range = (lower, upper);
        self
    }

    /// Volume id in the cache.
    #[must_use]
    pub fn volume_id(&self) -> &str {
        &self.volume_id
    }

    /// Metadata.
    #[must_use]
    pub fn metadata(&self) -> &VolumeMetadata {
        &self.metadata
    }

    /// Voxel counts along i, j, k.
    #[must_use]
    pub fn dimensions(&self) -> UVec3 {
        self.dimensions
    }

    /// Voxel spacing along i, j, k.
    #[must_use]
    pub fn spacing(&self) -> DVec3 {
        self.spacing
    }

    /// World position of voxel (0, 0, 0).
    #[must_use]
    pub fn origin(&self) -> DVec3 {
        self.origin
    }

    /// Direction cosines.
    #[must_use]
    pub fn direction(&self) -> DMat3 {
        self.direction
    }

    /// Normal of the acquisition plane (the k axis).
    #[must_use]
    pub fn acquisition_normal(&self) -> DVec3 {
        self.direction.z_axis
    }

    /// Image ids, one per k slice.
    #[must_use]
    pub fn image_ids(&self) -> &[String] {
        &self.image_ids
    }

    /// Voxel data, possibly empty.
    #[must_use]
    pub fn scalar_data(&self) -> &[f32] {
        &self.scalar_data
    }

    /// Minimum and maximum stored value.
    #[must_use]
    pub fn scalar_range(&self) -> (f64, f64) {
        self.scalar_range
    }

    /// Streaming state.
    #[must_use]
    pub fn load_status(&self) -> &RefCell<LoadStatus> {
        &self.load_status
    }

    /// Maps a continuous index to world space.
    #[must_use]
    pub fn index_to_world(&self, ijk: DVec3) -> DVec3 {
        self.origin + self.direction * (ijk * self.spacing)
    }

    /// Maps a world point to a continuous index.
    #[must_use]
    pub fn world_to_index(&self, world: DVec3) -> DVec3 {
        (self.direction.transpose() * (world - self.origin)) / self.spacing
    }

    /// Index of the central voxel, `floor(dim / 2)` per axis.
    #[must_use]
    pub fn center_index(&self) -> UVec3 {
        self.dimensions / 2
    }

    /// Axis-aligned world bounds of the voxel centers.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        let max_index = self.dimensions.saturating_sub(UVec3::ONE).as_dvec3();
        let mut bounds = Bounds::uninitialized();
        for corner in Bounds::new(DVec3::ZERO, max_index).corners() {
            let p = self.index_to_world(corner);
            bounds = bounds.union(&Bounds::new(p, p));
        }
        bounds
    }

    /// Nearest-voxel value at a world point, `None` outside the grid or
    /// without resident data.
    #[must_use]
    pub fn value_at_world(&self, world: DVec3) -> Option<f32> {
        let ijk = self.world_to_index(world).round();
        let dims = self.dimensions.as_dvec3();
        if ijk.cmplt(DVec3::ZERO).any() || ijk.cmpge(dims).any() {
            return None;
        }
        let (i, j, k) = (ijk.x as usize, ijk.y as usize, ijk.z as usize);
        let (nx, ny) = (self.dimensions.x as usize, self.dimensions.y as usize);
        self.scalar_data.get(i + nx * (j + ny * k)).copied()
    }

    /// Default VOI from metadata window/level, falling back to the scalar range.
    #[must_use]
    pub fn default_voi_range(&self) -> VoiRange {
        match (self.metadata.window_center, self.metadata.window_width) {
            (Some(center), Some(width)) => VoiRange::from_window_level(center, width),
            _ => VoiRange::new(self.scalar_range.0, self.scalar_range.1),
        }
    }
}

/// Future returned by [`VolumeCache::load_volume`].
pub type VolumeFuture<'a> = Pin<Box<dyn Future<Output = Result<Rc<ImageVolume>>> + 'a>>;

/// Source of volumes for viewports.
pub trait VolumeCache {
    /// Returns a cached volume.
    fn get_volume(&self, volume_id: &str) -> Option<Rc<ImageVolume>>;

    /// Loads (or fetches from cache) a volume.
    fn load_volume<'a>(&'a self, volume_id: &'a str) -> VolumeFuture<'a>;
}

/// A volume cache backed by a map; loading resolves immediately.
#[derive(Debug, Default)]
pub struct InMemoryVolumeCache {
    volumes: RefCell<HashMap<String, Rc<ImageVolume>>>,
}

impl InMemoryVolumeCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a volume, replacing one with the same id.
    pub fn insert(&self, volume: ImageVolume) -> Rc<ImageVolume> {
        let volume = Rc::new(volume);
        self.volumes
            .borrow_mut()
            .insert(volume.volume_id().to_string(), Rc::clone(&volume));
        volume
    }

    /// Removes a volume.
    pub fn remove(&self, volume_id: &str) -> Option<Rc<ImageVolume>> {
        self.volumes.borrow_mut().remove(volume_id)
    }
}

impl VolumeCache for InMemoryVolumeCache {
    fn get_volume(&self, volume_id: &str) -> Option<Rc<ImageVolume>> {
        self.volumes.borrow().get(volume_id).cloned()
    }

    fn load_volume<'a>(&'a self, volume_id: &'a str) -> VolumeFuture<'a> {
        let result = self
            .get_volume(volume_id)
            .ok_or_else(|| ViewportError::VolumeNotFound(volume_id.to_string()));
        Box::pin(std::future::ready(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume() -> ImageVolume {
        ImageVolume::new(
            "ct",
            VolumeMetadata {
                frame_of_reference_uid: "for-1".into(),
                ..Default::default()
            },
            UVec3::new(4, 3, 2),
            DVec3::new(1.0, 2.0, 3.0),
            DVec3::new(10.0, 20.0, 30.0),
        )
        .with_scalar_data((0..24).map(|v| v as f32).collect())
    }

    #[test]
    fn test_index_world_round_trip() {
        let v = volume();
        let w = v.index_to_world(DVec3::new(1.0, 1.0, 1.0));
        assert_eq!(w, DVec3::new(11.0, 22.0, 33.0));
        assert!((v.world_to_index(w) - DVec3::ONE).length() < 1e-12);
    }

    #[test]
    fn test_bounds_cover_voxel_centers() {
        let b = volume().bounds();
        assert_eq!(b.to_array(), [10.0, 13.0, 20.0, 24.0, 30.0, 33.0]);
    }

    #[test]
    fn test_oblique_direction_bounds() {
        let v = volume().with_direction(DMat3::from_cols(DVec3::NEG_X, DVec3::Y, DVec3::Z));
        let b = v.bounds();
        assert_eq!(b.min.x, 7.0);
        assert_eq!(b.max.x, 10.0);
    }

    #[test]
    fn test_value_at_world() {
        let v = volume();
        assert_eq!(v.value_at_world(DVec3::new(10.0, 20.0, 30.0)), Some(0.0));
        assert_eq!(v.value_at_world(DVec3::new(11.0, 22.0, 33.0)), Some(17.0));
        assert_eq!(v.value_at_world(DVec3::new(0.0, 0.0, 0.0)), None);
    }

    #[test]
    fn test_default_voi_prefers_metadata() {
        let v = volume();
        assert_eq!(v.default_voi_range(), VoiRange::new(0.0, 23.0));

        let with_window = ImageVolume::new(
            "mr",
            VolumeMetadata {
                window_center: Some(100.0),
                window_width: Some(50.0),
                ..Default::default()
            },
            UVec3::ONE,
            DVec3::ONE,
            DVec3::ZERO,
        );
        assert_eq!(with_window.default_voi_range(), VoiRange::new(75.0, 125.0));
    }

    #[test]
    fn test_load_status_callbacks() {
        let v = volume();
        let hits = Rc::new(RefCell::new(0));
        let h = Rc::clone(&hits);
        let id = v
            .load_status()
            .borrow_mut()
            .add_callback(move |_| *h.borrow_mut() += 1);
        v.load_status().borrow_mut().notify(LoadProgress {
            frames_loaded: 1,
            total_frames: 2,
        });
        assert!(v.load_status().borrow().is_loading());
        assert!(v.load_status().borrow_mut().remove_callback(id));
        v.load_status().borrow_mut().notify(LoadProgress {
            frames_loaded: 2,
            total_frames: 2,
        });
        assert_eq!(*hits.borrow(), 1);
        assert!(v.load_status().borrow().is_loaded());
    }

    #[test]
    fn test_cache_load_missing_volume() {
        let cache = InMemoryVolumeCache::new();
        cache.insert(volume());
        assert!(cache.get_volume("ct").is_some());
        let missing = pollster::block_on(cache.load_volume("nope"));
        assert!(matches!(missing, Err(ViewportError::VolumeNotFound(_))));
    }
}
