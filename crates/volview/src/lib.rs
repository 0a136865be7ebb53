//! volview-rs: viewport cameras and coordinate transforms for volumetric MPR.
//!
//! A [`Viewport`] shows one or more image volumes in a rectangle of a shared
//! rendering surface. It owns a slab-aware camera and an actor registry, and
//! converts between canvas pixels and world coordinates.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::rc::Rc;
//! use volview::*;
//!
//! fn main() -> Result<()> {
//!     init_logging();
//!
//!     let cache = Rc::new(InMemoryVolumeCache::new());
//!     cache.insert(ImageVolume::new(
//!         "ct",
//!         VolumeMetadata::default(),
//!         UVec3::new(256, 256, 100),
//!         DVec3::ONE,
//!         DVec3::ZERO,
//!     ));
//!     let engine = Rc::new(OffscreenRenderingEngine::new("engine"));
//!
//!     let input = ViewportInput::new("axial", ViewportType::Orthographic, 512, 512);
//!     let mut viewport = Viewport::new(input, engine.clone(), cache)?;
//!     pollster::block_on(viewport.set_volumes(&[VolumeInput::new("ct")], true))?;
//!
//!     let world = viewport.canvas_to_world(DVec2::new(256.0, 256.0))?;
//!     println!("center of the canvas is at {world:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Viewport kinds
//!
//! - [`ViewportType::Orthographic`] - slab-clipped MPR, defaults to the
//!   acquisition plane of the first volume
//! - [`ViewportType::VolumeSlice`] - a single reslice plane kept on the
//!   camera's focal plane
//! - [`ViewportType::Volume3d`] - perspective volume rendering
//!
//! Each kind is a [`ViewportStrategy`] plugged into the same [`Viewport`].

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Slice indices are rounded from world distances
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
// Viewport methods are split across modules by concern
#![allow(clippy::module_name_repetitions)]

mod fit;
mod orientation;
mod properties;
pub mod strategy;
mod viewport;
mod volumes;

pub use strategy::{OrthographicStrategy, ViewportStrategy, Volume3dStrategy, VolumeSliceStrategy};
pub use viewport::{ActorEntry, FlipDirection, ResetCameraOptions, Viewport, CAMERA_EPSILON};
pub use volumes::{ViewReference, VolumeInput};

// Re-export core types
pub use volview_core::{
    BlendMode, Bounds, Camera, CameraUpdate, ColormapSpec, ImageVolume, InMemoryVolumeCache,
    InterpolationType, ListenerId, LoadProgress, LoadStatus, OpacityPoint, OpacitySpec,
    Orientation, OrientationAxis, OrientationVectors, Plane, RenderingDefaults, Result,
    ViewportError, ViewportEvent, ViewportInput, ViewportOptions, ViewportProperties,
    ViewportType, VoiLutFunction, VoiRange, VolumeCache, VolumeMetadata,
};

// Re-export render types
pub use volview_render::{
    ActorHandle, CanvasPipeline, ColorMap, ColorMapRegistry, OffscreenRenderingEngine, Renderer,
    RenderingEngine, SlabCamera, SlabType, VolumeActor, VolumePreset,
};

pub use glam::{DMat3, DMat4, DVec2, DVec3, UVec3};

/// Initializes logging from `RUST_LOG`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::try_init();
}
