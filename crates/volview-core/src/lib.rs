//! Core abstractions for volview-rs.
//!
//! This crate provides the types shared by the rendering collaborators and the
//! viewports:
//! - [`Bounds`], [`Plane`] and the plane/bounds intersection helpers
//! - [`Camera`] snapshots and sparse [`CameraUpdate`]s
//! - [`ViewportProperties`] and the two-tier [`PropertyStore`]
//! - [`ImageVolume`] and the [`VolumeCache`] seam
//! - [`ViewportEvent`]s delivered through an [`EventTarget`]

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Voxel indices and counts convert freely between integer and float types
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]

pub mod camera;
pub mod error;
pub mod events;
pub mod geometry;
pub mod options;
pub mod orientation;
pub mod properties;
pub mod volume;

pub use camera::{Camera, CameraUpdate};
pub use error::{Result, ViewportError};
pub use events::{EventTarget, ListenerId, ViewportEvent};
pub use geometry::{Bounds, Plane};
pub use options::{RenderingDefaults, ViewportInput, ViewportOptions, ViewportType};
pub use orientation::{Orientation, OrientationAxis, OrientationVectors};
pub use properties::{
    BlendMode, ColormapSpec, InterpolationType, OpacityPoint, OpacitySpec, PropertyStep,
    PropertyStore, ViewportProperties, VoiLutFunction, VoiRange,
};
pub use volume::{
    ImageVolume, InMemoryVolumeCache, LoadCallbackId, LoadProgress, LoadStatus, VolumeCache,
    VolumeFuture, VolumeMetadata,
};

// Re-export glam types for convenience
pub use glam::{DMat3, DMat4, DQuat, DVec2, DVec3, DVec4, UVec3};
