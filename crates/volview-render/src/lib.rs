//! Rendering collaborators for volview-rs.
//!
//! This crate provides what a viewport drives but does not own:
//! - [`SlabCamera`] with its coordinate-transformation projection override
//! - [`VolumeActor`]s with transfer functions, clipping planes and slab state
//! - The [`RenderingEngine`] seam, its [`Renderer`]s and an offscreen engine
//! - Color maps, volume presets and the canvas <-> world pipelines

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// GPU uniforms are f32 while scene math is f64
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::float_cmp)]

pub mod actor;
pub mod camera;
pub mod color_maps;
pub mod coordinates;
pub mod engine;
pub mod presets;
pub mod transfer_function;

pub use actor::{ClippingPlaneUniforms, SlabType, VolumeActor, VolumeMapper, VolumeProperty, MAX_CLIPPING_PLANES};
pub use camera::{CoordinateTransformation, SlabCamera, TRANSFORMATION_RANGE_DEPTH};
pub use color_maps::{ColorMap, ColorMapRegistry};
pub use coordinates::{canvas_to_world, world_to_canvas, CanvasPipeline, DisplayGeometry};
pub use engine::{ActorHandle, OffscreenRenderingEngine, Renderer, RenderingEngine};
pub use presets::{preset_by_name, presets, VolumePreset};
pub use transfer_function::{
    sigmoid_rgb_transfer_function, voi_from_sigmoid, ColorNode, ColorTransferFunction,
    PiecewiseFunction, PiecewisePoint, SIGMOID_APPROXIMATION_NODES,
};
