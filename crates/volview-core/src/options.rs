//! Viewport configuration and rendering constants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewportError};
use crate::orientation::Orientation;

/// Fixed values shared by every viewport.
#[derive(Debug, Clone, Copy)]
pub struct RenderingDefaults;

impl RenderingDefaults {
    /// Thinnest slab a volume actor is clipped to.
    pub const MINIMUM_SLAB_THICKNESS: f64 = 5e-2;
    /// Half extent of the clipping range used while rendering volumes.
    pub const MAXIMUM_RAY_DISTANCE: f64 = 1e5;
}

/// Kind of volume viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ViewportType {
    /// Orthogonal multi-planar reformation with clipping-plane slabs.
    #[default]
    Orthographic,
    /// Whole-volume rendering without slicing.
    Volume3d,
    /// A single reslice plane synchronized with the camera.
    VolumeSlice,
}

impl ViewportType {
    /// Lowercase name, as accepted by [`FromStr`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ViewportType::Orthographic => "orthographic",
            ViewportType::Volume3d => "volume3d",
            ViewportType::VolumeSlice => "volume_slice",
        }
    }
}

impl fmt::Display for ViewportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ViewportType {
    type Err = ViewportError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "orthographic" => Ok(ViewportType::Orthographic),
            "volume3d" | "volume_3d" => Ok(ViewportType::Volume3d),
            "volume_slice" => Ok(ViewportType::VolumeSlice),
            other => Err(ViewportError::InvalidViewportType(other.to_string())),
        }
    }
}

/// Per-viewport options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportOptions {
    /// Initial orientation. Orthographic viewports use the acquisition plane
    /// of the first volume when this is unset.
    pub orientation: Option<Orientation>,
    /// Overrides the projection mode chosen by the viewport kind.
    pub parallel_projection: Option<bool>,
    /// Background color (RGB, 0 to 1).
    pub background: [f64; 3],
    /// Suppress all notifications from this viewport.
    pub suppress_events: bool,
    /// Request the CPU fallback renderer.
    pub use_cpu_rendering: bool,
}

impl Default for ViewportOptions {
    fn default() -> Self {
        Self {
            orientation: None,
            parallel_projection: None,
            background: [0.0, 0.0, 0.0],
            suppress_events: false,
            use_cpu_rendering: false,
        }
    }
}

/// Everything needed to construct a viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportInput {
    /// Unique id within the rendering engine.
    pub id: String,
    /// Viewport kind.
    pub kind: ViewportType,
    /// Left offset of the viewport inside the shared render surface, in pixels.
    pub sx: u32,
    /// Top offset of the viewport inside the shared render surface, in pixels.
    pub sy: u32,
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Options.
    #[serde(default)]
    pub options: ViewportOptions,
}

impl ViewportInput {
    /// A viewport covering `width` x `height` pixels at the surface origin.
    pub fn new(id: impl Into<String>, kind: ViewportType, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            kind,
            sx: 0,
            sy: 0,
            width,
            height,
            options: ViewportOptions::default(),
        }
    }

    /// Sets the options.
    #[must_use]
    pub fn with_options(mut self, options: ViewportOptions) -> Self {
        self.options = options;
        self
    }

    /// Places the viewport at an offset inside the shared surface.
    #[must_use]
    pub fn at(mut self, sx: u32, sy: u32) -> Self {
        self.sx = sx;
        self.sy = sy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::OrientationAxis;

    #[test]
    fn test_viewport_type_parse() {
        assert_eq!("orthographic".parse::<ViewportType>().unwrap(), ViewportType::Orthographic);
        assert_eq!("volume_3d".parse::<ViewportType>().unwrap(), ViewportType::Volume3d);
        assert!(matches!(
            "stack".parse::<ViewportType>(),
            Err(ViewportError::InvalidViewportType(name)) if name == "stack"
        ));
    }

    #[test]
    fn test_input_deserializes_with_default_options() {
        let json = r#"{"id":"ct-axial","kind":"orthographic","sx":0,"sy":0,"width":512,"height":512}"#;
        let input: ViewportInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.options, ViewportOptions::default());
    }

    #[test]
    fn test_orientation_option_accepts_name() {
        let json = r#"{"orientation":"coronal"}"#;
        let options: ViewportOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.orientation, Some(Orientation::Axis(OrientationAxis::Coronal)));
    }
}
