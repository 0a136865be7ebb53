//! Volume rendering presets.
//!
//! Presets are stored in the compact string encoding used by volume renderers:
//! every list starts with its element count, followed by the values
//! (`x r g b` tuples for colors, `x opacity` pairs for opacities).

use std::sync::OnceLock;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use volview_core::Result;

use crate::actor::VolumeProperty;
use crate::transfer_function::{ColorTransferFunction, PiecewiseFunction};

const PRESETS_JSON: &str = include_str!("presets.json");

static PRESETS: OnceLock<Vec<VolumePreset>> = OnceLock::new();

/// A named volume rendering preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumePreset {
    /// Preset name.
    pub name: String,
    /// Gradient opacity as `4 min_value min_opacity max_value max_opacity`.
    pub gradient_opacity: String,
    /// Specular power.
    pub specular_power: String,
    /// Scalar opacity points.
    pub scalar_opacity: String,
    /// Specular coefficient.
    pub specular: String,
    /// `"1"` to enable shading.
    pub shade: String,
    /// Ambient coefficient.
    pub ambient: String,
    /// Color points.
    pub color_transfer: String,
    /// Diffuse coefficient.
    pub diffuse: String,
    /// `"1"` for linear interpolation.
    pub interpolation: String,
}

/// Parses the embedded preset table.
pub fn parse_presets(json: &str) -> Result<Vec<VolumePreset>> {
    Ok(serde_json::from_str(json)?)
}

/// All built-in presets. An unparsable table yields no presets.
pub fn presets() -> &'static [VolumePreset] {
    PRESETS.get_or_init(|| {
        parse_presets(PRESETS_JSON).unwrap_or_else(|e| {
            log::error!("failed to parse built-in volume presets: {e}");
            Vec::new()
        })
    })
}

/// Looks up a built-in preset by name.
pub fn preset_by_name(name: &str) -> Option<&'static VolumePreset> {
    presets().iter().find(|p| p.name == name)
}

fn numbers(encoded: &str) -> Vec<f64> {
    encoded
        .split_whitespace()
        .skip(1)
        .filter_map(|v| v.parse().ok())
        .collect()
}

fn number(encoded: &str) -> f64 {
    encoded.trim().parse().unwrap_or(0.0)
}

impl VolumePreset {
    /// Color transfer function described by the preset.
    pub fn color_transfer_function(&self) -> ColorTransferFunction {
        let mut cfun = ColorTransferFunction::new();
        for chunk in numbers(&self.color_transfer).chunks_exact(4) {
            cfun.add_rgb_point(chunk[0], DVec3::new(chunk[1], chunk[2], chunk[3]));
        }
        cfun
    }

    /// Scalar opacity function described by the preset.
    pub fn scalar_opacity_function(&self) -> PiecewiseFunction {
        let mut ofun = PiecewiseFunction::new();
        for chunk in numbers(&self.scalar_opacity).chunks_exact(2) {
            ofun.add_point(chunk[0], chunk[1]);
        }
        ofun
    }

    /// Writes the preset into a volume property.
    pub fn apply(&self, property: &mut VolumeProperty) {
        property.set_rgb_transfer_function(self.color_transfer_function());
        property.discard_stashed_linear();
        property.clear_inverted();
        property.set_scalar_opacity(self.scalar_opacity_function());

        if let [min_value, min_opacity, max_value, max_opacity] = numbers(&self.gradient_opacity)[..] {
            property.use_gradient_opacity = true;
            property.gradient_opacity_minimum = [min_value, min_opacity];
            property.gradient_opacity_maximum = [max_value, max_opacity];
        }
        if self.interpolation == "1" {
            property.interpolation_type = volview_core::InterpolationType::FastLinear;
        }
        property.shade = self.shade == "1";
        property.ambient = number(&self.ambient);
        property.diffuse = number(&self.diffuse);
        property.specular = number(&self.specular);
        property.specular_power = number(&self.specular_power);
    }
}
