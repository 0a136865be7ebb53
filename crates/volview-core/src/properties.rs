//! Per-volume visual properties and the default-property store.
//!
//! A viewport keeps one "current" property bag plus two kinds of defaults: a
//! global bag and bags keyed by volume id. Applying a bag is expressed as an
//! ordered list of [`PropertyStep`]s, because several steps read back state
//! that an earlier step changed (a colormap swap replaces the transfer
//! function whose range the VOI step then adjusts).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A value-of-interest window, in stored intensity units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiRange {
    /// Lowest displayed intensity.
    pub lower: f64,
    /// Highest displayed intensity.
    pub upper: f64,
}

impl VoiRange {
    /// Creates a range.
    #[must_use]
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Converts window center/width into a range.
    #[must_use]
    pub fn from_window_level(window_center: f64, window_width: f64) -> Self {
        let half = window_width / 2.0;
        Self {
            lower: window_center - half,
            upper: window_center + half,
        }
    }

    /// Returns `(window_center, window_width)`.
    #[must_use]
    pub fn to_window_level(self) -> (f64, f64) {
        let width = (self.upper - self.lower).abs();
        (self.lower + width / 2.0, width)
    }
}

/// Shape of the VOI lookup curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoiLutFunction {
    /// Straight ramp between lower and upper.
    #[default]
    Linear,
    /// Sigmoid curve sampled into the color transfer function.
    SampledSigmoid,
}

/// Voxel interpolation used by the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InterpolationType {
    /// Nearest neighbour.
    Nearest,
    /// Trilinear.
    #[default]
    Linear,
    /// Trilinear with reduced precision.
    FastLinear,
}

/// How samples along a ray (or across a slab) are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BlendMode {
    /// Front-to-back compositing.
    #[default]
    Composite,
    /// Maximum intensity projection.
    MaximumIntensity,
    /// Minimum intensity projection.
    MinimumIntensity,
    /// Mean intensity projection.
    AverageIntensity,
    /// Sum of samples.
    Additive,
    /// Radon transform.
    RadonTransform,
}

/// A single opacity control point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpacityPoint {
    /// Intensity value.
    pub value: f64,
    /// Opacity at that value, in [0, 1].
    pub opacity: f64,
}

/// Opacity for a colormap: uniform or a piecewise curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpacitySpec {
    /// Same opacity across the whole VOI range.
    Uniform(f64),
    /// Explicit control points.
    Points(Vec<OpacityPoint>),
}

/// Colormap selection. Either field may be omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ColormapSpec {
    /// Name of a registered colormap or preset.
    pub name: Option<String>,
    /// Opacity override.
    pub opacity: Option<OpacitySpec>,
}

impl ColormapSpec {
    /// A colormap by name with no opacity override.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            opacity: None,
        }
    }
}

/// Sparse visual property bag. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ViewportProperties {
    /// VOI window.
    pub voi_range: Option<VoiRange>,
    /// VOI curve shape.
    #[serde(rename = "VOILUTFunction")]
    pub voi_lut_function: Option<VoiLutFunction>,
    /// Whether grayscale output is inverted.
    pub invert: Option<bool>,
    /// Colormap and opacity.
    pub colormap: Option<ColormapSpec>,
    /// Sampling interpolation.
    pub interpolation_type: Option<InterpolationType>,
    /// Slab thickness in world units.
    pub slab_thickness: Option<f64>,
    /// In-plane rotation in degrees.
    pub rotation: Option<f64>,
    /// Volume rendering preset name.
    pub preset: Option<String>,
}

/// One step of property application, in the order it must run.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyStep {
    /// Swap the color transfer function.
    Colormap(ColormapSpec),
    /// Replace the scalar opacity function.
    Opacity(OpacitySpec),
    /// Adjust the VOI window.
    Voi(VoiRange),
    /// Change sampling interpolation.
    Interpolation(InterpolationType),
    /// Change the VOI curve shape (re-applies the current VOI).
    VoiLutFunction(VoiLutFunction),
    /// Set inversion; only acts when it differs from the current state.
    Invert(bool),
    /// Apply a rendering preset.
    Preset(String),
    /// Change slab thickness.
    SlabThickness(f64),
    /// Rotate the view in-plane.
    Rotation(f64),
}

impl ViewportProperties {
    /// Returns whether every field is unset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == ViewportProperties::default()
    }

    /// Lists the application steps for this bag in their required order:
    /// colormap, opacity, VOI, interpolation, VOI-LUT function, invert,
    /// preset, slab thickness, rotation.
    #[must_use]
    pub fn steps(&self) -> Vec<PropertyStep> {
        let mut steps = Vec::new();
        if let Some(colormap) = &self.colormap {
            if colormap.name.is_some() {
                steps.push(PropertyStep::Colormap(colormap.clone()));
            }
            if let Some(opacity) = &colormap.opacity {
                steps.push(PropertyStep::Opacity(opacity.clone()));
            }
        }
        if let Some(voi) = self.voi_range {
            steps.push(PropertyStep::Voi(voi));
        }
        if let Some(interpolation) = self.interpolation_type {
            steps.push(PropertyStep::Interpolation(interpolation));
        }
        if let Some(function) = self.voi_lut_function {
            steps.push(PropertyStep::VoiLutFunction(function));
        }
        if let Some(invert) = self.invert {
            steps.push(PropertyStep::Invert(invert));
        }
        if let Some(preset) = &self.preset {
            steps.push(PropertyStep::Preset(preset.clone()));
        }
        if let Some(thickness) = self.slab_thickness {
            steps.push(PropertyStep::SlabThickness(thickness));
        }
        if let Some(rotation) = self.rotation {
            steps.push(PropertyStep::Rotation(rotation));
        }
        steps
    }

    /// Returns `self` with unset fields filled from `base`.
    #[must_use]
    pub fn merged_over(&self, base: &ViewportProperties) -> ViewportProperties {
        ViewportProperties {
            voi_range: self.voi_range.or(base.voi_range),
            voi_lut_function: self.voi_lut_function.or(base.voi_lut_function),
            invert: self.invert.or(base.invert),
            colormap: self.colormap.clone().or_else(|| base.colormap.clone()),
            interpolation_type: self.interpolation_type.or(base.interpolation_type),
            slab_thickness: self.slab_thickness.or(base.slab_thickness),
            rotation: self.rotation.or(base.rotation),
            preset: self.preset.clone().or_else(|| base.preset.clone()),
        }
    }
}

/// Current properties plus global and per-volume defaults.
#[derive(Debug, Clone, Default)]
pub struct PropertyStore {
    global_defaults: Option<ViewportProperties>,
    per_volume_defaults: HashMap<String, ViewportProperties>,
    current: ViewportProperties,
}

impl PropertyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the first bag ever applied as the global defaults.
    ///
    /// Returns `true` when the defaults were initialized by this call.
    pub fn initialize_global_defaults(&mut self, properties: &ViewportProperties) -> bool {
        if self.global_defaults.is_some() {
            return false;
        }
        self.global_defaults = Some(properties.clone());
        true
    }

    /// Sets defaults globally (`None`) or for one volume.
    pub fn set_defaults(&mut self, properties: ViewportProperties, volume_id: Option<&str>) {
        match volume_id {
            None => self.global_defaults = Some(properties),
            Some(id) => {
                self.per_volume_defaults.insert(id.to_string(), properties);
            }
        }
    }

    /// Returns defaults for a volume, or the global defaults.
    #[must_use]
    pub fn defaults(&self, volume_id: Option<&str>) -> Option<&ViewportProperties> {
        match volume_id {
            None => self.global_defaults.as_ref(),
            Some(id) => self.per_volume_defaults.get(id),
        }
    }

    /// Defaults that apply to `volume_id`: per-volume entries override the
    /// global bag field by field.
    #[must_use]
    pub fn effective_defaults(&self, volume_id: Option<&str>) -> ViewportProperties {
        let global = self.global_defaults.clone().unwrap_or_default();
        match volume_id.and_then(|id| self.per_volume_defaults.get(id)) {
            Some(per_volume) => per_volume.merged_over(&global),
            None => global,
        }
    }

    /// Clears defaults. With no volume id the global bag is emptied.
    pub fn clear_defaults(&mut self, volume_id: Option<&str>) {
        match volume_id {
            None => self.global_defaults = Some(ViewportProperties::default()),
            Some(id) => {
                self.per_volume_defaults.remove(id);
            }
        }
    }

    /// The current property bag.
    #[must_use]
    pub fn current(&self) -> &ViewportProperties {
        &self.current
    }

    /// Mutable access to the current property bag.
    pub fn current_mut(&mut self) -> &mut ViewportProperties {
        &mut self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_level_round_trip() {
        let range = VoiRange::from_window_level(40.0, 400.0);
        assert_eq!(range, VoiRange::new(-160.0, 240.0));
        assert_eq!(range.to_window_level(), (40.0, 400.0));
    }

    #[test]
    fn test_step_order_colormap_before_voi() {
        let props = ViewportProperties {
            voi_range: Some(VoiRange::new(0.0, 100.0)),
            colormap: Some(ColormapSpec {
                name: Some("hsv".into()),
                opacity: Some(OpacitySpec::Uniform(0.5)),
            }),
            invert: Some(true),
            rotation: Some(90.0),
            slab_thickness: Some(3.0),
            voi_lut_function: Some(VoiLutFunction::SampledSigmoid),
            interpolation_type: Some(InterpolationType::Nearest),
            preset: Some("CT-Bone".into()),
        };
        let steps = props.steps();
        let names: Vec<&str> = steps
            .iter()
            .map(|s| match s {
                PropertyStep::Colormap(_) => "colormap",
                PropertyStep::Opacity(_) => "opacity",
                PropertyStep::Voi(_) => "voi",
                PropertyStep::Interpolation(_) => "interpolation",
                PropertyStep::VoiLutFunction(_) => "lut",
                PropertyStep::Invert(_) => "invert",
                PropertyStep::Preset(_) => "preset",
                PropertyStep::SlabThickness(_) => "slab",
                PropertyStep::Rotation(_) => "rotation",
            })
            .collect();
        assert_eq!(
            names,
            [
                "colormap",
                "opacity",
                "voi",
                "interpolation",
                "lut",
                "invert",
                "preset",
                "slab",
                "rotation"
            ]
        );
    }

    #[test]
    fn test_opacity_without_name_skips_colormap_step() {
        let props = ViewportProperties {
            colormap: Some(ColormapSpec {
                name: None,
                opacity: Some(OpacitySpec::Uniform(0.2)),
            }),
            ..Default::default()
        };
        assert_eq!(props.steps(), vec![PropertyStep::Opacity(OpacitySpec::Uniform(0.2))]);
    }

    #[test]
    fn test_first_bag_becomes_global_default() {
        let mut store = PropertyStore::new();
        let first = ViewportProperties {
            invert: Some(true),
            ..Default::default()
        };
        assert!(store.initialize_global_defaults(&first));
        assert!(!store.initialize_global_defaults(&ViewportProperties::default()));
        assert_eq!(store.defaults(None), Some(&first));
    }

    #[test]
    fn test_per_volume_defaults_override_global() {
        let mut store = PropertyStore::new();
        store.set_defaults(
            ViewportProperties {
                voi_range: Some(VoiRange::new(0.0, 10.0)),
                invert: Some(false),
                ..Default::default()
            },
            None,
        );
        store.set_defaults(
            ViewportProperties {
                invert: Some(true),
                ..Default::default()
            },
            Some("ct"),
        );
        let effective = store.effective_defaults(Some("ct"));
        assert_eq!(effective.invert, Some(true));
        assert_eq!(effective.voi_range, Some(VoiRange::new(0.0, 10.0)));

        store.clear_defaults(Some("ct"));
        assert_eq!(store.effective_defaults(Some("ct")).invert, Some(false));
    }

    #[test]
    fn test_serde_uses_viewport_field_names() {
        let props = ViewportProperties {
            voi_lut_function: Some(VoiLutFunction::SampledSigmoid),
            slab_thickness: Some(2.0),
            ..Default::default()
        };
        let json = serde_json::to_string(&props).unwrap();
        assert!(json.contains("\"VOILUTFunction\":\"SAMPLED_SIGMOID\""));
        assert!(json.contains("\"slabThickness\":2.0"));
        let back: ViewportProperties = serde_json::from_str(&json).unwrap();
        assert_eq!(back, props);
    }
}
