//! Color map system.

use std::collections::HashMap;

use glam::DVec3;

use crate::transfer_function::ColorTransferFunction;

/// A color map for mapping normalized intensities to colors.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMap {
    /// Color map name.
    pub name: String,
    /// Color samples (evenly spaced from 0 to 1).
    pub colors: Vec<DVec3>,
}

impl ColorMap {
    /// Creates a new color map.
    pub fn new(name: impl Into<String>, colors: Vec<DVec3>) -> Self {
        Self {
            name: name.into(),
            colors,
        }
    }

    /// Samples the color map at a given value (0 to 1).
    pub fn sample(&self, t: f64) -> DVec3 {
        let t = t.clamp(0.0, 1.0);

        if self.colors.is_empty() {
            return DVec3::ZERO;
        }

        if self.colors.len() == 1 {
            return self.colors[0];
        }

        let n = self.colors.len() - 1;
        let idx = (t * n as f64).floor() as usize;
        let idx = idx.min(n - 1);
        let frac = t * n as f64 - idx as f64;

        self.colors[idx].lerp(self.colors[idx + 1], frac)
    }

    /// Builds a color transfer function spanning `range`.
    pub fn to_transfer_function(&self, range: [f64; 2]) -> ColorTransferFunction {
        let mut cfun = ColorTransferFunction::new();
        cfun.apply_colors(&self.colors);
        cfun.set_mapping_range(range[0], range[1]);
        cfun
    }
}

/// Registry for managing color maps.
#[derive(Debug, Default)]
pub struct ColorMapRegistry {
    color_maps: HashMap<String, ColorMap>,
}

impl ColorMapRegistry {
    /// Creates a new color map registry with default color maps.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register_defaults();
        registry
    }

    fn register_defaults(&mut self) {
        self.register(ColorMap::new("Grayscale", vec![DVec3::ZERO, DVec3::ONE]));

        // Inverted grayscale, as radiographs are read
        self.register(ColorMap::new("X Ray", vec![DVec3::ONE, DVec3::ZERO]));

        self.register(ColorMap::new(
            "hsv",
            vec![
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(1.0, 1.0, 0.0),
                DVec3::new(0.0, 1.0, 0.0),
                DVec3::new(0.0, 1.0, 1.0),
                DVec3::new(0.0, 0.0, 1.0),
                DVec3::new(1.0, 0.0, 1.0),
                DVec3::new(1.0, 0.0, 0.0),
            ],
        ));

        // Common for PET fusion
        self.register(ColorMap::new(
            "Hot Iron",
            vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(0.5, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(1.0, 0.5, 0.0),
                DVec3::new(1.0, 1.0, 0.5),
                DVec3::new(1.0, 1.0, 1.0),
            ],
        ));

        self.register(ColorMap::new(
            "Black-Body Radiation",
            vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(0.902, 0.0, 0.0),
                DVec3::new(0.902, 0.902, 0.0),
                DVec3::new(1.0, 1.0, 1.0),
            ],
        ));

        self.register(ColorMap::new(
            "viridis",
            vec![
                DVec3::new(0.267, 0.004, 0.329),
                DVec3::new(0.282, 0.140, 0.457),
                DVec3::new(0.253, 0.265, 0.529),
                DVec3::new(0.206, 0.371, 0.553),
                DVec3::new(0.163, 0.471, 0.558),
                DVec3::new(0.127, 0.566, 0.550),
                DVec3::new(0.134, 0.658, 0.517),
                DVec3::new(0.266, 0.749, 0.440),
                DVec3::new(0.477, 0.821, 0.318),
                DVec3::new(0.741, 0.873, 0.150),
                DVec3::new(0.993, 0.906, 0.144),
            ],
        ));

        self.register(ColorMap::new(
            "Cool to Warm",
            vec![
                DVec3::new(0.230, 0.299, 0.754),
                DVec3::new(0.552, 0.690, 0.996),
                DVec3::new(0.866, 0.866, 0.866),
                DVec3::new(0.956, 0.604, 0.486),
                DVec3::new(0.706, 0.016, 0.150),
            ],
        ));
    }

    /// Registers a color map, replacing one with the same name.
    pub fn register(&mut self, color_map: ColorMap) {
        self.color_maps.insert(color_map.name.clone(), color_map);
    }

    /// Gets a color map by name.
    pub fn get(&self, name: &str) -> Option<&ColorMap> {
        self.color_maps.get(name)
    }

    /// Returns all color map names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.color_maps.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_registered() {
        let registry = ColorMapRegistry::new();
        assert!(registry.get("Grayscale").is_some());
        assert!(registry.get("Hot Iron").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_sample_endpoints() {
        let registry = ColorMapRegistry::new();
        let gray = registry.get("Grayscale").unwrap();
        assert_eq!(gray.sample(0.0), DVec3::ZERO);
        assert_eq!(gray.sample(2.0), DVec3::ONE);
        assert!((gray.sample(0.25) - DVec3::splat(0.25)).length() < 1e-12);
    }

    #[test]
    fn test_transfer_function_spans_range() {
        let registry = ColorMapRegistry::new();
        let cfun = registry
            .get("hsv")
            .unwrap()
            .to_transfer_function([-1000.0, 1000.0]);
        assert_eq!(cfun.range(), [-1000.0, 1000.0]);
        assert_eq!(cfun.size(), 7);
        assert_eq!(cfun.color(-1000.0), DVec3::new(1.0, 0.0, 0.0));
    }
}
