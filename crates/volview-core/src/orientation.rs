//! View orientations for multi-planar reformation.

use std::fmt;
use std::str::FromStr;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewportError};

/// Named viewing axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrientationAxis {
    /// Looking from the feet towards the head.
    #[default]
    Axial,
    /// Looking from the patient's left.
    Sagittal,
    /// Looking from the front.
    Coronal,
    /// The plane the volume was scanned in, derived from its direction cosines.
    Acquisition,
}

impl OrientationAxis {
    /// Axes with a fixed camera frame.
    pub const FIXED: [OrientationAxis; 3] = [
        OrientationAxis::Axial,
        OrientationAxis::Sagittal,
        OrientationAxis::Coronal,
    ];

    /// Lowercase name, as accepted by [`FromStr`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            OrientationAxis::Axial => "axial",
            OrientationAxis::Sagittal => "sagittal",
            OrientationAxis::Coronal => "coronal",
            OrientationAxis::Acquisition => "acquisition",
        }
    }

    /// Fixed camera frame for this axis. `Acquisition` has none.
    #[must_use]
    pub fn camera_values(self) -> Option<OrientationVectors> {
        let (normal, up) = match self {
            OrientationAxis::Axial => (DVec3::NEG_Z, DVec3::NEG_Y),
            OrientationAxis::Sagittal => (DVec3::X, DVec3::Z),
            OrientationAxis::Coronal => (DVec3::NEG_Y, DVec3::Z),
            OrientationAxis::Acquisition => return None,
        };
        Some(OrientationVectors {
            view_plane_normal: normal,
            view_up: up,
        })
    }
}

impl fmt::Display for OrientationAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OrientationAxis {
    type Err = ViewportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "axial" => Ok(OrientationAxis::Axial),
            "sagittal" => Ok(OrientationAxis::Sagittal),
            "coronal" => Ok(OrientationAxis::Coronal),
            "acquisition" => Ok(OrientationAxis::Acquisition),
            _ => Err(invalid_orientation(s)),
        }
    }
}

/// An explicit camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationVectors {
    /// Normal of the view plane, pointing towards the camera.
    pub view_plane_normal: DVec3,
    /// Up direction on screen.
    pub view_up: DVec3,
}

/// Orientation given either by name or by explicit vectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Orientation {
    /// A named axis.
    Axis(OrientationAxis),
    /// An explicit frame.
    Vectors(OrientationVectors),
}

impl From<OrientationAxis> for Orientation {
    fn from(axis: OrientationAxis) -> Self {
        Orientation::Axis(axis)
    }
}

impl From<OrientationVectors> for Orientation {
    fn from(vectors: OrientationVectors) -> Self {
        Orientation::Vectors(vectors)
    }
}

impl Orientation {
    /// Resolves to concrete, normalized vectors.
    ///
    /// Named axes go through the fixed lookup; `Acquisition` is not in the
    /// lookup and is rejected here, callers with a volume resolve it first.
    /// Explicit vectors must be non-zero and not parallel.
    pub fn vectors(&self) -> Result<OrientationVectors> {
        match *self {
            Orientation::Axis(axis) => axis
                .camera_values()
                .ok_or_else(|| invalid_orientation(axis.name())),
            Orientation::Vectors(v) => {
                let (Some(normal), Some(up)) =
                    (v.view_plane_normal.try_normalize(), v.view_up.try_normalize())
                else {
                    return Err(ViewportError::InvalidOrientation {
                        input: format!("{v:?}"),
                        valid: "an object with non-zero viewPlaneNormal and viewUp".into(),
                    });
                };
                if normal.cross(up).length_squared() < 1e-12 {
                    return Err(ViewportError::InvalidOrientation {
                        input: format!("{v:?}"),
                        valid: "an object whose viewPlaneNormal and viewUp are not parallel"
                            .into(),
                    });
                }
                Ok(OrientationVectors {
                    view_plane_normal: normal,
                    view_up: up,
                })
            }
        }
    }
}

fn invalid_orientation(input: &str) -> ViewportError {
    ViewportError::InvalidOrientation {
        input: input.to_string(),
        valid: OrientationAxis::FIXED
            .iter()
            .map(|a| a.name())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("axial".parse::<OrientationAxis>().unwrap(), OrientationAxis::Axial);
        assert_eq!("Coronal".parse::<OrientationAxis>().unwrap(), OrientationAxis::Coronal);
        assert!("oblique".parse::<OrientationAxis>().is_err());
    }

    #[test]
    fn test_invalid_name_lists_valid_names() {
        let err = "oblique".parse::<OrientationAxis>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("oblique"));
        assert!(msg.contains("axial, sagittal, coronal"));
    }

    #[test]
    fn test_axial_vectors() {
        let v = Orientation::Axis(OrientationAxis::Axial).vectors().unwrap();
        assert_eq!(v.view_plane_normal, DVec3::NEG_Z);
        assert_eq!(v.view_up, DVec3::NEG_Y);
    }

    #[test]
    fn test_acquisition_needs_volume() {
        assert!(Orientation::Axis(OrientationAxis::Acquisition).vectors().is_err());
    }

    #[test]
    fn test_explicit_vectors_are_normalized() {
        let v = Orientation::Vectors(OrientationVectors {
            view_plane_normal: DVec3::new(0.0, 0.0, 2.0),
            view_up: DVec3::new(0.0, 3.0, 0.0),
        })
        .vectors()
        .unwrap();
        assert_eq!(v.view_plane_normal, DVec3::Z);
        assert_eq!(v.view_up, DVec3::Y);
    }

    #[test]
    fn test_parallel_vectors_rejected() {
        let result = Orientation::Vectors(OrientationVectors {
            view_plane_normal: DVec3::Z,
            view_up: DVec3::NEG_Z,
        })
        .vectors();
        assert!(matches!(result, Err(ViewportError::InvalidOrientation { .. })));
    }
}
