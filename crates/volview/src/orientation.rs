//! View orientation and in-plane rotation.

use std::rc::Rc;

use volview_core::geometry::{angle_between, rotate_about_axis};
use volview_core::{ImageVolume, Orientation, OrientationAxis, OrientationVectors, Result};

use crate::viewport::Viewport;

impl Viewport {
    /// Resolves an orientation to camera vectors.
    ///
    /// `Acquisition` uses the default volume's direction cosines and falls
    /// back to axial when no volume is loaded.
    pub fn orientation_vectors(&self, orientation: &Orientation) -> Result<OrientationVectors> {
        match orientation {
            Orientation::Axis(OrientationAxis::Acquisition) => match self.default_volume() {
                Some(volume) => Ok(Self::acquisition_orientation(&volume)),
                None => {
                    log::debug!(
                        "viewport '{}' has no volume for the acquisition plane, using axial",
                        self.id()
                    );
                    Orientation::Axis(OrientationAxis::Axial).vectors()
                }
            },
            other => other.vectors(),
        }
    }

    /// Camera vectors looking down the volume's slice axis, with the row
    /// direction reversed as screen up.
    pub fn acquisition_orientation(volume: &ImageVolume) -> OrientationVectors {
        let direction = volume.direction();
        OrientationVectors {
            view_plane_normal: -direction.z_axis,
            view_up: -direction.y_axis,
        }
    }

    /// Points the camera along `vectors`, records the up vector as the
    /// rotation reference and fits the camera.
    pub fn apply_view_orientation(&mut self, vectors: OrientationVectors) {
        self.camera
            .set_direction_of_projection(-vectors.view_plane_normal);
        self.camera.set_view_up(vectors.view_up);
        self.initial_view_up = Some(self.camera.view_up());
        self.reset_camera();
    }

    /// Changes the viewing orientation and redraws.
    pub fn set_orientation(&mut self, orientation: impl Into<Orientation>) -> Result<()> {
        let orientation = orientation.into();
        let strategy = Rc::clone(&self.strategy);
        strategy.apply_orientation(self, &orientation)?;
        self.render();
        Ok(())
    }

    /// In-plane rotation in degrees, in `[0, 360)`, measured from the up
    /// vector recorded by the last orientation change.
    pub fn rotation(&self) -> f64 {
        if !self.strategy.supports_rotation() {
            return 0.0;
        }
        let Some(initial) = self.initial_view_up else {
            return 0.0;
        };
        let (_, flip_vertical) = self.flip_state();
        let initial = if flip_vertical { -initial } else { initial };
        let current = self.camera.view_up();
        let normal = self.camera.view_plane_normal();

        let angle = angle_between(initial, current).to_degrees();
        if initial.cross(current).dot(normal) >= 0.0 {
            angle
        } else {
            (360.0 - angle) % 360.0
        }
    }

    /// Rotates the view in-plane so [`Viewport::rotation`] reports `degrees`.
    pub fn set_rotation(&mut self, degrees: f64) {
        if !self.strategy.supports_rotation() {
            log::debug!("viewport '{}' does not track rotation", self.id());
            return;
        }
        if self.initial_view_up.is_none() {
            self.initial_view_up = Some(self.camera.view_up());
        }
        let previous = self.camera();
        let delta = degrees - self.rotation();
        let view_up = rotate_about_axis(
            self.camera.view_up(),
            self.camera.view_plane_normal(),
            delta,
        );
        self.camera.set_view_up(view_up);
        self.properties.current_mut().rotation = Some(degrees.rem_euclid(360.0));
        self.camera_changed(&previous);
        self.render();
    }
}
