//! Per-volume property application and the default-property store.
//!
//! Every setter resolves the *applicable* actor: the actor showing the
//! requested volume if there is one, otherwise the first actor.

use std::rc::Rc;

use volview_core::{
    BlendMode, ColormapSpec, ImageVolume, InterpolationType, OpacitySpec, PropertyStep, Result,
    ViewportError, ViewportEvent, ViewportProperties, VoiLutFunction, VoiRange,
};
use volview_render::{
    preset_by_name, sigmoid_rgb_transfer_function, voi_from_sigmoid, PiecewiseFunction,
    SIGMOID_APPROXIMATION_NODES,
};

use crate::viewport::{ActorEntry, Viewport};

impl Viewport {
    pub(crate) fn applicable_actor(&self, volume_id: Option<&str>) -> Result<ActorEntry> {
        volume_id
            .and_then(|id| {
                self.actors
                    .iter()
                    .find(|entry| entry.reference_id == id || entry.uid == id)
            })
            .or_else(|| self.default_actor())
            .cloned()
            .ok_or_else(|| ViewportError::ActorNotFound(volume_id.unwrap_or("default").to_string()))
    }

    fn voi_lut_function_for(&self, volume: &ImageVolume) -> VoiLutFunction {
        self.properties
            .current()
            .voi_lut_function
            .or(volume.metadata().voi_lut_function)
            .unwrap_or_default()
    }


    /// Sets the VOI window.
    ///
    /// With a sampled-sigmoid curve the color function is rebuilt from the
    /// window; with a linear curve the existing function is rescaled.
    pub fn set_voi(&mut self, voi: VoiRange, volume_id: Option<&str>, suppress_events: bool) -> Result<()> {
        let entry = self.applicable_actor(volume_id)?;
        let volume = Rc::clone(entry.actor.borrow().volume());
        let function = self.voi_lut_function_for(&volume);
        {
            let mut actor = entry.actor.borrow_mut();
            let property = actor.property_mut();
            let inverted = property.is_inverted();
            match function {
                VoiLutFunction::SampledSigmoid => {
                    property.stash_linear();
                    let mut cfun = sigmoid_rgb_transfer_function(voi, SIGMOID_APPROXIMATION_NODES);
                    if inverted {
                        cfun.invert();
                    }
                    property.set_rgb_transfer_function(cfun);
                }
                VoiLutFunction::Linear => {
                    property.restore_linear();
                    property
                        .rgb_transfer_function_mut()
                        .set_mapping_range(voi.lower, voi.upper);
                }
            }
        }
        self.properties.current_mut().voi_range = Some(voi);

        if !suppress_events {
            self.emit(ViewportEvent::VoiModified {
                viewport_id: self.id().to_string(),
                volume_id: Some(entry.reference_id.clone()),
                range: voi,
                voi_lut_function: function,
                invert_state_changed: false,
            });
        }
        self.render();
        Ok(())
    }

    /// VOI window currently applied to the applicable actor.
    pub fn voi(&self, volume_id: Option<&str>) -> Result<VoiRange> {
        let entry = self.applicable_actor(volume_id)?;
        let actor = entry.actor.borrow();
        let cfun = actor.property().rgb_transfer_function();
        let linear = || {
            let [lower, upper] = cfun.range();
            VoiRange::new(lower, upper)
        };
        Ok(match self.voi_lut_function_for(actor.volume()) {
            VoiLutFunction::SampledSigmoid => voi_from_sigmoid(cfun).unwrap_or_else(linear),
            VoiLutFunction::Linear => linear(),
        })
    }

    /// Changes the VOI curve and re-applies the current window with it.
    pub fn set_voi_lut_function(
        &mut self,
        function: VoiLutFunction,
        volume_id: Option<&str>,
        suppress_events: bool,
    ) -> Result<()> {
        let voi = self.voi(volume_id)?;
        self.properties.current_mut().voi_lut_function = Some(function);
        self.set_voi(voi, volume_id, suppress_events)
    }

    /// Swaps the color transfer function for a registered colormap or a
    /// preset's colors, then applies the opacity if one is given.
    pub fn set_colormap(
        &mut self,
        colormap: ColormapSpec,
        volume_id: Option<&str>,
        suppress_events: bool,
    ) -> Result<()> {
        let entry = self.applicable_actor(volume_id)?;
        if let Some(name) = &colormap.name {
            let range = {
                let actor = entry.actor.borrow();
                let range = actor.property().rgb_transfer_function().range();
                if range[0] < range[1] {
                    range
                } else {
                    let voi = actor.volume().default_voi_range();
                    [voi.lower, voi.upper]
                }
            };
            let mut cfun = match (self.color_maps.get(name), preset_by_name(name)) {
                (Some(map), _) => map.to_transfer_function(range),
                (None, Some(preset)) => preset.color_transfer_function(),
                (None, None) => return Err(ViewportError::UnknownColormap(name.clone())),
            };
            if entry.actor.borrow().property().is_inverted() {
                cfun.invert();
            }
            let mut actor = entry.actor.borrow_mut();
            let property = actor.property_mut();
            property.discard_stashed_linear();
            property.set_rgb_transfer_function(cfun);
        }
        if let Some(opacity) = &colormap.opacity {
            self.set_opacity(opacity.clone(), volume_id)?;
        }

        let current = self.properties.current_mut();
        let opacity = colormap
            .opacity
            .clone()
            .or_else(|| current.colormap.as_ref().and_then(|c| c.opacity.clone()));
        current.colormap = Some(ColormapSpec {
            name: colormap.name.clone(),
            opacity,
        });

        if !suppress_events {
            self.emit(ViewportEvent::ColormapModified {
                viewport_id: self.id().to_string(),
                volume_id: Some(entry.reference_id.clone()),
                colormap,
            });
        }
        self.render();
        Ok(())
    }

    /// Replaces the scalar opacity function.
    ///
    /// A uniform opacity spans the color function's range.
    pub fn set_opacity(&mut self, opacity: OpacitySpec, volume_id: Option<&str>) -> Result<()> {
        let entry = self.applicable_actor(volume_id)?;
        {
            let mut actor = entry.actor.borrow_mut();
            let mut ofun = PiecewiseFunction::new();
            match &opacity {
                OpacitySpec::Uniform(value) => {
                    let [lower, upper] = actor.property().rgb_transfer_function().range();
                    let value = value.clamp(0.0, 1.0);
                    ofun.add_point(lower, value);
                    ofun.add_point(upper, value);
                }
                OpacitySpec::Points(points) => {
                    for point in points {
                        ofun.add_point(point.value, point.opacity.clamp(0.0, 1.0));
                    }
                }
            }
            actor.property_mut().set_scalar_opacity(ofun);
        }
        self.properties
            .current_mut()
            .colormap
            .get_or_insert_with(ColormapSpec::default)
            .opacity = Some(opacity);
        self.render();
        Ok(())
    }

    /// Inverts the grayscale output. Only acts when the state changes.
    pub fn set_invert(&mut self, invert: bool, volume_id: Option<&str>, suppress_events: bool) -> Result<()> {
        let entry = self.applicable_actor(volume_id)?;
        if entry.actor.borrow().property().is_inverted() == invert {
            return Ok(());
        }
        entry.actor.borrow_mut().property_mut().invert_colors();
        self.properties.current_mut().invert = Some(invert);

        if !suppress_events {
            let range = self.voi(volume_id)?;
            let voi_lut_function = self.voi_lut_function_for(entry.actor.borrow().volume());
            self.emit(ViewportEvent::VoiModified {
                viewport_id: self.id().to_string(),
                volume_id: Some(entry.reference_id.clone()),
                range,
                voi_lut_function,
                invert_state_changed: true,
            });
        }
        self.render();
        Ok(())
    }

    /// Sets the sampling interpolation.
    pub fn set_interpolation_type(
        &mut self,
        interpolation: InterpolationType,
        volume_id: Option<&str>,
    ) -> Result<()> {
        let entry = self.applicable_actor(volume_id)?;
        entry.actor.borrow_mut().property_mut().interpolation_type = interpolation;
        self.properties.current_mut().interpolation_type = Some(interpolation);
        self.render();
        Ok(())
    }

    /// Applies a built-in volume rendering preset. Unknown names are logged
    /// and ignored.
    pub fn set_preset(&mut self, name: &str, volume_id: Option<&str>, suppress_events: bool) -> Result<()> {
        let entry = self.applicable_actor(volume_id)?;
        let Some(preset) = preset_by_name(name) else {
            log::warn!("volume preset '{name}' not found");
            return Ok(());
        };
        preset.apply(entry.actor.borrow_mut().property_mut());
        self.properties.current_mut().preset = Some(name.to_string());

        if !suppress_events {
            self.emit(ViewportEvent::PresetModified {
                viewport_id: self.id().to_string(),
                volume_id: Some(entry.reference_id.clone()),
                preset_name: name.to_string(),
            });
        }
        self.render();
        Ok(())
    }

    /// Sets slab thickness on the listed actors, or every actor. Negative
    /// values are clamped to zero.
    pub fn set_slab_thickness(&mut self, thickness: f64, actor_uids: Option<&[&str]>) {
        let thickness = thickness.max(0.0);
        let strategy = Rc::clone(&self.strategy);
        strategy.set_slab_thickness(self, thickness, actor_uids);
        if strategy.slab_thickness(self).is_some() {
            self.properties.current_mut().slab_thickness = Some(thickness);
        }
    }

    /// Largest slab thickness across actors. `None` for 3D viewports.
    pub fn slab_thickness(&self) -> Option<f64> {
        self.strategy.slab_thickness(self)
    }

    /// Sets the blend mode on the listed actors, or every actor.
    pub fn set_blend_mode(&mut self, mode: BlendMode, actor_uids: Option<&[&str]>) {
        let strategy = Rc::clone(&self.strategy);
        strategy.set_blend_mode(self, mode, actor_uids);
    }

    /// Applies a property bag.
    ///
    /// The first bag ever applied becomes the global defaults.
    pub fn set_properties(
        &mut self,
        properties: &ViewportProperties,
        volume_id: Option<&str>,
        suppress_events: bool,
    ) -> Result<()> {
        if self.properties.initialize_global_defaults(properties) {
            log::debug!("viewport '{}' recorded its default properties", self.id());
        }
        self.apply_properties(properties, volume_id, suppress_events)?;
        self.render();
        Ok(())
    }

    fn apply_properties(
        &mut self,
        properties: &ViewportProperties,
        volume_id: Option<&str>,
        suppress_events: bool,
    ) -> Result<()> {
        for step in properties.steps() {
            match step {
                PropertyStep::Colormap(colormap) => self.set_colormap(
                    ColormapSpec {
                        opacity: None,
                        ..colormap
                    },
                    volume_id,
                    suppress_events,
                )?,
                PropertyStep::Opacity(opacity) => self.set_opacity(opacity, volume_id)?,
                PropertyStep::Voi(voi) => self.set_voi(voi, volume_id, suppress_events)?,
                PropertyStep::Interpolation(interpolation) => {
                    self.set_interpolation_type(interpolation, volume_id)?;
                }
                PropertyStep::VoiLutFunction(function) => {
                    self.set_voi_lut_function(function, volume_id, suppress_events)?;
                }
                PropertyStep::Invert(invert) => self.set_invert(invert, volume_id, suppress_events)?,
                PropertyStep::Preset(name) => self.set_preset(&name, volume_id, suppress_events)?,
                PropertyStep::SlabThickness(thickness) => self.set_slab_thickness(thickness, None),
                PropertyStep::Rotation(rotation) => self.set_rotation(rotation),
            }
        }
        Ok(())
    }

    /// Properties currently in effect on the applicable actor.
    pub fn properties(&self, volume_id: Option<&str>) -> Result<ViewportProperties> {
        let entry = self.applicable_actor(volume_id)?;
        let current = self.properties.current();
        let actor = entry.actor.borrow();
        Ok(ViewportProperties {
            voi_range: Some(self.voi(volume_id)?),
            voi_lut_function: Some(self.voi_lut_function_for(actor.volume())),
            invert: Some(actor.property().is_inverted()),
            colormap: current.colormap.clone(),
            interpolation_type: Some(actor.property().interpolation_type),
            slab_thickness: self.slab_thickness(),
            rotation: Some(self.rotation()),
            preset: current.preset.clone(),
        })
    }

    /// Stores default properties globally (`None`) or for one volume.
    pub fn set_default_properties(&mut self, properties: ViewportProperties, volume_id: Option<&str>) {
        self.properties.set_defaults(properties, volume_id);
    }

    /// Stored defaults for a volume, or the global defaults.
    pub fn default_properties(&self, volume_id: Option<&str>) -> Option<ViewportProperties> {
        self.properties.defaults(volume_id).cloned()
    }

    /// Removes stored defaults.
    pub fn clear_default_properties(&mut self, volume_id: Option<&str>) {
        self.properties.clear_defaults(volume_id);
    }

    /// Re-applies the stored defaults without emitting events, then redraws.
    pub fn reset_to_default_properties(&mut self, volume_id: Option<&str>) -> Result<()> {
        let defaults = self.properties.effective_defaults(volume_id);
        if defaults.is_empty() {
            log::debug!("viewport '{}' has no default properties to restore", self.id());
            return Ok(());
        }
        self.apply_properties(&defaults, volume_id, true)?;
        self.render();
        Ok(())
    }

    /// Restores default properties the way the viewport kind defines it.
    pub fn reset_properties(&mut self, volume_id: Option<&str>) -> Result<()> {
        let strategy = Rc::clone(&self.strategy);
        strategy.reset_properties(self, volume_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volview_core::{InMemoryVolumeCache, ViewportInput, ViewportType};
    use volview_render::OffscreenRenderingEngine;

    fn viewport(engine: &Rc<OffscreenRenderingEngine>, kind: ViewportType) -> Viewport {
        let input = ViewportInput::new(kind.to_string(), kind, 64, 64);
        Viewport::new(input, engine.clone(), Rc::new(InMemoryVolumeCache::new())).unwrap()
    }

    #[test]
    fn test_slab_thickness_recorded_only_where_supported() {
        let engine = Rc::new(OffscreenRenderingEngine::new("engine"));

        let mut ortho = viewport(&engine, ViewportType::Orthographic);
        ortho.set_slab_thickness(4.0, None);
        assert_eq!(ortho.properties.current().slab_thickness, Some(4.0));

        let mut volume_3d = viewport(&engine, ViewportType::Volume3d);
        volume_3d.set_slab_thickness(4.0, None);
        assert_eq!(volume_3d.properties.current().slab_thickness, None);
    }
}
