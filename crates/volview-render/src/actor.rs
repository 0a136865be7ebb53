//! Volume actors: a volume plus its appearance and mapper state.

use std::rc::Rc;

use glam::{DMat4, DVec3};
use serde::{Deserialize, Serialize};
use volview_core::{BlendMode, Bounds, ImageVolume, InterpolationType, Plane};

use crate::transfer_function::{ColorTransferFunction, PiecewiseFunction};

/// Maximum number of clipping planes uploaded to the GPU.
pub const MAX_CLIPPING_PLANES: usize = 6;

/// Reduction applied across a slab by the reslice path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlabType {
    /// Minimum intensity.
    Min,
    /// Maximum intensity.
    Max,
    /// Mean intensity.
    #[default]
    Mean,
    /// Sum of intensities.
    Sum,
}

/// Appearance of a volume: color, opacity, interpolation and lighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeProperty {
    rgb_transfer_function: ColorTransferFunction,
    scalar_opacity: PiecewiseFunction,
    /// Linear color function saved while a sigmoid curve is active.
    #[serde(skip)]
    stashed_linear: Option<ColorTransferFunction>,
    #[serde(default)]
    inverted: bool,
    /// Sampling interpolation.
    pub interpolation_type: InterpolationType,
    /// Whether lighting is applied.
    pub shade: bool,
    /// Ambient lighting coefficient.
    pub ambient: f64,
    /// Diffuse lighting coefficient.
    pub diffuse: f64,
    /// Specular lighting coefficient.
    pub specular: f64,
    /// Specular exponent.
    pub specular_power: f64,
    /// Whether gradient magnitude modulates opacity.
    pub use_gradient_opacity: bool,
    /// `[value, opacity]` at the low end of the gradient ramp.
    pub gradient_opacity_minimum: [f64; 2],
    /// `[value, opacity]` at the high end of the gradient ramp.
    pub gradient_opacity_maximum: [f64; 2],
}

impl Default for VolumeProperty {
    fn default() -> Self {
        Self {
            rgb_transfer_function: ColorTransferFunction::new(),
            scalar_opacity: PiecewiseFunction::new(),
            stashed_linear: None,
            inverted: false,
            interpolation_type: InterpolationType::Linear,
            shade: false,
            ambient: 0.2,
            diffuse: 0.7,
            specular: 0.3,
            specular_power: 8.0,
            use_gradient_opacity: false,
            gradient_opacity_minimum: [0.0, 1.0],
            gradient_opacity_maximum: [255.0, 1.0],
        }
    }
}

impl VolumeProperty {
    /// Color transfer function.
    #[must_use]
    pub fn rgb_transfer_function(&self) -> &ColorTransferFunction {
        &self.rgb_transfer_function
    }

    /// Mutable color transfer function.
    pub fn rgb_transfer_function_mut(&mut self) -> &mut ColorTransferFunction {
        &mut self.rgb_transfer_function
    }

    /// Replaces the color transfer function.
    pub fn set_rgb_transfer_function(&mut self, cfun: ColorTransferFunction) {
        self.rgb_transfer_function = cfun;
    }

    /// Scalar opacity function.
    #[must_use]
    pub fn scalar_opacity(&self) -> &PiecewiseFunction {
        &self.scalar_opacity
    }

    /// Mutable scalar opacity function.
    pub fn scalar_opacity_mut(&mut self) -> &mut PiecewiseFunction {
        &mut self.scalar_opacity
    }

    /// Replaces the scalar opacity function.
    pub fn set_scalar_opacity(&mut self, ofun: PiecewiseFunction) {
        self.scalar_opacity = ofun;
    }

    /// Saves the current color function so a later linear VOI can restore it.
    pub fn stash_linear(&mut self) {
        if self.stashed_linear.is_none() {
            self.stashed_linear = Some(self.rgb_transfer_function.clone());
        }
    }

    /// Restores the stashed linear color function, if any.
    ///
    /// Returns `true` when a function was restored.
    pub fn restore_linear(&mut self) -> bool {
        match self.stashed_linear.take() {
            Some(cfun) => {
                self.rgb_transfer_function = cfun;
                true
            }
            None => false,
        }
    }

    /// Whether a linear color function is stashed.
    #[must_use]
    pub fn has_stashed_linear(&self) -> bool {
        self.stashed_linear.is_some()
    }

    /// Drops the stashed linear function, e.g. after a colormap swap.
    pub fn discard_stashed_linear(&mut self) {
        self.stashed_linear = None;
    }

    /// Complements the colors of the active and the stashed function.
    pub fn invert_colors(&mut self) {
        self.rgb_transfer_function.invert();
        if let Some(stashed) = &mut self.stashed_linear {
            stashed.invert();
        }
        self.inverted = !self.inverted;
    }

    /// Whether the colors are currently complemented.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Marks freshly written, non-complemented colors.
    pub fn clear_inverted(&mut self) {
        self.inverted = false;
    }
}

/// Mapper state: clipping, blending and slab reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeMapper {
    clipping_planes: Vec<Plane>,
    slice_plane: Option<Plane>,
    blend_mode: BlendMode,
    slab_type: SlabType,
    slab_thickness: f64,
    sample_distance: f64,
}

impl Default for VolumeMapper {
    fn default() -> Self {
        Self {
            clipping_planes: Vec::new(),
            slice_plane: None,
            blend_mode: BlendMode::Composite,
            slab_type: SlabType::Mean,
            slab_thickness: 0.0,
            sample_distance: 1.0,
        }
    }
}

impl VolumeMapper {
    /// Clipping planes, in insertion order.
    #[must_use]
    pub fn clipping_planes(&self) -> &[Plane] {
        &self.clipping_planes
    }

    /// Mutable clipping planes.
    pub fn clipping_planes_mut(&mut self) -> &mut [Plane] {
        &mut self.clipping_planes
    }

    /// Appends a clipping plane.
    pub fn add_clipping_plane(&mut self, plane: Plane) {
        if self.clipping_planes.len() >= MAX_CLIPPING_PLANES {
            log::warn!("clipping plane limit ({MAX_CLIPPING_PLANES}) reached, plane ignored");
            return;
        }
        self.clipping_planes.push(plane);
    }

    /// Removes every clipping plane.
    pub fn remove_all_clipping_planes(&mut self) {
        self.clipping_planes.clear();
    }

    /// Plane sampled by the reslice path.
    #[must_use]
    pub fn slice_plane(&self) -> Option<Plane> {
        self.slice_plane
    }

    /// Sets the reslice plane.
    pub fn set_slice_plane(&mut self, plane: Plane) {
        self.slice_plane = Some(plane);
    }

    /// Compositing mode.
    #[must_use]
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// Sets the compositing mode.
    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend_mode = mode;
    }

    /// Slab reduction of the reslice path.
    #[must_use]
    pub fn slab_type(&self) -> SlabType {
        self.slab_type
    }

    /// Sets the slab reduction.
    pub fn set_slab_type(&mut self, slab_type: SlabType) {
        self.slab_type = slab_type;
    }

    /// Slab thickness of the reslice path.
    #[must_use]
    pub fn slab_thickness(&self) -> f64 {
        self.slab_thickness
    }

    /// Sets the reslice slab thickness.
    pub fn set_slab_thickness(&mut self, thickness: f64) {
        self.slab_thickness = thickness.max(0.0);
    }

    /// Ray sample spacing in world units.
    #[must_use]
    pub fn sample_distance(&self) -> f64 {
        self.sample_distance
    }

    /// Sets the ray sample spacing.
    pub fn set_sample_distance(&mut self, distance: f64) {
        self.sample_distance = distance;
    }
}

/// GPU-compatible clipping plane block.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ClippingPlaneUniforms {
    /// Plane equations `(nx, ny, nz, d)` with `n . p + d = 0`.
    pub planes: [[f32; 4]; MAX_CLIPPING_PLANES],
    /// Number of active planes.
    pub count: u32,
    /// Padding for alignment.
    pub _padding: [u32; 3],
}

impl Default for ClippingPlaneUniforms {
    fn default() -> Self {
        Self {
            planes: [[0.0; 4]; MAX_CLIPPING_PLANES],
            count: 0,
            _padding: [0; 3],
        }
    }
}

impl From<&VolumeMapper> for ClippingPlaneUniforms {
    fn from(mapper: &VolumeMapper) -> Self {
        let mut uniforms = Self::default();
        for (slot, plane) in uniforms.planes.iter_mut().zip(mapper.clipping_planes()) {
            let n = plane.normal.as_vec3();
            *slot = [n.x, n.y, n.z, (-plane.distance) as f32];
        }
        uniforms.count = mapper.clipping_planes().len().min(MAX_CLIPPING_PLANES) as u32;
        uniforms
    }
}

/// A renderable volume.
#[derive(Debug, Clone)]
pub struct VolumeActor {
    volume: Rc<ImageVolume>,
    property: VolumeProperty,
    initial_property: VolumeProperty,
    mapper: VolumeMapper,
    user_matrix: DMat4,
    visible: bool,
}

impl VolumeActor {
    /// Creates an actor with a grayscale ramp over the volume's default VOI
    /// and a linear opacity ramp over its scalar range.
    #[must_use]
    pub fn new(volume: Rc<ImageVolume>) -> Self {
        let voi = volume.default_voi_range();
        let (lower, upper) = volume.scalar_range();
        let mut property = VolumeProperty::default();
        property.set_rgb_transfer_function(ColorTransferFunction::grayscale(voi.lower, voi.upper));
        let mut ofun = PiecewiseFunction::new();
        ofun.add_point(lower, 0.0);
        ofun.add_point(upper, 1.0);
        property.set_scalar_opacity(ofun);

        let mut mapper = VolumeMapper::default();
        mapper.set_sample_distance(volume.spacing().min_element().max(f64::EPSILON));

        Self {
            volume,
            initial_property: property.clone(),
            property,
            mapper,
            user_matrix: DMat4::IDENTITY,
            visible: true,
        }
    }

    /// The rendered volume.
    #[must_use]
    pub fn volume(&self) -> &Rc<ImageVolume> {
        &self.volume
    }

    /// Appearance.
    #[must_use]
    pub fn property(&self) -> &VolumeProperty {
        &self.property
    }

    /// Mutable appearance.
    pub fn property_mut(&mut self) -> &mut VolumeProperty {
        &mut self.property
    }

    /// Restores the transfer functions the actor was created with.
    pub fn restore_initial_transfer_functions(&mut self) {
        self.property
            .set_rgb_transfer_function(self.initial_property.rgb_transfer_function().clone());
        self.property
            .set_scalar_opacity(self.initial_property.scalar_opacity().clone());
        self.property.stashed_linear = None;
        self.property.inverted = self.initial_property.inverted;
    }

    /// Mapper state.
    #[must_use]
    pub fn mapper(&self) -> &VolumeMapper {
        &self.mapper
    }

    /// Mutable mapper state.
    pub fn mapper_mut(&mut self) -> &mut VolumeMapper {
        &mut self.mapper
    }

    /// Model transform applied on top of the volume's own geometry.
    #[must_use]
    pub fn user_matrix(&self) -> DMat4 {
        self.user_matrix
    }

    /// Replaces the model transform.
    pub fn set_user_matrix(&mut self, matrix: DMat4) {
        self.user_matrix = matrix;
    }

    /// Whether the actor is drawn.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Shows or hides the actor.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// World bounds including the user transform.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.volume.bounds().transformed(&self.user_matrix)
    }

    /// Maps a world point through the inverse user transform and samples it.
    #[must_use]
    pub fn value_at_world(&self, world: DVec3) -> Option<f32> {
        let local = self.user_matrix.inverse().transform_point3(world);
        self.volume.value_at_world(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::UVec3;
    use volview_core::VolumeMetadata;

    fn volume() -> Rc<ImageVolume> {
        Rc::new(
            ImageVolume::new(
                "vol",
                VolumeMetadata::default(),
                UVec3::new(4, 4, 4),
                DVec3::ONE,
                DVec3::ZERO,
            )
            .with_scalar_range(0.0, 100.0),
        )
    }

    #[test]
    fn test_new_actor_defaults() {
        let actor = VolumeActor::new(volume());
        assert_eq!(actor.property().rgb_transfer_function().range(), [0.0, 100.0]);
        assert_eq!(actor.property().scalar_opacity().points().len(), 2);
        assert_eq!(actor.user_matrix(), DMat4::IDENTITY);
        assert!(actor.is_visible());
        assert_eq!(actor.bounds(), Bounds::new(DVec3::ZERO, DVec3::splat(3.0)));
    }

    #[test]
    fn test_bounds_follow_user_matrix() {
        let mut actor = VolumeActor::new(volume());
        actor.set_user_matrix(DMat4::from_translation(DVec3::new(10.0, 0.0, 0.0)));
        let bounds = actor.bounds();
        assert!((bounds.min - DVec3::new(10.0, 0.0, 0.0)).length() < 1e-12);
    }

    #[test]
    fn test_linear_stash_round_trip() {
        let mut property = VolumeProperty::default();
        property.set_rgb_transfer_function(ColorTransferFunction::grayscale(0.0, 10.0));
        property.stash_linear();
        property.set_rgb_transfer_function(ColorTransferFunction::grayscale(5.0, 6.0));
        // a second stash keeps the first linear function
        property.stash_linear();
        assert!(property.restore_linear());
        assert_eq!(property.rgb_transfer_function().range(), [0.0, 10.0]);
        assert!(!property.restore_linear());
    }

    #[test]
    fn test_invert_colors_tracks_state() {
        let mut property = VolumeProperty::default();
        property.set_rgb_transfer_function(ColorTransferFunction::grayscale(0.0, 10.0));
        assert!(!property.is_inverted());
        property.invert_colors();
        assert!(property.is_inverted());
        assert_eq!(property.rgb_transfer_function().color(0.0), DVec3::ONE);
        property.invert_colors();
        assert!(!property.is_inverted());
        assert_eq!(property.rgb_transfer_function().color(0.0), DVec3::ZERO);
    }

    #[test]
    fn test_restore_initial_transfer_functions() {
        let mut actor = VolumeActor::new(volume());
        actor.property_mut().rgb_transfer_function_mut().invert();
        actor.property_mut().scalar_opacity_mut().remove_all_points();
        actor.restore_initial_transfer_functions();
        assert_eq!(actor.property().rgb_transfer_function().color(0.0), DVec3::ZERO);
        assert_eq!(actor.property().scalar_opacity().points().len(), 2);
    }

    #[test]
    fn test_clipping_plane_uniforms() {
        let mut mapper = VolumeMapper::default();
        mapper.add_clipping_plane(Plane::from_point_normal(DVec3::new(0.0, 0.0, 2.0), DVec3::Z));
        let uniforms = ClippingPlaneUniforms::from(&mapper);
        assert_eq!(uniforms.count, 1);
        assert_eq!(uniforms.planes[0], [0.0, 0.0, 1.0, -2.0]);
        assert_eq!(bytemuck::bytes_of(&uniforms).len(), std::mem::size_of::<ClippingPlaneUniforms>());
    }

    #[test]
    fn test_clipping_plane_limit() {
        let mut mapper = VolumeMapper::default();
        for _ in 0..(MAX_CLIPPING_PLANES + 2) {
            mapper.add_clipping_plane(Plane::from_point_normal(DVec3::ZERO, DVec3::X));
        }
        assert_eq!(mapper.clipping_planes().len(), MAX_CLIPPING_PLANES);
    }
}
