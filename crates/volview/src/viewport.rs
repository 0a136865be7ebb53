//! The viewport: camera, actor registry, flip state and coordinate transforms.
//!
//! A [`Viewport`] owns a [`SlabCamera`] and a registry of [`ActorEntry`]s and
//! talks to a shared [`RenderingEngine`]. Behaviour that differs between
//! orthographic MPR, full 3D and reslice viewports lives in a
//! [`ViewportStrategy`] chosen from the [`ViewportType`] at construction.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use glam::{DMat3, DMat4, DVec2, DVec3};
use volview_core::geometry::view_right;
use volview_core::{
    BlendMode, Camera, CameraUpdate, EventTarget, ImageVolume, ListenerId, PropertyStore,
    Result, ViewportError, ViewportEvent, ViewportInput, ViewportOptions, ViewportType,
    VolumeCache,
};
use volview_render::{
    canvas_to_world, world_to_canvas, ActorHandle, ColorMapRegistry, DisplayGeometry, Renderer,
    RenderingEngine, SlabCamera,
};

use crate::strategy::{self, ViewportStrategy};

/// Tolerance used to decide whether the camera moved.
pub const CAMERA_EPSILON: f64 = 1e-9;

/// Registry entry for one actor.
#[derive(Debug, Clone)]
pub struct ActorEntry {
    /// Unique id within the viewport.
    pub uid: String,
    /// The renderable.
    pub actor: ActorHandle,
    /// Id of the volume backing the actor.
    pub reference_id: String,
    /// Slab thickness for this actor, if set.
    pub slab_thickness: Option<f64>,
    /// Compositing mode.
    pub blend_mode: BlendMode,
    /// Whether the actor is drawn.
    pub visibility: bool,
}

impl ActorEntry {
    /// Creates a visible entry with the default blend mode.
    pub fn new(uid: impl Into<String>, actor: ActorHandle, reference_id: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            actor,
            reference_id: reference_id.into(),
            slab_thickness: None,
            blend_mode: BlendMode::Composite,
            visibility: true,
        }
    }
}

/// Options for [`Viewport::reset_camera_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetCameraOptions {
    /// Keep the focal point on the currently viewed plane instead of
    /// recentring on the volume.
    pub reset_pan_zoom_for_view_plane: bool,
    /// Remember the fitted camera as the initial camera.
    pub store_as_initial: bool,
}

impl Default for ResetCameraOptions {
    fn default() -> Self {
        Self {
            reset_pan_zoom_for_view_plane: false,
            store_as_initial: true,
        }
    }
}

/// Flips requested from [`Viewport::flip`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlipDirection {
    /// Mirror left/right.
    pub flip_horizontal: bool,
    /// Mirror top/bottom.
    pub flip_vertical: bool,
}

/// A viewport over a region of a shared rendering surface.
pub struct Viewport {
    id: String,
    kind: ViewportType,
    engine: Weak<dyn RenderingEngine>,
    rendering_engine_id: String,
    pub(crate) volume_cache: Rc<dyn VolumeCache>,
    sx: u32,
    sy: u32,
    width: u32,
    height: u32,
    options: ViewportOptions,
    pub(crate) camera: SlabCamera,
    pub(crate) actors: Vec<ActorEntry>,
    flip_horizontal: bool,
    flip_vertical: bool,
    pub(crate) initial_view_up: Option<DVec3>,
    fit_camera: Option<Camera>,
    initial_camera: Option<Camera>,
    pub(crate) properties: PropertyStore,
    pub(crate) color_maps: ColorMapRegistry,
    events: EventTarget,
    pub(crate) strategy: Rc<dyn ViewportStrategy>,
}

impl fmt::Debug for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewport")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("rendering_engine_id", &self.rendering_engine_id)
            .field("actors", &self.actors.len())
            .field("camera", &self.camera)
            .field("flip_horizontal", &self.flip_horizontal)
            .field("flip_vertical", &self.flip_vertical)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl Viewport {
    /// Creates a viewport and enables it on the rendering engine.
    pub fn new(
        input: ViewportInput,
        engine: Rc<dyn RenderingEngine>,
        volume_cache: Rc<dyn VolumeCache>,
    ) -> Result<Self> {
        if input.options.use_cpu_rendering {
            return Err(ViewportError::CpuRenderingUnsupported);
        }
        if engine.has_been_destroyed() {
            return Err(ViewportError::RenderingEngineDestroyed);
        }
        engine.enable_viewport(&input)?;

        let strategy = strategy::for_kind(input.kind);
        let mut camera = SlabCamera::new();
        camera.set_parallel_projection(
            input
                .options
                .parallel_projection
                .unwrap_or_else(|| strategy.default_parallel_projection()),
        );

        let mut viewport = Self {
            id: input.id,
            kind: input.kind,
            rendering_engine_id: engine.id().to_string(),
            engine: Rc::downgrade(&engine),
            volume_cache,
            sx: input.sx,
            sy: input.sy,
            width: input.width,
            height: input.height,
            options: input.options,
            camera,
            actors: Vec::new(),
            flip_horizontal: false,
            flip_vertical: false,
            initial_view_up: None,
            fit_camera: None,
            initial_camera: None,
            properties: PropertyStore::new(),
            color_maps: ColorMapRegistry::new(),
            events: EventTarget::new(),
            strategy: Rc::clone(&strategy),
        };
        strategy.initialize(&mut viewport)?;
        log::info!("created {} viewport '{}'", viewport.kind, viewport.id);
        Ok(viewport)
    }

    /// Viewport id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Viewport kind.
    pub fn kind(&self) -> ViewportType {
        self.kind
    }

    /// Options the viewport was created with.
    pub fn options(&self) -> &ViewportOptions {
        &self.options
    }

    /// Id of the owning rendering engine.
    pub fn rendering_engine_id(&self) -> &str {
        &self.rendering_engine_id
    }

    /// The owning rendering engine.
    pub fn rendering_engine(&self) -> Result<Rc<dyn RenderingEngine>> {
        self.engine
            .upgrade()
            .filter(|engine| !engine.has_been_destroyed())
            .ok_or(ViewportError::RenderingEngineDestroyed)
    }

    pub(crate) fn engine_handle(&self) -> Weak<dyn RenderingEngine> {
        Weak::clone(&self.engine)
    }

    /// This viewport's renderer.
    pub fn renderer(&self) -> Result<Rc<RefCell<Renderer>>> {
        self.rendering_engine()?
            .renderer(&self.id)
            .ok_or(ViewportError::RenderingEngineDestroyed)
    }

    /// Asks the engine to redraw this viewport. Ignored after teardown.
    pub fn render(&self) {
        if let Ok(engine) = self.rendering_engine() {
            engine.render_viewport(&self.id);
        }
    }

    /// Registers an event listener.
    pub fn subscribe(&mut self, listener: impl FnMut(&ViewportEvent) + 'static) -> ListenerId {
        self.events.subscribe(listener)
    }

    /// Removes an event listener.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    pub(crate) fn emit(&mut self, event: ViewportEvent) {
        if self.options.suppress_events {
            return;
        }
        self.events.emit(&event);
    }

    // ---- Geometry ----

    /// Canvas size in device pixels.
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Offset inside the shared surface in device pixels.
    pub fn offset(&self) -> (u32, u32) {
        (self.sx, self.sy)
    }

    /// Moves or resizes the viewport inside the shared surface.
    pub fn set_size(&mut self, sx: u32, sy: u32, width: u32, height: u32) {
        self.sx = sx;
        self.sy = sy;
        self.width = width;
        self.height = height;
        match self.rendering_engine() {
            Ok(engine) => engine.resize_viewport(&self.id, sx, sy, width, height),
            Err(_) => log::warn!("viewport '{}' resized after engine teardown", self.id),
        }
    }

    fn display_geometry(&self) -> Result<DisplayGeometry> {
        let engine = self.rendering_engine()?;
        let renderer = self.renderer()?;
        let (surface_width, surface_height) = engine.surface_size();
        let viewport = renderer.borrow().viewport();
        Ok(DisplayGeometry {
            surface_size: DVec2::new(f64::from(surface_width), f64::from(surface_height)),
            viewport,
            offset: DVec2::new(f64::from(self.sx), f64::from(self.sy)),
            canvas_size: DVec2::new(f64::from(self.width), f64::from(self.height)),
            device_pixel_ratio: engine.device_pixel_ratio(),
        })
    }

    /// Maps a canvas point to the world point on the current view plane.
    pub fn canvas_to_world(&mut self, canvas: DVec2) -> Result<DVec3> {
        let geometry = self.display_geometry()?;
        let pipeline = self.strategy.canvas_pipeline();
        canvas_to_world(&mut self.camera, &geometry, pipeline, canvas)
    }

    /// Maps a world point to canvas coordinates.
    pub fn world_to_canvas(&mut self, world: DVec3) -> Result<DVec2> {
        let geometry = self.display_geometry()?;
        let pipeline = self.strategy.canvas_pipeline();
        world_to_canvas(&mut self.camera, &geometry, pipeline, world)
    }

    // ---- Actors ----

    /// Registered actors.
    pub fn actors(&self) -> &[ActorEntry] {
        &self.actors
    }

    /// Actor registered under `uid`.
    pub fn actor(&self, uid: &str) -> Option<&ActorEntry> {
        self.actors.iter().find(|entry| entry.uid == uid)
    }

    /// The first registered actor.
    pub fn default_actor(&self) -> Option<&ActorEntry> {
        self.actors.first()
    }

    /// Uid of the actor at `index`.
    pub fn actor_uid_by_index(&self, index: usize) -> Option<&str> {
        self.actors.get(index).map(|entry| entry.uid.as_str())
    }

    /// Actor at `index`.
    pub fn actor_by_index(&self, index: usize) -> Option<&ActorEntry> {
        self.actors.get(index)
    }

    pub(crate) fn default_volume(&self) -> Option<Rc<ImageVolume>> {
        self.default_actor()
            .map(|entry| Rc::clone(entry.actor.borrow().volume()))
    }

    /// Adds an actor. Duplicate uids, empty uids and a torn-down engine are
    /// logged and ignored.
    pub fn add_actor(&mut self, entry: ActorEntry) {
        let renderer = match self.renderer() {
            Ok(renderer) => renderer,
            Err(_) => {
                log::warn!(
                    "cannot add actor '{}' to viewport '{}': rendering engine has been destroyed",
                    entry.uid,
                    self.id
                );
                return;
            }
        };
        if entry.uid.is_empty() {
            log::warn!("cannot add actor without a uid to viewport '{}'", self.id);
            return;
        }
        if self.actor(&entry.uid).is_some() {
            log::warn!("actor '{}' already exists in viewport '{}'", entry.uid, self.id);
            return;
        }
        let flip = (self.flip_horizontal || self.flip_vertical).then(|| self.flip_transform());
        {
            let mut actor = entry.actor.borrow_mut();
            actor.set_visible(entry.visibility);
            actor.mapper_mut().set_blend_mode(entry.blend_mode);
            // late actors join the mirrored frame of the existing ones
            if let Some(matrix) = flip {
                actor.set_user_matrix(matrix);
            }
        }
        renderer.borrow_mut().add_actor(&entry.uid, Rc::clone(&entry.actor));
        self.actors.push(entry);
    }

    /// Adds several actors, optionally fitting the camera afterwards.
    pub fn add_actors(&mut self, entries: Vec<ActorEntry>, reset_camera: bool) {
        for entry in entries {
            self.add_actor(entry);
        }
        if reset_camera {
            self.reset_camera();
        }
    }

    /// Removes an actor and detaches it from the renderer.
    pub fn remove_actor(&mut self, uid: &str) -> bool {
        let Some(index) = self.actors.iter().position(|entry| entry.uid == uid) else {
            log::warn!("actor '{uid}' does not exist in viewport '{}'", self.id);
            return false;
        };
        match self.renderer() {
            Ok(renderer) => {
                renderer.borrow_mut().remove_actor(uid);
                self.actors.remove(index);
                if self.actors.is_empty() {
                    self.clear_flip_state();
                }
                true
            }
            Err(_) => {
                log::warn!(
                    "cannot remove actor '{uid}' from viewport '{}': rendering engine has been destroyed",
                    self.id
                );
                false
            }
        }
    }

    /// Removes several actors.
    pub fn remove_actors(&mut self, uids: &[&str]) {
        for uid in uids {
            self.remove_actor(uid);
        }
    }

    /// Removes every actor.
    pub fn remove_all_actors(&mut self) {
        match self.renderer() {
            Ok(renderer) => {
                renderer.borrow_mut().remove_all_actors();
                self.actors.clear();
                self.clear_flip_state();
            }
            Err(_) => log::warn!(
                "cannot clear actors of viewport '{}': rendering engine has been destroyed",
                self.id
            ),
        }
    }

    /// Replaces every actor and fits the camera.
    pub fn set_actors(&mut self, entries: Vec<ActorEntry>) {
        self.remove_all_actors();
        self.add_actors(entries, true);
    }

    // ---- Camera ----

    /// Matrix mapping rendered coordinates back to un-flipped world coordinates.
    ///
    /// The flip matrix is an involution, so the same matrix maps both ways.
    fn flip_transform(&self) -> DMat4 {
        self.default_actor()
            .map_or(DMat4::IDENTITY, |entry| entry.actor.borrow().user_matrix())
    }

    /// Snapshot of the camera in un-flipped world coordinates.
    pub fn camera(&self) -> Camera {
        let transform = self.flip_transform();
        Camera {
            position: transform.transform_point3(self.camera.position()),
            focal_point: transform.transform_point3(self.camera.focal_point()),
            view_up: self.camera.view_up(),
            view_plane_normal: self.camera.view_plane_normal(),
            clipping_range: self.camera.clipping_range(),
            parallel_projection: self.camera.parallel_projection(),
            parallel_scale: self.camera.parallel_scale(),
            view_angle: self.camera.view_angle(),
            slab_thickness: self.strategy.slab_thickness(self),
            flip_horizontal: self.flip_horizontal,
            flip_vertical: self.flip_vertical,
        }
    }

    /// The underlying slab camera.
    pub fn slab_camera(&self) -> &SlabCamera {
        &self.camera
    }

    /// Applies a sparse camera update. Only provided fields change.
    pub fn set_camera(&mut self, update: CameraUpdate) {
        let strategy = Rc::clone(&self.strategy);
        let update = strategy.adjust_camera_update(self, update);
        let previous = self.camera();

        if update.flip_horizontal.is_some() || update.flip_vertical.is_some() {
            self.set_flip(
                update.flip_horizontal.unwrap_or(self.flip_horizontal),
                update.flip_vertical.unwrap_or(self.flip_vertical),
            );
        }

        let transform = self.flip_transform();
        if let Some(normal) = update.view_plane_normal {
            self.camera.set_direction_of_projection(-normal);
        }
        if let Some(position) = update.position {
            self.camera.set_position(transform.transform_point3(position));
        }
        if let Some(focal_point) = update.focal_point {
            self.camera.set_focal_point(transform.transform_point3(focal_point));
        }
        match update.view_up {
            Some(view_up) => self.camera.set_view_up(view_up),
            None => self.camera.repair_view_up(),
        }
        if let Some(scale) = update.parallel_scale {
            self.camera.set_parallel_scale(scale);
        }
        if let Some(angle) = update.view_angle {
            self.camera.set_view_angle(angle);
        }
        if let Some([near, far]) = update.clipping_range {
            self.camera.set_clipping_range(near, far);
        }
        self.camera_changed(&previous);
    }

    /// Runs strategy follow-ups after a camera change and reports it.
    pub(crate) fn camera_changed(&mut self, previous: &Camera) {
        let strategy = Rc::clone(&self.strategy);
        strategy.camera_updated(self, previous);
        let camera = self.camera();
        if !camera.approx_eq(previous, CAMERA_EPSILON) {
            self.emit(ViewportEvent::CameraModified {
                viewport_id: self.id.clone(),
                rendering_engine_id: self.rendering_engine_id.clone(),
                previous: *previous,
                camera,
            });
        }
    }

    /// Fits the camera to the visible content.
    pub fn reset_camera(&mut self) -> bool {
        self.reset_camera_with(ResetCameraOptions::default())
    }

    /// Fits the camera to the visible content. Never fails: an empty
    /// viewport resets to a unit-sized default.
    pub fn reset_camera_with(&mut self, options: ResetCameraOptions) -> bool {
        let previous = self.camera();
        let strategy = Rc::clone(&self.strategy);
        strategy.reset_camera(self, options);

        let camera = self.camera();
        self.fit_camera = Some(camera);
        if options.store_as_initial {
            self.initial_camera = Some(camera);
        }
        log::debug!(
            "viewport '{}' camera reset: focal {:?}, parallel scale {}",
            self.id,
            camera.focal_point,
            camera.parallel_scale
        );
        self.emit(ViewportEvent::CameraReset {
            viewport_id: self.id.clone(),
            rendering_engine_id: self.rendering_engine_id.clone(),
            camera,
        });
        if !camera.approx_eq(&previous, CAMERA_EPSILON) {
            self.emit(ViewportEvent::CameraModified {
                viewport_id: self.id.clone(),
                rendering_engine_id: self.rendering_engine_id.clone(),
                previous,
                camera,
            });
        }
        true
    }

    /// Camera stored by the last reset that asked for it.
    pub fn initial_camera(&self) -> Option<Camera> {
        self.initial_camera
    }

    /// Camera produced by the last reset.
    pub fn fit_to_canvas_camera(&self) -> Option<Camera> {
        self.fit_camera
    }

    /// Fitted parallel scale over the current one; 1 before any reset.
    pub fn zoom(&self) -> f64 {
        match self.fit_camera {
            Some(fit) if self.camera.parallel_scale() > 0.0 => {
                fit.parallel_scale / self.camera.parallel_scale()
            }
            _ => 1.0,
        }
    }

    /// Sets the parallel scale relative to the fitted one.
    pub fn set_zoom(&mut self, zoom: f64) {
        let Some(fit) = self.fit_camera else {
            log::warn!("viewport '{}' has no fitted camera to zoom from", self.id);
            return;
        };
        if zoom <= 0.0 {
            log::warn!("ignoring non-positive zoom {zoom}");
            return;
        }
        self.set_camera(CameraUpdate {
            parallel_scale: Some(fit.parallel_scale / zoom),
            ..CameraUpdate::default()
        });
    }

    /// Canvas displacement of the fitted focal point from the current one.
    pub fn pan(&mut self) -> Result<DVec2> {
        let Some(fit) = self.fit_camera else {
            return Ok(DVec2::ZERO);
        };
        let fitted = self.world_to_canvas(fit.focal_point)?;
        let current = self.world_to_canvas(self.camera.focal_point())?;
        Ok(fitted - current)
    }

    /// Translates the camera in-plane so [`Viewport::pan`] returns `pan`.
    pub fn set_pan(&mut self, pan: DVec2) -> Result<()> {
        let delta = pan - self.pan()?;
        let center = self.world_to_canvas(self.camera.focal_point())?;
        let from = self.canvas_to_world(center)?;
        let to = self.canvas_to_world(center + delta)?;
        let shift = from - to;

        let previous = self.camera();
        let focal_point = self.camera.focal_point() + shift;
        let position = self.camera.position() + shift;
        self.camera.set_focal_point(focal_point);
        self.camera.set_position(position);
        self.camera_changed(&previous);
        Ok(())
    }

    // ---- Flip ----

    /// Current flip state as `(horizontal, vertical)`.
    pub fn flip_state(&self) -> (bool, bool) {
        (self.flip_horizontal, self.flip_vertical)
    }

    /// Toggles the requested flips by mirroring every actor about the
    /// default volume's center. No-op without a volume.
    pub fn flip(&mut self, direction: FlipDirection) {
        if !direction.flip_horizontal && !direction.flip_vertical {
            return;
        }
        let Some(center) = self
            .default_actor()
            .map(|entry| entry.actor.borrow().bounds().center())
        else {
            log::debug!("viewport '{}' has no image data to flip", self.id);
            return;
        };

        let matrix = flip_matrix(
            center,
            self.camera.view_up(),
            self.camera.view_plane_normal(),
            direction,
        );
        for entry in &self.actors {
            let mut actor = entry.actor.borrow_mut();
            let user_matrix = matrix * actor.user_matrix();
            actor.set_user_matrix(user_matrix);
        }
        if direction.flip_horizontal {
            self.flip_horizontal = !self.flip_horizontal;
        }
        if direction.flip_vertical {
            self.flip_vertical = !self.flip_vertical;
        }
        self.render();
    }

    /// Forgets the flip state once no actor carries the flip matrix.
    fn clear_flip_state(&mut self) {
        self.flip_horizontal = false;
        self.flip_vertical = false;
    }

    /// Sets the flip state, flipping only the axes whose state differs.
    pub fn set_flip(&mut self, flip_horizontal: bool, flip_vertical: bool) {
        self.flip(FlipDirection {
            flip_horizontal: flip_horizontal != self.flip_horizontal,
            flip_vertical: flip_vertical != self.flip_vertical,
        });
    }
}

/// Mirror about `center` along the camera's right and/or up axes.
///
/// Built as `T(center) * R^-1 * S * R * T(-center)` where `R` aligns view
/// right, view up and the view-plane normal with X, Y and Z.
pub(crate) fn flip_matrix(
    center: DVec3,
    view_up: DVec3,
    view_plane_normal: DVec3,
    direction: FlipDirection,
) -> DMat4 {
    let normal = view_plane_normal.normalize_or_zero();
    let right = view_right(view_up, normal).normalize_or_zero();
    let up = right.cross(normal).normalize_or_zero();
    let rotation = DMat4::from_mat3(DMat3::from_cols(right, up, normal).transpose());
    let scale = DVec3::new(
        if direction.flip_horizontal { -1.0 } else { 1.0 },
        if direction.flip_vertical { -1.0 } else { 1.0 },
        1.0,
    );
    DMat4::from_translation(center)
        * rotation.transpose()
        * DMat4::from_scale(scale)
        * rotation
        * DMat4::from_translation(-center)
}
