//! Rendering engine and per-viewport renderers.
//!
//! An engine owns one offscreen surface that every enabled viewport draws
//! into. Each viewport gets a [`Renderer`] covering its own rectangle of the
//! surface; the renderer knows which actors are in the scene and their bounds.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use volview_core::{Bounds, Result, ViewportError, ViewportInput};

use crate::actor::VolumeActor;

/// Shared handle to an actor. Viewports and renderers both hold one.
pub type ActorHandle = Rc<RefCell<VolumeActor>>;

/// Scene of a single viewport.
#[derive(Debug, Default)]
pub struct Renderer {
    actors: Vec<(String, ActorHandle)>,
    viewport: [f64; 4],
    background: [f64; 3],
    reset_camera_count: usize,
}

impl Renderer {
    /// Creates an empty renderer covering the whole surface.
    #[must_use]
    pub fn new() -> Self {
        Self {
            viewport: [0.0, 0.0, 1.0, 1.0],
            ..Self::default()
        }
    }

    /// Adds an actor under `uid`, replacing an actor with the same uid.
    pub fn add_actor(&mut self, uid: &str, actor: ActorHandle) {
        self.actors.retain(|(id, _)| id != uid);
        self.actors.push((uid.to_string(), actor));
    }

    /// Removes the actor registered under `uid`.
    pub fn remove_actor(&mut self, uid: &str) -> bool {
        let before = self.actors.len();
        self.actors.retain(|(id, _)| id != uid);
        self.actors.len() != before
    }

    /// Removes every actor.
    pub fn remove_all_actors(&mut self) {
        self.actors.clear();
    }

    /// Actors in insertion order.
    pub fn actors(&self) -> impl Iterator<Item = (&str, &ActorHandle)> {
        self.actors.iter().map(|(id, actor)| (id.as_str(), actor))
    }

    /// Number of actors in the scene.
    #[must_use]
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Union of the bounds of visible actors. Invalid when nothing is visible.
    #[must_use]
    pub fn compute_visible_prop_bounds(&self) -> Bounds {
        self.actors
            .iter()
            .map(|(_, actor)| actor.borrow())
            .filter(|actor| actor.is_visible())
            .fold(Bounds::uninitialized(), |acc, actor| acc.union(&actor.bounds()))
    }

    /// Normalized rectangle `[x_min, y_min, x_max, y_max]` of the surface
    /// covered by this renderer, with y pointing up.
    #[must_use]
    pub fn viewport(&self) -> [f64; 4] {
        self.viewport
    }

    /// Sets the normalized rectangle.
    pub fn set_viewport(&mut self, viewport: [f64; 4]) {
        self.viewport = viewport;
    }

    /// Background color.
    #[must_use]
    pub fn background(&self) -> [f64; 3] {
        self.background
    }

    /// Sets the background color.
    pub fn set_background(&mut self, background: [f64; 3]) {
        self.background = background;
    }

    /// Called after the owning viewport fitted its camera.
    pub fn notify_camera_reset(&mut self) {
        self.reset_camera_count += 1;
    }

    /// Number of camera resets seen by this renderer.
    #[must_use]
    pub fn reset_camera_count(&self) -> usize {
        self.reset_camera_count
    }
}

/// Engine services a viewport depends on.
pub trait RenderingEngine {
    /// Engine id.
    fn id(&self) -> &str;

    /// Whether the engine was torn down.
    fn has_been_destroyed(&self) -> bool;

    /// Registers a viewport and creates its renderer.
    fn enable_viewport(&self, input: &ViewportInput) -> Result<Rc<RefCell<Renderer>>>;

    /// Removes a viewport and its renderer.
    fn disable_viewport(&self, viewport_id: &str) -> bool;

    /// Moves or resizes a viewport on the surface.
    fn resize_viewport(&self, viewport_id: &str, sx: u32, sy: u32, width: u32, height: u32);

    /// Renderer of an enabled viewport.
    fn renderer(&self, viewport_id: &str) -> Option<Rc<RefCell<Renderer>>>;

    /// Requests a redraw of one viewport.
    fn render_viewport(&self, viewport_id: &str);

    /// Size of the shared surface in device pixels.
    fn surface_size(&self) -> (u32, u32);

    /// Device pixels per canvas pixel.
    fn device_pixel_ratio(&self) -> f64 {
        1.0
    }
}

#[derive(Debug, Clone, Copy)]
struct ViewportRect {
    sx: u32,
    sy: u32,
    width: u32,
    height: u32,
}

/// Engine drawing every viewport into one offscreen surface.
///
/// No pixels are produced; render requests are counted so callers can
/// observe when a redraw was asked for.
#[derive(Debug)]
pub struct OffscreenRenderingEngine {
    id: String,
    device_pixel_ratio: f64,
    destroyed: Cell<bool>,
    renderers: RefCell<HashMap<String, Rc<RefCell<Renderer>>>>,
    rects: RefCell<HashMap<String, ViewportRect>>,
    render_counts: RefCell<HashMap<String, usize>>,
}

impl OffscreenRenderingEngine {
    /// Creates an engine with a device pixel ratio of 1.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            device_pixel_ratio: 1.0,
            destroyed: Cell::new(false),
            renderers: RefCell::new(HashMap::new()),
            rects: RefCell::new(HashMap::new()),
            render_counts: RefCell::new(HashMap::new()),
        }
    }

    /// Sets the device pixel ratio.
    #[must_use]
    pub fn with_device_pixel_ratio(mut self, ratio: f64) -> Self {
        self.device_pixel_ratio = ratio.max(f64::EPSILON);
        self
    }

    fn update_renderer_viewports(&self) {
        let (width, height) = self.surface_size();
        if width == 0 || height == 0 {
            return;
        }
        let (w, h) = (f64::from(width), f64::from(height));
        let rects = self.rects.borrow();
        for (id, renderer) in self.renderers.borrow().iter() {
            let Some(rect) = rects.get(id) else {
                continue;
            };
            renderer.borrow_mut().set_viewport([
                f64::from(rect.sx) / w,
                1.0 - f64::from(rect.sy + rect.height) / h,
                f64::from(rect.sx + rect.width) / w,
                1.0 - f64::from(rect.sy) / h,
            ]);
        }
    }

    /// Tears the engine down. Renderers are released.
    pub fn destroy(&self) {
        self.destroyed.set(true);
        self.renderers.borrow_mut().clear();
        self.rects.borrow_mut().clear();
        log::info!("rendering engine '{}' destroyed", self.id);
    }

    /// Number of redraws requested for a viewport.
    #[must_use]
    pub fn render_count(&self, viewport_id: &str) -> usize {
        self.render_counts.borrow().get(viewport_id).copied().unwrap_or(0)
    }
}

impl RenderingEngine for OffscreenRenderingEngine {
    fn id(&self) -> &str {
        &self.id
    }

    fn has_been_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    fn enable_viewport(&self, input: &ViewportInput) -> Result<Rc<RefCell<Renderer>>> {
        if self.destroyed.get() {
            return Err(ViewportError::RenderingEngineDestroyed);
        }
        let renderer = Rc::new(RefCell::new(Renderer::new()));
        renderer.borrow_mut().set_background(input.options.background);
        self.renderers
            .borrow_mut()
            .insert(input.id.clone(), Rc::clone(&renderer));
        self.rects.borrow_mut().insert(
            input.id.clone(),
            ViewportRect {
                sx: input.sx,
                sy: input.sy,
                width: input.width,
                height: input.height,
            },
        );
        self.update_renderer_viewports();
        log::debug!("enabled viewport '{}' on engine '{}'", input.id, self.id);
        Ok(renderer)
    }

    fn disable_viewport(&self, viewport_id: &str) -> bool {
        let removed = self.renderers.borrow_mut().remove(viewport_id).is_some();
        self.rects.borrow_mut().remove(viewport_id);
        self.update_renderer_viewports();
        removed
    }

    fn resize_viewport(&self, viewport_id: &str, sx: u32, sy: u32, width: u32, height: u32) {
        if let Some(rect) = self.rects.borrow_mut().get_mut(viewport_id) {
            *rect = ViewportRect { sx, sy, width, height };
        }
        self.update_renderer_viewports();
    }

    fn renderer(&self, viewport_id: &str) -> Option<Rc<RefCell<Renderer>>> {
        self.renderers.borrow().get(viewport_id).cloned()
    }

    fn render_viewport(&self, viewport_id: &str) {
        if self.destroyed.get() {
            return;
        }
        *self
            .render_counts
            .borrow_mut()
            .entry(viewport_id.to_string())
            .or_insert(0) += 1;
    }

    fn surface_size(&self) -> (u32, u32) {
        self.rects.borrow().values().fold((0, 0), |(w, h), rect| {
            (w.max(rect.sx + rect.width), h.max(rect.sy + rect.height))
        })
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }
}
