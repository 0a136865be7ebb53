//! Viewport notifications and the observer registry that delivers them.

use std::fmt;

use crate::camera::Camera;
use crate::properties::{ColormapSpec, VoiLutFunction, VoiRange};

/// Notification emitted by a viewport.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewportEvent {
    /// The camera changed.
    CameraModified {
        /// Emitting viewport.
        viewport_id: String,
        /// Rendering engine owning the viewport.
        rendering_engine_id: String,
        /// Camera before the change.
        previous: Camera,
        /// Camera after the change.
        camera: Camera,
    },
    /// The camera was fitted to the content.
    CameraReset {
        /// Emitting viewport.
        viewport_id: String,
        /// Rendering engine owning the viewport.
        rendering_engine_id: String,
        /// Camera after the reset.
        camera: Camera,
    },
    /// The VOI window (or inversion) changed.
    VoiModified {
        /// Emitting viewport.
        viewport_id: String,
        /// Affected volume.
        volume_id: Option<String>,
        /// New window.
        range: VoiRange,
        /// Curve in effect.
        voi_lut_function: VoiLutFunction,
        /// Set when the change was an inversion toggle.
        invert_state_changed: bool,
    },
    /// The colormap changed.
    ColormapModified {
        /// Emitting viewport.
        viewport_id: String,
        /// Affected volume.
        volume_id: Option<String>,
        /// Applied colormap.
        colormap: ColormapSpec,
    },
    /// A rendering preset was applied.
    PresetModified {
        /// Emitting viewport.
        viewport_id: String,
        /// Affected volume.
        volume_id: Option<String>,
        /// Preset name.
        preset_name: String,
    },
    /// The viewport's volumes were replaced.
    NewVolumeSet {
        /// Emitting viewport.
        viewport_id: String,
        /// Volumes now displayed.
        volume_ids: Vec<String>,
    },
    /// The camera moved onto a different acquisition slice.
    NewSliceImage {
        /// Emitting viewport.
        viewport_id: String,
        /// Volume the index refers to.
        volume_id: String,
        /// Slice index along the acquisition axis.
        image_index: usize,
        /// Image id at that index, when known.
        image_id: Option<String>,
    },
}

/// Handle returned by [`EventTarget::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&ViewportEvent)>;

/// Callback registry owned by a single viewport.
#[derive(Default)]
pub struct EventTarget {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
}

impl EventTarget {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener that receives every event.
    pub fn subscribe(&mut self, listener: impl FnMut(&ViewportEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        before != self.listeners.len()
    }

    /// Delivers an event to all listeners in registration order.
    pub fn emit(&mut self, event: &ViewportEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns true if nobody is listening.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTarget")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
