//! Error types for volview-rs.

use thiserror::Error;

/// The main error type for viewport operations.
#[derive(Error, Debug)]
pub enum ViewportError {
    /// An orientation name or vector pair could not be resolved.
    #[error("invalid orientation: {input}. Valid orientations are: {valid}")]
    InvalidOrientation {
        /// The rejected input, as given by the caller.
        input: String,
        /// Comma separated list of accepted orientation names.
        valid: String,
    },

    /// A viewport type string did not name a known viewport kind.
    #[error("viewport type '{0}' is not recognized")]
    InvalidViewportType(String),

    /// CPU rendering was requested for a volume viewport.
    #[error("CPU rendering is not supported for volume viewports")]
    CpuRenderingUnsupported,

    /// The referenced volume is not present in the cache.
    #[error("image volume '{0}' does not exist")]
    VolumeNotFound(String),

    /// Volumes being fused do not share a frame of reference.
    #[error(
        "volumes being added to viewport '{viewport_id}' do not share the same \
         FrameOfReferenceUID (expected '{expected}', got '{actual}')"
    )]
    FrameOfReferenceMismatch {
        /// Viewport the volumes were being added to.
        viewport_id: String,
        /// Frame of reference of the first volume.
        expected: String,
        /// Frame of reference of the offending volume.
        actual: String,
    },

    /// No actor is registered for the given uid or volume id.
    #[error("no actor found for '{0}'")]
    ActorNotFound(String),

    /// The rendering engine owning this viewport has been torn down.
    #[error("rendering engine has been destroyed")]
    RenderingEngineDestroyed,

    /// A colormap name is neither registered nor a known preset.
    #[error("colormap '{0}' not found")]
    UnknownColormap(String),

    /// The camera was asked for a projection it cannot build.
    #[error("unsupported projection: {0}")]
    UnsupportedProjection(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for viewport operations.
pub type Result<T> = std::result::Result<T, ViewportError>;
