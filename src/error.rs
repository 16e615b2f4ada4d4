// Error types for Vulkan initialization and the frame loop
//
// Every failure here is fatal: nothing is retried and there is no degraded
// mode. Constructors return these through `?` and partially-built resources
// are released by their owners' Drop impls.

use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// The Vulkan loader itself could not be found or initialized.
    #[error("failed to load Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    /// A requested validation layer is not installed on this system.
    #[error("required layer not supported: {0}")]
    MissingLayer(String),

    /// The platform does not report a required instance extension.
    #[error("required instance extension not supported: {0}")]
    MissingInstanceExtension(String),

    /// No physical device passed the API-version / queue / extension filters.
    #[error("failed to find a suitable GPU")]
    NoSuitableDevice,

    /// No queue family on the selected device advertises graphics.
    #[error("no graphics-capable queue family found")]
    NoGraphicsQueue,

    /// No queue family on the selected device can present to the surface.
    #[error("no present-capable queue family found")]
    NoPresentQueue,

    /// The surface reported an empty format list.
    #[error("surface reports no supported formats")]
    NoSurfaceFormats,

    /// The shader binary is not a plausible SPIR-V buffer.
    #[error("invalid shader binary: {0}")]
    InvalidShader(String),

    /// The shader file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other failure reported by the driver.
    #[error("Vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),
}
