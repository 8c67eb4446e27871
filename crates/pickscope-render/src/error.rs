//! Rendering error types.

use std::time::Duration;

use pickscope_core::PickError;
use thiserror::Error;

/// Errors that can occur during GPU picking operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Mapping a readback buffer failed.
    #[error("buffer map failed: {0}")]
    BufferMapFailed(String),

    /// The device was lost or polling failed for another reason.
    #[error("device poll failed: {0}")]
    PollFailed(String),

    /// The render target has zero size.
    #[error("invalid target size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    /// Timeout waiting for GPU.
    #[error("timeout waiting for GPU after {0:?}")]
    Timeout(Duration),
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

impl From<RenderError> for PickError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Timeout(after) => PickError::ReadbackTimeout(after),
            RenderError::InvalidSize { width, height } => {
                PickError::InvalidViewport { width, height }
            }
            RenderError::AdapterCreationFailed => PickError::GpuUnavailable,
            other => PickError::Render(other.to_string()),
        }
    }
}
