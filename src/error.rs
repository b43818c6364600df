//! Error types for startup and configuration

use std::time::Duration;

/// Fatal conditions hit while bringing up the renderer
///
/// None of these are retried: the application shell logs the error and
/// terminates.
#[derive(thiserror::Error, Debug)]
pub enum StartupError {
    #[error("WebGPU not supported on this browser.")]
    GraphicsUnsupported,

    #[error("No adapter found")]
    NoAdapter,

    #[error("surface reports no supported formats for this adapter")]
    NoSurfaceFormat,

    #[error("could not find a canvas element to draw on")]
    NoCanvas,

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("failed to request device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("grid size must be at least 1")]
    EmptyGrid,

    #[error("grid size {0} is too large: {0}x{0} cells exceed the instance or storage limits")]
    GridTooLarge(u32),

    #[error("update interval must be non-zero, got {0:?}")]
    ZeroInterval(Duration),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown stage `{0}`, expected one of: clear, square, grid, cells")]
pub struct ParseStageError(pub String);
