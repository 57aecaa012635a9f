use thiserror::Error;

/// Errors originating from the rendering pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("bitmap of {width}x{height} (oversampling {oversampling}) exceeds the maximum addressable pixel count")]
    BitmapTooLarge {
        width: u32,
        height: u32,
        oversampling: u32,
    },

    #[error("failed to allocate render buffers: {0}")]
    OutOfMemory(String),

    #[error("PNG export failed: {0}")]
    Export(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] fractalmorph_core::CoreError),
}
