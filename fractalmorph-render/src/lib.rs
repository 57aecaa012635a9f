pub mod bitmap;
pub mod canvas;
pub mod colorizer;
pub mod engine;
pub mod error;
pub mod export;
pub mod iter_buffer;
pub mod observer;

pub use bitmap::Bitmap;
pub use canvas::FractalCanvas;
pub use colorizer::GradientConfig;
pub use engine::{default_thread_budget, RenderCancel, RenderResult};
pub use error::RenderError;
pub use export::{export_png, ExportMetadata};
pub use iter_buffer::{IterBuffer, IterData};
pub use observer::{NullObserver, Observer, ParameterChangeSource, RenderSnapshot, ResizeFailure};

/// Convenience result type for the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;
