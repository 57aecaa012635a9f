pub mod complex;
pub mod error;
pub mod formula;
pub mod gradient;
pub mod params;
pub mod serde_format;

// Re-export primary types for convenience.
pub use complex::Complex;
pub use error::CoreError;
pub use formula::{procedure_id, FormulaMeta};
pub use gradient::{GradientFactors, Rgb};
pub use params::{transformation, FractalParameters, TransformationType};

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
