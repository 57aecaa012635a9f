use std::path::PathBuf;

use thiserror::Error;

/// Aggregates the library error types plus the CLI's own I/O and
/// argument failures. `main` prints this error's `Display` to stderr and
/// maps it to the exit codes of the command-line surface.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] fractalmorph_core::CoreError),

    #[error(transparent)]
    Render(#[from] fractalmorph_render::RenderError),

    #[error("failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create output directory {path}: {source}")]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
