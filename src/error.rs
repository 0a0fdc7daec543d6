//! Failure modes shared by the whole crate.
//!
//! Everything here is fatal: an error aborts the run before (or instead of)
//! writing any output. Voxel-level degeneracies (empty voxels, unmapped
//! target fixels) are valid data and never surface as errors.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum FixelError {

    #[error("{}: {source}", path.display())]
    Io { path: PathBuf, #[source] source: std::io::Error },

    #[error("failed to parse {}: {message}", path.display())]
    Header { path: PathBuf, message: String },

    #[error("{}: expected {expected} {what}, found {found}", path.display())]
    LengthMismatch { path: PathBuf, what: &'static str, expected: usize, found: usize },

    #[error("fixel index at voxel {voxel:?} overruns the dataset ({fixels} fixels)")]
    CorruptIndex { voxel: [usize; 3], fixels: usize },

    #[error("output target {} already exists", .0.display())]
    OutputExists(PathBuf),

    #[error("{0}")]
    InvalidParameter(String),
}

impl FixelError {
    /// Adapter for attaching the offending path to a raw I/O error
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| FixelError::Io { path, source }
    }
}

pub type Result<T> = std::result::Result<T, FixelError>;
