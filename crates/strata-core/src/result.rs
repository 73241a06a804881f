//! Result type alias for strata operations

use crate::error::StrataError;

/// Standard Result type for strata operations
pub type Result<T> = std::result::Result<T, StrataError>;

/// Extension trait for Result to map I/O failures onto a path
pub trait IoResultExt<T> {
    /// Attach the offending path to an I/O error
    fn with_path(self, path: impl Into<std::path::PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<std::path::PathBuf>) -> Result<T> {
        self.map_err(|source| StrataError::io_error(path, source))
    }
}
