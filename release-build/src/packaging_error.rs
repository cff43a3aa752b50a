//! Error types for release archive writing.
//!
//! Covers I/O failures and zip container errors that can occur while
//! creating `.tar.xz` and `.zip` archives.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors arising from archive writing.
#[derive(Debug, Error)]
pub enum PackagingError {
    /// An I/O operation failed (reading the artifact, writing the archive).
    #[error("I/O error during packaging: {0}")]
    Io(#[from] std::io::Error),

    /// The zip writer rejected an entry or could not finish the archive.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The artifact to package does not exist.
    #[error("artifact not found: {0}")]
    MissingArtifact(Utf8PathBuf),

    /// The artifact path has no filename component.
    #[error("artifact path has no filename: {0}")]
    InvalidArtifactPath(Utf8PathBuf),
}
