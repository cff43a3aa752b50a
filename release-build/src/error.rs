//! Error types for the release pipeline.
//!
//! Variants split into two groups: configuration errors that stop the run
//! before any target starts, and per-target errors that the pipeline driver
//! records against a single target before applying its failure policy.

use crate::config::ConfigError;
use crate::packaging_error::PackagingError;
use crate::target::TargetError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while running the release pipeline.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// A tool required by the target's toolchain is absent.
    #[error("toolchain for {triple} is incomplete: {tool} not found at {path}")]
    ToolchainNotFound {
        /// The target triple being resolved.
        triple: String,
        /// Logical tool name (compiler, archiver, wrapper...).
        tool: &'static str,
        /// Where the tool was expected.
        path: Utf8PathBuf,
    },

    /// An external tool could not be started at all.
    #[error("failed to start {tool}: {source}")]
    ToolMissing {
        /// The program that failed to launch.
        tool: String,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The external build tool reported failure.
    #[error("build failed for {triple}:\n{diagnostics}")]
    BuildFailed {
        /// The target triple that failed to build.
        triple: String,
        /// Captured standard output and error of the build tool.
        diagnostics: String,
    },

    /// The build reported success but produced no artifact.
    #[error("artifact not found at {path} after a successful build")]
    ArtifactNotFound {
        /// Where the artifact was expected.
        path: Utf8PathBuf,
    },

    /// The artifact inspector ran but reported failure.
    #[error("dependency inspection of {path} failed: {diagnostics}")]
    VerificationFailed {
        /// The artifact being inspected.
        path: Utf8PathBuf,
        /// Captured output of the inspector.
        diagnostics: String,
    },

    /// Writing the release archive failed.
    #[error("packaging {archive} failed: {source}")]
    PackagingFailed {
        /// The archive being written.
        archive: Utf8PathBuf,
        /// The underlying packaging error.
        #[source]
        source: PackagingError,
    },

    /// The run was interrupted before this target finished.
    #[error("interrupted")]
    Interrupted,

    /// A target filter or descriptor lookup failed.
    #[error(transparent)]
    Target(#[from] TargetError),

    /// The release version is not usable in an archive filename.
    #[error("invalid release version \"{value}\": {reason}")]
    InvalidVersion {
        /// The rejected version string.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// The configuration file could not be read or parsed.
    #[error("invalid configuration at {path}: {source}")]
    InvalidConfig {
        /// Path to the configuration file.
        path: Utf8PathBuf,
        /// What was wrong with it.
        #[source]
        source: ConfigError,
    },

    /// Failed to write the run report.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

impl ReleaseError {
    /// Wrap the error raised when `tool` could not be started.
    #[must_use]
    pub fn tool_missing(tool: &str, source: std::io::Error) -> Self {
        Self::ToolMissing {
            tool: tool.to_owned(),
            source,
        }
    }

    /// Whether this error concerns a single target rather than the whole run.
    #[must_use]
    pub fn is_target_failure(&self) -> bool {
        matches!(
            self,
            Self::ToolchainNotFound { .. }
                | Self::ToolMissing { .. }
                | Self::BuildFailed { .. }
                | Self::ArtifactNotFound { .. }
                | Self::VerificationFailed { .. }
                | Self::PackagingFailed { .. }
                | Self::Interrupted
        )
    }
}

/// Result type alias using [`ReleaseError`].
pub type Result<T> = std::result::Result<T, ReleaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toolchain_not_found_names_tool_and_path() {
        let err = ReleaseError::ToolchainNotFound {
            triple: "x86_64-apple-darwin".to_owned(),
            tool: "archiver",
            path: Utf8PathBuf::from("/packages/osxcross/target/bin/x86_64-apple-darwin21.4-ar"),
        };
        let msg = err.to_string();
        assert!(msg.contains("x86_64-apple-darwin"));
        assert!(msg.contains("archiver"));
        assert!(msg.contains("/packages/osxcross"));
    }

    #[test]
    fn build_failed_carries_full_diagnostics() {
        let err = ReleaseError::BuildFailed {
            triple: "x86_64-unknown-linux-musl".to_owned(),
            diagnostics: "error[E0425]: cannot find value\nerror: aborting".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("E0425"));
        assert!(msg.contains("aborting"));
    }

    #[test]
    fn tool_missing_preserves_source() {
        let err = ReleaseError::ToolMissing {
            tool: "cargo".to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("cargo"));
    }

    #[test]
    fn configuration_errors_are_not_target_failures() {
        let err = ReleaseError::InvalidVersion {
            value: String::new(),
            reason: "empty".to_owned(),
        };
        assert!(!err.is_target_failure());
        assert!(ReleaseError::Interrupted.is_target_failure());
    }
}
