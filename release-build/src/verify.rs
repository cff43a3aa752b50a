//! Dynamic dependency inspection for built artifacts.
//!
//! The verifier asks an external inspector (`llvm-objdump -p` by default) for
//! the artifact's private headers and extracts the libraries it loads at run
//! time. It understands ELF `NEEDED` entries, PE import tables, and Mach-O
//! dylib load commands, so one inspector covers every release target.

use crate::error::{ReleaseError, Result};
use crate::exec::{CommandExecutor, Invocation, combined_output};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

/// Dependencies found in one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// The inspected artifact.
    pub artifact_path: Utf8PathBuf,
    /// Runtime library dependencies, in the order the inspector lists them.
    pub dependencies: Vec<String>,
}

impl VerificationReport {
    /// Return the dependencies not named in `allowed`.
    ///
    /// Names compare case-insensitively, matching how Windows resolves DLLs.
    /// An empty result means the artifact only depends on allowed libraries.
    ///
    /// # Examples
    ///
    /// ```
    /// use release_build::verify::VerificationReport;
    ///
    /// let report = VerificationReport {
    ///     artifact_path: "mp4decrypt.dll".into(),
    ///     dependencies: vec!["KERNEL32.dll".to_owned(), "VCRUNTIME140.dll".to_owned()],
    /// };
    /// let allowed = vec!["kernel32.dll".to_owned()];
    /// assert_eq!(report.unexpected(&allowed), ["VCRUNTIME140.dll"]);
    /// ```
    #[must_use]
    pub fn unexpected(&self, allowed: &[String]) -> Vec<&str> {
        self.dependencies
            .iter()
            .filter(|dep| !allowed.iter().any(|a| a.eq_ignore_ascii_case(dep)))
            .map(String::as_str)
            .collect()
    }
}

/// Runs the dependency inspector on artifacts.
pub struct Verifier<'a> {
    inspector: String,
    executor: &'a dyn CommandExecutor,
}

impl<'a> Verifier<'a> {
    /// Create a verifier that runs `inspector` through `executor`.
    #[must_use]
    pub fn new(inspector: impl Into<String>, executor: &'a dyn CommandExecutor) -> Self {
        Self {
            inspector: inspector.into(),
            executor,
        }
    }

    /// List the runtime dependencies of `artifact`.
    ///
    /// # Errors
    ///
    /// - [`ReleaseError::ArtifactNotFound`] if `artifact` is not a file.
    /// - [`ReleaseError::ToolMissing`] if the inspector cannot be started.
    /// - [`ReleaseError::VerificationFailed`] if it exits unsuccessfully.
    pub fn verify(&self, artifact: &Utf8Path) -> Result<VerificationReport> {
        if !artifact.is_file() {
            return Err(ReleaseError::ArtifactNotFound {
                path: artifact.to_owned(),
            });
        }

        let invocation = Invocation::new(self.inspector.as_str())
            .arg("-p")
            .arg(artifact.as_str());
        let output = self
            .executor
            .run(&invocation)
            .map_err(|source| ReleaseError::tool_missing(&self.inspector, source))?;

        if !output.status.success() {
            return Err(ReleaseError::VerificationFailed {
                path: artifact.to_owned(),
                diagnostics: combined_output(&output),
            });
        }

        let dependencies = parse_dependencies(&String::from_utf8_lossy(&output.stdout));
        log::debug!("{artifact}: {} runtime dependencies", dependencies.len());
        Ok(VerificationReport {
            artifact_path: artifact.to_owned(),
            dependencies,
        })
    }
}

const DYLIB_COMMANDS: &[&str] = &["LC_LOAD_DYLIB", "LC_LOAD_WEAK_DYLIB", "LC_REEXPORT_DYLIB"];

/// Extract dependency names from `llvm-objdump -p` output.
///
/// Duplicates are dropped; first occurrence wins.
#[must_use]
pub fn parse_dependencies(headers: &str) -> Vec<String> {
    let mut dependencies: Vec<String> = Vec::new();
    let mut in_dylib_command = false;

    for line in headers.lines().map(str::trim) {
        let found = if let Some(rest) = line.strip_prefix("NEEDED") {
            rest.split_whitespace().next()
        } else if let Some(rest) = line.strip_prefix("DLL Name:") {
            Some(rest.trim())
        } else if let Some(cmd) = line.strip_prefix("cmd ") {
            in_dylib_command = DYLIB_COMMANDS.contains(&cmd.trim());
            None
        } else if line.starts_with("Load command") {
            in_dylib_command = false;
            None
        } else if in_dylib_command {
            line.strip_prefix("name ").map(|rest| {
                in_dylib_command = false;
                rest.split(" (offset").next().unwrap_or(rest).trim()
            })
        } else {
            None
        };

        if let Some(name) = found.filter(|name| !name.is_empty()) {
            if !dependencies.iter().any(|d| d == name) {
                dependencies.push(name.to_owned());
            }
        }
    }
    dependencies
}
