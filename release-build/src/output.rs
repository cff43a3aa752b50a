//! Progress, summary, and dry-run output for the release CLI.

use crate::builder::{Builder, ProjectRef};
use crate::error::{ReleaseError, Result};
use crate::packaging::Packager;
use crate::pipeline::{PipelineReport, TargetState};
use crate::target::TargetDescriptor;
use crate::toolchain::ToolchainResolver;
use crate::version::ReleaseVersion;
use std::fmt::Display;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// The reporting stream for a run.
///
/// Informational lines are dropped in quiet mode; failures never are.
pub struct Progress<'a> {
    stderr: &'a mut dyn Write,
    quiet: bool,
}

impl<'a> Progress<'a> {
    /// Report to `stderr`.
    pub fn new(stderr: &'a mut dyn Write, quiet: bool) -> Self {
        Self { stderr, quiet }
    }

    /// Write an informational line.
    pub fn info(&mut self, message: impl Display) {
        if !self.quiet {
            write_stderr_line(self.stderr, message);
        }
    }

    /// Write a failure line.
    pub fn failure(&mut self, message: impl Display) {
        write_stderr_line(self.stderr, message);
    }
}

/// Format the end-of-run summary.
///
/// # Example
///
/// ```
/// use release_build::pipeline::{FailurePolicy, PipelineReport};
/// use release_build::output::summary_text;
/// use release_build::version::ReleaseVersion;
///
/// let report = PipelineReport {
///     version: ReleaseVersion::try_from("1.2.3").expect("valid"),
///     policy: FailurePolicy::HaltOnFirstFailure,
///     interrupted: false,
///     targets: Vec::new(),
/// };
/// assert!(summary_text(&report).contains("0 of 0"));
/// ```
#[must_use]
pub fn summary_text(report: &PipelineReport) -> String {
    let done = report.packages().count();
    let total = report.targets.len();
    let mut lines = vec![format!("Released {done} of {total} target(s)")];
    for run in &report.targets {
        let line = match &run.state {
            TargetState::Done { package } => format!("  ok       {}", package.output_archive),
            TargetState::Failed { during, .. } => {
                format!("  FAILED   {} (while {during})", run.target)
            }
            other => format!("  {:<8} {}", other.phase(), run.target),
        };
        lines.push(line);
    }
    if report.interrupted {
        lines.push("Run interrupted".to_owned());
    }
    lines.join("\n")
}

/// Write the report as pretty JSON.
///
/// # Errors
///
/// Returns [`ReleaseError::WriteFailed`] if `out` rejects the write.
pub fn write_json_report(out: &mut dyn Write, report: &PipelineReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|err| ReleaseError::WriteFailed { source: err.into() })?;
    writeln!(out, "{json}").map_err(|source| ReleaseError::WriteFailed { source })
}

/// What a dry run shows.
#[derive(Debug)]
pub struct DryRunInfo<'a> {
    /// Toolchain lookup.
    pub resolver: &'a ToolchainResolver,
    /// The project being released.
    pub project: &'a ProjectRef,
    /// Where archives would go.
    pub packager: &'a Packager,
    /// Release version.
    pub version: &'a ReleaseVersion,
    /// Archive base name.
    pub base_name: &'a str,
    /// Selected targets, in build order.
    pub targets: &'a [TargetDescriptor],
}

impl DryRunInfo<'_> {
    /// Format the plan without running anything.
    ///
    /// Targets whose toolchain is incomplete are listed with the reason.
    #[must_use]
    pub fn display_text(&self) -> String {
        let mut lines = vec![
            "Dry run - nothing will be built".to_owned(),
            String::new(),
            format!("Project root: {}", self.project.root),
            format!("Package: {}", self.project.package),
            format!("Version: {}", self.version),
            format!("Packages root: {}", self.resolver.packages_root()),
            format!("Output directory: {}", self.packager.output_dir()),
        ];

        let packager = self.packager;
        for target in self.targets {
            let archive = packager.archive_path(target, self.version, self.base_name);
            lines.push(String::new());
            lines.push(format!("{target}:"));
            lines.push(format!("  archive: {archive}"));
            match self.resolver.resolve(target) {
                Ok(toolchain) => {
                    let invocation = Builder::invocation(target, &toolchain, self.project);
                    lines.push(format!("  command: {invocation}"));
                    for dir in &invocation.path_prepend {
                        lines.push(format!("  path:    {dir}"));
                    }
                    for (key, value) in &invocation.envs {
                        lines.push(format!("  env:     {key}={value}"));
                    }
                }
                Err(err) => lines.push(format!("  unavailable: {err}")),
            }
        }

        lines.join("\n")
    }
}
