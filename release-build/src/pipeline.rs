//! Release pipeline driver.
//!
//! Each selected target walks `Pending → Resolving → Building → Verifying →
//! Packaging → Done`, or stops in `Failed` with the phase it failed in.
//! Targets run one at a time in registry order. Every transition is kept in
//! the target's history and reported as it happens. Failures are contained to
//! their target; the [`FailurePolicy`] decides whether later targets run.

use crate::builder::{Builder, ProjectRef};
use crate::cancel::CancellationToken;
use crate::error::{ReleaseError, Result};
use crate::exec::CommandExecutor;
use crate::output::Progress;
use crate::packaging::{PackageRecord, Packager};
use crate::target::TargetDescriptor;
use crate::toolchain::ToolchainResolver;
use crate::verify::{VerificationReport, Verifier};
use crate::version::ReleaseVersion;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happens to the remaining targets after one fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum FailurePolicy {
    /// Stop; remaining targets stay `Pending`.
    #[default]
    #[serde(rename = "halt")]
    HaltOnFirstFailure,
    /// Attempt every target regardless.
    #[serde(rename = "continue")]
    ContinueOnFailure,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HaltOnFirstFailure => "halt",
            Self::ContinueOnFailure => "continue",
        })
    }
}

/// A step of the per-target state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Not started.
    Pending,
    /// Locating the toolchain.
    Resolving,
    /// Running the build tool.
    Building,
    /// Inspecting the artifact's dependencies.
    Verifying,
    /// Writing the release archive.
    Packaging,
    /// Archive written.
    Done,
    /// Stopped by an error.
    Failed,
}

impl Phase {
    /// Return the lowercase phase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolving => "resolving",
            Self::Building => "building",
            Self::Verifying => "verifying",
            Self::Packaging => "packaging",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TargetState {
    /// Not started.
    Pending,
    /// Locating the toolchain.
    Resolving,
    /// Running the build tool.
    Building,
    /// Inspecting the artifact.
    Verifying,
    /// Writing the archive.
    Packaging,
    /// Finished with an archive.
    Done {
        /// The written archive.
        package: PackageRecord,
    },
    /// Stopped by an error.
    Failed {
        /// The phase the target was in when it failed.
        during: Phase,
        /// Error message, including captured diagnostics.
        reason: String,
    },
}

impl TargetState {
    /// Return the phase this state belongs to.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::Pending => Phase::Pending,
            Self::Resolving => Phase::Resolving,
            Self::Building => Phase::Building,
            Self::Verifying => Phase::Verifying,
            Self::Packaging => Phase::Packaging,
            Self::Done { .. } => Phase::Done,
            Self::Failed { .. } => Phase::Failed,
        }
    }

    /// Whether no further transition can happen.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Failed { .. })
    }
}

/// The record of one target's run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetRun {
    /// The target.
    pub target: TargetDescriptor,
    /// Where it ended up.
    #[serde(flatten)]
    pub state: TargetState,
    /// Every phase entered, in order, starting with `Pending`.
    pub history: Vec<Phase>,
    /// Dependency listing, once verification has run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationReport>,
    /// Dependencies outside the configured allowlist.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unexpected_dependencies: Vec<String>,
}

impl TargetRun {
    fn new(target: TargetDescriptor) -> Self {
        Self {
            target,
            state: TargetState::Pending,
            history: vec![Phase::Pending],
            verification: None,
            unexpected_dependencies: Vec::new(),
        }
    }

    fn enter(&mut self, next: TargetState, progress: &mut Progress<'_>) {
        debug_assert!(!self.state.is_terminal(), "state is already terminal");
        let target = self.target;
        let phase = next.phase();
        match &next {
            TargetState::Done { package } => {
                let archive = &package.output_archive;
                let sha256 = &package.sha256;
                progress.info(format!("[{target}] done: {archive} (sha256 {sha256})"));
            }
            TargetState::Failed { during, reason } => {
                progress.failure(format!("[{target}] failed while {during}: {reason}"));
            }
            _ => progress.info(format!("[{target}] {phase}")),
        }
        self.history.push(phase);
        self.state = next;
    }

    /// Return the archive if the target finished.
    #[must_use]
    pub const fn package(&self) -> Option<&PackageRecord> {
        match &self.state {
            TargetState::Done { package } => Some(package),
            _ => None,
        }
    }

    /// Whether the target failed.
    #[must_use]
    pub const fn failed(&self) -> bool {
        matches!(self.state, TargetState::Failed { .. })
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// Release version used for archive names.
    pub version: ReleaseVersion,
    /// Failure policy in effect.
    pub policy: FailurePolicy,
    /// Whether the run was interrupted.
    pub interrupted: bool,
    /// One entry per selected target, in build order.
    pub targets: Vec<TargetRun>,
}

impl PipelineReport {
    /// Return the written archives, in build order.
    pub fn packages(&self) -> impl Iterator<Item = &PackageRecord> {
        self.targets.iter().filter_map(TargetRun::package)
    }

    /// Return the targets that failed.
    pub fn failures(&self) -> impl Iterator<Item = &TargetRun> {
        self.targets.iter().filter(|run| run.failed())
    }

    /// Whether every selected target finished with an archive.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.targets.iter().all(|run| run.package().is_some())
    }

    /// Return the process exit code: `0` when every target is done, else `1`.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.succeeded())
    }
}

/// Everything the driver needs besides the target list.
pub struct PipelineContext<'a> {
    /// Toolchain lookup below the packages root.
    pub resolver: &'a ToolchainResolver,
    /// Runs cargo and the inspector.
    pub executor: &'a dyn CommandExecutor,
    /// The project being released.
    pub project: &'a ProjectRef,
    /// Writes archives into the release directory.
    pub packager: &'a Packager,
    /// Release version.
    pub version: &'a ReleaseVersion,
    /// Archive base name.
    pub base_name: &'a str,
    /// Dependency inspector program.
    pub inspector: &'a str,
    /// Advisory dependency allowlist.
    pub expected_dependencies: Option<&'a [String]>,
    /// What to do after a failure.
    pub policy: FailurePolicy,
    /// Interrupt flag.
    pub cancel: &'a CancellationToken,
}

/// Run every target in `targets`, in order.
///
/// Per-target errors never escape; they are recorded in the returned report.
pub fn run_pipeline(
    context: &PipelineContext<'_>,
    targets: &[TargetDescriptor],
    progress: &mut Progress<'_>,
) -> PipelineReport {
    progress.info(format!(
        "Releasing {} {} for {} target(s)",
        context.base_name,
        context.version,
        targets.len()
    ));

    let mut runs: Vec<TargetRun> = targets.iter().copied().map(TargetRun::new).collect();
    let mut interrupted = false;

    for run in &mut runs {
        match run_target(context, run, progress) {
            Ok(package) => run.enter(TargetState::Done { package }, progress),
            Err(err) => {
                interrupted = matches!(err, ReleaseError::Interrupted);
                let during = run.state.phase();
                run.enter(
                    TargetState::Failed {
                        during,
                        reason: err.to_string(),
                    },
                    progress,
                );
                if interrupted || context.policy == FailurePolicy::HaltOnFirstFailure {
                    break;
                }
            }
        }
    }

    PipelineReport {
        version: context.version.clone(),
        policy: context.policy,
        interrupted,
        targets: runs,
    }
}

fn run_target(
    context: &PipelineContext<'_>,
    run: &mut TargetRun,
    progress: &mut Progress<'_>,
) -> Result<PackageRecord> {
    let target = run.target;
    if context.cancel.is_cancelled() {
        return Err(ReleaseError::Interrupted);
    }

    run.enter(TargetState::Resolving, progress);
    let toolchain = context.resolver.resolve(&target)?;

    run.enter(TargetState::Building, progress);
    let build = Builder::new(context.executor).build(&target, &toolchain, context.project)?;
    if context.cancel.is_cancelled() {
        return Err(ReleaseError::Interrupted);
    }
    let artifact = build.into_artifact()?;

    run.enter(TargetState::Verifying, progress);
    let report = Verifier::new(context.inspector, context.executor).verify(&artifact)?;
    if let Some(allowed) = context.expected_dependencies {
        run.unexpected_dependencies = report
            .unexpected(allowed)
            .into_iter()
            .map(str::to_owned)
            .collect();
        if !run.unexpected_dependencies.is_empty() {
            progress.info(format!(
                "[{target}] warning: unexpected runtime dependencies: {}",
                run.unexpected_dependencies.join(", ")
            ));
        }
    }
    run.verification = Some(report);

    run.enter(TargetState::Packaging, progress);
    context
        .packager
        .package(&artifact, &target, context.version, context.base_name)
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
