//! Cargo build invocation for one release target.
//!
//! The builder turns a target, its resolved [`ToolchainEnv`], and the project
//! description into a single `cargo` invocation, runs it through a
//! [`CommandExecutor`], and reports where the artifact should have landed.

use crate::config::TargetOverrides;
use crate::error::{ReleaseError, Result};
use crate::exec::{CommandExecutor, Invocation, combined_output};
use crate::target::{Os, TargetDescriptor};
use crate::toolchain::ToolchainEnv;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the release package contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// A `cdylib` (`libfoo.so`, `libfoo.dylib`, `foo.dll`).
    #[default]
    SharedLibrary,
    /// A binary (`foo`, `foo.exe`).
    Executable,
}

impl ArtifactKind {
    /// Return the default artifact stem for a package.
    ///
    /// Cargo names library outputs after the crate name, with dashes
    /// replaced by underscores; binaries keep the package name.
    #[must_use]
    pub fn default_stem(self, package: &str) -> String {
        match self {
            Self::SharedLibrary => package.replace('-', "_"),
            Self::Executable => package.to_owned(),
        }
    }

    /// Return the `crt-static` target feature a linux build of this kind
    /// needs.
    ///
    /// musl only emits a `cdylib` against a dynamic C runtime; binaries link
    /// it statically.
    #[must_use]
    pub const fn crt_static_feature(self) -> &'static str {
        match self {
            Self::SharedLibrary => "-crt-static",
            Self::Executable => "+crt-static",
        }
    }
}

/// The project being released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef {
    /// Directory cargo runs in.
    pub root: Utf8PathBuf,
    /// Cargo package to build (`-p`).
    pub package: String,
    /// Artifact stem, without prefix or extension.
    pub artifact_name: String,
    /// Library or executable.
    pub artifact_kind: ArtifactKind,
    /// Cargo target directory.
    pub target_dir: Utf8PathBuf,
    /// Features enabled for every target.
    pub features: Vec<String>,
    /// Pass `--no-default-features`.
    pub no_default_features: bool,
    /// Build environment for every target.
    pub env: BTreeMap<String, String>,
    /// Per-target additions, keyed by triple.
    pub target_overrides: BTreeMap<String, TargetOverrides>,
}

impl ProjectRef {
    /// Create a project that builds `package` as a shared library.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>, package: &str) -> Self {
        let root = root.into();
        Self {
            target_dir: root.join("target"),
            root,
            package: package.to_owned(),
            artifact_name: ArtifactKind::SharedLibrary.default_stem(package),
            artifact_kind: ArtifactKind::SharedLibrary,
            features: Vec::new(),
            no_default_features: false,
            env: BTreeMap::new(),
            target_overrides: BTreeMap::new(),
        }
    }

    /// Return the features for `target`: project-wide, then the target's own,
    /// then configured per-target ones, without duplicates.
    #[must_use]
    pub fn features_for(&self, target: &TargetDescriptor) -> Vec<String> {
        let overrides = self
            .target_overrides
            .get(target.triple)
            .map(|o| o.features.as_slice())
            .unwrap_or_default();
        let mut features: Vec<String> = Vec::new();
        let all = self
            .features
            .iter()
            .map(String::as_str)
            .chain(target.features.iter().copied())
            .chain(overrides.iter().map(String::as_str));
        for feature in all {
            if !features.iter().any(|f| f == feature) {
                features.push(feature.to_owned());
            }
        }
        features
    }

    /// Return the artifact filename for `target`.
    ///
    /// # Examples
    ///
    /// ```
    /// use release_build::builder::ProjectRef;
    /// use release_build::target::find_target;
    ///
    /// let project = ProjectRef::new("/src/bento4", "mp4decrypt");
    /// let windows = find_target("x86_64-pc-windows-msvc").expect("registered");
    /// let linux = find_target("x86_64-unknown-linux-musl").expect("registered");
    /// assert_eq!(project.artifact_file_name(&windows), "mp4decrypt.dll");
    /// assert_eq!(project.artifact_file_name(&linux), "libmp4decrypt.so");
    /// ```
    #[must_use]
    pub fn artifact_file_name(&self, target: &TargetDescriptor) -> String {
        match self.artifact_kind {
            ArtifactKind::SharedLibrary => format!(
                "{}{}{}",
                target.library_prefix(),
                self.artifact_name,
                target.library_extension()
            ),
            ArtifactKind::Executable => {
                format!("{}{}", self.artifact_name, target.executable_suffix())
            }
        }
    }

    /// Return where cargo writes the release artifact for `target`.
    #[must_use]
    pub fn artifact_path(&self, target: &TargetDescriptor) -> Utf8PathBuf {
        self.target_dir
            .join(target.triple)
            .join("release")
            .join(self.artifact_file_name(target))
    }

    fn build_env(
        &self,
        target: &TargetDescriptor,
        toolchain: &ToolchainEnv,
    ) -> BTreeMap<String, String> {
        let mut env = self.env.clone();
        if let Some(overrides) = self.target_overrides.get(target.triple) {
            env.extend(overrides.env.clone());
        }
        let mut toolchain = toolchain.clone();
        if target.os == Os::Linux {
            toolchain.linker_flags.extend([
                "-C".to_owned(),
                format!("target-feature={}", self.artifact_kind.crt_static_feature()),
            ]);
        }
        for (key, value) in toolchain.build_vars(target) {
            if let Some(previous) = env.get(&key).filter(|previous| **previous != value) {
                log::warn!(
                    "{target}: toolchain sets {key}={value}, replacing configured {previous}"
                );
            }
            env.insert(key, value);
        }
        env.insert("CARGO_TARGET_DIR".to_owned(), self.target_dir.to_string());
        env
    }
}

/// Outcome of one build invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// Target that was built.
    pub target: TargetDescriptor,
    /// Where the artifact is expected.
    pub artifact_path: Utf8PathBuf,
    /// Whether the build tool exited successfully.
    pub succeeded: bool,
    /// Captured build tool output.
    pub diagnostics: String,
}

impl BuildResult {
    /// Return the artifact path of a successful build.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::BuildFailed`] if the build tool failed, or
    /// [`ReleaseError::ArtifactNotFound`] if it succeeded without producing
    /// the expected file.
    pub fn into_artifact(self) -> Result<Utf8PathBuf> {
        if !self.succeeded {
            return Err(ReleaseError::BuildFailed {
                triple: self.target.triple.to_owned(),
                diagnostics: self.diagnostics,
            });
        }
        if !self.artifact_path.is_file() {
            return Err(ReleaseError::ArtifactNotFound {
                path: self.artifact_path,
            });
        }
        Ok(self.artifact_path)
    }
}

/// Runs cargo builds through an injected executor.
pub struct Builder<'a> {
    executor: &'a dyn CommandExecutor,
}

impl<'a> Builder<'a> {
    /// Create a builder that runs commands through `executor`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self { executor }
    }

    /// Return the invocation that builds `target`.
    #[must_use]
    pub fn invocation(
        target: &TargetDescriptor,
        toolchain: &ToolchainEnv,
        project: &ProjectRef,
    ) -> Invocation {
        let mut invocation = Invocation::new("cargo")
            .args(toolchain.driver.subcommand().iter().copied())
            .args(["--release", "--target", target.triple])
            .args(["-p", project.package.as_str()])
            .current_dir(&project.root);

        let features = project.features_for(target);
        if !features.is_empty() {
            invocation = invocation.arg("--features").arg(features.join(","));
        }
        if project.no_default_features {
            invocation = invocation.arg("--no-default-features");
        }

        invocation.path_prepend.clone_from(&toolchain.path_prepend);
        invocation.envs = project.build_env(target, toolchain);
        invocation
    }

    /// Build `project` for `target`.
    ///
    /// A build tool that runs and fails yields `succeeded == false` with its
    /// output as diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::ToolMissing`] if cargo could not be started.
    pub fn build(
        &self,
        target: &TargetDescriptor,
        toolchain: &ToolchainEnv,
        project: &ProjectRef,
    ) -> Result<BuildResult> {
        let invocation = Self::invocation(target, toolchain, project);
        log::info!("{target}: {invocation}");

        let output = self
            .executor
            .run(&invocation)
            .map_err(|source| ReleaseError::tool_missing(&invocation.program, source))?;

        let succeeded = output.status.success();
        if !succeeded {
            log::debug!("{target}: build exited with {}", output.status);
        }

        Ok(BuildResult {
            target: *target,
            artifact_path: project.artifact_path(target),
            succeeded,
            diagnostics: combined_output(&output),
        })
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
