//! Release configuration loading and run settings resolution.
//!
//! Settings come from three layers, highest precedence first: command-line
//! flags, an optional `release.toml`, and the built-in defaults below. The
//! defaults reproduce the fixed values a release host is provisioned with, so
//! a bare `release-build` invocation needs no flags at all.

use crate::builder::{ArtifactKind, ProjectRef};
use crate::error::{ReleaseError, Result};
use crate::pipeline::FailurePolicy;
use crate::target::{TargetError, find_target};
use crate::toolchain::{LinuxStrategy, ToolchainSettings};
use crate::version::ReleaseVersion;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Name of the configuration file looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "release.toml";

/// Well-known location of provisioned cross toolchains.
pub const DEFAULT_PACKAGES_ROOT: &str = "/packages";

/// Release directory used when none is configured, relative to the project.
pub const DEFAULT_OUTPUT_DIR: &str = "release";

/// Package and archive base name used when none is configured.
pub const DEFAULT_PACKAGE: &str = "mp4decrypt";

/// Inspector used to list an artifact's dynamic dependencies.
pub const DEFAULT_INSPECTOR: &str = "llvm-objdump";

/// Why a configuration file was rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read file: {0}")]
    Read(#[from] std::io::Error),
    /// The text is not TOML, or does not match the expected keys and types.
    #[error(transparent)]
    Syntax(#[from] toml::de::Error),
    /// A `[targets]` table names a triple the registry does not know.
    #[error("in [targets]: {0}")]
    Target(#[from] TargetError),
}

/// Per-target overrides from a `[targets."<triple>"]` table.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TargetOverrides {
    /// Extra cargo features for this target.
    pub features: Vec<String>,
    /// Extra build environment for this target.
    pub env: BTreeMap<String, String>,
}

/// Contents of `release.toml`.
///
/// Every key is optional.
///
/// # Examples
///
/// ```
/// use release_build::config::ReleaseConfig;
///
/// let config = ReleaseConfig::parse(r#"
///     version = "1.2.3"
///     features = ["vendored"]
///
///     [targets."x86_64-unknown-linux-musl".env]
///     X86_64_UNKNOWN_LINUX_MUSL_BENTO4_DIR = "/packages/bento4-musl"
/// "#).expect("valid config");
/// assert_eq!(config.version.as_deref(), Some("1.2.3"));
/// ```
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseConfig {
    /// Release version stamped into archive names.
    pub version: Option<String>,
    /// Archive base name.
    pub base_name: Option<String>,
    /// Cargo package to build.
    pub package: Option<String>,
    /// Kind of artifact the package produces.
    pub artifact_kind: ArtifactKind,
    /// Artifact stem when it differs from the package name.
    pub artifact_name: Option<String>,
    /// Root directory of provisioned toolchains.
    pub packages_root: Option<Utf8PathBuf>,
    /// Release directory.
    pub output_dir: Option<Utf8PathBuf>,
    /// Cargo target directory.
    pub target_dir: Option<Utf8PathBuf>,
    /// Whether one failing target stops the run.
    pub failure_policy: FailurePolicy,
    /// osxcross SDK version embedded in darwin tool names.
    pub darwin_sdk_version: Option<String>,
    /// Android API level for NDK compiler selection.
    pub android_api_level: Option<u32>,
    /// How linux targets are built.
    pub linux_strategy: LinuxStrategy,
    /// Program used to list dynamic dependencies.
    pub inspector: Option<String>,
    /// Cargo features enabled for every target.
    pub features: Vec<String>,
    /// Pass `--no-default-features` to every build.
    pub no_default_features: bool,
    /// Build environment applied to every target.
    pub env: BTreeMap<String, String>,
    /// Dependencies an artifact is expected to declare (advisory).
    pub expected_dependencies: Option<Vec<String>>,
    /// Per-target overrides keyed by triple.
    pub targets: BTreeMap<String, TargetOverrides>,
}

impl ReleaseConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Syntax`] if the text is malformed or has unknown
    /// keys, and [`ConfigError::Target`] if it names an unregistered triple
    /// under `[targets]`.
    pub fn parse(contents: &str) -> std::result::Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        for triple in config.targets.keys() {
            find_target(triple)?;
        }
        Ok(config)
    }

    /// Load configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::InvalidConfig`] if the file cannot be read or
    /// parsed.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        Self::read(path).map_err(|source| ReleaseError::InvalidConfig {
            path: path.to_owned(),
            source,
        })
    }

    fn read(path: &Utf8Path) -> std::result::Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load the explicit config file, or `release.toml` in `project_root`
    /// when present, or fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::InvalidConfig`] if a file that should be read
    /// cannot be read or parsed.
    pub fn discover(explicit: Option<&Utf8Path>, project_root: &Utf8Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = project_root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            log::debug!("loading configuration from {candidate}");
            Self::load(&candidate)
        } else {
            log::debug!("no {CONFIG_FILE_NAME} in {project_root}; using defaults");
            Ok(Self::default())
        }
    }
}

/// Values supplied on the command line, each overriding the config file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    /// `--version`.
    pub version: Option<String>,
    /// `--packages-root`.
    pub packages_root: Option<Utf8PathBuf>,
    /// `--output-dir`.
    pub output_dir: Option<Utf8PathBuf>,
    /// `--continue-on-failure`.
    pub continue_on_failure: bool,
}

/// Fully resolved settings for one pipeline run.
#[derive(Clone, Debug)]
pub struct RunSettings {
    /// The project being released.
    pub project: ProjectRef,
    /// Release version.
    pub version: ReleaseVersion,
    /// Archive base name.
    pub base_name: String,
    /// Root directory of provisioned toolchains.
    pub packages_root: Utf8PathBuf,
    /// Release directory.
    pub output_dir: Utf8PathBuf,
    /// Failure policy.
    pub policy: FailurePolicy,
    /// Toolchain resolution knobs.
    pub toolchain: ToolchainSettings,
    /// Dependency inspector program.
    pub inspector: String,
    /// Advisory dependency allowlist.
    pub expected_dependencies: Option<Vec<String>>,
}

impl RunSettings {
    /// Resolve settings for `project_root` from the config and overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::InvalidVersion`] if no usable version is
    /// configured or found in the project's `Cargo.toml`.
    pub fn resolve(
        project_root: &Utf8Path,
        config: ReleaseConfig,
        overrides: Overrides,
    ) -> Result<Self> {
        let manifest = project_root.join("Cargo.toml");
        let version = overrides
            .version
            .or(config.version)
            .or_else(|| read_package_version(project_root))
            .ok_or_else(|| ReleaseError::InvalidVersion {
                value: String::new(),
                reason: format!("not set by --version, {CONFIG_FILE_NAME} or {manifest}"),
            })?;
        let version = ReleaseVersion::try_from(version)?;

        let package = config.package.unwrap_or_else(|| DEFAULT_PACKAGE.to_owned());
        let base_name = config.base_name.unwrap_or_else(|| package.clone());
        let artifact_name = config
            .artifact_name
            .unwrap_or_else(|| config.artifact_kind.default_stem(&package));

        let policy = if overrides.continue_on_failure {
            FailurePolicy::ContinueOnFailure
        } else {
            config.failure_policy
        };

        let mut toolchain = ToolchainSettings {
            linux_strategy: config.linux_strategy,
            ..ToolchainSettings::default()
        };
        if let Some(sdk) = config.darwin_sdk_version {
            toolchain.darwin_sdk_version = sdk;
        }
        if let Some(api) = config.android_api_level {
            toolchain.android_api_level = api;
        }

        let target_dir = config.target_dir.unwrap_or_else(|| "target".into());
        let project = ProjectRef {
            root: project_root.to_owned(),
            package,
            artifact_name,
            artifact_kind: config.artifact_kind,
            target_dir: relative_to(project_root, target_dir),
            features: config.features,
            no_default_features: config.no_default_features,
            env: config.env,
            target_overrides: config.targets,
        };

        Ok(Self {
            project,
            version,
            base_name,
            packages_root: overrides
                .packages_root
                .or(config.packages_root)
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_PACKAGES_ROOT)),
            output_dir: relative_to(
                project_root,
                overrides
                    .output_dir
                    .or(config.output_dir)
                    .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUTPUT_DIR)),
            ),
            policy,
            toolchain,
            inspector: config
                .inspector
                .unwrap_or_else(|| DEFAULT_INSPECTOR.to_owned()),
            expected_dependencies: config.expected_dependencies,
        })
    }
}

fn relative_to(root: &Utf8Path, path: Utf8PathBuf) -> Utf8PathBuf {
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

/// Read `package.version` from the project's `Cargo.toml`.
///
/// Falls back to `workspace.package.version` when the package inherits its
/// version from the workspace.
#[must_use]
pub fn read_package_version(project_root: &Utf8Path) -> Option<String> {
    let contents = std::fs::read_to_string(project_root.join("Cargo.toml")).ok()?;
    let table = contents.parse::<toml::Table>().ok()?;
    let direct = table
        .get("package")
        .and_then(|p| p.get("version"))
        .and_then(toml::Value::as_str);
    let inherited = || {
        table
            .get("workspace")
            .and_then(|w| w.get("package"))
            .and_then(|p| p.get("version"))
            .and_then(toml::Value::as_str)
    };
    direct.or_else(inherited).map(str::to_owned)
}
