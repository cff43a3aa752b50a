//! Per-target toolchain resolution.
//!
//! [`ToolchainResolver::resolve`] maps a [`TargetDescriptor`] to a
//! self-contained [`ToolchainEnv`]: the build driver to run, directories to
//! put on the child's search path, compiler/archiver/linker paths, and the
//! variables the build tool reads. Resolution only inspects the filesystem;
//! it never reads or writes the process environment, so every target gets a
//! fresh value with nothing carried over from the previous one.

use crate::error::{ReleaseError, Result};
use crate::target::{Os, TargetDescriptor};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How linux targets are compiled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinuxStrategy {
    /// Plain `cargo build` with the host toolchain.
    #[default]
    Host,
    /// `cargo zigbuild`, using zig as the cross linker.
    Zigbuild,
}

/// Knobs that select tool names inside the packages root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainSettings {
    /// osxcross SDK version embedded in darwin tool names.
    pub darwin_sdk_version: String,
    /// Android API level embedded in NDK compiler names.
    pub android_api_level: u32,
    /// How linux targets are compiled.
    pub linux_strategy: LinuxStrategy,
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            darwin_sdk_version: "21.4".to_owned(),
            android_api_level: 24,
            linux_strategy: LinuxStrategy::Host,
        }
    }
}

/// The cargo front end that drives a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildDriver {
    /// `cargo build`.
    Cargo,
    /// `cargo xwin build`, which supplies the MSVC CRT and SDK.
    Xwin,
    /// `cargo zigbuild`.
    Zigbuild,
}

impl BuildDriver {
    /// Return the cargo subcommand words for this driver.
    #[must_use]
    pub const fn subcommand(self) -> &'static [&'static str] {
        match self {
            Self::Cargo => &["build"],
            Self::Xwin => &["xwin", "build"],
            Self::Zigbuild => &["zigbuild"],
        }
    }
}

impl fmt::Display for BuildDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cargo {}", self.subcommand().join(" "))
    }
}

/// The resolved build environment for one target.
///
/// `None` tool entries mean the build tool's host default is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainEnv {
    /// Cargo front end to invoke.
    pub driver: BuildDriver,
    /// Directories searched before the inherited `PATH`, in order.
    pub path_prepend: Vec<Utf8PathBuf>,
    /// Static archiver.
    pub archiver: Option<Utf8PathBuf>,
    /// C compiler.
    pub c_compiler: Option<Utf8PathBuf>,
    /// C++ compiler.
    pub cxx_compiler: Option<Utf8PathBuf>,
    /// Linker used by rustc for the final artifact.
    pub linker: Option<Utf8PathBuf>,
    /// Wrapper executable backing the driver, when it is not plain cargo.
    pub wrapper: Option<Utf8PathBuf>,
    /// Extra rustc flags for this target, in order.
    pub linker_flags: Vec<String>,
    /// Additional variables for the build tool.
    pub extra_vars: BTreeMap<String, String>,
}

impl ToolchainEnv {
    pub(crate) fn host(driver: BuildDriver) -> Self {
        Self {
            driver,
            path_prepend: Vec::new(),
            archiver: None,
            c_compiler: None,
            cxx_compiler: None,
            linker: None,
            wrapper: None,
            linker_flags: Vec::new(),
            extra_vars: BTreeMap::new(),
        }
    }

    /// Return every tool path this environment declares, with its role.
    #[must_use]
    pub fn declared_tools(&self) -> Vec<(&'static str, &Utf8Path)> {
        [
            ("archiver", self.archiver.as_deref()),
            ("C compiler", self.c_compiler.as_deref()),
            ("C++ compiler", self.cxx_compiler.as_deref()),
            ("linker", self.linker.as_deref()),
            ("build wrapper", self.wrapper.as_deref()),
        ]
        .into_iter()
        .filter_map(|(role, path)| path.map(|p| (role, p)))
        .collect()
    }

    /// Return the variables the build tool reads for `target`.
    ///
    /// Uses the `cc` crate's per-target names (`CC_<t>`, `CXX_<t>`, `AR_<t>`)
    /// and cargo's `CARGO_TARGET_<T>_LINKER` / `_RUSTFLAGS`, so nothing
    /// leaks into host-side build scripts.
    #[must_use]
    pub fn build_vars(&self, target: &TargetDescriptor) -> BTreeMap<String, String> {
        let suffix = target.cc_env_suffix();
        let key = target.cargo_env_key();
        let mut vars = BTreeMap::new();

        let tools = [
            (format!("CC_{suffix}"), &self.c_compiler),
            (format!("CXX_{suffix}"), &self.cxx_compiler),
            (format!("AR_{suffix}"), &self.archiver),
            (format!("CARGO_TARGET_{key}_LINKER"), &self.linker),
        ];
        for (name, path) in tools {
            if let Some(path) = path {
                vars.insert(name, path.to_string());
            }
        }
        if !self.linker_flags.is_empty() {
            vars.insert(
                format!("CARGO_TARGET_{key}_RUSTFLAGS"),
                self.linker_flags.join(" "),
            );
        }
        vars.extend(self.extra_vars.clone());
        vars
    }
}

/// NDK prebuilt host directory for the machine running the pipeline.
#[cfg(target_os = "macos")]
const NDK_HOST_TAG: &str = "darwin-x86_64";
#[cfg(target_os = "windows")]
const NDK_HOST_TAG: &str = "windows-x86_64";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const NDK_HOST_TAG: &str = "linux-x86_64";

/// Executable suffix of wrapper binaries on the host.
const HOST_EXE_SUFFIX: &str = std::env::consts::EXE_SUFFIX;

/// Resolves toolchains below a fixed packages root.
#[derive(Debug, Clone)]
pub struct ToolchainResolver {
    packages_root: Utf8PathBuf,
    settings: ToolchainSettings,
    search_path: Vec<Utf8PathBuf>,
}

impl ToolchainResolver {
    /// Create a resolver rooted at `packages_root`.
    ///
    /// Build wrappers are only looked up in `<packages_root>/bin` until a
    /// search path is supplied with [`Self::with_search_path`].
    #[must_use]
    pub fn new(packages_root: impl Into<Utf8PathBuf>, settings: ToolchainSettings) -> Self {
        Self {
            packages_root: packages_root.into(),
            settings,
            search_path: Vec::new(),
        }
    }

    /// Also look for build wrappers in `dirs`, after `<packages_root>/bin`.
    #[must_use]
    pub fn with_search_path(mut self, dirs: Vec<Utf8PathBuf>) -> Self {
        self.search_path = dirs;
        self
    }

    /// Return the packages root.
    #[must_use]
    pub fn packages_root(&self) -> &Utf8Path {
        &self.packages_root
    }

    /// Resolve the toolchain for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::ToolchainNotFound`] naming the first required
    /// tool that does not exist.
    pub fn resolve(&self, target: &TargetDescriptor) -> Result<ToolchainEnv> {
        let env = match target.os {
            Os::Darwin => self.resolve_darwin(target)?,
            Os::Linux => self.resolve_linux(target)?,
            Os::Windows => self.resolve_windows(target)?,
            Os::Android => self.resolve_android(target)?,
        };
        log::debug!(
            "{target}: {} with {} declared tool(s)",
            env.driver,
            env.declared_tools().len()
        );
        Ok(env)
    }

    fn resolve_darwin(&self, target: &TargetDescriptor) -> Result<ToolchainEnv> {
        let bin = self.packages_root.join("osxcross/target/bin");
        let sdk = &self.settings.darwin_sdk_version;
        let prefix = format!("{}-apple-darwin{sdk}", target.arch);
        let tool = |name: &str| bin.join(format!("{prefix}-{name}"));
        let clang = require(target, "C compiler", tool("clang"))?;
        let clangxx = require(target, "C++ compiler", tool("clang++"))?;
        let ar = require(target, "archiver", tool("ar"))?;

        let mut env = ToolchainEnv::host(BuildDriver::Cargo);
        env.path_prepend.push(bin);
        env.linker = Some(clang.clone());
        env.c_compiler = Some(clang);
        env.cxx_compiler = Some(clangxx);
        env.archiver = Some(ar);
        // Stop cc-rs from adding host flags that fight the osxcross sysroot.
        env.extra_vars.insert("CRATE_CC_NO_DEFAULTS".to_owned(), "1".to_owned());
        Ok(env)
    }

    fn resolve_linux(&self, target: &TargetDescriptor) -> Result<ToolchainEnv> {
        match self.settings.linux_strategy {
            LinuxStrategy::Host => Ok(ToolchainEnv::host(BuildDriver::Cargo)),
            LinuxStrategy::Zigbuild => {
                let zig_dir = self.packages_root.join("zig");
                require(target, "zig", zig_dir.join(format!("zig{HOST_EXE_SUFFIX}")))?;
                let wrapper = self.find_wrapper(target, "cargo-zigbuild")?;
                let mut env = ToolchainEnv::host(BuildDriver::Zigbuild);
                env.path_prepend.push(zig_dir);
                push_parent(&mut env.path_prepend, &wrapper);
                env.wrapper = Some(wrapper);
                Ok(env)
            }
        }
    }

    fn resolve_windows(&self, target: &TargetDescriptor) -> Result<ToolchainEnv> {
        let wrapper = self.find_wrapper(target, "cargo-xwin")?;
        let mut env = ToolchainEnv::host(BuildDriver::Xwin);
        push_parent(&mut env.path_prepend, &wrapper);
        env.wrapper = Some(wrapper);
        Ok(env)
    }

    fn resolve_android(&self, target: &TargetDescriptor) -> Result<ToolchainEnv> {
        let ndk = self.packages_root.join("android-ndk");
        let bin = ndk
            .join("toolchains")
            .join("llvm")
            .join("prebuilt")
            .join(NDK_HOST_TAG)
            .join("bin");
        let prefix = format!("{}{}", target.triple, self.settings.android_api_level);
        let tool = |name: &str| bin.join(format!("{prefix}-{name}"));
        let clang = require(target, "C compiler", tool("clang"))?;
        let clangxx = require(target, "C++ compiler", tool("clang++"))?;
        let ar = require(target, "archiver", bin.join("llvm-ar"))?;

        let mut env = ToolchainEnv::host(BuildDriver::Cargo);
        env.path_prepend.push(bin);
        env.linker = Some(clang.clone());
        env.c_compiler = Some(clang);
        env.cxx_compiler = Some(clangxx);
        env.archiver = Some(ar);
        env.extra_vars.insert("ANDROID_NDK_ROOT".to_owned(), ndk.to_string());
        Ok(env)
    }

    /// Locate a cargo wrapper in `<packages_root>/bin`, then on the search path.
    fn find_wrapper(&self, target: &TargetDescriptor, name: &str) -> Result<Utf8PathBuf> {
        let file_name = format!("{name}{HOST_EXE_SUFFIX}");
        let preferred = self.packages_root.join("bin").join(&file_name);
        std::iter::once(preferred.clone())
            .chain(self.search_path.iter().map(|dir| dir.join(&file_name)))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| ReleaseError::ToolchainNotFound {
                triple: target.triple.to_owned(),
                tool: "build wrapper",
                path: preferred,
            })
    }
}

fn require(
    target: &TargetDescriptor,
    tool: &'static str,
    path: Utf8PathBuf,
) -> Result<Utf8PathBuf> {
    if path.exists() {
        Ok(path)
    } else {
        Err(ReleaseError::ToolchainNotFound {
            triple: target.triple.to_owned(),
            tool,
            path,
        })
    }
}

fn push_parent(dirs: &mut Vec<Utf8PathBuf>, tool: &Utf8Path) {
    if let Some(parent) = tool.parent() {
        dirs.push(parent.to_owned());
    }
}

/// Split the host `PATH` into UTF-8 directories, skipping any that are not.
#[must_use]
pub fn host_search_path() -> Vec<Utf8PathBuf> {
    std::env::var_os("PATH")
        .map(|path| {
            std::env::split_paths(&path)
                .filter_map(|dir| Utf8PathBuf::from_path_buf(dir).ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "toolchain_tests.rs"]
mod tests;
