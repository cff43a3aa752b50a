//! Target descriptor registry for the release matrix.
//!
//! The registry is a fixed, ordered table: order is build order. Entries that
//! are not currently released stay in the table with `enabled: false`, so
//! turning a target back on is a one-flag change.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Operating system family of a release target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// macOS, built through an osxcross toolchain.
    Darwin,
    /// Linux, built against musl.
    Linux,
    /// Windows, built against the MSVC ABI through `cargo xwin`.
    Windows,
    /// Android, built through the NDK.
    Android,
}

impl Os {
    const ALL: [Self; 4] = [Self::Darwin, Self::Linux, Self::Windows, Self::Android];

    /// Return the lowercase OS name used in target filters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Darwin => "darwin",
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::Android => "android",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|os| os.as_str() == name)
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU architecture of a release target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Arch {
    /// 64-bit x86.
    #[serde(rename = "x86_64")]
    X86_64,
    /// 64-bit ARM.
    #[serde(rename = "aarch64")]
    Aarch64,
}

impl Arch {
    const ALL: [Self; 2] = [Self::X86_64, Self::Aarch64];

    /// Return the architecture name as it appears in target triples.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|arch| arch.as_str() == name)
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Archive container used for a target's release package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
    /// A tar stream compressed with xz.
    TarXz,
    /// A zip archive.
    Zip,
}

impl ArchiveFormat {
    /// Return the filename extension, without a leading dot.
    ///
    /// # Examples
    ///
    /// ```
    /// use release_build::target::ArchiveFormat;
    ///
    /// assert_eq!(ArchiveFormat::TarXz.extension(), "tar.xz");
    /// assert_eq!(ArchiveFormat::Zip.extension(), "zip");
    /// ```
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::TarXz => "tar.xz",
            Self::Zip => "zip",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One entry of the release matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TargetDescriptor {
    /// Operating system family.
    pub os: Os,
    /// CPU architecture.
    pub arch: Arch,
    /// ABI or libc flavour, when the triple names one.
    pub abi: Option<&'static str>,
    /// The Rust target triple.
    pub triple: &'static str,
    /// Archive format for the release package.
    pub archive_format: ArchiveFormat,
    /// Whether the pipeline builds this target.
    pub enabled: bool,
    /// Cargo features always enabled for this target.
    pub features: &'static [&'static str],
}

impl TargetDescriptor {
    /// Return the shared library extension for this target, including the dot.
    #[must_use]
    pub const fn library_extension(&self) -> &'static str {
        match self.os {
            Os::Windows => ".dll",
            Os::Darwin => ".dylib",
            Os::Linux | Os::Android => ".so",
        }
    }

    /// Return the shared library filename prefix for this target.
    #[must_use]
    pub const fn library_prefix(&self) -> &'static str {
        match self.os {
            Os::Windows => "",
            Os::Darwin | Os::Linux | Os::Android => "lib",
        }
    }

    /// Return the executable filename suffix for this target.
    #[must_use]
    pub const fn executable_suffix(&self) -> &'static str {
        match self.os {
            Os::Windows => ".exe",
            Os::Darwin | Os::Linux | Os::Android => "",
        }
    }

    /// Return the triple in the form used by `cc`-style variables (`CC_<t>`).
    ///
    /// # Examples
    ///
    /// ```
    /// use release_build::target::find_target;
    ///
    /// let target = find_target("x86_64-unknown-linux-musl").expect("registered");
    /// assert_eq!(target.cc_env_suffix(), "x86_64_unknown_linux_musl");
    /// assert_eq!(target.cargo_env_key(), "X86_64_UNKNOWN_LINUX_MUSL");
    /// ```
    #[must_use]
    pub fn cc_env_suffix(&self) -> String {
        self.triple.replace('-', "_")
    }

    /// Return the triple in the form used by `CARGO_TARGET_<T>_*` variables.
    #[must_use]
    pub fn cargo_env_key(&self) -> String {
        self.cc_env_suffix().to_ascii_uppercase()
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.triple)
    }
}

/// The release matrix, in build order.
pub const REGISTRY: &[TargetDescriptor] = &[
    TargetDescriptor {
        os: Os::Darwin,
        arch: Arch::X86_64,
        abi: None,
        triple: "x86_64-apple-darwin",
        archive_format: ArchiveFormat::TarXz,
        enabled: true,
        features: &[],
    },
    TargetDescriptor {
        os: Os::Darwin,
        arch: Arch::Aarch64,
        abi: None,
        triple: "aarch64-apple-darwin",
        archive_format: ArchiveFormat::TarXz,
        enabled: true,
        features: &[],
    },
    TargetDescriptor {
        os: Os::Linux,
        arch: Arch::X86_64,
        abi: Some("musl"),
        triple: "x86_64-unknown-linux-musl",
        archive_format: ArchiveFormat::TarXz,
        enabled: true,
        features: &[],
    },
    TargetDescriptor {
        os: Os::Linux,
        arch: Arch::Aarch64,
        abi: Some("musl"),
        triple: "aarch64-unknown-linux-musl",
        archive_format: ArchiveFormat::TarXz,
        enabled: true,
        features: &[],
    },
    TargetDescriptor {
        os: Os::Windows,
        arch: Arch::X86_64,
        abi: Some("msvc"),
        triple: "x86_64-pc-windows-msvc",
        archive_format: ArchiveFormat::Zip,
        enabled: true,
        features: &[],
    },
    TargetDescriptor {
        os: Os::Windows,
        arch: Arch::Aarch64,
        abi: Some("msvc"),
        triple: "aarch64-pc-windows-msvc",
        archive_format: ArchiveFormat::Zip,
        enabled: true,
        features: &[],
    },
    TargetDescriptor {
        os: Os::Android,
        arch: Arch::Aarch64,
        abi: None,
        triple: "aarch64-linux-android",
        archive_format: ArchiveFormat::TarXz,
        enabled: false,
        features: &[],
    },
    TargetDescriptor {
        os: Os::Android,
        arch: Arch::X86_64,
        abi: None,
        triple: "x86_64-linux-android",
        archive_format: ArchiveFormat::TarXz,
        enabled: false,
        features: &[],
    },
];

/// Errors arising from target selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    /// A filter token matched no registry entry.
    #[error("unknown target \"{value}\"; expected a triple, OS or arch from: {expected}")]
    UnknownTarget {
        /// The rejected token.
        value: String,
        /// Comma-separated list of registered triples.
        expected: String,
    },

    /// A filter was given but selected no enabled target.
    #[error("no enabled target matches \"{filter}\"")]
    NoEnabledTargets {
        /// The filter as written by the user.
        filter: String,
    },
}

/// Look up a registry entry by triple, including disabled entries.
///
/// # Errors
///
/// Returns [`TargetError::UnknownTarget`] if the triple is not registered.
pub fn find_target(triple: &str) -> Result<TargetDescriptor, TargetError> {
    REGISTRY
        .iter()
        .find(|t| t.triple == triple)
        .copied()
        .ok_or_else(|| unknown_target(triple))
}

fn unknown_target(value: &str) -> TargetError {
    TargetError::UnknownTarget {
        value: value.to_owned(),
        expected: REGISTRY
            .iter()
            .map(|t| t.triple)
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// One token of a target filter.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Selector {
    Triple(String),
    Os(Os),
    Arch(Arch),
}

impl Selector {
    fn matches(&self, target: &TargetDescriptor) -> bool {
        match self {
            Self::Triple(triple) => target.triple == triple,
            Self::Os(os) => target.os == *os,
            Self::Arch(arch) => target.arch == *arch,
        }
    }
}

/// A parsed `--targets` filter.
///
/// A target is selected when any token matches it.
///
/// # Examples
///
/// ```
/// use release_build::target::{TargetFilter, list_targets};
///
/// let filter = TargetFilter::parse("windows,x86_64-unknown-linux-musl").expect("valid");
/// let triples: Vec<_> = list_targets(Some(&filter)).iter().map(|t| t.triple).collect();
/// assert_eq!(
///     triples,
///     ["x86_64-unknown-linux-musl", "x86_64-pc-windows-msvc", "aarch64-pc-windows-msvc"]
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFilter {
    raw: String,
    selectors: Vec<Selector>,
}

impl TargetFilter {
    /// Parse a comma-separated filter.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError::UnknownTarget`] for a token that names no
    /// registered triple, OS or architecture.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let selectors = raw
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(parse_selector)
            .collect::<Result<Vec<_>, _>>()?;

        if selectors.is_empty() {
            return Err(unknown_target(raw));
        }

        Ok(Self {
            raw: raw.to_owned(),
            selectors,
        })
    }

    /// Return the filter as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the filter selects `target`.
    #[must_use]
    pub fn matches(&self, target: &TargetDescriptor) -> bool {
        self.selectors.iter().any(|s| s.matches(target))
    }
}

fn parse_selector(token: &str) -> Result<Selector, TargetError> {
    if let Some(os) = Os::from_name(token) {
        return Ok(Selector::Os(os));
    }
    if let Some(arch) = Arch::from_name(token) {
        return Ok(Selector::Arch(arch));
    }
    find_target(token).map(|t| Selector::Triple(t.triple.to_owned()))
}

/// Return the enabled targets in build order, optionally narrowed by a filter.
#[must_use]
pub fn list_targets(filter: Option<&TargetFilter>) -> Vec<TargetDescriptor> {
    REGISTRY
        .iter()
        .filter(|t| t.enabled)
        .filter(|t| filter.is_none_or(|f| f.matches(t)))
        .copied()
        .collect()
}

/// Parse an optional `--targets` filter and return the selected targets.
///
/// # Errors
///
/// Returns [`TargetError::UnknownTarget`] for an unparseable filter, or
/// [`TargetError::NoEnabledTargets`] when it selects nothing.
pub fn select_targets(filter: Option<&str>) -> Result<Vec<TargetDescriptor>, TargetError> {
    let Some(raw) = filter else {
        return Ok(list_targets(None));
    };
    let parsed = TargetFilter::parse(raw)?;
    let selected = list_targets(Some(&parsed));
    if selected.is_empty() {
        return Err(TargetError::NoEnabledTargets {
            filter: raw.to_owned(),
        });
    }
    Ok(selected)
}
