//! Release archive naming policy.
//!
//! Archive names are `<base>-<version>-<triple>.<ext>`, where the extension
//! follows the target's archive format. The name is a pure function of its
//! inputs, so reruns overwrite the same file and distinct targets never
//! collide in the release directory.

use crate::target::TargetDescriptor;
use crate::version::ReleaseVersion;
use std::fmt;

/// A fully-qualified release archive name.
///
/// # Examples
///
/// ```
/// use release_build::naming::ArchiveName;
/// use release_build::target::find_target;
/// use release_build::version::ReleaseVersion;
///
/// let target = find_target("aarch64-pc-windows-msvc").expect("registered");
/// let version = ReleaseVersion::try_from("1.2.3").expect("valid");
/// let name = ArchiveName::new("mp4decrypt", &version, &target);
/// assert_eq!(name.filename(), "mp4decrypt-1.2.3-aarch64-pc-windows-msvc.zip");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    base_name: String,
    version: ReleaseVersion,
    target: TargetDescriptor,
}

impl ArchiveName {
    /// Create an archive name from its components.
    #[must_use]
    pub fn new(base_name: &str, version: &ReleaseVersion, target: &TargetDescriptor) -> Self {
        Self {
            base_name: base_name.to_owned(),
            version: version.clone(),
            target: *target,
        }
    }

    /// Return the filename as a string without consuming the value.
    #[must_use]
    pub fn filename(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ArchiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}.{}",
            self.base_name,
            self.version,
            self.target.triple,
            self.target.archive_format.extension()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::find_target;
    use rstest::{fixture, rstest};

    #[fixture]
    fn version() -> ReleaseVersion {
        ReleaseVersion::try_from("1.2.3").expect("valid version")
    }

    #[rstest]
    #[case::linux("x86_64-unknown-linux-musl", "tar.xz")]
    #[case::macos("aarch64-apple-darwin", "tar.xz")]
    #[case::windows("aarch64-pc-windows-msvc", "zip")]
    fn filename_follows_release_convention(
        version: ReleaseVersion,
        #[case] triple: &str,
        #[case] extension: &str,
    ) {
        let target = find_target(triple).expect("registered");
        let name = ArchiveName::new("mp4decrypt", &version, &target);
        let expected = format!("mp4decrypt-1.2.3-{triple}.{extension}");
        assert_eq!(name.filename(), expected);
    }

    #[rstest]
    fn identical_inputs_produce_identical_names(version: ReleaseVersion) {
        let target = find_target("x86_64-pc-windows-msvc").expect("registered");
        let first = ArchiveName::new("mp4decrypt", &version, &target);
        let second = ArchiveName::new("mp4decrypt", &version, &target);
        assert_eq!(first, second);
        assert_eq!(first.filename(), second.filename());
    }

    #[rstest]
    fn base_name_keeps_its_dashes(version: ReleaseVersion) {
        let target = find_target("x86_64-apple-darwin").expect("registered");
        let name = ArchiveName::new("mp4-tools", &version, &target);
        assert_eq!(
            name.filename(),
            "mp4-tools-1.2.3-x86_64-apple-darwin.tar.xz"
        );
    }
}
