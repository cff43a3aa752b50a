//! Release version newtype for archive naming.
//!
//! The version ends up verbatim in every archive filename, so it is limited
//! to characters that are safe in a path component: ASCII alphanumerics and
//! `.`, `-`, `+`. It must start with a digit (`1.2.3`, `0.4.0-rc.1`).

use crate::error::{ReleaseError, Result};
use serde::Serialize;
use std::fmt;

/// A validated release version.
///
/// # Examples
///
/// ```
/// use release_build::version::ReleaseVersion;
///
/// let version: ReleaseVersion = "1.2.3".try_into().expect("valid version");
/// assert_eq!(version.as_str(), "1.2.3");
/// assert!(ReleaseVersion::try_from("v1/../2").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ReleaseVersion(String);

impl ReleaseVersion {
    /// Return the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ReleaseVersion {
    type Error = ReleaseError;

    fn try_from(value: &str) -> Result<Self> {
        validate_version(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for ReleaseVersion {
    type Error = ReleaseError;

    fn try_from(value: String) -> Result<Self> {
        validate_version(&value)?;
        Ok(Self(value))
    }
}

impl AsRef<str> for ReleaseVersion {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_version(value: &str) -> Result<()> {
    let invalid = |reason: &str| ReleaseError::InvalidVersion {
        value: value.to_owned(),
        reason: reason.to_owned(),
    };

    let Some(first) = value.chars().next() else {
        return Err(invalid("version must not be empty"));
    };
    if !first.is_ascii_digit() {
        return Err(invalid("version must start with a digit"));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+')))
    {
        return Err(invalid(&format!("character '{bad}' is not allowed")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain("1.2.3")]
    #[case::prerelease("0.4.0-rc.1")]
    #[case::build_metadata("2.0.0+20261017")]
    fn accepts_semver_shapes(#[case] raw: &str) {
        let version = ReleaseVersion::try_from(raw).expect("valid");
        assert_eq!(version.to_string(), raw);
    }

    #[rstest]
    #[case::empty("", "empty")]
    #[case::leading_v("v1.2.3", "digit")]
    #[case::path_separator("1.2/3", "'/'")]
    #[case::whitespace("1.2.3 ", "' '")]
    fn rejects_unsafe_versions(#[case] raw: &str, #[case] reason_fragment: &str) {
        let err = ReleaseVersion::try_from(raw).expect_err("expected rejection");
        match err {
            ReleaseError::InvalidVersion { reason, .. } => {
                assert!(reason.contains(reason_fragment), "reason was: {reason}");
            }
            other => panic!("expected InvalidVersion, got {other:?}"),
        }
    }
}
