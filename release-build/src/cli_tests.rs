//! Tests for release CLI parsing and default behaviours.

use super::*;
use rstest::rstest;

#[test]
fn cli_parses_defaults() {
    let cli = Cli::parse_from(["release-build"]);
    assert!(cli.targets.is_none());
    assert!(cli.version.is_none());
    assert!(cli.packages_root.is_none());
    assert!(cli.output_dir.is_none());
    assert!(cli.config.is_none());
    assert!(!cli.continue_on_failure);
    assert!(!cli.dry_run);
    assert!(!cli.json);
    assert_eq!(cli.verbosity, 0);
    assert!(!cli.quiet);
    assert_eq!(cli.project_root(), Utf8Path::new("."));
}

#[test]
fn version_flag_takes_a_release_version() {
    let cli = Cli::parse_from(["release-build", "--version", "1.2.3"]);
    assert_eq!(cli.version.as_deref(), Some("1.2.3"));
}

#[test]
fn cli_parses_full_invocation() {
    let cli = Cli::parse_from([
        "release-build",
        "--targets",
        "linux,aarch64-pc-windows-msvc",
        "--packages-root",
        "/opt/packages",
        "-o",
        "/tmp/release",
        "--project-root",
        "/src/bento4",
        "--config",
        "/src/bento4/ci/release.toml",
        "--continue-on-failure",
        "--json",
    ]);
    assert_eq!(
        cli.targets.as_deref(),
        Some("linux,aarch64-pc-windows-msvc")
    );
    assert_eq!(cli.project_root(), Utf8Path::new("/src/bento4"));
    assert_eq!(
        cli.config,
        Some(Utf8PathBuf::from("/src/bento4/ci/release.toml"))
    );
    assert!(cli.json);

    let overrides = cli.overrides();
    assert_eq!(
        overrides.packages_root,
        Some(Utf8PathBuf::from("/opt/packages"))
    );
    assert_eq!(
        overrides.output_dir,
        Some(Utf8PathBuf::from("/tmp/release"))
    );
    assert!(overrides.continue_on_failure);
    assert!(overrides.version.is_none());
}

#[rstest]
#[case::default(&["release-build"], LevelFilter::Warn)]
#[case::verbose(&["release-build", "-v"], LevelFilter::Info)]
#[case::very_verbose(&["release-build", "-vv"], LevelFilter::Debug)]
#[case::trace(&["release-build", "-vvvv"], LevelFilter::Trace)]
#[case::quiet(&["release-build", "-q"], LevelFilter::Error)]
fn log_level_follows_verbosity(#[case] args: &[&str], #[case] expected: LevelFilter) {
    let cli = Cli::parse_from(args);
    assert_eq!(cli.log_level(), expected);
}

#[test]
fn quiet_and_verbose_conflict() {
    let result = Cli::try_parse_from(["release-build", "-q", "-v"]);
    assert!(result.is_err());
}
