//! Multi-target release pipeline.
//!
//! This crate builds one project for a fixed matrix of targets, checks each
//! artifact's runtime dependencies, and packages it into a versioned release
//! archive. It backs the `release-build` CLI binary and can be driven
//! programmatically, with external commands injected through
//! [`exec::CommandExecutor`].
//!
//! # Modules
//!
//! - [`builder`] - Cargo invocation for one target
//! - [`cancel`] - Interrupt flag shared with the signal handler
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - `release.toml` loading and layered run settings
//! - [`error`] - Error types for the pipeline
//! - [`exec`] - External command execution seam
//! - [`naming`] - Release archive naming
//! - [`output`] - Progress, summary, dry-run, and JSON output
//! - [`packaging`] - Archive writing and digests
//! - [`packaging_error`] - Archive writing errors
//! - [`pipeline`] - Per-target state machine and run driver
//! - [`target`] - Target registry and filters
//! - [`toolchain`] - Per-target toolchain resolution
//! - [`verify`] - Runtime dependency inspection
//! - [`version`] - Release version validation

pub mod builder;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod naming;
pub mod output;
pub mod packaging;
pub mod packaging_error;
pub mod pipeline;
pub mod target;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod toolchain;
pub mod verify;
pub mod version;
