//! External command execution.
//!
//! Every external tool the pipeline runs (the build driver and the artifact
//! inspector) goes through [`CommandExecutor`]. An [`Invocation`] carries its
//! own environment, which is applied to the child process only; the calling
//! process's environment is never modified.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Output};

/// A fully described external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Program to run.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Directories searched before the inherited `PATH`.
    pub path_prepend: Vec<Utf8PathBuf>,
    /// Variables set for the child only.
    pub envs: BTreeMap<String, String>,
    /// Working directory, if different from the caller's.
    pub current_dir: Option<Utf8PathBuf>,
}

impl Invocation {
    /// Create an invocation of `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: &Utf8Path) -> Self {
        self.current_dir = Some(dir.to_owned());
        self
    }

    /// Return the `PATH` value the child will see.
    ///
    /// `inherited` is the caller's `PATH`; prepended directories come first,
    /// in order.
    ///
    /// # Errors
    ///
    /// Returns an [`io::ErrorKind::InvalidInput`] error when a prepended
    /// directory contains the platform's path separator.
    pub fn search_path(&self, inherited: Option<OsString>) -> io::Result<Option<OsString>> {
        if self.path_prepend.is_empty() {
            return Ok(inherited);
        }
        let prepended = self.path_prepend.iter().map(PathBuf::from);
        let rest = inherited
            .as_deref()
            .map(std::env::split_paths)
            .into_iter()
            .flatten();
        std::env::join_paths(prepended.chain(rest))
            .map(Some)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Run the invocation to completion and return its captured output.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised when the process could not be started.
    fn run(&self, invocation: &Invocation) -> io::Result<Output>;
}

/// Executes commands on the host system.
///
/// # Examples
///
/// ```no_run
/// use release_build::exec::{CommandExecutor, Invocation, SystemCommandExecutor};
///
/// let output = SystemCommandExecutor.run(&Invocation::new("cargo").arg("--version"))?;
/// assert!(output.status.success());
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, invocation: &Invocation) -> io::Result<Output> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        cmd.envs(&invocation.envs);
        if let Some(path) = invocation.search_path(std::env::var_os("PATH"))? {
            cmd.env("PATH", path);
        }
        if let Some(dir) = &invocation.current_dir {
            cmd.current_dir(dir);
        }
        log::trace!("spawning {invocation}");
        cmd.output()
    }
}

/// Join captured stdout and stderr into one diagnostics block.
#[must_use]
pub fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (true, _) => stderr.trim_end().to_owned(),
        (false, true) => stdout.trim_end().to_owned(),
        (false, false) => format!("{}\n{}", stdout.trim_end(), stderr.trim_end()),
    }
}
