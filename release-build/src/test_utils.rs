//! Shared test utilities for the release pipeline.

use crate::exec::{CommandExecutor, Invocation};
use std::cell::RefCell;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.unsigned_abs())
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a successful command `Output` with the given stdout text.
#[must_use]
pub fn output_with_stdout(stdout: &str) -> Output {
    Output {
        stdout: stdout.as_bytes().to_vec(),
        ..success_output()
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// A `CommandExecutor` that answers every invocation from a closure.
///
/// Every invocation is recorded so tests can assert on what was run, in
/// which order, and with which environment.
pub struct ScriptedExecutor<F> {
    respond: F,
    calls: RefCell<Vec<Invocation>>,
}

impl<F> ScriptedExecutor<F>
where
    F: Fn(&Invocation) -> std::io::Result<Output>,
{
    /// Create an executor backed by `respond`.
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Return every invocation seen so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }
}

impl<F> CommandExecutor for ScriptedExecutor<F>
where
    F: Fn(&Invocation) -> std::io::Result<Output>,
{
    fn run(&self, invocation: &Invocation) -> std::io::Result<Output> {
        self.calls.borrow_mut().push(invocation.clone());
        (self.respond)(invocation)
    }
}
