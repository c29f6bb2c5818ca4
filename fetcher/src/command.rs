//! External command execution.
//!
//! The signature verification tool is driven as a subprocess. Routing every
//! invocation through [`CommandExecutor`] lets preflight probes and the
//! verifier run against stubs in tests.

use std::process::{Command, Output};

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the command.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use unifont_fetch::command::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run("gpg", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), std::io::Error>(())
    /// ```
    fn run<'a>(&self, cmd: &str, args: &[&'a str]) -> std::io::Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> std::io::Result<Output> {
        log::debug!("running {cmd} {}", args.join(" "));
        Command::new(cmd).args(args).output()
    }
}

/// Returns true if the given command executes successfully.
pub fn command_succeeds(executor: &dyn CommandExecutor, cmd: &str, args: &[&str]) -> bool {
    executor.run(cmd, args).is_ok_and(|o| o.status.success())
}
