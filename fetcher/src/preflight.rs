//! Capability checks run before any network activity.
//!
//! Each required tool is probed with `<tool> --version`. A missing tool is
//! reported together with every other missing tool so a single run surfaces
//! the complete list.

use crate::command::{CommandExecutor, command_succeeds};

/// Availability of a single external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    /// The probed program name.
    pub name: String,
    /// Whether `<name> --version` succeeded.
    pub available: bool,
}

/// Errors raised by the preflight check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreflightError {
    /// One or more required tools are not invocable.
    #[error("missing required tool(s): {}", tools.join(", "))]
    MissingDependency {
        /// Names of the tools that failed their probe, in request order.
        tools: Vec<String>,
    },
}

/// Probes each tool in `tools` and reports its availability.
///
/// # Examples
///
/// ```no_run
/// use unifont_fetch::command::SystemCommandExecutor;
/// use unifont_fetch::preflight::probe_tools;
///
/// let statuses = probe_tools(&SystemCommandExecutor, &["gpg".to_owned()]);
/// for status in statuses {
///     println!("{}: {}", status.name, status.available);
/// }
/// ```
#[must_use]
pub fn probe_tools(executor: &dyn CommandExecutor, tools: &[String]) -> Vec<ToolStatus> {
    tools
        .iter()
        .map(|name| ToolStatus {
            name: name.clone(),
            available: command_succeeds(executor, name, &["--version"]),
        })
        .collect()
}

/// Fails with [`PreflightError::MissingDependency`] unless every tool in
/// `tools` is invocable.
///
/// # Errors
///
/// Returns [`PreflightError::MissingDependency`] naming every missing tool.
pub fn check_tools(executor: &dyn CommandExecutor, tools: &[String]) -> Result<(), PreflightError> {
    let missing: Vec<String> = probe_tools(executor, tools)
        .into_iter()
        .filter(|status| !status.available)
        .map(|status| status.name)
        .collect();

    if missing.is_empty() {
        log::debug!("preflight: all tools available ({})", tools.join(", "));
        Ok(())
    } else {
        Err(PreflightError::MissingDependency { tools: missing })
    }
}
