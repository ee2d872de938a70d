use crate::error::LaunchError;
use kickoff_core::Environment;
use std::ffi::OsStr;
use std::process::{Command, ExitStatus};

/// A command that sees exactly `env`, nothing inherited besides it.
pub(crate) fn command(program: impl AsRef<OsStr>, env: &Environment) -> Command {
    let mut cmd = Command::new(program);
    cmd.env_clear().envs(env.iter());
    cmd
}

pub(crate) fn wait_status(cmd: &mut Command, program: &str) -> Result<ExitStatus, LaunchError> {
    cmd.status().map_err(|source| LaunchError::Spawn {
        program: program.to_string(),
        source,
    })
}

/// Run to completion; a non-zero exit is an error.
pub(crate) fn run_checked(cmd: &mut Command, program: &str) -> Result<(), LaunchError> {
    let status = wait_status(cmd, program)?;
    if !status.success() {
        tracing::error!(program = %program, status = ?status, "Command failed");
        return Err(LaunchError::Failed {
            program: program.to_string(),
            status,
        });
    }
    Ok(())
}
