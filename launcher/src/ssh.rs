use crate::command::{command, run_checked};
use crate::error::LaunchError;
use kickoff_core::Environment;

/// Start the SSH daemon through the service manager and wait for it to report back.
pub fn start_ssh(command_line: &[String], env: &Environment) -> Result<(), LaunchError> {
    let (program, args) = command_line
        .split_first()
        .ok_or_else(|| LaunchError::EmptyCommand("ssh".to_string()))?;

    tracing::debug!("Starting SSH daemon with {:?}", command_line);

    let mut cmd = command(program, env);
    cmd.args(args);
    run_checked(&mut cmd, &command_line.join(" "))?;

    tracing::info!("SSH service started");
    Ok(())
}
