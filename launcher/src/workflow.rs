use crate::command::{command, run_checked, wait_status};
use crate::error::LaunchError;
use kickoff_core::Environment;
use std::convert::Infallible;
use std::ffi::OsString;
use std::io::Write;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

/// Run `bin/setup` from `workdir` and require it to succeed.
pub fn run_setup(script: &Path, workdir: &Path, env: &Environment) -> Result<(), LaunchError> {
    tracing::debug!("Running setup {:?}", script);

    let mut cmd = command(script, env);
    cmd.current_dir(workdir);
    run_checked(&mut cmd, &script.display().to_string())?;

    tracing::info!("Setup completed");
    Ok(())
}

/// One invocation of the `bin/run` collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowInvocation {
    script: PathBuf,
    workdir: PathBuf,
    workflow_id: OsString,
    shut_down_after_run: bool,
}

impl WorkflowInvocation {
    /// The workflow id is passed on byte for byte, even when it is not UTF-8.
    pub fn new(script: &Path, workdir: &Path, workflow_id: impl Into<OsString>) -> Self {
        Self {
            script: script.to_path_buf(),
            workdir: workdir.to_path_buf(),
            workflow_id: workflow_id.into(),
            shut_down_after_run: false,
        }
    }

    /// Ask `bin/run` to stop the container once the workflow is done.
    pub fn shut_down_after_run(mut self) -> Self {
        self.shut_down_after_run = true;
        self
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    pub fn args(&self) -> Vec<OsString> {
        let mut args = vec![OsString::from("--workflow-id"), self.workflow_id.clone()];
        if self.shut_down_after_run {
            args.push(OsString::from("--shut-down-after-run"));
        }
        args
    }

    fn command(&self, env: &Environment) -> Command {
        let mut cmd = command(&self.script, env);
        cmd.args(self.args()).current_dir(&self.workdir);
        cmd
    }

    /// Run as a child and report how it exited. A non-zero exit is not an error here.
    pub fn run(&self, env: &Environment) -> Result<ExitStatus, LaunchError> {
        tracing::info!(
            "Running workflow {:?}: {:?} {:?}",
            self.workflow_id,
            self.script,
            self.args()
        );

        wait_status(&mut self.command(env), &self.script.display().to_string())
    }

    /// Replace the current process with `bin/run`.
    ///
    /// Only returns on failure. On success the exit status of the container
    /// is whatever `bin/run` exits with. The replacement starts with the same
    /// environment, working directory and default signal dispositions that
    /// [`run`](Self::run) gives the child.
    pub fn exec(&self, env: &Environment) -> Result<Infallible, LaunchError> {
        tracing::info!(
            "Handing over to workflow {:?}: {:?} {:?}",
            self.workflow_id,
            self.script,
            self.args()
        );
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();

        let source = self.command(env).exec();
        Err(LaunchError::Exec {
            program: self.script.display().to_string(),
            source,
        })
    }
}

/// Block until the process is killed.
///
/// Keeps the container alive for SSH/VNC access. No signal handlers are
/// installed: outside a PID namespace a stop signal ends the process with its
/// default action, but as PID 1 the kernel drops signals that have no handler,
/// so only SIGKILL or container teardown stops it.
pub fn idle_forever() -> ! {
    tracing::info!("Idling; container stays up for interactive access");
    loop {
        nix::unistd::pause();
    }
}
