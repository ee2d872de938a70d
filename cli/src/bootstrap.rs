//! The container bootstrap sequence.
//!
//! Steps run strictly in order and any unguarded failure stops the sequence
//! before the next step:
//!
//! 1. start sshd (fatal)
//! 2. export `DISPLAY`, start the VNC launcher in the background (warn only)
//! 3. print diagnostics
//! 4. run `bin/setup` (fatal)
//! 5. write the environment snapshot (fatal, chmod warn only)
//! 6. dispatch to `bin/run`: exec in shutdown mode, otherwise run and idle

use crate::error::BootError;
use kickoff_core::{
    BootConfig, BootLayout, DISPLAY_VAR, Diagnostics, EnvSnapshot, Environment, RunMode,
};
use kickoff_launcher::{WorkflowInvocation, idle_forever, run_setup, start_desktop, start_ssh};
use std::convert::Infallible;

pub const RUN_FAILED_MESSAGE: &str = "Workflow run failed; keeping container alive";

/// How the bootstrap ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Replace the process with `bin/run`; its exit status becomes ours.
    Delegate(WorkflowInvocation),
    /// Run `bin/run` as a child, tolerate failure, then idle forever.
    RunThenIdle(WorkflowInvocation),
}

pub struct Bootstrap {
    config: BootConfig,
    layout: BootLayout,
    env: Environment,
    mode: RunMode,
}

impl Bootstrap {
    pub fn new(layout: BootLayout, env: Environment) -> Self {
        let config = BootConfig::from_env(&env);
        let mode = config.mode();
        Self {
            config,
            layout,
            env,
            mode,
        }
    }

    /// Decide the mode with the strict flag parser; unrecognized `SHUT_DOWN`
    /// values become a configuration error instead of meaning "no".
    pub fn strict(mut self) -> Result<Self, BootError> {
        self.mode = self.config.strict_mode()?;
        Ok(self)
    }

    pub fn run(mut self) -> Result<Infallible, BootError> {
        self.prepare()?;
        self.dispatch()
    }

    /// Every step before the workflow dispatch.
    pub fn prepare(&mut self) -> Result<(), BootError> {
        tracing::info!(
            mode = %self.mode,
            workflow_id = ?self.config.workflow_id,
            "Bootstrapping container"
        );

        start_ssh(&self.layout.ssh_command, &self.env).map_err(BootError::Ssh)?;
        self.start_desktop();
        self.print_diagnostics()?;
        run_setup(&self.layout.setup_script(), &self.layout.workdir, &self.env)
            .map_err(BootError::Setup)?;
        self.write_snapshot()?;

        Ok(())
    }

    fn start_desktop(&mut self) {
        self.env.set(DISPLAY_VAR, &self.config.display);

        let candidates = self.layout.desktop_launchers();
        match start_desktop(&candidates, &self.config.display, &self.env) {
            Ok(Some(_)) => {}
            Ok(None) => tracing::warn!(
                "No VNC startup script found in {}; continuing without remote desktop",
                self.layout.startup_dir.display()
            ),
            Err(e) => tracing::warn!(
                "Failed to start VNC: {}; continuing without remote desktop",
                e
            ),
        }
    }

    pub fn print_diagnostics(&self) -> Result<(), BootError> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        Diagnostics::new(&self.config, &self.layout.workdir, &self.env).write_to(&mut out)?;
        Ok(())
    }

    pub fn write_snapshot(&self) -> Result<(), BootError> {
        let snapshot = EnvSnapshot::new(&self.layout.env_file);
        snapshot.write(&self.env)?;
        tracing::info!("Environment written to {}", snapshot.path().display());
        Ok(())
    }

    pub fn plan(&self) -> Dispatch {
        let invocation = WorkflowInvocation::new(
            &self.layout.run_script(),
            &self.layout.workdir,
            self.config.workflow_id.clone(),
        );

        match self.mode {
            RunMode::ShutDownAfterRun => Dispatch::Delegate(invocation.shut_down_after_run()),
            RunMode::KeepAlive => Dispatch::RunThenIdle(invocation),
        }
    }

    pub fn dispatch(self) -> Result<Infallible, BootError> {
        match self.plan() {
            Dispatch::Delegate(invocation) => invocation.exec(&self.env).map_err(BootError::Exec),
            Dispatch::RunThenIdle(invocation) => {
                match invocation.run(&self.env) {
                    Ok(status) if status.success() => tracing::info!("Workflow run finished"),
                    Ok(status) => tracing::warn!(status = %status, "{}", RUN_FAILED_MESSAGE),
                    Err(e) => tracing::warn!(error = %e, "{}", RUN_FAILED_MESSAGE),
                }
                idle_forever()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn write_script(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut perms = fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).unwrap();
    }

    fn layout(dir: &Path, ssh: &str) -> BootLayout {
        let mut layout = BootLayout::new(dir).with_ssh_command(ssh);
        layout.startup_dir = dir.join("dockerstartup");
        layout.env_file = dir.join(".env");
        layout
    }

    fn env(pairs: &[(&str, &str)]) -> Environment {
        let mut env = Environment::from_vars(pairs.iter().copied());
        if let Some(path) = std::env::var_os("PATH") {
            env.set("PATH", path);
        }
        env
    }

    fn setup_marker(dir: &Path) -> PathBuf {
        dir.join("setup-ran")
    }

    #[test]
    fn test_prepare_without_launchers_reaches_setup_and_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        write_script(&temp_dir.path().join("bin/setup"), "touch setup-ran");

        let mut bootstrap = Bootstrap::new(
            layout(temp_dir.path(), "true"),
            env(&[("WORKFLOW_ID", "abc123")]),
        );
        bootstrap.prepare().unwrap();

        assert!(setup_marker(temp_dir.path()).exists());
        let snapshot = fs::read_to_string(temp_dir.path().join(".env")).unwrap();
        assert!(snapshot.lines().any(|l| l == "DISPLAY=:1"));
        assert!(snapshot.lines().any(|l| l == "WORKFLOW_ID=abc123"));
        assert_eq!(snapshot.lines().count(), bootstrap.env.len());
    }

    #[test]
    fn test_display_from_environment_is_kept() {
        let temp_dir = TempDir::new().unwrap();
        write_script(&temp_dir.path().join("bin/setup"), "exit 0");

        let mut bootstrap =
            Bootstrap::new(layout(temp_dir.path(), "true"), env(&[("DISPLAY", ":5")]));
        bootstrap.prepare().unwrap();

        assert_eq!(bootstrap.config.display, ":5");
        let snapshot = fs::read_to_string(temp_dir.path().join(".env")).unwrap();
        assert!(snapshot.lines().any(|l| l == "DISPLAY=:5"));
    }

    #[test]
    fn test_ssh_failure_stops_everything() {
        let temp_dir = TempDir::new().unwrap();
        write_script(&temp_dir.path().join("bin/setup"), "touch setup-ran");

        let mut bootstrap = Bootstrap::new(layout(temp_dir.path(), "false"), env(&[]));
        let err = bootstrap.prepare().unwrap_err();

        assert!(matches!(err, BootError::Ssh(_)));
        assert!(!setup_marker(temp_dir.path()).exists());
        assert!(!temp_dir.path().join(".env").exists());
    }

    #[test]
    fn test_setup_failure_skips_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        write_script(&temp_dir.path().join("bin/setup"), "exit 1");

        let mut bootstrap = Bootstrap::new(layout(temp_dir.path(), "true"), env(&[]));
        let err = bootstrap.prepare().unwrap_err();

        assert!(matches!(err, BootError::Setup(_)));
        assert!(!temp_dir.path().join(".env").exists());
    }

    #[test]
    fn test_plan_delegates_only_for_literal_one() {
        let temp_dir = TempDir::new().unwrap();
        let run = temp_dir.path().join("bin/run");

        let bootstrap = Bootstrap::new(
            layout(temp_dir.path(), "true"),
            env(&[("SHUT_DOWN", "1"), ("WORKFLOW_ID", "abc123")]),
        );
        let expected = WorkflowInvocation::new(&run, temp_dir.path(), "abc123").shut_down_after_run();
        assert_eq!(bootstrap.plan(), Dispatch::Delegate(expected));

        for value in ["0", "2", "true", ""] {
            let bootstrap = Bootstrap::new(
                layout(temp_dir.path(), "true"),
                env(&[("SHUT_DOWN", value), ("WORKFLOW_ID", "abc123")]),
            );
            let expected = WorkflowInvocation::new(&run, temp_dir.path(), "abc123");
            assert_eq!(bootstrap.plan(), Dispatch::RunThenIdle(expected), "SHUT_DOWN={:?}", value);
        }
    }

    #[test]
    fn test_strict_mode() {
        let temp_dir = TempDir::new().unwrap();

        let bootstrap = Bootstrap::new(layout(temp_dir.path(), "true"), env(&[("SHUT_DOWN", "yes")]))
            .strict()
            .unwrap();
        assert!(matches!(bootstrap.plan(), Dispatch::Delegate(_)));

        let result = Bootstrap::new(layout(temp_dir.path(), "true"), env(&[("SHUT_DOWN", "2")]))
            .strict();
        assert!(matches!(result, Err(BootError::Config(_))));
    }
}
