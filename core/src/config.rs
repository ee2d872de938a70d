use crate::environment::Environment;
use crate::error::ConfigError;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const SHUT_DOWN_VAR: &str = "SHUT_DOWN";
pub const WORKFLOW_ID_VAR: &str = "WORKFLOW_ID";
pub const DISPLAY_VAR: &str = "DISPLAY";
pub const BROWSERS_PATH_VAR: &str = "PLAYWRIGHT_BROWSERS_PATH";

pub const DEFAULT_SHUT_DOWN: &str = "0";
pub const DEFAULT_DISPLAY: &str = ":1";

pub const DEFAULT_STARTUP_DIR: &str = "/dockerstartup";
pub const DEFAULT_ENV_FILE: &str = "/workspace/.env";
pub const DEFAULT_SSH_COMMAND: &str = "service ssh start";

const VNC_STARTUP_SCRIPT: &str = "vnc_startup.sh";
const GENERIC_STARTUP_SCRIPT: &str = "startup.sh";

/// What happens once setup is done and the environment is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Hand the process over to `bin/run` and let its exit status end the container.
    ShutDownAfterRun,
    /// Run the workflow as a child, then keep the container alive.
    KeepAlive,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::ShutDownAfterRun => write!(f, "shut-down-after-run"),
            RunMode::KeepAlive => write!(f, "keep-alive"),
        }
    }
}

/// Configuration read from the container environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootConfig {
    /// Raw `SHUT_DOWN` value. Only the literal `1` selects shutdown mode.
    pub shut_down: String,
    /// Opaque id handed to `bin/run`, kept byte for byte.
    pub workflow_id: OsString,
    pub display: String,
    /// Printed in the diagnostics only.
    pub browsers_path: Option<String>,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            shut_down: DEFAULT_SHUT_DOWN.to_string(),
            workflow_id: OsString::new(),
            display: DEFAULT_DISPLAY.to_string(),
            browsers_path: None,
        }
    }
}

impl BootConfig {
    pub fn from_env(env: &Environment) -> Self {
        Self::from_lookup(|key| env.get(key).map(|v| v.to_os_string()))
    }

    /// Resolve the configuration through an arbitrary lookup.
    ///
    /// Unset and empty values both fall back to the default, the same way a
    /// shell `${VAR:-default}` expansion does.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let text = |value: OsString| value.to_string_lossy().into_owned();

        Self {
            shut_down: non_empty(SHUT_DOWN_VAR)
                .map(text)
                .unwrap_or_else(|| DEFAULT_SHUT_DOWN.to_string()),
            workflow_id: non_empty(WORKFLOW_ID_VAR).unwrap_or_default(),
            display: non_empty(DISPLAY_VAR)
                .map(text)
                .unwrap_or_else(|| DEFAULT_DISPLAY.to_string()),
            browsers_path: lookup(BROWSERS_PATH_VAR).map(text),
        }
    }

    pub fn mode(&self) -> RunMode {
        if self.shut_down == "1" {
            RunMode::ShutDownAfterRun
        } else {
            RunMode::KeepAlive
        }
    }

    /// Mode derived from the strict flag parser instead of the literal `1` rule.
    pub fn strict_mode(&self) -> Result<RunMode, ConfigError> {
        if parse_flag(SHUT_DOWN_VAR, &self.shut_down)? {
            Ok(RunMode::ShutDownAfterRun)
        } else {
            Ok(RunMode::KeepAlive)
        }
    }
}

/// Parse a boolean-like environment value.
///
/// Accepts `1/true/yes/on` and `0/false/no/off` (case-insensitive, surrounding
/// whitespace ignored); an empty value is false. Anything else is rejected.
pub fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected one of 1/0, true/false, yes/no, on/off; got {:?}", other),
        }),
    }
}

/// Filesystem locations and commands the bootstrap touches.
#[derive(Debug, Clone)]
pub struct BootLayout {
    /// Directory holding `bin/setup` and `bin/run`; children start here.
    pub workdir: PathBuf,
    /// Directory searched for the remote-desktop launcher scripts.
    pub startup_dir: PathBuf,
    /// Where the environment snapshot is written.
    pub env_file: PathBuf,
    /// Program and arguments that start the SSH daemon.
    pub ssh_command: Vec<String>,
}

impl BootLayout {
    pub fn new(workdir: &Path) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
            startup_dir: PathBuf::from(DEFAULT_STARTUP_DIR),
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            ssh_command: split_command(DEFAULT_SSH_COMMAND),
        }
    }

    /// Replace the SSH start command with a whitespace-separated command line.
    pub fn with_ssh_command(mut self, command: &str) -> Self {
        self.ssh_command = split_command(command);
        self
    }

    pub fn setup_script(&self) -> PathBuf {
        self.workdir.join("bin").join("setup")
    }

    pub fn run_script(&self) -> PathBuf {
        self.workdir.join("bin").join("run")
    }

    /// Launcher scripts in priority order.
    pub fn desktop_launchers(&self) -> [PathBuf; 2] {
        [
            self.startup_dir.join(VNC_STARTUP_SCRIPT),
            self.startup_dir.join(GENERIC_STARTUP_SCRIPT),
        ]
    }
}

fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}
