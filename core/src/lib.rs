//! Shared pieces of the kickoff container entrypoint.
//!
//! Resolves the boot configuration from the process environment, keeps the
//! environment that is handed to child processes, persists it as a sorted
//! `KEY=VALUE` snapshot, and renders the startup diagnostics.

mod config;
mod diagnostics;
mod environment;
mod error;

pub use config::{
    BootConfig, BootLayout, RunMode, parse_flag, BROWSERS_PATH_VAR, DEFAULT_DISPLAY,
    DEFAULT_ENV_FILE, DEFAULT_SHUT_DOWN, DEFAULT_SSH_COMMAND, DEFAULT_STARTUP_DIR, DISPLAY_VAR,
    SHUT_DOWN_VAR, WORKFLOW_ID_VAR,
};
pub use diagnostics::Diagnostics;
pub use environment::{EnvSnapshot, Environment};
pub use error::{ConfigError, SnapshotError};
