use kickoff_core::{ConfigError, SnapshotError};
use kickoff_launcher::LaunchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("SSH service failed to start: {0}")]
    Ssh(#[source] LaunchError),

    #[error("setup failed: {0}")]
    Setup(#[source] LaunchError),

    #[error("environment snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("could not hand over to the workflow runner: {0}")]
    Exec(#[source] LaunchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
