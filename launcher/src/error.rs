use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("empty command line for {0}")]
    EmptyCommand(String),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },

    #[error("failed to exec {program}: {source}")]
    Exec {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
