//! Remote-desktop (VNC + web VNC) startup.
//!
//! The base image ships one of two launcher scripts. Whichever is found first
//! is started in the background and left alone: there is no readiness check,
//! so SSH/VNC clients have to tolerate the desktop coming up a bit later.

use crate::command::command;
use crate::error::LaunchError;
use kickoff_core::Environment;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// A launcher script that has been started in the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopLauncher {
    pub script: PathBuf,
    pub pid: u32,
}

/// First candidate that exists on disk.
pub fn find_desktop_launcher(candidates: &[PathBuf]) -> Option<&Path> {
    candidates
        .iter()
        .find(|path| path.exists())
        .map(PathBuf::as_path)
}

/// Start the first available launcher without waiting for it.
///
/// Returns `Ok(None)` when none of the candidates exist.
pub fn start_desktop(
    candidates: &[PathBuf],
    display_id: &str,
    env: &Environment,
) -> Result<Option<DesktopLauncher>, LaunchError> {
    let Some(script) = find_desktop_launcher(candidates) else {
        return Ok(None);
    };

    let mut child = command(script, env)
        .stdin(Stdio::null())
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            program: script.display().to_string(),
            source,
        })?;

    let launcher = DesktopLauncher {
        script: script.to_path_buf(),
        pid: child.id(),
    };

    let name = script
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| script.display().to_string());
    tracing::info!(
        pid = launcher.pid,
        "Started VNC via {} on DISPLAY={}",
        name,
        display_id
    );

    // Only reaps the child so it does not linger as a zombie.
    let reaped = std::thread::Builder::new()
        .name("desktop-reaper".to_string())
        .spawn(move || match child.wait() {
            Ok(status) => tracing::debug!("Desktop launcher exited with {}", status),
            Err(e) => tracing::debug!("Failed to wait for desktop launcher: {}", e),
        });
    if let Err(e) = reaped {
        tracing::debug!("Desktop launcher left unreaped: {}", e);
    }

    Ok(Some(launcher))
}
