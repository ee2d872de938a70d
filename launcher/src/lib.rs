//! Process launching for the kickoff entrypoint.
//!
//! Starts the SSH daemon, the detached remote-desktop launcher and the
//! `bin/setup` / `bin/run` collaborators, and provides the terminal
//! behaviors: replacing the process with `bin/run`, or idling forever.

mod command;
mod desktop;
mod error;
mod ssh;
mod workflow;

pub use desktop::{DesktopLauncher, find_desktop_launcher, start_desktop};
pub use error::LaunchError;
pub use ssh::start_ssh;
pub use workflow::{WorkflowInvocation, idle_forever, run_setup};
