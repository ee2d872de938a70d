mod bootstrap;
mod error;

use bootstrap::Bootstrap;
use clap::{Parser, Subcommand};
use error::BootError;
use kickoff_core::{
    BootConfig, BootLayout, DEFAULT_ENV_FILE, DEFAULT_SSH_COMMAND, DEFAULT_STARTUP_DIR,
    Diagnostics, EnvSnapshot, Environment,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kickoff")]
#[command(about = "Container entrypoint: start SSH and VNC, run setup, launch a workflow")]
struct Cli {
    /// Directory holding bin/setup and bin/run (defaults to the current directory)
    #[arg(long, global = true)]
    workdir: Option<PathBuf>,

    /// Directory searched for vnc_startup.sh / startup.sh
    #[arg(long, global = true, default_value = DEFAULT_STARTUP_DIR)]
    startup_dir: PathBuf,

    /// Environment snapshot file
    #[arg(long, global = true, default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,

    /// Command line that starts the SSH daemon
    #[arg(long, global = true, default_value = DEFAULT_SSH_COMMAND)]
    ssh_command: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start services, run setup, then run the workflow (default)
    Boot {
        /// Reject SHUT_DOWN values that are not a recognized boolean
        #[arg(long)]
        strict_config: bool,
    },
    /// Write the environment snapshot and exit
    Snapshot,
    /// Print the startup diagnostics and exit
    Diagnose {
        /// Emit JSON instead of the text report
        #[arg(long)]
        json: bool,
    },
    /// Validate the configuration taken from the environment
    CheckConfig,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, BootError> {
    // Children start inside the workdir, so paths built from it must be absolute.
    let workdir = match cli.workdir {
        Some(dir) => std::path::absolute(&dir)?,
        None => std::env::current_dir()?,
    };

    let mut layout = BootLayout::new(&workdir).with_ssh_command(&cli.ssh_command);
    layout.startup_dir = cli.startup_dir;
    layout.env_file = cli.env_file;

    let env = Environment::capture();

    match cli.command.unwrap_or(Commands::Boot {
        strict_config: false,
    }) {
        Commands::Boot { strict_config } => {
            let mut bootstrap = Bootstrap::new(layout, env);
            if strict_config {
                bootstrap = bootstrap.strict()?;
            }
            match bootstrap.run()? {}
        }
        Commands::Snapshot => {
            let snapshot = EnvSnapshot::new(&layout.env_file);
            snapshot.write(&env)?;
            tracing::info!("Environment written to {}", snapshot.path().display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Diagnose { json } => {
            let config = BootConfig::from_env(&env);
            let diagnostics = Diagnostics::new(&config, &layout.workdir, &env);
            if json {
                println!("{}", serde_json::to_string_pretty(&diagnostics.to_json())?);
            } else {
                diagnostics.write_to(&mut std::io::stdout().lock())?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::CheckConfig => {
            let config = BootConfig::from_env(&env);
            let mode = config.strict_mode()?;
            println!("SHUT_DOWN={:?} -> {}", config.shut_down, mode);
            if mode != config.mode() {
                tracing::warn!(
                    "SHUT_DOWN={:?} is read as {} only with --strict-config; boot without it uses {}",
                    config.shut_down,
                    mode,
                    config.mode()
                );
            }
            println!("WORKFLOW_ID={:?}", config.workflow_id);
            println!("DISPLAY={:?}", config.display);
            Ok(ExitCode::SUCCESS)
        }
    }
}
