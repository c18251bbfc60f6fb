//! Optibench command-line interface.
//!
//! Solve optical benches described in TOML job files:
//! ```sh
//! optibench run job.toml
//! optibench validate job.toml
//! optibench inspect job.toml
//! optibench engines
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "optibench")]
#[command(about = "Optibench: scalar diffraction optical bench")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a bench from a TOML job file.
    Run {
        /// Path to the job file.
        config: PathBuf,
        /// Output root directory (overrides the job file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a job file without solving.
    Validate {
        /// Path to the job file.
        config: PathBuf,
    },
    /// Print the element axis and its simulation order.
    Inspect {
        /// Path to the job file.
        config: PathBuf,
    },
    /// List the available engines and the elements each one uses.
    Engines,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("Optibench Solver");
            println!("================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let report = runner::run_job(&job, output)?;
            if let Some(failure) = &report.failure {
                anyhow::bail!("Solve failed ({}): {failure}", failure.kind());
            }
            println!("Solve complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let workspace = runner::validate_job(&job)?;
            println!(
                "Configuration is valid: {} ({} elements)",
                config.display(),
                workspace.sequence.len()
            );
            Ok(())
        }
        Commands::Inspect { config } => {
            let job = config::load_config(&config)?;
            runner::inspect_job(&job)
        }
        Commands::Engines => {
            runner::print_engines();
            Ok(())
        }
    }
}
