//! scanctl - inspect and convert neurofeedback session files
//!
//! Subcommands:
//! - `scanctl list <file>` - Print the variable names in a session file
//! - `scanctl show <file> <names>...` - Print selected variables as rows or JSON
//! - `scanctl convert <input> <output>` - Re-encode a session (by extension)
//! - `scanctl checkpoint <input> <label>` - Copy a session into the checkpoint directory

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scanstore::StoreConfig;

mod commands;

#[derive(Parser)]
#[command(name = "scanctl")]
#[command(about = "Inspect and convert neurofeedback session files")]
#[command(version)]
struct Cli {
    /// TOML config file with a [session] table
    #[arg(long, global = true, env = "SCANSTORE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List variable names, in file order
    List {
        /// Session file (.txt or .dat)
        file: PathBuf,

        /// Only volume variables
        #[arg(long)]
        volumes: bool,

        /// Only trial (block) variables
        #[arg(long)]
        blocks: bool,
    },

    /// Print selected variables
    Show {
        /// Session file (.txt or .dat)
        file: PathBuf,

        /// Variable names to read
        #[arg(required = true)]
        names: Vec<String>,

        /// Read trial variables instead of volume variables
        #[arg(long)]
        blocks: bool,

        /// Print JSON instead of tab-separated rows
        #[arg(long)]
        json: bool,
    },

    /// Load a session file and save it again; the output extension picks the encoding
    Convert {
        input: PathBuf,
        output: PathBuf,
    },

    /// Load a session file and write a checkpoint into the configured directory
    Checkpoint {
        input: PathBuf,

        /// Label embedded in the checkpoint file name
        label: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<StoreConfig> {
    match path {
        Some(path) => StoreConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => StoreConfig::from_env().context("invalid configuration in environment"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    match cli.command {
        Commands::List {
            file,
            volumes,
            blocks,
        } => {
            commands::list(&file, volumes, blocks)?;
        }
        Commands::Show {
            file,
            names,
            blocks,
            json,
        } => {
            commands::show(&file, &names, blocks, json)?;
        }
        Commands::Convert { input, output } => {
            commands::convert(&input, &output)?;
        }
        Commands::Checkpoint { input, label } => {
            let config = load_config(cli.config.as_ref())?;
            commands::checkpoint(&config, &input, &label)?;
        }
    }

    Ok(())
}
