// Civic CLI entry point

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use civic::CivicConfig;
use civic_common::logging::init_logging;
use civic_common::Selector;

#[derive(Parser, Debug)]
#[command(author, version, about = "Civic governance tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load, validate and print the configuration
    Config {
        /// YAML file to read instead of the environment
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Print the selector of a canonical function signature
    Selector {
        /// Signature such as `checkERC20Limits(address)`
        signature: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { file } => {
            let config = match file {
                Some(path) => CivicConfig::from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => CivicConfig::from_env().context("loading configuration from environment")?,
            };
            init_logging(&config.log_level)?;
            info!(log_level = %config.log_level, "Configuration is valid");
            print!("{}", config.to_yaml()?);
        }
        Commands::Selector { signature } => {
            println!("{}", Selector::from_signature(&signature));
        }
    }

    Ok(())
}
