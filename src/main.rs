//! Trimline CLI
//!
//! Command-line front end for non-destructive recording edits.

use clap::Parser;
use env_logger::Env;
use log::debug;

use trimline::cli::{commands, Cli, Commands};
use trimline::Result;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG still wins over the default filter
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    debug!("Trimline v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Trimline v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Info { input } => commands::info(&input),
        Commands::Cut {
            input,
            output,
            exclude,
            virtual_time,
            config,
        } => commands::cut(&input, &output, &exclude, virtual_time, config.as_deref()),
        Commands::Keep {
            input,
            output,
            from,
            to,
            config,
        } => commands::keep(&input, &output, from, to, config.as_deref()),
    }
}
