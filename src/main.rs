// Entrypoint for the CLI application.
// - Keeps `main` small: set up logging, parse arguments, run the command.
// - Command failures are printed by the command itself and do not change
//   the exit status.

use appctl::cli::{Cli, Commands};
use clap::Parser;
use env_logger::Env;

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    match cli.command {
        Commands::Variant { command } => appctl::commands::run(command),
    }
}
