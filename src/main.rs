//! filmsync CLI entry point.

use clap::Parser;
use filmsync::cli::commands;
use filmsync::cli::{Cli, Commands};
use filmsync::config::SyncConfig;
use filmsync::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    // Run the command and handle errors
    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info,reqwest=info,hyper=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    if let Commands::Version = cli.command {
        return commands::version::execute(json);
    }

    let config = SyncConfig::resolve(cli.config.as_deref(), &cli.settings.overrides())?;

    match &cli.command {
        Commands::Run { once, dry_run } => commands::run::execute(&config, *once, *dry_run, json),
        Commands::Index { command } => commands::index::execute(command, &config, json),
        Commands::Checkpoint { command } => commands::checkpoint::execute(command, &config, json),
        Commands::Source { command } => commands::source::execute(command, &config, json),
        Commands::Version => commands::version::execute(json),
    }
}
