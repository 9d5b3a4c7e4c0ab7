use clap::Parser;
use env_logger::Env;
use log::info;

use polyclick::cli::{Cli, Commands, commands};
use polyclick::EngineError;

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    info!("Polyclick v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli) {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), EngineError> {
    match cli.command {
        Commands::Play { config, seconds } => {
            let settings = commands::load_settings(cli.settings.as_deref())?;
            commands::play(&config, seconds, settings)
        }
        Commands::Render {
            config,
            output,
            duration,
        } => {
            let settings = commands::load_settings(cli.settings.as_deref())?;
            commands::render(&config, &output, duration, settings)
        }
        Commands::Validate { config } => commands::validate(&config),
        Commands::Init { config } => commands::init(&config),
    }
}
