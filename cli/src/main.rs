mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{choropleth, dictionary, enrich, inspect, load};

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match &cli.command {
        Commands::Inspect(args) => inspect::run(&cli, args),
        Commands::Dictionary(args) => dictionary::run(&cli, args),
        Commands::Choropleth(args) => choropleth::run(&cli, args),
        Commands::Enrich(args) => enrich::run(&cli, args),
        Commands::Load(args) => load::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> { run() }
