//! windsync - compile utility-class CSS once, refresh every editor.

mod actor;
mod builder;
mod bus;
mod cli;
mod compiler;
mod config;
mod core;
mod detect;
mod logger;
mod storage;
mod utils;
mod vfs;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::ProjectConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);
    logger::set_stderr(cli.command.prints_result());

    // packing needs no project
    if let Commands::Pack { dir } = &cli.command {
        println!("{}", cli::pack::pack_dir(dir)?);
        return Ok(());
    }

    let config = ProjectConfig::load(&cli)?;

    match &cli.command {
        Commands::Build { providers, .. } => cli::build::build_cache(&config, providers).map(|_| ()),
        Commands::Serve { .. } => cli::serve::serve(config),
        Commands::Replay {
            builder,
            file,
            publish,
        } => cli::replay::replay(&config, builder, file, *publish).map(|_| ()),
        Commands::Pack { .. } => Ok(()),
    }
}
