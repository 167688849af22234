//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

/// Keep utility-class CSS in sync across page-builder editors
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Print debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (default: windsync.toml, searched upward)
    #[arg(short = 'C', long, global = true, default_value = "windsync.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the cache once and exit
    #[command(visible_alias = "b")]
    Build {
        /// Scope an incremental build to these builders (repeatable)
        #[arg(short, long = "provider", value_name = "ID")]
        providers: Vec<String>,

        /// Minify the generated stylesheet
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        minify: Option<bool>,
    },

    /// Encode a design-system directory as a volume blob
    #[command(visible_alias = "p")]
    Pack {
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: PathBuf,
    },

    /// Run the compiler, variable sync and websocket bridge until Ctrl+C
    #[command(visible_alias = "s")]
    Serve {
        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<IpAddr>,

        /// Bridge port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Replay captured editor requests through a builder's save detector
    #[command(visible_alias = "r")]
    Replay {
        /// Builder id (bricks, gutenberg, ...)
        builder: String,

        /// Captured requests, one JSON object per line
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Send the resulting build requests to a running bridge
        #[arg(long)]
        publish: bool,
    },
}

impl Commands {
    /// Whether stdout carries the command's result rather than progress.
    pub fn prints_result(&self) -> bool {
        matches!(self, Self::Pack { .. } | Self::Replay { .. })
    }
}
