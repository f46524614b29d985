use std::ffi::OsString;
use std::io;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::error::Result;
use crate::generate::{GenerateArgs, run_generate};
use crate::server::{ServeArgs, run_serve};

#[derive(Debug, Parser)]
#[command(
    name = "monkeytype_card",
    about = "SVG stat cards for Monkeytype personal bests",
    version,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Flags for the default `generate` action.
    #[command(flatten)]
    pub generate: GenerateArgs,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write a single card to a file (default).
    Generate(GenerateArgs),

    /// Serve cards over HTTP.
    Serve(ServeArgs),
}

impl Cli {
    #[must_use]
    pub fn into_command(self) -> Commands {
        self.command
            .unwrap_or_else(|| Commands::Generate(self.generate))
    }
}

/// Long flags that may also be spelled with a single dash (`-username=miodec`).
const SINGLE_DASH_LONG_FLAGS: [&str; 4] = ["username", "theme", "mode", "length"];

/// Rewrites `-username`, `-theme`, `-mode` and `-length`, bare or with
/// `=value`, to their `--` form. Clap would otherwise read them as a short
/// flag with an attached value (`-u sername=miodec`). Arguments after `--`
/// are left alone.
pub fn normalize_single_dash_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut after_separator = false;
    args.into_iter()
        .map(Into::<OsString>::into)
        .map(|arg| {
            if after_separator {
                return arg;
            }
            if arg == "--" {
                after_separator = true;
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            let Some(rest) = text
                .strip_prefix('-')
                .filter(|rest| !rest.starts_with('-'))
            else {
                return arg;
            };
            let name = rest.split_once('=').map_or(rest, |(name, _)| name);
            if SINGLE_DASH_LONG_FLAGS.contains(&name) {
                OsString::from(format!("-{text}"))
            } else {
                arg
            }
        })
        .collect()
}

fn init_tracing(command: &Commands) {
    let default_level = match command {
        Commands::Generate(_) => "warn",
        Commands::Serve(_) => "info",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub fn run_from_env() -> Result<()> {
    let command =
        Cli::parse_from(normalize_single_dash_flags(std::env::args_os())).into_command();
    init_tracing(&command);
    run(command)
}

pub fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Generate(args) => run_generate(args),
        Commands::Serve(args) => run_serve(args),
    }
}
