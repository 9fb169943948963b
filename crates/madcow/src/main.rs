//! Command-line entry point: runs madcow on the terminal.
//!
//! ```bash
//! madcow                       # search ./madcow.toml, then ~/.config/madcow
//! madcow -c bot.toml -D        # explicit config, debug logging
//! madcow -p production -n cow  # production profile, answer to "cow"
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use madcow::prelude::*;

#[derive(Parser)]
#[command(name = "madcow", version, about = "A modular chat bot")]
struct Args {
    /// Configuration file (default: search for madcow.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Configuration profile (also MADCOW_PROFILE)
    #[arg(short, long)]
    profile: Option<String>,

    /// Turn on debugging output
    #[arg(short = 'D', long, conflicts_with = "quiet")]
    debug: bool,

    /// Only show warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Name the bot answers to, overriding bot.name
    #[arg(short, long)]
    nick: Option<String>,
}

impl Args {
    fn level_override(&self) -> Option<LogLevel> {
        if self.debug {
            Some(LogLevel::Debug)
        } else if self.quiet {
            Some(LogLevel::Warn)
        } else {
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = MadcowRuntime::builder()
        .level_override(args.level_override())
        .nick(args.nick.clone());
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }

    let runtime = builder.build().await.context("failed to start madcow")?;
    info!(
        name = %runtime.dispatcher().resolver().name(),
        modules = ?runtime.dispatcher().registry().names(),
        "madcow is ready"
    );

    runtime.run_shell().await?;
    Ok(())
}
