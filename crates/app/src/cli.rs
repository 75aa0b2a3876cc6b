use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::{service, session};

/// Mark points on a map, keep them per user, and measure the area they span.
#[derive(Debug, Parser)]
#[command(name = "geomark", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the points service that stores each user's point set.
    Serve(service::ServeCliArgs),
    /// Open an interactive marking session against a points service.
    Session(session::SessionCliArgs),
}

pub fn handle_commands(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve(args) => service::run(args.try_into()?),
        Command::Session(args) => session::run(args.try_into()?),
    }
}
