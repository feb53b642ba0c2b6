use anyhow::Result;
use clap::Parser;

mod cli;
mod pattern;

fn main() -> Result<()> {
    cli::Args::parse().run()
}
