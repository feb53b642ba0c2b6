use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use ffmpeg_next::util::log::{self as ffmpeg_log, Level};
use tracing_subscriber::EnvFilter;

mod formats;
mod hardware;
mod record;

pub use formats::FormatsCommand;
pub use hardware::HardwareCommand;
pub use record::RecordCommand;

#[derive(Parser, Debug)]
#[command(name = "mediawriter")]
#[command(about = "Encode and mux test media through FFmpeg")]
pub struct Args {
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List container formats, or describe one
    Formats(FormatsCommand),
    /// Probe which hardware encoders work on this machine
    Hardware(HardwareCommand),
    /// Record a synthetic test pattern
    Record(RecordCommand),
}

impl Args {
    pub fn run(self) -> Result<()> {
        init_logging(self.verbose);

        match self.command {
            Command::Formats(cmd) => cmd.run(),
            Command::Hardware(cmd) => cmd.run(),
            Command::Record(cmd) => cmd.run(),
        }
    }
}

/**
    Install the tracing subscriber and match FFmpeg's own log level to it.

    `RUST_LOG` takes precedence over the verbosity flags.
*/
fn init_logging(verbose: u8) {
    let (directive, ffmpeg_level) = match verbose {
        0 => ("info", Level::Error),
        1 => ("debug", Level::Warning),
        _ => ("trace", Level::Verbose),
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
    ffmpeg_log::set_level(ffmpeg_level);
}
