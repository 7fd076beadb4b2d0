use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ignite-talk")]
#[command(about = "Run and record 20 x 15 second Ignite talks", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Present a deck of 20 slide images, recording the talk
    Present(PresentCliArgs),
    /// List capture formats and which ones the local ffmpeg supports
    Formats,
    /// Show the config file location and its contents
    Config,
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct PresentCliArgs {
    /// Directory holding exactly 20 slide images, ordered by file name
    pub deck_dir: PathBuf,
    /// Event title shown in the overlay
    #[arg(long, default_value = "")]
    pub title: String,
    /// Talk title shown in the overlay
    #[arg(long, default_value = "")]
    pub story: String,
    /// Speaker name shown in the overlay
    #[arg(long, default_value = "")]
    pub speaker: String,
    /// Present without recording
    #[arg(long)]
    pub no_record: bool,
    /// Wait for Enter before starting the clock
    #[arg(long)]
    pub wait: bool,
    /// Where to write the recording (defaults to the recordings directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
