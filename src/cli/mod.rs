//! CLI handlers for the informational subcommands.
//!
//! Presenting a talk lives in `app`; these only print.

mod args;

pub use args::{Cli, CliCommand, PresentCliArgs};

use anyhow::Result;

use crate::capture::{FfmpegCapabilities, MediaFormat};
use crate::config::Config;

pub async fn handle_formats_command() -> Result<()> {
    let config = Config::load()?;
    let capabilities = FfmpegCapabilities::probe(&config.capture.ffmpeg_path).await;

    println!("Capture formats, in order of preference ({}):\n", config.capture.ffmpeg_path);
    for line in format_lines(&capabilities) {
        println!("{}", line);
    }

    match MediaFormat::select(|format| capabilities.supports(format)) {
        Some(format) => println!("\nRecordings will use {}", format.mime_type),
        None => println!("\nNo supported format: talks will be presented without recording"),
    }
    Ok(())
}

fn format_lines(capabilities: &FfmpegCapabilities) -> Vec<String> {
    MediaFormat::preference_list()
        .iter()
        .map(|format| {
            let mark = if capabilities.supports(format) { "yes" } else { "no " };
            format!(
                "  [{}] {:<5} {} + {}",
                mark,
                format.extension(),
                format.video_codec,
                format.audio_codec
            )
        })
        .collect()
}

pub fn handle_config_command() -> Result<()> {
    let config = Config::load()?;
    println!("Config file: {}", Config::config_path()?.display());
    println!("Recordings: {}\n", config.recordings_dir()?.display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
