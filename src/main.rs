use anyhow::Result;
use clap::Parser;
use ignite_talk::{
    app,
    cli::{handle_config_command, handle_formats_command, Cli, CliCommand},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        CliCommand::Version => {
            println!("ignite-talk {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliCommand::Formats => handle_formats_command().await,
        CliCommand::Config => handle_config_command(),
        CliCommand::Present(args) => app::run_presentation(args).await,
    }
}
