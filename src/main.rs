//! tuneforge - convert media to FLAC with embedded lyrics, tags and cover art
//! Drives ffmpeg through trim/encode and tagging stages

mod app;
mod cli;
mod features;
mod tool;
mod utils;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match cli::parse_args(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Run `tuneforge --help` for usage");
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing for logging; status lines go to stdout, logs to stderr
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    for warning in &cli.warnings {
        println!("Warning: {}", warning);
    }

    let app = app::App::new(cli.config.as_deref());
    app.run(cli.command).await
}
