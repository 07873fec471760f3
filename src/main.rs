mod beats;
mod cli;
mod engine;
mod error;
mod ffmpeg;
mod pipeline;
mod player;
mod progress;
mod scenes;
mod tui;
mod workspace;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::beats::AubioBeatSource;
use crate::cli::Cli;
use crate::engine::FfmpegEngine;
use crate::ffmpeg::resolve_tools;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = if cli.interactive {
        tui::interactive_config()?
    } else {
        cli.into_config()?
    };

    let tools = resolve_tools(config.ffmpeg.clone(), config.ffprobe.clone())?;
    let beat_source = AubioBeatSource::resolve(config.aubio.clone())?;
    let engine = FfmpegEngine::new(tools, config.verbose);

    let final_output = pipeline::run(&config, &engine, &beat_source)?;
    println!("Final video: {}", final_output.display());

    if config.play {
        player::open_with_default_app(&final_output)?;
    }
    Ok(())
}
