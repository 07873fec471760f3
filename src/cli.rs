use anyhow::{Result, bail};
use clap::{ArgAction, Parser, ValueHint};
use std::path::PathBuf;

pub const DEFAULT_MAX_WORKERS: usize = 8;

#[derive(Parser, Debug)]
#[command(
    name = "beat_sync",
    version,
    about = "Re-cut a video so its scene changes land on the beats of a music track"
)]
pub struct Cli {
    /// Source video file
    #[arg(long, value_hint = ValueHint::FilePath, required_unless_present = "interactive")]
    pub video: Option<PathBuf>,

    /// Audio track whose beats drive the retiming
    #[arg(long, value_hint = ValueHint::FilePath, required_unless_present = "interactive")]
    pub audio: Option<PathBuf>,

    /// Scene change sensitivity; higher values yield fewer, larger scenes
    #[arg(long, default_value = "0.4", value_parser = validate_threshold)]
    pub threshold: f64,

    /// Parallel workers per phase (default: MAX_WORKERS env var, or 8)
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Directory that receives one timestamped workspace per run
    #[arg(long, default_value = "analysis", value_hint = ValueHint::DirPath)]
    pub base_dir: PathBuf,

    /// Open the final video with the platform default player when done
    #[arg(long, action = ArgAction::SetTrue)]
    pub play: bool,

    /// Prompt for options instead of taking flags
    #[arg(short = 'I', long, action = ArgAction::SetTrue)]
    pub interactive: bool,

    /// Show raw ffmpeg/aubio logs (useful for debugging)
    #[arg(long, action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Path to ffmpeg binary (overrides PATH lookup)
    #[arg(long, value_hint = ValueHint::ExecutablePath)]
    pub ffmpeg: Option<PathBuf>,

    /// Path to ffprobe binary (overrides PATH lookup)
    #[arg(long, value_hint = ValueHint::ExecutablePath)]
    pub ffprobe: Option<PathBuf>,

    /// Path to aubio binary (overrides PATH lookup)
    #[arg(long, value_hint = ValueHint::ExecutablePath)]
    pub aubio: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub video: PathBuf,
    pub audio: PathBuf,
    pub threshold: f64,
    pub max_workers: usize,
    pub base_dir: PathBuf,
    pub play: bool,
    pub verbose: bool,
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
    pub aubio: Option<PathBuf>,
}

impl Cli {
    pub fn into_config(self) -> Result<AppConfig> {
        let Some(video) = self.video else {
            bail!("--video is required");
        };
        let Some(audio) = self.audio else {
            bail!("--audio is required");
        };
        if !video.exists() {
            bail!("Video not found: {}", video.display());
        }
        if !audio.exists() {
            bail!("Audio not found: {}", audio.display());
        }
        let max_workers = self.max_workers.unwrap_or_else(workers_from_env);
        if max_workers == 0 {
            bail!("--max-workers must be >= 1");
        }

        Ok(AppConfig {
            video,
            audio,
            threshold: self.threshold,
            max_workers,
            base_dir: self.base_dir,
            play: self.play,
            verbose: self.verbose,
            ffmpeg: self.ffmpeg,
            ffprobe: self.ffprobe,
            aubio: self.aubio,
        })
    }
}

pub fn validate_threshold(raw: &str) -> Result<f64, String> {
    let parsed: f64 = raw
        .parse()
        .map_err(|_| format!("`{raw}` must be a number"))?;
    if !parsed.is_finite() || parsed <= 0.0 || parsed > 1.0 {
        return Err("threshold must be in (0.0, 1.0]".into());
    }
    Ok(parsed)
}

/// Read once at startup; the worker bound stays fixed for the whole run.
pub fn workers_from_env() -> usize {
    std::env::var("MAX_WORKERS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .filter(|&n| n >= 1)
        .unwrap_or(DEFAULT_MAX_WORKERS)
}
