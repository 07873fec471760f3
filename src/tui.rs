use crate::cli::{AppConfig, validate_threshold, workers_from_env};
use anyhow::Result;
use dialoguer::{Confirm, Input, theme::ColorfulTheme};
use std::path::PathBuf;

pub fn interactive_config() -> Result<AppConfig> {
    println!("Interactive beat sync");
    println!("Press Enter to accept defaults.\n");

    let theme = ColorfulTheme::default();
    let video = prompt_existing_path(&theme, "Source video file path")?;
    let audio = prompt_existing_path(&theme, "Audio track file path")?;

    let threshold = loop {
        let raw: String = Input::with_theme(&theme)
            .with_prompt("Scene change threshold (higher = fewer scenes)")
            .default("0.4".into())
            .interact_text()?;
        match validate_threshold(raw.trim()) {
            Ok(value) => break value,
            Err(err) => println!("Invalid value: {err}."),
        }
    };

    let max_workers: usize = Input::with_theme(&theme)
        .with_prompt("Parallel workers per phase")
        .default(workers_from_env())
        .validate_with(|n: &usize| {
            if *n >= 1 {
                Ok(())
            } else {
                Err("must be >= 1")
            }
        })
        .interact_text()?;

    let base_dir: String = Input::with_theme(&theme)
        .with_prompt("Workspace base directory")
        .default("analysis".into())
        .interact_text()?;

    let play = Confirm::with_theme(&theme)
        .with_prompt("Play the final video when done?")
        .default(false)
        .interact()?;

    let verbose = Confirm::with_theme(&theme)
        .with_prompt("Show ffmpeg/aubio logs?")
        .default(false)
        .interact()?;

    let ffmpeg = prompt_optional_path(&theme, "Custom ffmpeg path (blank = PATH)")?;
    let ffprobe = prompt_optional_path(&theme, "Custom ffprobe path (blank = PATH)")?;
    let aubio = prompt_optional_path(&theme, "Custom aubio path (blank = PATH)")?;

    Ok(AppConfig {
        video,
        audio,
        threshold,
        max_workers,
        base_dir: PathBuf::from(base_dir.trim()),
        play,
        verbose,
        ffmpeg,
        ffprobe,
        aubio,
    })
}

fn prompt_existing_path(theme: &ColorfulTheme, prompt: &str) -> Result<PathBuf> {
    loop {
        let raw: String = Input::with_theme(theme)
            .with_prompt(prompt)
            .interact_text()?;
        let path = PathBuf::from(raw.trim());
        if path.exists() {
            return Ok(path);
        }
        println!("Path not found, please try again.");
    }
}

fn prompt_optional_path(theme: &ColorfulTheme, prompt: &str) -> Result<Option<PathBuf>> {
    loop {
        let raw: String = Input::with_theme(theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let path = PathBuf::from(trimmed);
        if path.exists() {
            return Ok(Some(path));
        }
        println!("Path not found. Leave blank to skip or enter a valid file path.");
    }
}
