use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};

use crate::ffmpeg::resolve_bin;

/// Beat timestamps in seconds, non-decreasing, possibly empty. Shared
/// read-only by every scene's matching step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeatTrack(Vec<f64>);

impl BeatTrack {
    pub fn new(times: Vec<f64>) -> Self {
        Self(times)
    }

    pub fn times(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of matching one scene against the beat track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeatMatch {
    /// The scene stretches/compresses so its end lands on `beat`.
    Synced { playback_speed: f64, beat: f64 },
    /// No beat lies after the scene end; the scene is left untouched.
    NoFollowingBeat,
}

impl BeatMatch {
    pub fn playback_speed(&self) -> f64 {
        match self {
            BeatMatch::Synced { playback_speed, .. } => *playback_speed,
            BeatMatch::NoFollowingBeat => 1.0,
        }
    }
}

/// Match a scene to the nearest beat strictly after its end.
///
/// `playback_speed = original_duration / new_duration`, so a beat further out
/// than the scene end slows the scene down (< 1.0) and a beat between two
/// close cuts would speed it up (> 1.0). Beats at or before the scene end are
/// never candidates; a scene ending past the last beat keeps its speed.
pub fn match_scene_to_beat(scene_start: f64, scene_end: f64, beats: &BeatTrack) -> BeatMatch {
    let chosen = beats
        .times()
        .iter()
        .copied()
        .filter(|&beat| beat > scene_end)
        .reduce(f64::min);

    let Some(beat) = chosen else {
        return BeatMatch::NoFollowingBeat;
    };

    let new_duration = beat - scene_start;
    if new_duration <= 0.0 {
        // Cannot happen for a well-formed scene (beat > end > start), but a
        // zero span degrades to the identity case rather than a NaN speed.
        return BeatMatch::NoFollowingBeat;
    }

    BeatMatch::Synced {
        playback_speed: (scene_end - scene_start) / new_duration,
        beat,
    }
}

/// Narrow interface to whatever tracks beats in an audio file. The pipeline
/// never looks past this boundary; tests feed it canned tracks.
pub trait BeatSource: Send + Sync {
    fn detect_beats(&self, audio: &Path) -> Result<BeatTrack>;
}

/// Beat source backed by the `aubio` CLI (`aubio beat <file>` prints one
/// timestamp per line, in seconds, ascending).
pub struct AubioBeatSource {
    aubio: PathBuf,
}

impl AubioBeatSource {
    pub fn resolve(aubio: Option<PathBuf>) -> Result<Self> {
        Ok(Self {
            aubio: resolve_bin(aubio, "aubio")?,
        })
    }
}

impl BeatSource for AubioBeatSource {
    fn detect_beats(&self, audio: &Path) -> Result<BeatTrack> {
        let out = Command::new(&self.aubio)
            .arg("beat")
            .arg(audio)
            .output()
            .context("failed to run aubio")?;
        if !out.status.success() {
            bail!(
                "aubio beat failed (status {}): {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        parse_beat_lines(&String::from_utf8_lossy(&out.stdout))
    }
}

/// Parse `aubio beat` stdout: one float per line, blank lines ignored.
pub fn parse_beat_lines(stdout: &str) -> Result<BeatTrack> {
    let mut times = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let t: f64 = line
            .parse()
            .with_context(|| format!("unexpected beat timestamp line `{line}`"))?;
        times.push(t);
    }
    Ok(BeatTrack::new(times))
}
