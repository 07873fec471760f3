use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};

use crate::ffmpeg::{Tools, probe_duration_seconds, run_to_completion, stderr_tail};
use crate::scenes::{Scene, pair_cut_points, parse_showinfo_times};

/// Every media operation the pipeline needs, behind one seam so the
/// matching/ordering/failure logic can run against an in-memory fake.
pub trait MediaEngine: Send + Sync {
    /// Detect visual cuts; higher thresholds yield fewer, larger scenes.
    fn detect_scenes(&self, video: &Path, threshold: f64) -> Result<Vec<Scene>>;

    /// Cut `[start, end)` out of `video` into `output`.
    fn extract_segment(&self, video: &Path, start: f64, end: f64, output: &Path) -> Result<()>;

    /// Retime a clip's video presentation timestamps by `playback_speed`,
    /// dropping its audio.
    fn adjust_speed(&self, segment: &Path, playback_speed: f64, output: &Path) -> Result<()>;

    /// Losslessly concatenate clips, in the order given, video-only.
    fn concatenate(&self, segments: &[PathBuf], output: &Path) -> Result<()>;

    /// Mux the external audio track onto a (silent) video, shortest wins.
    fn overlay_audio(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;

    fn probe_duration(&self, media: &Path) -> Result<f64>;
}

/// The real engine: one ffmpeg/ffprobe subprocess per operation.
pub struct FfmpegEngine {
    tools: Tools,
    verbose: bool,
}

impl FfmpegEngine {
    pub fn new(tools: Tools, verbose: bool) -> Self {
        Self { tools, verbose }
    }

    fn ffmpeg_cmd(&self) -> Command {
        let mut cmd = Command::new(&self.tools.ffmpeg);
        if !self.verbose {
            cmd.args(["-hide_banner", "-nostats", "-loglevel", "error"]);
        }
        cmd
    }
}

impl MediaEngine for FfmpegEngine {
    fn detect_scenes(&self, video: &Path, threshold: f64) -> Result<Vec<Scene>> {
        // Scene detection always captures stderr: showinfo writes there.
        let out = Command::new(&self.tools.ffmpeg)
            .arg("-i")
            .arg(video)
            .arg("-filter:v")
            .arg(format!("select='gt(scene,{threshold})',showinfo"))
            .arg("-f")
            .arg("null")
            .arg("-")
            .output()
            .context("failed to run ffmpeg scene detection")?;
        if !out.status.success() {
            bail!(
                "ffmpeg scene detection failed (status {}): {}",
                out.status,
                stderr_tail(&out.stderr)
            );
        }
        let stderr = String::from_utf8_lossy(&out.stderr);
        Ok(pair_cut_points(&parse_showinfo_times(&stderr)))
    }

    fn extract_segment(&self, video: &Path, start: f64, end: f64, output: &Path) -> Result<()> {
        let mut cmd = self.ffmpeg_cmd();
        cmd.args(extract_args(video, start, end, output));
        run_to_completion(cmd, "segment extraction", self.verbose)
    }

    fn adjust_speed(&self, segment: &Path, playback_speed: f64, output: &Path) -> Result<()> {
        let mut cmd = self.ffmpeg_cmd();
        cmd.args(adjust_args(segment, playback_speed, output));
        run_to_completion(cmd, "speed adjustment", self.verbose)
    }

    fn concatenate(&self, segments: &[PathBuf], output: &Path) -> Result<()> {
        let list_path = output.with_file_name("concat_list.txt");
        fs::write(&list_path, concat_list_body(segments))
            .with_context(|| format!("failed to write {}", list_path.display()))?;

        let mut cmd = self.ffmpeg_cmd();
        cmd.args(concat_args(&list_path, output));
        run_to_completion(cmd, "concatenation", self.verbose)?;

        // On failure the list stays behind for diagnosis, like the segments.
        let _ = fs::remove_file(&list_path);
        Ok(())
    }

    fn overlay_audio(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        let mut cmd = self.ffmpeg_cmd();
        cmd.args(overlay_args(video, audio, output));
        run_to_completion(cmd, "audio overlay", self.verbose)
    }

    fn probe_duration(&self, media: &Path) -> Result<f64> {
        probe_duration_seconds(&self.tools, media)
    }
}

pub fn setpts_filter(playback_speed: f64) -> String {
    format!("setpts=PTS/{playback_speed}")
}

pub fn concat_list_body(segments: &[PathBuf]) -> String {
    let mut body = String::new();
    for path in segments {
        body.push_str(&format!("file '{}'\n", path.display()));
    }
    body
}

fn extract_args(video: &Path, start: f64, end: f64, output: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        video.into(),
        // millisecond precision keeps cuts aligned with detected pts
        "-ss".into(),
        format!("{start:.3}").into(),
        "-t".into(),
        format!("{:.3}", end - start).into(),
        output.into(),
    ]
}

fn adjust_args(segment: &Path, playback_speed: f64, output: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        segment.into(),
        "-filter:v".into(),
        setpts_filter(playback_speed).into(),
        "-an".into(),
        output.into(),
    ]
}

fn concat_args(list_path: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list_path.into(),
        "-c".into(),
        "copy".into(),
        "-an".into(),
        output.into(),
    ]
}

fn overlay_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        video.into(),
        "-i".into(),
        audio.into(),
        "-c:v".into(),
        "copy".into(),
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
        "-shortest".into(),
        output.into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn setpts_compresses_or_stretches() {
        assert_eq!(setpts_filter(0.75), "setpts=PTS/0.75");
        assert_eq!(setpts_filter(1.5), "setpts=PTS/1.5");
        assert_eq!(setpts_filter(1.0), "setpts=PTS/1");
    }

    #[test]
    fn extract_uses_millisecond_precision() {
        let args = strs(&extract_args(
            Path::new("in.mp4"),
            1.25,
            3.5,
            Path::new("out.mp4"),
        ));
        assert_eq!(
            args,
            vec!["-y", "-i", "in.mp4", "-ss", "1.250", "-t", "2.250", "out.mp4"]
        );
    }

    #[test]
    fn adjust_drops_audio() {
        let args = strs(&adjust_args(
            Path::new("seg.mp4"),
            0.8,
            Path::new("seg_adjusted.mp4"),
        ));
        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"setpts=PTS/0.8".to_string()));
    }

    #[test]
    fn concat_is_stream_copy() {
        let args = strs(&concat_args(Path::new("list.txt"), Path::new("cat.mp4")));
        let copy_pos = args.iter().position(|a| a == "-c").unwrap();
        assert_eq!(args[copy_pos + 1], "copy");
        assert!(args.contains(&"-an".to_string()));
    }

    #[test]
    fn overlay_trims_to_shortest_stream() {
        let args = strs(&overlay_args(
            Path::new("cat.mp4"),
            Path::new("song.flac"),
            Path::new("final.mp4"),
        ));
        assert!(args.contains(&"-shortest".to_string()));
        assert!(args.windows(2).any(|w| w == ["-map", "0:v:0"]));
        assert!(args.windows(2).any(|w| w == ["-map", "1:a:0"]));
    }

    #[test]
    fn concat_list_is_one_file_directive_per_clip() {
        let body = concat_list_body(&[
            PathBuf::from("a/segment_0_adjusted.mp4"),
            PathBuf::from("a/segment_1_adjusted.mp4"),
        ]);
        assert_eq!(
            body,
            "file 'a/segment_0_adjusted.mp4'\nfile 'a/segment_1_adjusted.mp4'\n"
        );
    }
}
