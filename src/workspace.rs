use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;

/// Per-run directory tree. Created once, never reused, never torn down: the
/// intermediates stay on disk for inspection after a failed (or successful)
/// run.
#[derive(Debug, Clone)]
pub struct RunWorkspace {
    pub base: PathBuf,
    pub raw_segments: PathBuf,
    pub adjusted_segments: PathBuf,
    pub outputs: PathBuf,
}

impl RunWorkspace {
    /// Create `<base_dir>/<YYYYMMDD_HHMMSS>/{raw_segments,adjusted_segments,outputs}`.
    pub fn create(base_dir: &Path) -> io::Result<Self> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        Self::create_at(base_dir.join(stamp))
    }

    /// Safe to call for an existing tree (`create_dir_all` is idempotent).
    pub fn create_at(base: PathBuf) -> io::Result<Self> {
        let workspace = Self {
            raw_segments: base.join("raw_segments"),
            adjusted_segments: base.join("adjusted_segments"),
            outputs: base.join("outputs"),
            base,
        };
        for dir in [
            &workspace.raw_segments,
            &workspace.adjusted_segments,
            &workspace.outputs,
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(workspace)
    }

    pub fn raw_segment_path(&self, index: usize) -> PathBuf {
        self.raw_segments.join(format!("segment_{index}.mp4"))
    }

    pub fn adjusted_segment_path(&self, index: usize) -> PathBuf {
        self.adjusted_segments
            .join(format!("segment_{index}_adjusted.mp4"))
    }

    pub fn concatenated_path(&self) -> PathBuf {
        self.outputs.join("concatenated_video.mp4")
    }

    pub fn final_output_path(&self) -> PathBuf {
        self.outputs.join("final_output.mp4")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_the_three_subdirectories() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(tmp.path()).unwrap();
        assert!(ws.raw_segments.is_dir());
        assert!(ws.adjusted_segments.is_dir());
        assert!(ws.outputs.is_dir());
        assert!(ws.base.starts_with(tmp.path()));
    }

    #[test]
    fn recreating_the_same_tree_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("20240101_120000");
        let first = RunWorkspace::create_at(base.clone()).unwrap();
        let second = RunWorkspace::create_at(base).unwrap();
        assert_eq!(first.outputs, second.outputs);
        assert!(second.outputs.is_dir());
    }

    #[test]
    fn segment_paths_carry_the_scene_index() {
        let ws = RunWorkspace {
            base: PathBuf::from("analysis/x"),
            raw_segments: PathBuf::from("analysis/x/raw_segments"),
            adjusted_segments: PathBuf::from("analysis/x/adjusted_segments"),
            outputs: PathBuf::from("analysis/x/outputs"),
        };
        assert!(ws.raw_segment_path(3).ends_with("segment_3.mp4"));
        assert!(
            ws.adjusted_segment_path(3)
                .ends_with("segment_3_adjusted.mp4")
        );
        assert!(ws.concatenated_path().ends_with("concatenated_video.mp4"));
        assert!(ws.final_output_path().ends_with("final_output.mp4"));
    }
}
