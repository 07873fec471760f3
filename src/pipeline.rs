use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::beats::{BeatMatch, BeatSource, BeatTrack, match_scene_to_beat};
use crate::cli::AppConfig;
use crate::engine::MediaEngine;
use crate::error::{Result, SyncError};
use crate::progress;
use crate::scenes::Scene;
use crate::workspace::RunWorkspace;

/// A scene paired with its extracted sub-clip.
#[derive(Debug, Clone)]
pub struct SegmentJob {
    pub scene: Scene,
    pub raw_path: PathBuf,
}

/// A retimed clip ready for assembly. `scene.index` decides its slot in the
/// final concatenation; completion order never does.
#[derive(Debug, Clone)]
pub struct AdjustedSegment {
    pub scene: Scene,
    pub playback_speed: f64,
    pub path: PathBuf,
}

/// Runs the extraction and adjustment phases on a bounded worker pool and
/// hands the ordered results to the assembler. The pool size is fixed at
/// construction for the lifetime of the run.
pub struct SegmentPipeline<'a> {
    engine: &'a dyn MediaEngine,
    workspace: &'a RunWorkspace,
    pool: ThreadPool,
}

impl<'a> SegmentPipeline<'a> {
    pub fn new(
        engine: &'a dyn MediaEngine,
        workspace: &'a RunWorkspace,
        max_workers: usize,
    ) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(max_workers)
            .build()
            .map_err(|e| SyncError::WorkerPool(e.to_string()))?;
        Ok(Self {
            engine,
            workspace,
            pool,
        })
    }

    /// Extraction phase: cut every scene out of the source video in parallel.
    /// All units must succeed; the first failure fails the phase (units still
    /// in flight finish on their own, their output is simply never used).
    pub fn extract(&self, video: &Path, scenes: &[Scene]) -> Result<Vec<SegmentJob>> {
        info!(scenes = scenes.len(), "scene extraction started");
        let bar = progress::phase_bar(scenes.len() as u64, "Extracting scenes");

        let result = self.pool.install(|| {
            scenes
                .par_iter()
                .map(|&scene| {
                    let raw_path = self.workspace.raw_segment_path(scene.index);
                    self.engine
                        .extract_segment(video, scene.start, scene.end, &raw_path)
                        .map_err(|e| SyncError::Extraction {
                            index: scene.index,
                            reason: format!("{e:#}"),
                        })?;
                    bar.inc(1);
                    Ok(SegmentJob { scene, raw_path })
                })
                .collect::<Result<Vec<_>>>()
        });

        match &result {
            Ok(_) => {
                bar.finish_with_message("Extraction complete");
                info!("scene extraction completed");
            }
            Err(_) => bar.abandon_with_message("Extraction failed"),
        }
        result
    }

    /// Adjustment phase: match each extracted segment to its following beat
    /// and retime it, in parallel. Same all-or-fail policy as extraction.
    pub fn adjust(&self, jobs: &[SegmentJob], beats: &BeatTrack) -> Result<Vec<AdjustedSegment>> {
        info!(segments = jobs.len(), "scene adjustment started");
        let bar = progress::phase_bar(jobs.len() as u64, "Adjusting scenes");

        let result = self.pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    let scene = job.scene;
                    let playback_speed =
                        match match_scene_to_beat(scene.start, scene.end, beats) {
                            BeatMatch::Synced {
                                playback_speed,
                                beat,
                            } => {
                                debug!(
                                    scene = scene.index,
                                    beat, speed = playback_speed, "matched scene to beat"
                                );
                                playback_speed
                            }
                            BeatMatch::NoFollowingBeat => {
                                warn!(
                                    scene = scene.index,
                                    "no beat after scene end, leaving playback speed at 1.0"
                                );
                                1.0
                            }
                        };

                    let path = self.workspace.adjusted_segment_path(scene.index);
                    self.engine
                        .adjust_speed(&job.raw_path, playback_speed, &path)
                        .map_err(|e| SyncError::Adjustment {
                            index: scene.index,
                            reason: format!("{e:#}"),
                        })?;
                    bar.inc(1);
                    Ok(AdjustedSegment {
                        scene,
                        playback_speed,
                        path,
                    })
                })
                .collect::<Result<Vec<_>>>()
        });

        match &result {
            Ok(_) => {
                bar.finish_with_message("Adjustment complete");
                info!("scene adjustment completed");
            }
            Err(_) => bar.abandon_with_message("Adjustment failed"),
        }
        result
    }

    /// Concatenate the adjusted clips in scene-index order, then overlay the
    /// external audio track.
    pub fn assemble(&self, segments: &[AdjustedSegment], audio: &Path) -> Result<PathBuf> {
        // The clips are handed over in scene-index order no matter how the
        // caller's slice happens to be arranged.
        let mut ordered: Vec<&AdjustedSegment> = segments.iter().collect();
        ordered.sort_by_key(|segment| segment.scene.index);
        let clips: Vec<PathBuf> = ordered.iter().map(|segment| segment.path.clone()).collect();

        info!(clips = clips.len(), "concatenation started");
        let concatenated = self.workspace.concatenated_path();
        self.engine
            .concatenate(&clips, &concatenated)
            .map_err(|e| SyncError::Assembly {
                stage: "concatenation",
                reason: format!("{e:#}"),
            })?;
        info!("concatenation completed");

        info!("audio overlay started");
        let final_output = self.workspace.final_output_path();
        self.engine
            .overlay_audio(&concatenated, audio, &final_output)
            .map_err(|e| SyncError::Assembly {
                stage: "audio overlay",
                reason: format!("{e:#}"),
            })?;
        info!("audio overlay completed");

        self.warn_on_duration_mismatch(&concatenated, audio);
        Ok(final_output)
    }

    /// "Shortest wins" silently trims the longer stream; at least make the
    /// mismatch visible to the operator.
    fn warn_on_duration_mismatch(&self, video: &Path, audio: &Path) {
        match (
            self.engine.probe_duration(video),
            self.engine.probe_duration(audio),
        ) {
            (Ok(video_s), Ok(audio_s)) => {
                if (video_s - audio_s).abs() > 0.5 {
                    warn!(
                        video_s,
                        audio_s, "stream durations differ, output trimmed to the shorter"
                    );
                }
            }
            _ => debug!("could not probe output durations"),
        }
    }
}

/// The whole run: detect beats and scenes (independently), create the
/// workspace, extract, adjust, assemble. Any failure aborts; intermediates
/// stay on disk.
pub fn run(
    config: &AppConfig,
    engine: &dyn MediaEngine,
    beat_source: &dyn BeatSource,
) -> Result<PathBuf> {
    let spinner = progress::detection_spinner("Detecting beats and scenes.");
    let (beats, scenes) = rayon::join(
        || {
            beat_source
                .detect_beats(&config.audio)
                .map_err(|e| SyncError::BeatDetection(format!("{e:#}")))
        },
        || {
            engine
                .detect_scenes(&config.video, config.threshold)
                .map_err(|e| SyncError::SceneDetection(format!("{e:#}")))
        },
    );
    spinner.finish_and_clear();
    let beats = beats?;
    let scenes = scenes?;
    info!(beats = beats.len(), scenes = scenes.len(), "detection completed");

    if scenes.is_empty() {
        return Err(SyncError::SceneDetection(
            "no scene changes detected; try a lower --threshold".into(),
        ));
    }
    if beats.is_empty() {
        warn!("beat track is empty, every scene will keep its original speed");
    }

    let workspace = RunWorkspace::create(&config.base_dir)?;
    info!(path = %workspace.base.display(), "workspace created");

    let pipeline = SegmentPipeline::new(engine, &workspace, config.max_workers)?;
    let jobs = pipeline.extract(&config.video, &scenes)?;
    let adjusted = pipeline.adjust(&jobs, &beats)?;
    let final_output = pipeline.assemble(&adjusted, &config.audio)?;
    info!(path = %final_output.display(), "final video ready");
    Ok(final_output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beats::BeatTrack;
    use anyhow::bail;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    /// In-memory engine: records call order, optionally fails one extraction,
    /// optionally staggers completion so low indices finish last.
    #[derive(Default)]
    struct FakeEngine {
        scenes: Vec<Scene>,
        fail_extraction_for: Option<usize>,
        stagger: bool,
        extracted: Mutex<Vec<usize>>,
        adjusted: Mutex<Vec<(usize, f64)>>,
        concatenated: Mutex<Vec<Vec<PathBuf>>>,
    }

    fn index_of(path: &Path) -> usize {
        path.file_stem()
            .unwrap()
            .to_string_lossy()
            .split('_')
            .nth(1)
            .unwrap()
            .parse()
            .unwrap()
    }

    impl MediaEngine for FakeEngine {
        fn detect_scenes(&self, _video: &Path, _threshold: f64) -> anyhow::Result<Vec<Scene>> {
            Ok(self.scenes.clone())
        }

        fn extract_segment(
            &self,
            _video: &Path,
            _start: f64,
            _end: f64,
            output: &Path,
        ) -> anyhow::Result<()> {
            let index = index_of(output);
            if self.stagger {
                thread::sleep(Duration::from_millis(30 * (3 - index.min(3)) as u64));
            }
            if self.fail_extraction_for == Some(index) {
                bail!("boom");
            }
            self.extracted.lock().unwrap().push(index);
            Ok(())
        }

        fn adjust_speed(
            &self,
            _segment: &Path,
            playback_speed: f64,
            output: &Path,
        ) -> anyhow::Result<()> {
            let index = index_of(output);
            if self.stagger {
                thread::sleep(Duration::from_millis(30 * (3 - index.min(3)) as u64));
            }
            self.adjusted.lock().unwrap().push((index, playback_speed));
            Ok(())
        }

        fn concatenate(&self, segments: &[PathBuf], _output: &Path) -> anyhow::Result<()> {
            self.concatenated.lock().unwrap().push(segments.to_vec());
            Ok(())
        }

        fn overlay_audio(&self, _video: &Path, _audio: &Path, _output: &Path) -> anyhow::Result<()> {
            Ok(())
        }

        fn probe_duration(&self, _media: &Path) -> anyhow::Result<f64> {
            Ok(10.0)
        }
    }

    struct FakeBeatSource(Vec<f64>);

    impl BeatSource for FakeBeatSource {
        fn detect_beats(&self, _audio: &Path) -> anyhow::Result<BeatTrack> {
            Ok(BeatTrack::new(self.0.clone()))
        }
    }

    fn scene(index: usize, start: f64, end: f64) -> Scene {
        Scene { index, start, end }
    }

    fn test_workspace(tmp: &tempfile::TempDir) -> RunWorkspace {
        RunWorkspace::create_at(tmp.path().join("run")).unwrap()
    }

    fn test_config(tmp: &tempfile::TempDir, max_workers: usize) -> AppConfig {
        AppConfig {
            video: PathBuf::from("video.mp4"),
            audio: PathBuf::from("audio.flac"),
            threshold: 0.4,
            max_workers,
            base_dir: tmp.path().to_path_buf(),
            play: false,
            verbose: false,
            ffmpeg: None,
            ffprobe: None,
            aubio: None,
        }
    }

    #[test]
    fn extraction_results_are_in_scene_order_despite_staggered_completion() {
        let tmp = tempfile::tempdir().unwrap();
        let workspace = test_workspace(&tmp);
        let engine = FakeEngine {
            stagger: true,
            ..Default::default()
        };
        let pipeline = SegmentPipeline::new(&engine, &workspace, 4).unwrap();

        let scenes = [scene(0, 0.0, 1.0), scene(1, 1.0, 3.0), scene(2, 3.0, 4.0)];
        let jobs = pipeline.extract(Path::new("video.mp4"), &scenes).unwrap();

        let indices: Vec<usize> = jobs.iter().map(|j| j.scene.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(jobs[1].raw_path.ends_with("segment_1.mp4"));
    }

    #[test]
    fn adjustment_applies_the_matched_speed_per_scene() {
        let tmp = tempfile::tempdir().unwrap();
        let workspace = test_workspace(&tmp);
        let engine = FakeEngine::default();
        let pipeline = SegmentPipeline::new(&engine, &workspace, 2).unwrap();

        let scenes = [scene(0, 0.0, 1.5), scene(1, 1.5, 3.0)];
        let jobs = pipeline.extract(Path::new("video.mp4"), &scenes).unwrap();
        let beats = BeatTrack::new(vec![2.0, 4.0]);
        let adjusted = pipeline.adjust(&jobs, &beats).unwrap();

        // scene 0: (1.5 - 0.0) / (2.0 - 0.0); scene 1: (3.0 - 1.5) / (4.0 - 1.5)
        assert_eq!(adjusted[0].playback_speed, 0.75);
        assert_eq!(adjusted[1].playback_speed, 0.6);
        assert!(adjusted[0].path.ends_with("segment_0_adjusted.mp4"));
    }

    #[test]
    fn empty_beat_track_leaves_every_scene_at_identity_speed() {
        let tmp = tempfile::tempdir().unwrap();
        let workspace = test_workspace(&tmp);
        let engine = FakeEngine::default();
        let pipeline = SegmentPipeline::new(&engine, &workspace, 2).unwrap();

        let scenes = [scene(0, 0.0, 1.0), scene(1, 1.0, 2.0)];
        let jobs = pipeline.extract(Path::new("video.mp4"), &scenes).unwrap();
        let adjusted = pipeline.adjust(&jobs, &BeatTrack::default()).unwrap();

        assert!(adjusted.iter().all(|s| s.playback_speed == 1.0));
    }

    #[test]
    fn assembly_order_is_scene_index_order() {
        let tmp = tempfile::tempdir().unwrap();
        let workspace = test_workspace(&tmp);
        let engine = FakeEngine::default();
        let pipeline = SegmentPipeline::new(&engine, &workspace, 2).unwrap();

        // Hand the assembler segments in completion order 2, 0, 1.
        let shuffled: Vec<AdjustedSegment> = [2usize, 0, 1]
            .into_iter()
            .map(|i| AdjustedSegment {
                scene: scene(i, i as f64, i as f64 + 1.0),
                playback_speed: 1.0,
                path: workspace.adjusted_segment_path(i),
            })
            .collect();

        pipeline
            .assemble(&shuffled, Path::new("audio.flac"))
            .unwrap();

        let concatenated = engine.concatenated.lock().unwrap();
        let order: Vec<usize> = concatenated[0].iter().map(|p| index_of(p)).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn failed_extraction_aborts_before_adjustment_starts() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = FakeEngine {
            scenes: vec![scene(0, 0.0, 1.0), scene(1, 1.0, 2.0), scene(2, 2.0, 3.0)],
            fail_extraction_for: Some(1),
            ..Default::default()
        };
        let beat_source = FakeBeatSource(vec![1.0, 2.0, 5.0]);
        let config = test_config(&tmp, 2);

        let err = run(&config, &engine, &beat_source).unwrap_err();
        match err {
            SyncError::Extraction { index, .. } => assert_eq!(index, 1),
            other => panic!("unexpected error: {other}"),
        }
        assert!(engine.adjusted.lock().unwrap().is_empty());
        assert!(engine.concatenated.lock().unwrap().is_empty());
    }

    #[test]
    fn run_with_no_detected_scenes_is_a_detection_error() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = FakeEngine::default();
        let beat_source = FakeBeatSource(vec![1.0]);
        let config = test_config(&tmp, 2);

        let err = run(&config, &engine, &beat_source).unwrap_err();
        assert!(matches!(err, SyncError::SceneDetection(_)));
    }

    #[test]
    fn full_run_produces_final_output_path() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = FakeEngine {
            scenes: vec![scene(0, 0.0, 1.5), scene(1, 1.5, 3.0)],
            ..Default::default()
        };
        let beat_source = FakeBeatSource(vec![2.0, 4.0]);
        let config = test_config(&tmp, 2);

        let final_output = run(&config, &engine, &beat_source).unwrap();
        assert!(final_output.ends_with("outputs/final_output.mp4"));

        // The recorded log is in completion order; sort by index to compare.
        let mut adjusted = engine.adjusted.lock().unwrap().clone();
        adjusted.sort_by_key(|(index, _)| *index);
        assert_eq!(adjusted, vec![(0, 0.75), (1, 0.6)]);

        let concatenated = engine.concatenated.lock().unwrap();
        let order: Vec<usize> = concatenated[0].iter().map(|p| index_of(p)).collect();
        assert_eq!(order, vec![0, 1]);
    }
}
