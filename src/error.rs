use thiserror::Error;

/// Everything that can abort a run. Extraction and adjustment failures carry
/// the scene index so the operator can find the matching intermediate file in
/// the workspace.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("beat detection failed: {0}")]
    BeatDetection(String),

    #[error("scene detection failed: {0}")]
    SceneDetection(String),

    #[error("extraction of scene {index} failed: {reason}")]
    Extraction { index: usize, reason: String },

    #[error("speed adjustment of scene {index} failed: {reason}")]
    Adjustment { index: usize, reason: String },

    #[error("assembly failed during {stage}: {reason}")]
    Assembly { stage: &'static str, reason: String },

    #[error("worker pool setup failed: {0}")]
    WorkerPool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
