use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A `checkpoint-<N>` model file discovered in the finetune directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointArtifact {
    pub path: PathBuf,
    pub file_name: String,
    pub index: u64,
}

impl CheckpointArtifact {
    /// `checkpoint-<N>`, used as both the filename prefix and the strip label.
    pub fn label(&self) -> String {
        checkpoint_label(self.index)
    }

    /// Name of the first image ComfyUI writes for this checkpoint.
    pub fn output_image_name(&self) -> String {
        output_image_name(self.index)
    }
}

/// Label and filename prefix for checkpoint `index`.
pub fn checkpoint_label(index: u64) -> String {
    format!("checkpoint-{}", index)
}

/// First output image ComfyUI saves under `checkpoint-<index>`.
pub fn output_image_name(index: u64) -> String {
    format!("checkpoint-{}_0001.png", index)
}

/// Per-submission values written over the base workflow template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOverrides {
    /// `<folder>/<file>` reference for the model loader node.
    pub unet_name: String,
    /// `checkpoint-<N>` for the save node.
    pub filename_prefix: String,
    /// Run-wide output subdirectory for the save node.
    pub output_path: String,
}

/// Why a single submission did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitFailure {
    /// The endpoint could not be reached.
    Connection(String),
    /// The endpoint answered with a non-2xx status.
    Status(u16),
    /// Anything else (template rendering, serialization).
    Other(String),
}

/// Result of submitting one checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Queued { index: u64, status: u16 },
    Failed { index: u64, reason: SubmitFailure },
}

impl SubmitOutcome {
    /// Whether the prompt was accepted.
    pub fn is_success(&self) -> bool {
        matches!(self, SubmitOutcome::Queued { .. })
    }

    /// Checkpoint this outcome belongs to.
    pub fn index(&self) -> u64 {
        match self {
            SubmitOutcome::Queued { index, .. } | SubmitOutcome::Failed { index, .. } => *index,
        }
    }
}

/// What the compositor produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StripOutcome {
    /// A strip was written with these checkpoint indices, left to right.
    Written {
        path: PathBuf,
        panels: Vec<u64>,
        width: u32,
        height: u32,
    },
    /// No output image was available; nothing was written.
    NoImages,
}

/// Summary of a full sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_stamp: String,
    pub checkpoints: Vec<u64>,
    pub queued: Vec<u64>,
    pub failed: Vec<u64>,
    pub output_dir: PathBuf,
    pub directory_appeared: bool,
    pub images_ready: bool,
    pub strip: Option<PathBuf>,
}
