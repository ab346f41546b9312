//! # checkpoint-strip
//!
//! Visual comparison of finetune checkpoints through
//! [ComfyUI](https://github.com/comfyanonymous/ComfyUI).
//!
//! For every `checkpoint-<N>.safetensors` in a training output directory the
//! crate queues one API-format workflow on a ComfyUI server, waits for the
//! images to land in ComfyUI's output directory, then stitches them left to
//! right under `checkpoint-<N>` labels into a single PNG.
//!
//! Stages run strictly in order, one request at a time:
//!
//! 1. [`scan_checkpoints`] lists and orders the checkpoints.
//! 2. [`submit_all`] renders a job per checkpoint from a [`WorkflowTemplate`]
//!    and posts it with [`ComfyClient`].
//! 3. [`wait_for_directory`] and [`wait_for_images`] poll the filesystem.
//! 4. [`build_strip`] composites the images.
//!
//! [`SweepRun`] wires the stages together from a [`StripConfig`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use checkpoint_strip::{FontLabeler, StripConfig, SweepRun, TokioClock};
//!
//! # async fn example() -> checkpoint_strip::Result<()> {
//! let config = StripConfig::builder()
//!     .with_workflow("/srv/workflows", "sd3_api.json")
//!     .with_finetune_dir("/train/sd3-run")
//!     .with_endpoint("127.0.0.1:8188")
//!     .with_comfyui_output_dir("/srv/comfyui/output")
//!     .with_image_output_dir("/srv/strips")
//!     .with_font("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf")
//!     .build();
//!
//! let labeler = FontLabeler::from_file(&config.font_path, config.label_font_size)?;
//! let report = SweepRun::new(&config, TokioClock, labeler).execute().await?;
//! if let Some(strip) = &report.strip {
//!     println!("Strip written to {}", strip.display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod compositor;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod poller;
pub mod scanner;
pub mod submitter;
pub mod types;
pub mod workflow;

pub use client::ComfyClient;
pub use compositor::{build_strip, compose, FontLabeler, Labeler, Panel, StripLayout};
pub use config::StripConfig;
pub use error::{Result, StripError};
pub use pipeline::{run_stamp_now, SweepRun};
pub use poller::{
    count_images, poll_until, wait_for_directory, wait_for_images, Clock, ManualClock, TokioClock,
};
pub use scanner::{parse_checkpoint_index, scan_checkpoints};
pub use submitter::{submit_all, submit_checkpoint};
pub use types::{
    CheckpointArtifact, JobOverrides, RunReport, StripOutcome, SubmitFailure, SubmitOutcome,
};
pub use workflow::WorkflowTemplate;
