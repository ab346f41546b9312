use chrono::Local;
use tracing::{error, info, warn};

use crate::client::ComfyClient;
use crate::compositor::{build_strip, Labeler, StripLayout};
use crate::config::StripConfig;
use crate::error::Result;
use crate::poller::{wait_for_directory, wait_for_images, Clock};
use crate::scanner::{folder_name, scan_checkpoints};
use crate::submitter::submit_all;
use crate::types::{RunReport, StripOutcome};
use crate::workflow::WorkflowTemplate;

/// Format of the per-run output subdirectory.
pub const RUN_STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Current local time as a run stamp, e.g. `2024-06-01_12-00-00`.
pub fn run_stamp_now() -> String {
    Local::now().format(RUN_STAMP_FORMAT).to_string()
}

/// One checkpoint sweep: scan, submit, wait, composite.
///
/// # Example
/// ```no_run
/// use checkpoint_strip::{FontLabeler, StripConfig, SweepRun, TokioClock};
///
/// # async fn example() -> checkpoint_strip::Result<()> {
/// let config = StripConfig::from_env()?;
/// let labeler = FontLabeler::from_file(&config.font_path, config.label_font_size)?;
/// let report = SweepRun::new(&config, TokioClock, labeler).execute().await?;
/// println!("queued {} of {}", report.queued.len(), report.checkpoints.len());
/// # Ok(())
/// # }
/// ```
pub struct SweepRun<'a, C, L> {
    config: &'a StripConfig,
    client: ComfyClient,
    clock: C,
    labeler: L,
    run_stamp: String,
}

impl<'a, C, L> SweepRun<'a, C, L>
where
    C: Clock,
    L: Labeler,
{
    /// Stamps the run with the current local time.
    pub fn new(config: &'a StripConfig, clock: C, labeler: L) -> Self {
        Self {
            config,
            client: ComfyClient::new(config.api_endpoint.clone()),
            clock,
            labeler,
            run_stamp: run_stamp_now(),
        }
    }

    /// Replace the run stamp computed in [`new`](SweepRun::new).
    pub fn with_run_stamp(mut self, stamp: impl Into<String>) -> Self {
        self.run_stamp = stamp.into();
        self
    }

    /// Use a preconfigured client.
    pub fn with_client(mut self, client: ComfyClient) -> Self {
        self.client = client;
        self
    }

    /// Stamp naming this run's output subdirectory.
    pub fn run_stamp(&self) -> &str {
        &self.run_stamp
    }

    /// Clock driving the polling loops.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Run every stage in order.
    ///
    /// Only startup failures (template load, checkpoint scan) are returned as
    /// errors. Submission failures, poll timeouts and compositing problems are
    /// logged and reflected in the [`RunReport`].
    pub async fn execute(&self) -> Result<RunReport> {
        let config = self.config;
        let template = WorkflowTemplate::load(
            &config.workflow_path(),
            &config.loader_node,
            &config.save_node,
        )?;

        info!(dir = %config.finetune_dir.display(), "Finetune directory");
        let artifacts = scan_checkpoints(&config.finetune_dir)?;
        let folder = folder_name(&config.finetune_dir);

        let mut report = RunReport {
            run_stamp: self.run_stamp.clone(),
            checkpoints: artifacts.iter().map(|a| a.index).collect(),
            output_dir: config.run_output_dir(&self.run_stamp),
            ..Default::default()
        };

        if artifacts.is_empty() {
            warn!("No .safetensors files found in the directory, nothing to render");
            return Ok(report);
        }

        let outcomes =
            submit_all(&self.client, &template, &artifacts, &folder, &self.run_stamp).await;
        for outcome in &outcomes {
            if outcome.is_success() {
                report.queued.push(outcome.index());
            } else {
                report.failed.push(outcome.index());
            }
        }

        let expected = artifacts.len();
        info!(path = %report.output_dir.display(), "Absolute output path");

        report.directory_appeared = wait_for_directory(
            &self.clock,
            &report.output_dir,
            config.poll_interval,
            config.directory_timeout,
        )
        .await;
        if !report.directory_appeared {
            error!("Output directory was not created");
            return Ok(report);
        }

        info!(expected, "Expected image count");
        report.images_ready = wait_for_images(
            &self.clock,
            &report.output_dir,
            expected,
            config.poll_interval,
            config.image_timeout,
        )
        .await;
        if !report.images_ready {
            error!("Failed to generate all images in time");
            return Ok(report);
        }

        let layout = StripLayout::with_band_height(config.label_band_height);
        let strip_path = config.strip_path(&self.run_stamp);
        match build_strip(
            &config.finetune_dir,
            &report.output_dir,
            &strip_path,
            &layout,
            &self.labeler,
            config.strict,
        ) {
            Ok(StripOutcome::Written { path, .. }) => report.strip = Some(path),
            Ok(StripOutcome::NoImages) => {}
            Err(e) => error!("Failed to build image strip: {}", e),
        }

        Ok(report)
    }
}
