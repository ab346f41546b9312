use tracing::{error, info, warn};

use crate::client::ComfyClient;
use crate::error::StripError;
use crate::types::{CheckpointArtifact, JobOverrides, SubmitFailure, SubmitOutcome};
use crate::workflow::WorkflowTemplate;

/// Overrides for one checkpoint: `<folder>/<file>` for the loader,
/// `checkpoint-<N>` for the save prefix, and the run-wide output path.
pub fn overrides_for(
    artifact: &CheckpointArtifact,
    folder: &str,
    run_stamp: &str,
) -> JobOverrides {
    JobOverrides {
        unet_name: format!("{}/{}", folder, artifact.file_name),
        filename_prefix: artifact.label(),
        output_path: run_stamp.to_string(),
    }
}

/// Render and post the job for a single checkpoint.
///
/// Never returns an error: every failure becomes [`SubmitOutcome::Failed`]
/// after being logged, so the caller can move on to the next checkpoint.
pub async fn submit_checkpoint(
    client: &ComfyClient,
    template: &WorkflowTemplate,
    artifact: &CheckpointArtifact,
    folder: &str,
    run_stamp: &str,
) -> SubmitOutcome {
    let overrides = overrides_for(artifact, folder, run_stamp);
    info!(unet_name = %overrides.unet_name, "Processing checkpoint");

    let index = artifact.index;
    let result = match template.render(&overrides) {
        Ok(job) => client.queue_prompt(&job).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(status) => {
            info!(checkpoint = index, status, "Queued prompt");
            SubmitOutcome::Queued { index, status }
        }
        Err(StripError::Network { context, source }) => {
            error!(
                checkpoint = index,
                endpoint = %client.prompt_url(),
                "Failed to reach the server: {}: {}",
                context,
                source
            );
            SubmitOutcome::Failed {
                index,
                reason: SubmitFailure::Connection(source.to_string()),
            }
        }
        Err(StripError::Http { status, body }) => {
            error!(
                checkpoint = index,
                endpoint = %client.prompt_url(),
                status,
                body = %body,
                "The server couldn't fulfill the request"
            );
            SubmitOutcome::Failed {
                index,
                reason: SubmitFailure::Status(status),
            }
        }
        Err(other) => {
            error!(checkpoint = index, "Failed to queue prompt: {}", other);
            SubmitOutcome::Failed {
                index,
                reason: SubmitFailure::Other(other.to_string()),
            }
        }
    }
}

/// Submit every checkpoint in order, one request at a time.
pub async fn submit_all(
    client: &ComfyClient,
    template: &WorkflowTemplate,
    artifacts: &[CheckpointArtifact],
    folder: &str,
    run_stamp: &str,
) -> Vec<SubmitOutcome> {
    if artifacts.is_empty() {
        warn!("No .safetensors checkpoints to submit");
        return Vec::new();
    }

    let mut outcomes = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        outcomes.push(submit_checkpoint(client, template, artifact, folder, run_stamp).await);
    }
    outcomes
}
