use super::dto::{EnqueueJobRequest, JobQueued, TranscodeAccepted, TranscodeRequest};
use super::events::TranscodeJob;
use super::pipeline::is_reserved_output_name;
use crate::state::AppState;
use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tracing::{error, info};

pub struct TranscodeService;

impl TranscodeService {
    /// Starts probe/ladder/encode/manifest on a file already on local disk.
    /// Runs in the background; nothing is uploaded.
    pub async fn start_local_transcode(state: AppState, req: TranscodeRequest) -> Result<TranscodeAccepted> {
        let input = PathBuf::from(&req.input_path);

        let is_file = tokio::fs::metadata(&input)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(anyhow!("Input file not found: {}", req.input_path));
        }
        if input
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(is_reserved_output_name)
        {
            return Err(anyhow!(
                "Input file name clashes with transcoder output: {}",
                req.input_path
            ));
        }

        let pipeline = state.pipeline.clone();
        tokio::spawn(async move {
            match pipeline.transcode(&input).await {
                Ok(summary) => info!(
                    variants = summary.ladder.len(),
                    failed = summary.failed_rungs.len(),
                    "✅ Local transcode finished: {}",
                    summary.manifest_path.display()
                ),
                Err(e) => error!("❌ Local transcode of {} failed: {}", input.display(), e),
            }
        });

        Ok(TranscodeAccepted {
            input_path: req.input_path,
        })
    }

    pub async fn enqueue_job(state: AppState, req: EnqueueJobRequest) -> Result<JobQueued> {
        let job = TranscodeJob {
            video_id: req.video_id,
            s3_key: req.s3_key,
        };
        let payload = serde_json::to_vec(&job)?;
        let queue = state.config.transcode_queue.clone();

        state
            .publisher
            .publish(&queue, &payload)
            .await
            .map_err(|e| anyhow!("Failed to queue job: {}", e))?;

        info!(video_id = job.video_id, "📦 Queued transcoding job on '{}'", queue);

        Ok(JobQueued {
            video_id: job.video_id,
            s3_key: job.s3_key,
            queue,
        })
    }
}
