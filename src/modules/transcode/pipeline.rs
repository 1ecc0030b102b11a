use super::events::TranscodeJob;
use super::ladder::{plan_ladder, LadderRung};
use super::manifest::{write_master_playlist, MASTER_PLAYLIST};
use super::publisher::{publish_tree, remove_tree};
use super::transcoder::{ProbeError, RungError, Transcoder};
use crate::config::settings::{AppConfig, RungFailurePolicy};
use crate::infrastructure::storage::ObjectStorage;
use futures_util::StreamExt;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Received,
    Fetching,
    Transcoding,
    Manifesting,
    Publishing,
    CleanedUp,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStage::Received => "received",
            JobStage::Fetching => "fetching",
            JobStage::Transcoding => "transcoding",
            JobStage::Manifesting => "manifesting",
            JobStage::Publishing => "publishing",
            JobStage::CleanedUp => "cleaned-up",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("could not presign source: {0}")]
    Presign(String),
    #[error("source key {0:?} has no usable file name")]
    InvalidKey(String),
    #[error("download returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("could not store source locally: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("malformed job payload: {0}")]
    MalformedJob(#[from] serde_json::Error),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("height probe failed: {0}")]
    Probe(#[from] ProbeError),
    #[error("rung {height}p failed: {source}")]
    Rung {
        height: u32,
        #[source]
        source: RungError,
    },
    #[error("failed to write master playlist: {0}")]
    Manifest(#[source] std::io::Error),
}

/// A job that stopped before reaching `CleanedUp`.
#[derive(Debug, thiserror::Error)]
#[error("job failed while {stage}: {error}")]
pub struct JobFailure {
    pub stage: JobStage,
    #[source]
    pub error: PipelineError,
}

impl JobFailure {
    fn at(stage: JobStage, error: impl Into<PipelineError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }
}

/// Outcome of a job that reached `CleanedUp`, with the non-fatal failures it absorbed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub video_id: i64,
    pub source_height: u32,
    pub rungs_planned: usize,
    pub rungs_failed: usize,
    pub manifest_variants: usize,
    pub files_uploaded: usize,
    pub upload_failures: usize,
    pub cleanup_failures: usize,
}

/// Result of the local half of a job: probe, ladder, per-rung encode and manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeSummary {
    pub source_height: u32,
    pub ladder: Vec<LadderRung>,
    pub failed_rungs: Vec<u32>,
    pub manifest_path: PathBuf,
}

impl TranscodeSummary {
    pub fn manifest_variants(&self, policy: RungFailurePolicy) -> usize {
        match policy {
            RungFailurePolicy::Skip => self.ladder.len() - self.failed_rungs.len(),
            _ => self.ladder.len(),
        }
    }
}

/// Runs one job from queue payload to published HLS package.
///
/// Stages run strictly in order. Jobs share nothing except the storage
/// client and the transcoder binaries.
pub struct JobPipeline {
    storage: Arc<dyn ObjectStorage>,
    transcoder: Transcoder,
    http: reqwest::Client,
    video_folder: PathBuf,
    presign_ttl: Duration,
    rung_failure_policy: RungFailurePolicy,
}

impl JobPipeline {
    pub fn new(config: &AppConfig, storage: Arc<dyn ObjectStorage>) -> Self {
        Self::with_parts(
            storage,
            Transcoder::from_config(config),
            &config.video_folder,
            config.presign_ttl(),
            config.rung_failure_policy,
        )
    }

    pub fn with_parts(
        storage: Arc<dyn ObjectStorage>,
        transcoder: Transcoder,
        video_folder: impl Into<PathBuf>,
        presign_ttl: Duration,
        rung_failure_policy: RungFailurePolicy,
    ) -> Self {
        Self {
            storage,
            transcoder,
            http: reqwest::Client::new(),
            video_folder: video_folder.into(),
            presign_ttl,
            rung_failure_policy,
        }
    }

    /// Parses a raw queue payload and runs it. Malformed payloads fail at `Received`.
    pub async fn handle_message(&self, payload: &[u8]) -> Result<JobReport, JobFailure> {
        let job = TranscodeJob::from_slice(payload).map_err(|e| {
            error!(
                "❌ Malformed job payload {}: {}",
                String::from_utf8_lossy(payload),
                e
            );
            JobFailure::at(JobStage::Received, e)
        })?;

        self.run(&job).await
    }

    pub async fn run(&self, job: &TranscodeJob) -> Result<JobReport, JobFailure> {
        info!(video_id = job.video_id, s3_key = %job.s3_key, "🔹 Received job");

        let work_dir = self.work_dir_for(job);
        let result = self.run_in(job, &work_dir).await;

        if let Err(failure) = &result {
            error!(
                video_id = job.video_id,
                stage = %failure.stage,
                "❌ Job abandoned: {}",
                failure.error
            );
            if work_dir.exists() && remove_tree(&work_dir).await > 0 {
                warn!("⚠️ Leftovers remain in {}", work_dir.display());
            }
        }

        result
    }

    async fn run_in(&self, job: &TranscodeJob, work_dir: &Path) -> Result<JobReport, JobFailure> {
        info!(video_id = job.video_id, stage = %JobStage::Fetching, "Fetching source");
        let source = self
            .fetch_source(job, work_dir)
            .await
            .map_err(|e| JobFailure::at(JobStage::Fetching, e))?;
        info!("✅ Downloaded file locally: {}", source.display());

        info!(video_id = job.video_id, stage = %JobStage::Transcoding, "Transcoding source");
        let transcoded = self.transcode(&source).await?;

        info!(video_id = job.video_id, stage = %JobStage::Publishing, "Publishing output");
        let published = publish_tree(self.storage.as_ref(), job.video_id, work_dir).await;

        let report = JobReport {
            video_id: job.video_id,
            source_height: transcoded.source_height,
            rungs_planned: transcoded.ladder.len(),
            rungs_failed: transcoded.failed_rungs.len(),
            manifest_variants: transcoded.manifest_variants(self.rung_failure_policy),
            files_uploaded: published.uploaded,
            upload_failures: published.upload_failures,
            cleanup_failures: published.cleanup_failures,
        };

        info!(
            video_id = report.video_id,
            stage = %JobStage::CleanedUp,
            rungs_planned = report.rungs_planned,
            rungs_failed = report.rungs_failed,
            files_uploaded = report.files_uploaded,
            upload_failures = report.upload_failures,
            cleanup_failures = report.cleanup_failures,
            "✅ Finished transcoding & uploading"
        );

        Ok(report)
    }

    /// Probes `source`, encodes every rung next to it and writes `master.m3u8`
    /// in the same folder. Used by queued jobs and the direct HTTP trigger.
    pub async fn transcode(&self, source: &Path) -> Result<TranscodeSummary, JobFailure> {
        let folder = source.parent().unwrap_or_else(|| Path::new("."));
        info!("🎬 Starting transcoding for {}", source.display());

        let source_height = self
            .transcoder
            .probe_height(source)
            .await
            .map_err(|e| JobFailure::at(JobStage::Transcoding, e))?;
        info!("Input video height: {}", source_height);

        let ladder = plan_ladder(source_height);
        info!(
            "Target resolutions for ABR: {:?}",
            ladder.iter().map(|r| r.height).collect::<Vec<_>>()
        );

        let mut failed_rungs = Vec::new();
        for rung in &ladder {
            if let Err(e) = self.transcoder.transcode_rung(source, folder, rung).await {
                if self.rung_failure_policy == RungFailurePolicy::Fail {
                    return Err(JobFailure::at(
                        JobStage::Transcoding,
                        PipelineError::Rung {
                            height: rung.height,
                            source: e,
                        },
                    ));
                }
                error!(rung = rung.height, "❌ Rung failed, continuing: {}", e);
                failed_rungs.push(rung.height);
            }
        }

        let manifest_rungs: Vec<LadderRung> = match self.rung_failure_policy {
            RungFailurePolicy::Skip => ladder
                .iter()
                .filter(|r| !failed_rungs.contains(&r.height))
                .cloned()
                .collect(),
            _ => ladder.clone(),
        };

        info!(stage = %JobStage::Manifesting, variants = manifest_rungs.len(), "Writing master playlist");
        let manifest_path = write_master_playlist(folder, &manifest_rungs)
            .await
            .map_err(|e| JobFailure::at(JobStage::Manifesting, PipelineError::Manifest(e)))?;

        Ok(TranscodeSummary {
            source_height,
            ladder,
            failed_rungs,
            manifest_path,
        })
    }

    fn work_dir_for(&self, job: &TranscodeJob) -> PathBuf {
        self.video_folder
            .join(format!("{}-{}", job.video_id, Uuid::new_v4().simple()))
    }

    async fn fetch_source(&self, job: &TranscodeJob, work_dir: &Path) -> Result<PathBuf, FetchError> {
        let file_name = source_file_name(&job.s3_key)
            .ok_or_else(|| FetchError::InvalidKey(job.s3_key.clone()))?;

        let url = self
            .storage
            .presign_get(&job.s3_key, self.presign_ttl)
            .await
            .map_err(|e| FetchError::Presign(format!("{:#}", e)))?;

        tokio::fs::create_dir_all(work_dir).await?;
        let local = work_dir.join(file_name);
        info!("⬇ Downloading {} to {}", job.s3_key, local.display());

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let mut file = tokio::fs::File::create(&local).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        Ok(local)
    }
}

/// Last path segment of an object key, if it is a usable file name.
fn source_file_name(key: &str) -> Option<&str> {
    key.rsplit('/')
        .next()
        .map(|name| name.split('?').next().unwrap_or(name))
        .filter(|name| !name.is_empty() && *name != "." && *name != ".." && !name.contains('\\'))
        .filter(|name| !is_reserved_output_name(name))
}

/// Names the transcoder writes next to the source: rung folders (`{h}p`)
/// and the master playlist with its staging file.
pub fn is_reserved_output_name(name: &str) -> bool {
    let rung_dir = name
        .strip_suffix('p')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()));
    rung_dir || name == MASTER_PLAYLIST || name == format!("{MASTER_PLAYLIST}.tmp")
}
