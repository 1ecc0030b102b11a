use crate::config::env::{self, EnvKey};
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// What the pipeline does when the transcoder exits non-zero for a rung.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RungFailurePolicy {
    /// Log, keep going, and still reference the rung in the manifest.
    #[default]
    Continue,
    /// Log, keep going, and leave the rung out of the manifest.
    Skip,
    /// Abort the job at the transcoding stage.
    Fail,
}

impl FromStr for RungFailurePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "skip" => Ok(Self::Skip),
            "fail" => Ok(Self::Fail),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub rabbitmq_url: String,
    pub transcode_queue: String,
    pub worker_prefetch: u16,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_bucket: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub presign_ttl_secs: u64,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub video_folder: PathBuf,
    pub transcode_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub rung_failure_policy: RungFailurePolicy,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let policy_raw = env::get_or(EnvKey::RungFailurePolicy, "continue");
        let rung_failure_policy =
            policy_raw
                .parse::<RungFailurePolicy>()
                .map_err(|_| ConfigError::Invalid {
                    key: EnvKey::RungFailurePolicy.as_str(),
                    value: policy_raw.clone(),
                })?;

        Ok(Self {
            server_port: number(EnvKey::ServerPort, 3000)?,
            rabbitmq_url: required(EnvKey::RabbitMqUrl)?,
            transcode_queue: env::get_or(EnvKey::TranscodeQueue, "transcode.queue"),
            worker_prefetch: positive(EnvKey::WorkerPrefetch, 1)?,
            s3_endpoint: required(EnvKey::S3Endpoint)?,
            s3_region: env::get_or(EnvKey::S3Region, "ap-southeast-2"),
            s3_bucket: required(EnvKey::S3Bucket)?,
            s3_access_key: required(EnvKey::S3AccessKey)?,
            s3_secret_key: required(EnvKey::S3SecretKey)?,
            presign_ttl_secs: positive(EnvKey::PresignTtlSecs, 15 * 60)?,
            ffmpeg_path: env::get_or(EnvKey::FfmpegPath, "ffmpeg").into(),
            ffprobe_path: env::get_or(EnvKey::FfprobePath, "ffprobe").into(),
            video_folder: env::get_or(EnvKey::VideoFolder, "/tmp/hls-worker").into(),
            transcode_timeout_secs: positive(EnvKey::TranscodeTimeoutSecs, 3600)?,
            probe_timeout_secs: positive(EnvKey::ProbeTimeoutSecs, 60)?,
            rung_failure_policy,
        })
    }

    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.presign_ttl_secs)
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

fn required(key: EnvKey) -> Result<String, ConfigError> {
    let name = key.as_str();
    env::get(key).map_err(|_| ConfigError::Missing(name))
}

fn number<T: FromStr>(key: EnvKey, default: T) -> Result<T, ConfigError> {
    let name = key.as_str();
    parse_or(name, env::get_opt(key), default)
}

/// Like `number`, but zero is rejected. A prefetch of 0 means unlimited to the broker.
fn positive<T: FromStr + Default + PartialEq>(key: EnvKey, default: T) -> Result<T, ConfigError> {
    let name = key.as_str();
    parse_positive(name, env::get_opt(key), default)
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    let Some(value) = raw else {
        return Ok(default);
    };
    let parsed: Result<T, _> = value.trim().parse();
    parsed.map_err(|_| ConfigError::Invalid { key, value })
}

fn parse_positive<T: FromStr + Default + PartialEq>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    let shown = raw.clone().unwrap_or_default();
    let value = parse_or(key, raw, default)?;
    if value == T::default() {
        return Err(ConfigError::Invalid { key, value: shown });
    }
    Ok(value)
}
