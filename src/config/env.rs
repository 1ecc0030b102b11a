use std::env;

pub enum EnvKey {
    ServerPort,
    RabbitMqUrl,
    TranscodeQueue,
    WorkerPrefetch,
    S3Endpoint,
    S3Region,
    S3Bucket,
    S3AccessKey,
    S3SecretKey,
    PresignTtlSecs,
    FfmpegPath,
    FfprobePath,
    VideoFolder,
    TranscodeTimeoutSecs,
    ProbeTimeoutSecs,
    RungFailurePolicy,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::RabbitMqUrl => "RABBITMQ_URL",
            EnvKey::TranscodeQueue => "TRANSCODE_QUEUE",
            EnvKey::WorkerPrefetch => "WORKER_PREFETCH",
            EnvKey::S3Endpoint => "S3_ENDPOINT",
            EnvKey::S3Region => "S3_REGION",
            EnvKey::S3Bucket => "S3_BUCKET",
            EnvKey::S3AccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::S3SecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::PresignTtlSecs => "PRESIGN_TTL_SECS",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::FfprobePath => "FFPROBE_PATH",
            EnvKey::VideoFolder => "VIDEO_FOLDER",
            EnvKey::TranscodeTimeoutSecs => "TRANSCODE_TIMEOUT_SECS",
            EnvKey::ProbeTimeoutSecs => "PROBE_TIMEOUT_SECS",
            EnvKey::RungFailurePolicy => "RUNG_FAILURE_POLICY",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str()).ok()
}
