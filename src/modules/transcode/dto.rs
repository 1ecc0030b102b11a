use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeRequest {
    #[validate(length(min = 1, message = "inputPath is required"))]
    pub input_path: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueJobRequest {
    #[validate(range(min = 1, message = "videoId must be positive"))]
    pub video_id: i64,
    #[validate(length(min = 1, message = "s3Key is required"))]
    pub s3_key: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeAccepted {
    pub input_path: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobQueued {
    pub video_id: i64,
    pub s3_key: String,
    pub queue: String,
}
