use serde::{Deserialize, Serialize};

/// Message carried on the transcode queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeJob {
    pub video_id: i64,
    pub s3_key: String,
}

impl TranscodeJob {
    pub fn from_slice(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_queue_payload() {
        let job = TranscodeJob::from_slice(br#"{"videoId": 55, "s3Key": "uploads/clip.mp4"}"#).unwrap();
        assert_eq!(job.video_id, 55);
        assert_eq!(job.s3_key, "uploads/clip.mp4");
    }

    #[test]
    fn rejects_missing_fields_and_non_numeric_ids() {
        assert!(TranscodeJob::from_slice(br#"{"videoId": 55}"#).is_err());
        assert!(TranscodeJob::from_slice(br#"{"s3Key": "a.mp4"}"#).is_err());
        assert!(TranscodeJob::from_slice(br#"{"videoId": "abc", "s3Key": "a.mp4"}"#).is_err());
        assert!(TranscodeJob::from_slice(b"not json").is_err());
    }
}
