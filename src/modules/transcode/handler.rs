use super::dto::{EnqueueJobRequest, JobQueued, TranscodeAccepted, TranscodeRequest};
use super::service::TranscodeService;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

/// Transcode a local file
/// Runs the ladder, encoder and manifest steps in place, without uploading
#[utoipa::path(
    post,
    path = "/api/v1/transcode",
    request_body = TranscodeRequest,
    responses(
        (status = 202, description = "Transcoding started", body = ApiResponse<TranscodeAccepted>),
        (status = 400, description = "Bad Request")
    ),
    tag = "Transcode"
)]
pub async fn transcode_local(
    State(state): State<AppState>,
    Json(payload): Json<TranscodeRequest>,
) -> impl IntoResponse {
    if let Err(e) = payload.validate() {
        return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }

    match TranscodeService::start_local_transcode(state, payload).await {
        Ok(res) => ApiSuccess(
            ApiResponse::success(res, "Transcoding started"),
            StatusCode::ACCEPTED,
        )
        .into_response(),
        Err(e) => ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    }
}

/// Queue a transcode job
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    request_body = EnqueueJobRequest,
    responses(
        (status = 202, description = "Job queued", body = ApiResponse<JobQueued>),
        (status = 400, description = "Bad Request"),
        (status = 503, description = "Queue unavailable")
    ),
    tag = "Transcode"
)]
pub async fn enqueue_job(
    State(state): State<AppState>,
    Json(payload): Json<EnqueueJobRequest>,
) -> impl IntoResponse {
    if let Err(e) = payload.validate() {
        return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }

    match TranscodeService::enqueue_job(state, payload).await {
        Ok(res) => ApiSuccess(ApiResponse::success(res, "Job queued"), StatusCode::ACCEPTED)
            .into_response(),
        Err(e) => ApiError(e.to_string(), StatusCode::SERVICE_UNAVAILABLE).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::settings::{AppConfig, RungFailurePolicy};
    use crate::infrastructure::queue::JobPublisher;
    use crate::modules::transcode::pipeline::JobPipeline;
    use crate::modules::transcode::test_support::MemoryStorage;
    use crate::state::AppState;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    #[derive(Default)]
    struct RecordingPublisher {
        broken: bool,
        sent: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl JobPublisher for RecordingPublisher {
        async fn publish(&self, queue: &str, payload: &[u8]) -> Result<()> {
            if self.broken {
                return Err(anyhow!("connection refused"));
            }
            self.sent
                .lock()
                .unwrap()
                .push((queue.to_string(), payload.to_vec()));
            Ok(())
        }
    }

    fn config() -> AppConfig {
        AppConfig {
            server_port: 0,
            rabbitmq_url: "amqp://localhost".into(),
            transcode_queue: "transcode.queue".into(),
            worker_prefetch: 1,
            s3_endpoint: "http://localhost:9000".into(),
            s3_region: "ap-southeast-2".into(),
            s3_bucket: "videos".into(),
            s3_access_key: "key".into(),
            s3_secret_key: "secret".into(),
            presign_ttl_secs: 900,
            ffmpeg_path: "/nonexistent/ffmpeg".into(),
            ffprobe_path: "/nonexistent/ffprobe".into(),
            video_folder: std::env::temp_dir().join("hls-worker-tests"),
            transcode_timeout_secs: 5,
            probe_timeout_secs: 5,
            rung_failure_policy: RungFailurePolicy::Continue,
        }
    }

    async fn app(publisher: Arc<RecordingPublisher>) -> axum::Router {
        let config = config();
        let pipeline = JobPipeline::new(&config, Arc::new(MemoryStorage::default()));
        let state = AppState::new(config, pipeline, publisher);
        crate::app::create_app(state).await
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_check_responds_ok() {
        let app = app(Arc::default()).await;
        let res = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn transcode_rejects_empty_path() {
        let app = app(Arc::default()).await;
        let res = app
            .oneshot(post_json("/api/v1/transcode", r#"{"inputPath": ""}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn transcode_rejects_missing_file() {
        let app = app(Arc::default()).await;
        let res = app
            .oneshot(post_json(
                "/api/v1/transcode",
                r#"{"inputPath": "/definitely/missing/source.mp4"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn transcode_rejects_input_named_like_an_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("master.m3u8");
        std::fs::write(&input, "#EXTM3U\n").unwrap();
        let body = serde_json::json!({ "inputPath": input }).to_string();

        let app = app(Arc::default()).await;
        let res = app.oneshot(post_json("/api/v1/transcode", &body)).await.unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn enqueue_publishes_job_message() {
        let publisher = Arc::new(RecordingPublisher::default());
        let app = app(publisher.clone()).await;

        let res = app
            .oneshot(post_json(
                "/api/v1/jobs",
                r#"{"videoId": 55, "s3Key": "uploads/clip.mp4"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::ACCEPTED);
        let sent = publisher.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "transcode.queue");
        let message: serde_json::Value = serde_json::from_slice(&sent[0].1).unwrap();
        assert_eq!(
            message,
            serde_json::json!({"videoId": 55, "s3Key": "uploads/clip.mp4"})
        );
    }

    #[tokio::test]
    async fn enqueue_rejects_invalid_job() {
        let publisher = Arc::new(RecordingPublisher::default());
        let app = app(publisher.clone()).await;

        let res = app
            .oneshot(post_json("/api/v1/jobs", r#"{"videoId": 0, "s3Key": ""}"#))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(publisher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn enqueue_reports_unavailable_queue() {
        let publisher = Arc::new(RecordingPublisher {
            broken: true,
            ..Default::default()
        });
        let app = app(publisher).await;

        let res = app
            .oneshot(post_json(
                "/api/v1/jobs",
                r#"{"videoId": 1, "s3Key": "a.mp4"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
