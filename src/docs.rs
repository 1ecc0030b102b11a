use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::transcode::handler::transcode_local,
        crate::modules::transcode::handler::enqueue_job,
    ),
    components(
        schemas(
            crate::modules::transcode::dto::TranscodeRequest,
            crate::modules::transcode::dto::TranscodeAccepted,
            crate::modules::transcode::dto::EnqueueJobRequest,
            crate::modules::transcode::dto::JobQueued,
        )
    ),
    tags(
        (name = "Transcode", description = "HLS transcoding jobs")
    )
)]
pub struct ApiDoc;
