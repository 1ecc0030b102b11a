use crate::config::settings::AppConfig;
use crate::infrastructure::queue::JobPublisher;
use crate::modules::transcode::pipeline::JobPipeline;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<JobPipeline>,
    pub publisher: Arc<dyn JobPublisher>,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: JobPipeline, publisher: Arc<dyn JobPublisher>) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            publisher,
        }
    }
}
