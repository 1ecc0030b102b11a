use crate::state::AppState;
use axum::routing::post;
use axum::Router;

pub mod dto;
pub mod events;
pub mod handler;
pub mod ladder;
pub mod manifest;
pub mod pipeline;
pub mod publisher;
pub mod service;
pub mod transcoder;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/transcode", post(handler::transcode_local))
        .route("/jobs", post(handler::enqueue_job))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::infrastructure::storage::ObjectStorage;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory object store that records every upload attempt.
    #[derive(Default)]
    pub struct MemoryStorage {
        base_url: String,
        fail_keys: Vec<String>,
        attempts: Mutex<Vec<String>>,
        objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    }

    impl MemoryStorage {
        pub fn with_base_url(base_url: &str) -> Self {
            Self {
                base_url: base_url.to_string(),
                ..Self::default()
            }
        }

        pub fn failing_on(key: &str) -> Self {
            Self::default().fail_on(key)
        }

        pub fn fail_on(mut self, key: &str) -> Self {
            self.fail_keys.push(key.to_string());
            self
        }

        pub fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }

        pub fn keys(&self) -> Vec<String> {
            self.objects.lock().unwrap().keys().cloned().collect()
        }

        pub fn body(&self, key: &str) -> Option<Vec<u8>> {
            self.objects.lock().unwrap().get(key).map(|(b, _)| b.clone())
        }

        pub fn content_type(&self, key: &str) -> Option<String> {
            self.objects.lock().unwrap().get(key).map(|(_, ct)| ct.clone())
        }
    }

    #[async_trait]
    impl ObjectStorage for MemoryStorage {
        async fn presign_get(&self, key: &str, _ttl: Duration) -> Result<String> {
            Ok(format!("{}/{}", self.base_url, key))
        }

        async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<()> {
            self.attempts.lock().unwrap().push(key.to_string());
            if self.fail_keys.iter().any(|k| k == key) {
                return Err(anyhow!("simulated upload failure for {}", key));
            }
            let body = tokio::fs::read(path).await?;
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), (body, content_type.to_string()));
            Ok(())
        }
    }

    /// Serves `body` for any key under the returned base URL.
    pub async fn serve_source(body: Vec<u8>) -> String {
        use axum::routing::get;

        let app = axum::Router::new().route(
            "/objects/{*key}",
            get(move || {
                let body = body.clone();
                async move { body }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}/objects")
    }

    #[cfg(unix)]
    pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Holds the immutable attribute on a file and clears it on drop.
    /// Root cannot delete such a file either.
    #[cfg(unix)]
    pub struct Immutable(PathBuf);

    #[cfg(unix)]
    impl Immutable {
        /// `None` when `chattr` is missing or the filesystem or capabilities refuse it.
        pub fn pin(path: &Path) -> Option<Self> {
            chattr("+i", path).then(|| Self(path.to_path_buf()))
        }

        pub fn path(&self) -> &Path {
            &self.0
        }
    }

    #[cfg(unix)]
    impl Drop for Immutable {
        fn drop(&mut self) {
            chattr("-i", &self.0);
        }
    }

    #[cfg(unix)]
    fn chattr(flag: &str, path: &Path) -> bool {
        std::process::Command::new("chattr")
            .arg(flag)
            .arg(path)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}
