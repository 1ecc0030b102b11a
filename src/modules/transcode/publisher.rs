use crate::infrastructure::storage::ObjectStorage;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// A regular file found under a publish root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub absolute: PathBuf,
    pub relative: PathBuf,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishSummary {
    pub uploaded: usize,
    pub upload_failures: usize,
    pub cleanup_failures: usize,
}

/// Lists every regular file under `root` with its root-relative path.
/// Entries that cannot be read are returned as errors so the caller can account for them.
pub fn walk_files(root: &Path) -> Vec<Result<TreeEntry, walkdir::Error>> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_file() => {
                let absolute = entry.into_path();
                let relative = absolute.strip_prefix(root).ok()?.to_path_buf();
                Some(Ok(TreeEntry { absolute, relative }))
            }
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
        .collect()
}

/// `{prefix}/a/b/c` for a relative path `a/b/c`, always using '/'.
pub fn remote_key(prefix: &str, relative: &Path) -> String {
    let mut key = prefix.to_string();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            key.push('/');
            key.push_str(&part.to_string_lossy());
        }
    }
    key
}

pub fn content_type_for(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("m3u8") => "application/vnd.apple.mpegurl".to_string(),
        Some("ts") => "video/mp2t".to_string(),
        _ => mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

/// Uploads every file under `root` to `{video_id}/...`, then deletes `root`.
///
/// Neither upload nor delete failures stop the sweep; they are only counted.
/// The local tree is removed even when uploads failed.
pub async fn publish_tree(storage: &dyn ObjectStorage, video_id: i64, root: &Path) -> PublishSummary {
    info!(
        video_id,
        "Uploading HLS output folder from {}",
        root.display()
    );

    let mut summary = upload_tree(storage, &video_id.to_string(), root).await;
    summary.cleanup_failures = remove_tree(root).await;

    if summary.cleanup_failures == 0 {
        info!("🧹 Cleaned up local files from {}", root.display());
    }

    summary
}

async fn upload_tree(storage: &dyn ObjectStorage, prefix: &str, root: &Path) -> PublishSummary {
    let mut summary = PublishSummary::default();

    let walk_root = root.to_path_buf();
    let entries = match tokio::task::spawn_blocking(move || walk_files(&walk_root)).await {
        Ok(entries) => entries,
        Err(e) => {
            error!("❌ Failed to list {}: {}", root.display(), e);
            return summary;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!("❌ Skipping unreadable entry under {}: {}", root.display(), e);
                summary.upload_failures += 1;
                continue;
            }
        };

        let key = remote_key(prefix, &entry.relative);
        let content_type = content_type_for(&entry.absolute);
        info!("⬆ Uploading {} as {}", entry.absolute.display(), key);

        match storage.put_file(&key, &entry.absolute, &content_type).await {
            Ok(()) => summary.uploaded += 1,
            Err(e) => {
                error!("❌ Failed to upload {}: {:#}", entry.absolute.display(), e);
                summary.upload_failures += 1;
            }
        }
    }

    summary
}

/// Deletes `root` recursively, returning how many entries could not be removed.
pub async fn remove_tree(root: &Path) -> usize {
    let root = root.to_path_buf();
    let root_display = root.display().to_string();
    match tokio::task::spawn_blocking(move || delete_tree(&root)).await {
        Ok(failures) => failures,
        Err(e) => {
            warn!("⚠️ Cleanup of {} did not complete: {}", root_display, e);
            1
        }
    }
}

/// Files are removed before the directories that hold them, deepest first.
fn delete_tree(root: &Path) -> usize {
    delete_tree_with(root, remove_entry)
}

fn remove_entry(path: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        std::fs::remove_dir(path)
    } else {
        std::fs::remove_file(path)
    }
}

fn delete_tree_with(root: &Path, mut remove: impl FnMut(&Path, bool) -> io::Result<()>) -> usize {
    if !root.exists() {
        return 0;
    }

    let mut failures = 0;
    for entry in WalkDir::new(root).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("⚠️ Could not inspect {}: {}", root.display(), e);
                failures += 1;
                continue;
            }
        };

        let path = entry.path();
        if let Err(e) = remove(path, entry.file_type().is_dir()) {
            warn!("⚠️ Could not delete {}: {}", path.display(), e);
            failures += 1;
        }
    }
    failures
}
