//! Bounded-parallel upload of a packaged output tree
//!
//! Walks the packager's output directory and uploads every regular file under
//! `<prefix>/<relative path>`, with per-file retry. Failures are aggregated
//! rather than cancelling uploads already in flight.

use crate::content_type::content_type_for_path;
use crate::store::ObjectStore;
use crate::StoreError;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Tuning knobs for a directory upload; the worker runtime owns the values.
#[derive(Clone, Debug)]
pub struct UploadOptions {
    /// Maximum in-flight uploads
    pub concurrency: usize,
    /// Attempts per file, first try included
    pub max_attempts: u32,
    /// Linear backoff base; attempt N sleeps N x this
    pub backoff_base: Duration,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            concurrency: 50,
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// Outcome of a tree upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: usize,
    pub failed: usize,
}

/// Upload every regular file under `dir` to `bucket` as
/// `<prefix>/<path relative to dir>` (forward-slash separated).
///
/// Returns an aggregate error carrying the failure count and the first
/// error once all transfers have settled.
pub async fn upload_directory(
    store: &ObjectStore,
    bucket: &str,
    prefix: &str,
    dir: &Path,
    options: &UploadOptions,
) -> Result<UploadSummary, StoreError> {
    let files = collect_files(dir).await?;
    let total = files.len();

    let results: Vec<Result<(), StoreError>> = stream::iter(files)
        .map(|path| {
            let key = object_key(prefix, dir, &path);
            async move { upload_with_retry(store, bucket, &key, &path, options).await }
        })
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;

    let mut failed = 0;
    let mut first_error: Option<String> = None;
    for result in results {
        if let Err(e) = result {
            failed += 1;
            first_error.get_or_insert_with(|| e.to_string());
        }
    }

    if let Some(first_error) = first_error {
        return Err(StoreError::UploadTree {
            failed,
            total,
            first_error,
        });
    }

    Ok(UploadSummary {
        uploaded: total,
        failed: 0,
    })
}

/// Build the object key for a file inside the tree.
fn object_key(prefix: &str, root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let rel = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{}", prefix.trim_end_matches('/'), rel)
}

/// Recursively collect regular files, depth-first.
async fn collect_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    // Deterministic order keeps logs and tests stable
    files.sort();
    Ok(files)
}

async fn upload_with_retry(
    store: &ObjectStore,
    bucket: &str,
    key: &str,
    path: &Path,
    options: &UploadOptions,
) -> Result<(), StoreError> {
    let content_type = content_type_for_path(path);

    let mut last_error = None;
    for attempt in 1..=options.max_attempts {
        match store
            .put_object_from_path(bucket, key, path, content_type)
            .await
        {
            Ok(()) => {
                debug!(key = %key, attempt, "uploaded artifact");
                return Ok(());
            }
            Err(e) => {
                warn!(key = %key, attempt, error = %e, "artifact upload failed");
                last_error = Some(e);
                if attempt < options.max_attempts {
                    tokio::time::sleep(options.backoff_base * attempt).await;
                }
            }
        }
    }

    Err(last_error.expect("at least one attempt was made"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_is_relative_and_slash_separated() {
        let root = Path::new("/tmp/job/output");
        let file = root.join("hls").join("chunk-001.m4s");
        assert_eq!(
            object_key("outputs/v1", root, &file),
            "outputs/v1/hls/chunk-001.m4s"
        );
    }

    #[test]
    fn test_object_key_trims_trailing_slash() {
        let root = Path::new("/tmp/out");
        let file = root.join("master.m3u8");
        assert_eq!(
            object_key("outputs/v1/", root, &file),
            "outputs/v1/master.m3u8"
        );
    }

    #[tokio::test]
    async fn test_collect_files_walks_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("hls/segments");
        tokio::fs::create_dir_all(&nested).await.unwrap();
        tokio::fs::write(dir.path().join("master.m3u8"), b"#EXTM3U")
            .await
            .unwrap();
        tokio::fs::write(nested.join("chunk-0001.m4s"), b"seg")
            .await
            .unwrap();

        let files = collect_files(dir.path()).await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|f| f.ends_with("master.m3u8")));
        assert!(files.iter().any(|f| f.ends_with("chunk-0001.m4s")));
    }

    #[test]
    fn test_default_options_match_pipeline_limits() {
        let options = UploadOptions::default();
        assert_eq!(options.concurrency, 50);
        assert_eq!(options.max_attempts, 3);
        assert_eq!(options.backoff_base, Duration::from_secs(1));
    }
}
