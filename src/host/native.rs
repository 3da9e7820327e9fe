//! Native host implementations backed by tokio::fs and reqwest
//!
//! Desktop builds store persisted media under a configured root directory
//! with a configured quota; the grant decision is remembered with a
//! marker file under the root, standing in for the platform's
//! persisted-storage bit.

use futures_util::StreamExt;
use log::warn;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use super::{
    ByteStream, DirectoryHandle, FileSink, StorageEstimate, StorageHost, StreamFetcher,
    StreamResponse,
};

/// Marker file recording that persistent storage was granted.
const PERSISTED_MARKER: &str = ".persisted";

/// Configuration for the native storage host.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Directory the application's storage allotment lives under.
    pub root: PathBuf,
    /// Storage allotment ceiling in bytes.
    #[serde(rename = "quotaBytes")]
    pub quota_bytes: u64,
}

/// Entry names come from opaque identifiers; reject anything that could
/// escape the sandboxed directory.
fn ensure_safe_name(name: &str) -> Result<(), String> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\\')
    {
        return Err(format!("Invalid storage entry name: {}", name));
    }
    Ok(())
}

/// Storage host backed by a directory on the local filesystem.
pub struct NativeStorageHost {
    root: PathBuf,
    quota_bytes: u64,
}

impl NativeStorageHost {
    pub fn new(config: PersistenceConfig) -> Self {
        NativeStorageHost {
            root: config.root,
            quota_bytes: config.quota_bytes,
        }
    }

    fn marker_path(&self) -> PathBuf {
        self.root.join(PERSISTED_MARKER)
    }
}

#[async_trait::async_trait]
impl StorageHost for NativeStorageHost {
    fn supports_persistence(&self) -> bool {
        true
    }

    async fn persisted(&self) -> bool {
        fs::try_exists(self.marker_path()).await.unwrap_or(false)
    }

    async fn persist(&self) -> bool {
        if let Err(e) = fs::create_dir_all(&self.root).await {
            warn!(
                "persistence: failed to create storage root {}: {}",
                self.root.display(),
                e
            );
            return false;
        }
        match File::create(self.marker_path()).await {
            Ok(_) => true,
            Err(e) => {
                warn!("persistence: failed to record storage grant: {}", e);
                false
            }
        }
    }

    async fn estimate(&self) -> Result<StorageEstimate, String> {
        let usage = directory_usage(self.root.clone()).await?;
        Ok(StorageEstimate {
            quota: self.quota_bytes,
            usage,
        })
    }

    async fn open_directory(
        &self,
        segments: &[&str],
    ) -> Result<Box<dyn DirectoryHandle>, String> {
        let mut path = self.root.clone();
        for segment in segments {
            ensure_safe_name(segment)?;
            path.push(segment);
        }
        fs::create_dir_all(&path)
            .await
            .map_err(|e| format!("Failed to create directory {}: {}", path.display(), e))?;
        Ok(Box::new(NativeDirectoryHandle { path }))
    }
}

/// Total size of all files under `root`, walked iteratively.
async fn directory_usage(root: PathBuf) -> Result<u64, String> {
    let mut total: u64 = 0;
    let mut stack = vec![root];
    while let Some(dir) = stack.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(format!("Failed to read directory {}: {}", dir.display(), e))
            }
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| format!("Failed to read directory entry: {}", e))?
        {
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| format!("Failed to read metadata: {}", e))?;
            if metadata.is_dir() {
                stack.push(entry.path());
            } else {
                total += metadata.len();
            }
        }
    }
    Ok(total)
}

struct NativeDirectoryHandle {
    path: PathBuf,
}

#[async_trait::async_trait]
impl DirectoryHandle for NativeDirectoryHandle {
    async fn create_file(&self, name: &str) -> Result<Box<dyn FileSink>, String> {
        ensure_safe_name(name)?;
        let path = self.path.join(name);
        let file = File::create(&path)
            .await
            .map_err(|e| format!("Failed to create file {}: {}", path.display(), e))?;
        Ok(Box::new(NativeFileSink { file }))
    }

    async fn remove_entry(&self, name: &str) -> Result<(), String> {
        ensure_safe_name(name)?;
        let path = self.path.join(name);
        fs::remove_file(&path)
            .await
            .map_err(|e| format!("Failed to remove {}: {}", path.display(), e))
    }
}

struct NativeFileSink {
    file: File,
}

#[async_trait::async_trait]
impl FileSink for NativeFileSink {
    async fn write_all(&mut self, buf: &[u8]) -> Result<(), String> {
        self.file
            .write_all(buf)
            .await
            .map_err(|e| format!("Failed to write buffer: {}", e))
    }

    async fn finalize(mut self: Box<Self>) -> Result<(), String> {
        self.file
            .flush()
            .await
            .map_err(|e| format!("Failed to flush file: {}", e))
    }

    async fn abort(self: Box<Self>) {
        // Dropping the handle closes the file; the partial entry is
        // removed by the caller.
    }
}

/// Streaming transport backed by reqwest.
pub struct HttpStreamFetcher {
    client: reqwest::Client,
}

impl HttpStreamFetcher {
    pub fn new() -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        Ok(HttpStreamFetcher { client })
    }
}

#[async_trait::async_trait]
impl StreamFetcher for HttpStreamFetcher {
    async fn fetch_stream(&self, url: &str) -> Result<StreamResponse, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Stream request failed: {}", e))?;
        let status = response.status().as_u16();
        let body: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| format!("Failed to read chunk: {}", e))),
        );
        Ok(StreamResponse {
            status,
            body: Some(body),
        })
    }
}
