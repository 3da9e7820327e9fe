//! Per-server persistence store: quota/usage stats and stream-to-file copies

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio::sync::Mutex;

use super::types::{PersistenceStats, Server, Song};
use crate::host::{DirectoryHandle, FileSink, StorageHost, StreamFetcher, StreamResponse};

/// Write buffer size for stream copies (2 MB) - reduces I/O operations
const WRITE_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// Handle to one server's sandboxed storage directory.
///
/// Constructed by a successful negotiation, holds no cache, and is
/// discardable at any time.
pub struct PersistenceStore {
    storage: Arc<dyn StorageHost>,
    fetcher: Arc<dyn StreamFetcher>,
    server: Server,
    handle: Box<dyn DirectoryHandle>,
    // Song ids with a copy currently in flight. A concurrent request for
    // an id already being stored is rejected instead of racing on the
    // same path.
    in_flight: Mutex<HashSet<String>>,
}

impl std::fmt::Debug for PersistenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceStore")
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

impl PersistenceStore {
    pub(crate) fn new(
        storage: Arc<dyn StorageHost>,
        fetcher: Arc<dyn StreamFetcher>,
        server: Server,
        handle: Box<dyn DirectoryHandle>,
    ) -> Self {
        PersistenceStore {
            storage,
            fetcher,
            server,
            handle,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Quota and usage snapshot from the host, in bytes.
    pub async fn stats(&self) -> Result<PersistenceStats, String> {
        let estimate = self
            .storage
            .estimate()
            .await
            .map_err(|e| format!("Failed to estimate storage: {}", e))?;
        Ok(PersistenceStats {
            quota_bytes: estimate.quota,
            usage_bytes: estimate.usage,
        })
    }

    /// Copy one streamed song into the server directory.
    ///
    /// The file is named by the raw song id. On any failure during the
    /// copy the partial file is removed: afterwards there is either a
    /// fully written file or none. A failed copy must be re-invoked
    /// entirely by the caller.
    pub async fn store_song(&self, song: &Song) -> Result<(), String> {
        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(song.id.clone()) {
                return Err(format!("Store already in progress for song {}", song.id));
            }
        }
        let result = self.copy_song(song).await;
        self.in_flight.lock().await.remove(&song.id);
        result
    }

    async fn copy_song(&self, song: &Song) -> Result<(), String> {
        let sink = self
            .handle
            .create_file(&song.id)
            .await
            .map_err(|e| format!("Failed to open file for song {}: {}", song.id, e))?;

        let response = match self.fetcher.fetch_stream(&song.stream_url).await {
            Ok(response) => response,
            Err(e) => {
                self.cleanup(sink, &song.id).await;
                return Err(e);
            }
        };

        let StreamResponse { status, body } = response;
        let mut stream = match body {
            Some(body) if status == 200 => body,
            _ => {
                self.cleanup(sink, &song.id).await;
                return Err(format!(
                    "Unable to retrieve stream: {} statusCode: {}",
                    song.stream_url, status
                ));
            }
        };

        debug!(
            "persistence: copying song {} from {}",
            song.id, song.stream_url
        );

        let mut sink = sink;
        let mut write_buffer: Vec<u8> = Vec::with_capacity(WRITE_BUFFER_SIZE);
        let mut written: u64 = 0;

        while let Some(chunk_result) = stream.next().await {
            let chunk = match chunk_result {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.cleanup(sink, &song.id).await;
                    return Err(e);
                }
            };
            write_buffer.extend_from_slice(&chunk);

            // Flush buffer when it reaches target size
            if write_buffer.len() >= WRITE_BUFFER_SIZE {
                if let Err(e) = sink.write_all(&write_buffer).await {
                    self.cleanup(sink, &song.id).await;
                    return Err(e);
                }
                written += write_buffer.len() as u64;
                write_buffer.clear();
            }
        }

        // Flush remaining buffer
        if !write_buffer.is_empty() {
            if let Err(e) = sink.write_all(&write_buffer).await {
                self.cleanup(sink, &song.id).await;
                return Err(e);
            }
            written += write_buffer.len() as u64;
        }

        if let Err(e) = sink.finalize().await {
            self.remove_entry_best_effort(&song.id).await;
            return Err(e);
        }

        info!("persistence: stored song {} ({} bytes)", song.id, written);
        Ok(())
    }

    async fn cleanup(&self, sink: Box<dyn FileSink>, song_id: &str) {
        sink.abort().await;
        self.remove_entry_best_effort(song_id).await;
    }

    async fn remove_entry_best_effort(&self, song_id: &str) {
        if let Err(e) = self.handle.remove_entry(song_id).await {
            warn!(
                "persistence: failed to remove partial file {}: {}",
                song_id, e
            );
        }
    }
}
