//! Host capability traits
//!
//! Narrow interfaces over the host-provided storage, permission, and
//! network primitives. Production code wires in [`NativeStorageHost`]
//! and [`HttpStreamFetcher`]; tests substitute in-memory fakes.

mod native;

pub use native::{HttpStreamFetcher, NativeStorageHost, PersistenceConfig};

use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;

/// Chunked response body as produced by the host transport.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>;

/// Quota and current usage reported by the host, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageEstimate {
    pub quota: u64,
    pub usage: u64,
}

/// Persisted-storage and directory capability of the host platform.
#[async_trait::async_trait]
pub trait StorageHost: Send + Sync {
    /// Whether the host exposes the persisted-storage capability at all.
    fn supports_persistence(&self) -> bool;

    /// Whether persistent storage has already been granted. Silent: must
    /// never prompt.
    async fn persisted(&self) -> bool;

    /// Request persistent storage from the host. May prompt. Returns
    /// whether the grant was given.
    async fn persist(&self) -> bool;

    /// Quota and current usage for this application's allotment.
    async fn estimate(&self) -> Result<StorageEstimate, String>;

    /// Resolve a directory under the storage root, creating each path
    /// segment if absent.
    async fn open_directory(&self, segments: &[&str])
        -> Result<Box<dyn DirectoryHandle>, String>;
}

/// Capability-scoped reference to one storage directory.
#[async_trait::async_trait]
pub trait DirectoryHandle: Send + Sync {
    /// Open a file inside this directory for writing, creating it if
    /// absent and truncating existing content.
    async fn create_file(&self, name: &str) -> Result<Box<dyn FileSink>, String>;

    /// Remove an entry from this directory.
    async fn remove_entry(&self, name: &str) -> Result<(), String>;
}

/// In-progress write to a single file.
#[async_trait::async_trait]
pub trait FileSink: Send {
    async fn write_all(&mut self, buf: &[u8]) -> Result<(), String>;

    /// Flush and close, committing the written content.
    async fn finalize(self: Box<Self>) -> Result<(), String>;

    /// Discard the in-progress write without committing. Best effort; the
    /// directory entry itself is removed separately.
    async fn abort(self: Box<Self>);
}

/// Status and body of a streaming GET.
pub struct StreamResponse {
    pub status: u16,
    pub body: Option<ByteStream>,
}

/// Streaming network transport.
#[async_trait::async_trait]
pub trait StreamFetcher: Send + Sync {
    /// Issue a GET against `url`, returning the status and body stream.
    async fn fetch_stream(&self, url: &str) -> Result<StreamResponse, String>;
}
