//! In-memory fakes for the host capability traits, shared across unit
//! tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::stream;
use tokio::sync::mpsc::Receiver;

use crate::host::{
    ByteStream, DirectoryHandle, FileSink, StorageEstimate, StorageHost, StreamFetcher,
    StreamResponse,
};

/// Committed files keyed by `"segment/…/name"`.
type FileMap = Arc<Mutex<HashMap<String, Vec<u8>>>>;

pub(crate) struct FakeStorageHost {
    pub supported: bool,
    pub persisted: AtomicBool,
    pub grant_on_request: bool,
    pub persist_calls: AtomicUsize,
    pub estimate: StorageEstimate,
    pub files: FileMap,
}

impl FakeStorageHost {
    pub fn new(supported: bool, persisted: bool, grant_on_request: bool) -> Self {
        FakeStorageHost {
            supported,
            persisted: AtomicBool::new(persisted),
            grant_on_request,
            persist_calls: AtomicUsize::new(0),
            estimate: StorageEstimate {
                quota: 1024 * 1024,
                usage: 0,
            },
            files: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait::async_trait]
impl StorageHost for FakeStorageHost {
    fn supports_persistence(&self) -> bool {
        self.supported
    }

    async fn persisted(&self) -> bool {
        self.persisted.load(Ordering::SeqCst)
    }

    async fn persist(&self) -> bool {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        if self.grant_on_request {
            self.persisted.store(true, Ordering::SeqCst);
        }
        self.grant_on_request
    }

    async fn estimate(&self) -> Result<StorageEstimate, String> {
        Ok(self.estimate)
    }

    async fn open_directory(
        &self,
        segments: &[&str],
    ) -> Result<Box<dyn DirectoryHandle>, String> {
        Ok(Box::new(FakeDirectoryHandle {
            prefix: segments.join("/"),
            files: self.files.clone(),
        }))
    }
}

pub(crate) struct FakeDirectoryHandle {
    prefix: String,
    files: FileMap,
}

impl FakeDirectoryHandle {
    fn path(&self, name: &str) -> String {
        format!("{}/{}", self.prefix, name)
    }
}

#[async_trait::async_trait]
impl DirectoryHandle for FakeDirectoryHandle {
    async fn create_file(&self, name: &str) -> Result<Box<dyn FileSink>, String> {
        let path = self.path(name);
        // The entry exists (empty) as soon as the file is opened.
        self.files.lock().unwrap().insert(path.clone(), Vec::new());
        Ok(Box::new(FakeFileSink {
            path,
            buffer: Vec::new(),
            files: self.files.clone(),
        }))
    }

    async fn remove_entry(&self, name: &str) -> Result<(), String> {
        self.files.lock().unwrap().remove(&self.path(name));
        Ok(())
    }
}

pub(crate) struct FakeFileSink {
    path: String,
    buffer: Vec<u8>,
    files: FileMap,
}

#[async_trait::async_trait]
impl FileSink for FakeFileSink {
    async fn write_all(&mut self, buf: &[u8]) -> Result<(), String> {
        self.buffer.extend_from_slice(buf);
        Ok(())
    }

    async fn finalize(self: Box<Self>) -> Result<(), String> {
        let this = *self;
        this.files.lock().unwrap().insert(this.path, this.buffer);
        Ok(())
    }

    async fn abort(self: Box<Self>) {}
}

/// Programmed response for one URL.
pub(crate) enum FakeResponse {
    /// 200 with the full body, delivered in small chunks.
    Ok(Vec<u8>),
    /// The given status with an empty body stream.
    Status(u16),
    /// 200 but no body at all.
    MissingBody,
    /// 200, yields `prefix` then a stream error.
    Broken { prefix: Vec<u8>, error: String },
    /// 200 with a body fed through a channel; closes when the sender
    /// drops.
    Gated(Receiver<Result<Bytes, String>>),
}

pub(crate) struct FakeFetcher {
    responses: Mutex<HashMap<String, FakeResponse>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        FakeFetcher {
            responses: Mutex::new(HashMap::new()),
        }
    }

    pub fn push(&self, url: &str, response: FakeResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }
}

fn chunked(body: Vec<u8>) -> ByteStream {
    let chunks: Vec<Result<Bytes, String>> = body
        .chunks(3)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    Box::pin(stream::iter(chunks))
}

#[async_trait::async_trait]
impl StreamFetcher for FakeFetcher {
    async fn fetch_stream(&self, url: &str) -> Result<StreamResponse, String> {
        let response = self
            .responses
            .lock()
            .unwrap()
            .remove(url)
            .ok_or_else(|| format!("no fake response for {}", url))?;
        Ok(match response {
            FakeResponse::Ok(body) => StreamResponse {
                status: 200,
                body: Some(chunked(body)),
            },
            FakeResponse::Status(status) => StreamResponse {
                status,
                body: Some(chunked(Vec::new())),
            },
            FakeResponse::MissingBody => StreamResponse {
                status: 200,
                body: None,
            },
            FakeResponse::Broken { prefix, error } => {
                let mut items: Vec<Result<Bytes, String>> = prefix
                    .chunks(3)
                    .map(|c| Ok(Bytes::copy_from_slice(c)))
                    .collect();
                items.push(Err(error));
                StreamResponse {
                    status: 200,
                    body: Some(Box::pin(stream::iter(items))),
                }
            }
            FakeResponse::Gated(rx) => StreamResponse {
                status: 200,
                body: Some(Box::pin(stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                }))),
            },
        })
    }
}
