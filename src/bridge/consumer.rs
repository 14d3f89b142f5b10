//! Contract consumer
//!
//! The synchronous side of the bridge. [`SyncFs`] looks like a plain
//! blocking filesystem; underneath, each method arms the shared region,
//! posts the invocation over the message channel, and parks the calling
//! thread until the producer publishes a result.
//!
//! Methods take `&mut self`: a second call cannot be issued while one is
//! in flight, so the single-outstanding-call discipline is enforced by the
//! borrow checker instead of caller convention.

use super::contract::{BridgeError, FsRequest};
use super::region::{DataTag, SharedRegion};
use crate::fs::{DirEntry, FileStat, WatcherId};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::mpsc::Sender;

/// Decoded reply shapes.
enum Reply {
    Void,
    Json(Vec<u8>),
    Bytes(Vec<u8>),
}

pub struct SyncFs {
    region: Arc<SharedRegion>,
    requests: Sender<FsRequest>,
}

impl SyncFs {
    pub fn new(region: Arc<SharedRegion>, requests: Sender<FsRequest>) -> Self {
        Self { region, requests }
    }

    /// Issue one invocation and block until its result is fully received.
    fn invoke(&mut self, request: FsRequest) -> Result<Reply, BridgeError> {
        self.region.rearm();
        self.requests
            .send(request)
            .map_err(|_| BridgeError::Disconnected)?;

        let (tag, payload) = self
            .region
            .wait_published()
            .map_err(|e| BridgeError::Protocol(e.to_string()))?;

        match tag {
            DataTag::Void => Ok(Reply::Void),
            DataTag::Json => Ok(Reply::Json(payload)),
            DataTag::Buffer | DataTag::BufferComplete => Ok(Reply::Bytes(payload)),
            DataTag::Error => Err(BridgeError::Producer(
                String::from_utf8_lossy(&payload).into_owned(),
            )),
            DataTag::BufferIncomplete => {
                // Accumulate chunks, acknowledging each by re-arming, until
                // the terminating BufferComplete frame (possibly empty).
                let mut assembled = payload;
                loop {
                    self.region.rearm();
                    let (tag, chunk) = self
                        .region
                        .wait_published()
                        .map_err(|e| BridgeError::Protocol(e.to_string()))?;
                    match tag {
                        DataTag::BufferIncomplete => assembled.extend_from_slice(&chunk),
                        DataTag::BufferComplete => {
                            assembled.extend_from_slice(&chunk);
                            return Ok(Reply::Bytes(assembled));
                        }
                        other => {
                            return Err(BridgeError::Protocol(format!(
                                "unexpected tag {:?} inside chunk sequence",
                                other
                            )));
                        }
                    }
                }
            }
            DataTag::Pending => Err(BridgeError::Protocol(
                "woke with pending status".to_string(),
            )),
        }
    }

    fn invoke_json<T: DeserializeOwned>(&mut self, request: FsRequest) -> Result<T, BridgeError> {
        let name = request.name();
        match self.invoke(request)? {
            Reply::Json(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| BridgeError::Protocol(format!("bad {} reply: {}", name, e))),
            _ => Err(BridgeError::Protocol(format!(
                "{} expected a json reply",
                name
            ))),
        }
    }

    fn invoke_unit(&mut self, request: FsRequest) -> Result<(), BridgeError> {
        let name = request.name();
        match self.invoke(request)? {
            Reply::Void => Ok(()),
            _ => Err(BridgeError::Protocol(format!(
                "{} expected a void reply",
                name
            ))),
        }
    }

    pub fn stat(&mut self, path: &str) -> Result<FileStat, BridgeError> {
        self.invoke_json(FsRequest::Stat { path: path.to_string() })
    }

    pub fn read_directory(&mut self, path: &str) -> Result<Vec<DirEntry>, BridgeError> {
        self.invoke_json(FsRequest::ReadDirectory { path: path.to_string() })
    }

    pub fn create_directory(&mut self, path: &str) -> Result<(), BridgeError> {
        self.invoke_unit(FsRequest::CreateDirectory { path: path.to_string() })
    }

    pub fn read_file(&mut self, path: &str) -> Result<Vec<u8>, BridgeError> {
        let request = FsRequest::ReadFile { path: path.to_string() };
        match self.invoke(request)? {
            Reply::Bytes(data) => Ok(data),
            _ => Err(BridgeError::Protocol(
                "readFile expected a buffer reply".to_string(),
            )),
        }
    }

    pub fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<(), BridgeError> {
        self.invoke_unit(FsRequest::WriteFile {
            path: path.to_string(),
            contents: contents.to_vec(),
        })
    }

    pub fn delete(&mut self, path: &str, recursive: bool) -> Result<(), BridgeError> {
        self.invoke_unit(FsRequest::Delete { path: path.to_string(), recursive })
    }

    pub fn rename(&mut self, from: &str, to: &str, overwrite: bool) -> Result<(), BridgeError> {
        self.invoke_unit(FsRequest::Rename {
            from: from.to_string(),
            to: to.to_string(),
            overwrite,
        })
    }

    pub fn copy(&mut self, from: &str, to: &str, overwrite: bool) -> Result<(), BridgeError> {
        self.invoke_unit(FsRequest::Copy {
            from: from.to_string(),
            to: to.to_string(),
            overwrite,
        })
    }

    pub fn create_watcher(&mut self, glob: &str) -> Result<WatcherId, BridgeError> {
        self.invoke_json(FsRequest::CreateWatcher { glob: glob.to_string() })
    }
}
