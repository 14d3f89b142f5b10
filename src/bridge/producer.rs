//! Contract producer
//!
//! Runs in the context that owns the real asynchronous capability. Drains
//! invocation requests from the message channel, executes each against the
//! capability, and publishes the result through the shared region:
//! `Void` for unit results, `Json` for metadata, `Buffer` for binary
//! payloads that fit the window, and the chunked
//! `BufferIncomplete`/`BufferComplete` handshake for payloads that do not.
//! A failed operation publishes the `Error` tag instead of leaving the
//! consumer parked.

use super::contract::FsRequest;
use super::region::{DataTag, SharedRegion};
use crate::console_log;
use crate::fs::FileSystem;
use futures::executor::block_on;
use serde::Serialize;
use std::sync::Arc;
use std::sync::mpsc::Receiver;

pub struct ContractProducer<F: FileSystem> {
    region: Arc<SharedRegion>,
    fs: F,
}

impl<F: FileSystem> ContractProducer<F> {
    pub fn new(region: Arc<SharedRegion>, fs: F) -> Self {
        Self { region, fs }
    }

    /// Serve invocations until every sender is dropped.
    pub fn serve(&self, requests: Receiver<FsRequest>) {
        while let Ok(request) = requests.recv() {
            self.handle_invocation(request);
        }
    }

    /// Execute one invocation and publish its result. Signals completion
    /// exactly once.
    pub fn handle_invocation(&self, request: FsRequest) {
        let name = request.name();
        let outcome = match request {
            FsRequest::Stat { path } => match block_on(self.fs.stat(&path)) {
                Ok(stat) => self.send_json_result(&stat),
                Err(e) => self.send_error(&e.to_string()),
            },
            FsRequest::ReadDirectory { path } => match block_on(self.fs.read_directory(&path)) {
                Ok(entries) => self.send_json_result(&entries),
                Err(e) => self.send_error(&e.to_string()),
            },
            FsRequest::CreateDirectory { path } => {
                self.finish_unit(block_on(self.fs.create_directory(&path)))
            }
            FsRequest::ReadFile { path } => match block_on(self.fs.read_file(&path)) {
                Ok(data) => self.send_buffer_result(&data),
                Err(e) => self.send_error(&e.to_string()),
            },
            FsRequest::WriteFile { path, contents } => {
                self.finish_unit(block_on(self.fs.write_file(&path, &contents)))
            }
            FsRequest::Delete { path, recursive } => {
                self.finish_unit(block_on(self.fs.delete(&path, recursive)))
            }
            FsRequest::Rename { from, to, overwrite } => {
                self.finish_unit(block_on(self.fs.rename(&from, &to, overwrite)))
            }
            FsRequest::Copy { from, to, overwrite } => {
                self.finish_unit(block_on(self.fs.copy(&from, &to, overwrite)))
            }
            FsRequest::CreateWatcher { glob } => match block_on(self.fs.create_watcher(&glob)) {
                Ok(id) => self.send_json_result(&id),
                Err(e) => self.send_error(&e.to_string()),
            },
        };
        if let Err(e) = outcome {
            console_log!("bridge producer: failed to publish {} result: {}", name, e);
        }
    }

    fn finish_unit(&self, result: std::io::Result<()>) -> Result<(), super::region::RegionError> {
        match result {
            Ok(()) => self.region.publish(DataTag::Void, &[]),
            Err(e) => self.send_error(&e.to_string()),
        }
    }

    /// Publish a binary result. Payloads smaller than the window go out in
    /// one `Buffer` frame. Anything else is cut into window-sized
    /// `BufferIncomplete` chunks, each acknowledged by the consumer's
    /// re-arm before the next is written, and terminated by a
    /// `BufferComplete` remainder that may be empty when the length is an
    /// exact multiple of the window.
    pub fn send_buffer_result(&self, buffer: &[u8]) -> Result<(), super::region::RegionError> {
        let capacity = self.region.window_capacity();
        if buffer.len() < capacity {
            return self.region.publish(DataTag::Buffer, buffer);
        }
        let mut sent = 0;
        while buffer.len() - sent >= capacity {
            self.region
                .publish(DataTag::BufferIncomplete, &buffer[sent..sent + capacity])?;
            sent += capacity;
            self.region.wait_consumed();
        }
        self.region.publish(DataTag::BufferComplete, &buffer[sent..])
    }

    /// Publish a JSON result. JSON replies must fit in one window; an
    /// oversize encoding is reported as an error, there is no chunking
    /// path for JSON.
    pub fn send_json_result<T: Serialize>(&self, value: &T) -> Result<(), super::region::RegionError> {
        let encoded = match serde_json::to_vec(value) {
            Ok(encoded) => encoded,
            Err(e) => return self.send_error(&format!("result serialization failed: {}", e)),
        };
        if encoded.len() > self.region.window_capacity() {
            return self.send_error(&format!(
                "json result of {} bytes exceeds window capacity {}",
                encoded.len(),
                self.region.window_capacity()
            ));
        }
        self.region.publish(DataTag::Json, &encoded)
    }

    fn send_error(&self, message: &str) -> Result<(), super::region::RegionError> {
        // Error messages share the window; truncate rather than fail the
        // publish for a pathological message.
        let capacity = self.region.window_capacity();
        let bytes = message.as_bytes();
        let mut end = bytes.len().min(capacity);
        while end > 0 && !message.is_char_boundary(end) {
            end -= 1;
        }
        self.region.publish(DataTag::Error, &bytes[..end])
    }
}
