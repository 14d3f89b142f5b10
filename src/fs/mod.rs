//! The real (asynchronous) filesystem capability
//!
//! This is the surface the contract producer executes against. Every
//! operation is async from the producer's point of view; the in-memory
//! backend in [`memory`] resolves immediately, a host-filesystem adapter
//! would not. The data types here travel across the bridge as JSON, so
//! they all derive serde.

pub mod memory;

pub use memory::MemoryFs;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::io;

/// Future type for capability operations.
pub type FsFuture<'a, T> = BoxFuture<'a, io::Result<T>>;

/// What kind of node a path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    File,
    Directory,
}

/// File metadata as reported over the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub kind: FileKind,
    /// Content length in bytes; zero for directories.
    pub size: u64,
    /// Modification stamp (backend clock ticks).
    pub mtime: u64,
}

/// A single directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: FileKind,
}

/// Handle for a registered filesystem watcher.
pub type WatcherId = usize;

/// Change notification recorded for watchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FsEventKind {
    Create,
    Change,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: String,
}

/// The asynchronous capability surface. Implementations must be `Send`:
/// the contract producer drives them from its own thread.
pub trait FileSystem: Send {
    fn stat<'a>(&'a self, path: &'a str) -> FsFuture<'a, FileStat>;

    fn read_directory<'a>(&'a self, path: &'a str) -> FsFuture<'a, Vec<DirEntry>>;

    fn create_directory<'a>(&'a self, path: &'a str) -> FsFuture<'a, ()>;

    fn read_file<'a>(&'a self, path: &'a str) -> FsFuture<'a, Vec<u8>>;

    fn write_file<'a>(&'a self, path: &'a str, contents: &'a [u8]) -> FsFuture<'a, ()>;

    fn delete<'a>(&'a self, path: &'a str, recursive: bool) -> FsFuture<'a, ()>;

    fn rename<'a>(&'a self, from: &'a str, to: &'a str, overwrite: bool) -> FsFuture<'a, ()>;

    fn copy<'a>(&'a self, from: &'a str, to: &'a str, overwrite: bool) -> FsFuture<'a, ()>;

    /// Register a watcher for paths matching `glob`. Events are delivered
    /// through the backend's own channel, not through the bridge; only the
    /// handle crosses it.
    fn create_watcher<'a>(&'a self, glob: &'a str) -> FsFuture<'a, WatcherId>;
}
