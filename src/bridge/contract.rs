//! The bridge contract
//!
//! Invocations travel over the native message channel as an explicit
//! tagged request type; only results come back through the shared region.
//! There is no reflection anywhere: the set of operations a consumer can
//! issue is exactly this enum.

use serde::{Deserialize, Serialize};

/// One invocation of the remote capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FsRequest {
    Stat { path: String },
    ReadDirectory { path: String },
    CreateDirectory { path: String },
    ReadFile { path: String },
    WriteFile { path: String, contents: Vec<u8> },
    Delete { path: String, recursive: bool },
    Rename { from: String, to: String, overwrite: bool },
    Copy { from: String, to: String, overwrite: bool },
    CreateWatcher { glob: String },
}

impl FsRequest {
    /// Operation name, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stat { .. } => "stat",
            Self::ReadDirectory { .. } => "readDirectory",
            Self::CreateDirectory { .. } => "createDirectory",
            Self::ReadFile { .. } => "readFile",
            Self::WriteFile { .. } => "writeFile",
            Self::Delete { .. } => "delete",
            Self::Rename { .. } => "rename",
            Self::Copy { .. } => "copy",
            Self::CreateWatcher { .. } => "createFileSystemWatcher",
        }
    }
}

/// Errors surfaced to the consumer's caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The producer-side operation failed; carries its message.
    Producer(String),
    /// The reply violated the protocol (wrong tag for the operation,
    /// undecodable JSON, corrupt header).
    Protocol(String),
    /// The producer is gone; no call can complete.
    Disconnected,
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Producer(msg) => write!(f, "{}", msg),
            Self::Protocol(msg) => write!(f, "bridge protocol error: {}", msg),
            Self::Disconnected => write!(f, "bridge disconnected"),
        }
    }
}

impl std::error::Error for BridgeError {}
