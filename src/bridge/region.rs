//! Shared transport region
//!
//! A fixed-size byte region shared between the consumer (blocked, synchronous)
//! context and the producer (async-capable) context. The layout mirrors the
//! wire format: two little-endian u32 control words at offsets 0 and 4
//! (status tag and payload length), then the payload window. The region is
//! allocated once and never resized; every result and every chunk of a large
//! result is copied through the same window.
//!
//! Wait/notify is a `Mutex` + `Condvar` pair over the region bytes. This is
//! the Rust rendering of a raw atomic wait on the control word: the waiting
//! thread is parked at the OS level, and correctness rests on the
//! single-outstanding-call discipline, not on any higher-level lock held
//! across a call.

use std::sync::{Condvar, Mutex, PoisonError};

/// Control header size: status word + length word.
pub const HEADER_BYTES: usize = 8;

/// Status tags for the control word.
///
/// `Pending` is the sentinel the consumer arms before blocking. The
/// `Error` tag carries a UTF-8 message from a failed producer-side
/// operation; without it a producer failure would leave the consumer
/// parked forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DataTag {
    Pending = 0,
    Void = 1,
    Json = 2,
    Buffer = 3,
    BufferIncomplete = 4,
    BufferComplete = 5,
    Error = 6,
}

impl DataTag {
    fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Pending),
            1 => Some(Self::Void),
            2 => Some(Self::Json),
            3 => Some(Self::Buffer),
            4 => Some(Self::BufferIncomplete),
            5 => Some(Self::BufferComplete),
            6 => Some(Self::Error),
            _ => None,
        }
    }
}

/// Errors raised by the region itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
    /// Requested region cannot hold the header plus any payload.
    TooSmall(usize),
    /// Payload exceeds the window capacity.
    PayloadTooLarge { len: usize, capacity: usize },
    /// The status word held a value outside the tag enumeration.
    CorruptHeader(u32),
}

impl std::fmt::Display for RegionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooSmall(size) => {
                write!(f, "region of {} bytes cannot hold header and payload", size)
            }
            Self::PayloadTooLarge { len, capacity } => {
                write!(f, "payload of {} bytes exceeds window capacity {}", len, capacity)
            }
            Self::CorruptHeader(value) => write!(f, "unknown status tag: {}", value),
        }
    }
}

impl std::error::Error for RegionError {}

/// The shared region. One instance serves one consumer/producer pair and
/// carries at most one invocation's result path at a time.
pub struct SharedRegion {
    bytes: Mutex<Box<[u8]>>,
    signal: Condvar,
}

fn status_of(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn length_of(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]])
}

impl SharedRegion {
    /// Allocate a region of `buffer_size` bytes. The payload window is
    /// whatever remains after the 8-byte control header.
    pub fn new(buffer_size: usize) -> Result<Self, RegionError> {
        if buffer_size <= HEADER_BYTES {
            return Err(RegionError::TooSmall(buffer_size));
        }
        Ok(Self {
            bytes: Mutex::new(vec![0u8; buffer_size].into_boxed_slice()),
            signal: Condvar::new(),
        })
    }

    /// Bytes available for a single payload or chunk.
    pub fn window_capacity(&self) -> usize {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        bytes.len() - HEADER_BYTES
    }

    /// Copy `payload` into the window, set both control words, and wake the
    /// waiting side. Exactly one publish per completion or chunk.
    pub fn publish(&self, tag: DataTag, payload: &[u8]) -> Result<(), RegionError> {
        let mut bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        let capacity = bytes.len() - HEADER_BYTES;
        if payload.len() > capacity {
            return Err(RegionError::PayloadTooLarge { len: payload.len(), capacity });
        }
        bytes[HEADER_BYTES..HEADER_BYTES + payload.len()].copy_from_slice(payload);
        bytes[0..4].copy_from_slice(&(tag as u32).to_le_bytes());
        bytes[4..8].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        self.signal.notify_all();
        Ok(())
    }

    /// Reset the status word to the `Pending` sentinel and wake the other
    /// side. The consumer arms the region this way before issuing a call,
    /// and again to acknowledge each chunk of a multi-chunk result.
    pub fn rearm(&self) {
        let mut bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        bytes[0..4].copy_from_slice(&(DataTag::Pending as u32).to_le_bytes());
        self.signal.notify_all();
    }

    /// Block until the status word leaves `Pending`, then copy out the
    /// published payload. This is the consumer's park point.
    pub fn wait_published(&self) -> Result<(DataTag, Vec<u8>), RegionError> {
        let mut bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        while status_of(&bytes) == DataTag::Pending as u32 {
            bytes = self
                .signal
                .wait(bytes)
                .unwrap_or_else(PoisonError::into_inner);
        }
        let status = status_of(&bytes);
        let tag = DataTag::from_u32(status).ok_or(RegionError::CorruptHeader(status))?;
        let len = length_of(&bytes) as usize;
        Ok((tag, bytes[HEADER_BYTES..HEADER_BYTES + len].to_vec()))
    }

    /// Block until the consumer has re-armed the region. The producer waits
    /// here between chunks, so it can never run more than one window ahead.
    pub fn wait_consumed(&self) {
        let mut bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        while status_of(&bytes) != DataTag::Pending as u32 {
            bytes = self
                .signal
                .wait(bytes)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}
