//! Synchronous-over-asynchronous bridge
//!
//! Lets the shell's single-threaded context call a filesystem whose real
//! implementation is asynchronous and lives in another execution context,
//! without turning the caller into continuation-passing style. Requests go
//! out over a plain message channel; results come back through a
//! fixed-size shared region with blocking wait/notify, chunked when a
//! binary payload outgrows the window.
//!
//! One region serves one consumer/producer pair, one call at a time.

pub mod consumer;
pub mod contract;
pub mod producer;
pub mod region;

pub use consumer::SyncFs;
pub use contract::{BridgeError, FsRequest};
pub use producer::ContractProducer;
pub use region::{DataTag, RegionError, SharedRegion};

use crate::fs::FileSystem;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;

/// Stand up a bridge: allocate a shared region of `buffer_size` bytes,
/// move the capability onto a producer thread, and hand back the blocking
/// consumer facade. The producer thread exits when the consumer is
/// dropped.
pub fn spawn_bridge<F>(fs: F, buffer_size: usize) -> Result<(SyncFs, JoinHandle<()>), RegionError>
where
    F: FileSystem + 'static,
{
    let region = Arc::new(SharedRegion::new(buffer_size)?);
    let (tx, rx) = mpsc::channel();
    let producer_region = region.clone();
    let handle = std::thread::spawn(move || {
        ContractProducer::new(producer_region, fs).serve(rx);
    });
    Ok((SyncFs::new(region, tx), handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FileKind, FsFuture, MemoryFs};
    use std::time::Duration;

    const WINDOW: usize = 16;
    const BUFFER_SIZE: usize = region::HEADER_BYTES + WINDOW;

    fn bridged_fs() -> (SyncFs, JoinHandle<()>) {
        spawn_bridge(MemoryFs::new(), BUFFER_SIZE).unwrap()
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    // ============ Chunking round-trips ============

    #[test]
    fn test_chunking_round_trip_boundary_lengths() {
        let (mut fs, _producer) = bridged_fs();
        for len in [0, WINDOW - 1, WINDOW, WINDOW + 1, 2 * WINDOW, 3 * WINDOW] {
            let data = payload(len);
            fs.write_file("/blob", &data).unwrap();
            let back = fs.read_file("/blob").unwrap();
            assert_eq!(back, data, "length {}", len);
        }
    }

    #[test]
    fn test_exact_multiple_terminates_with_empty_chunk() {
        // An exact multiple of the window must still complete; the final
        // BufferComplete frame is empty.
        let (mut fs, _producer) = bridged_fs();
        let data = payload(4 * WINDOW);
        fs.write_file("/blob", &data).unwrap();
        assert_eq!(fs.read_file("/blob").unwrap(), data);
    }

    // ============ Result shapes ============

    #[test]
    fn test_json_result_decodes() {
        let (mut fs, _producer) = spawn_bridge(MemoryFs::new(), 256).unwrap();
        fs.write_file("/f", b"hello").unwrap();
        let stat = fs.stat("/f").unwrap();
        assert_eq!(stat.kind, FileKind::File);
        assert_eq!(stat.size, 5);
    }

    #[test]
    fn test_void_result() {
        let (mut fs, _producer) = spawn_bridge(MemoryFs::new(), 256).unwrap();
        fs.create_directory("/d").unwrap();
        let entries = fs.read_directory("/").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "d");
    }

    #[test]
    fn test_watcher_id_crosses_bridge() {
        let (mut fs, _producer) = spawn_bridge(MemoryFs::new(), 256).unwrap();
        let first = fs.create_watcher("/a/*").unwrap();
        let second = fs.create_watcher("/b/*").unwrap();
        assert_ne!(first, second);
    }

    // ============ Errors ============

    #[test]
    fn test_producer_error_surfaces_instead_of_hanging() {
        let (mut fs, _producer) = spawn_bridge(MemoryFs::new(), 256).unwrap();
        let err = fs.read_file("/missing").unwrap_err();
        match err {
            BridgeError::Producer(msg) => assert!(msg.contains("/missing")),
            other => panic!("expected producer error, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_json_reports_error() {
        // Window of 16 bytes cannot hold a stat reply.
        let (mut fs, _producer) = bridged_fs();
        fs.write_file("/f", b"x").unwrap();
        let err = fs.stat("/f").unwrap_err();
        assert!(matches!(err, BridgeError::Producer(_)));
    }

    #[test]
    fn test_calls_after_error_still_work() {
        let (mut fs, _producer) = bridged_fs();
        assert!(fs.read_file("/missing").is_err());
        fs.write_file("/present", b"ok").unwrap();
        assert_eq!(fs.read_file("/present").unwrap(), b"ok");
    }

    #[test]
    fn test_disconnected_when_producer_is_gone() {
        let region = Arc::new(SharedRegion::new(256).unwrap());
        let (tx, rx) = std::sync::mpsc::channel();
        drop(rx);
        let mut fs = SyncFs::new(region, tx);
        assert_eq!(fs.stat("/").unwrap_err(), BridgeError::Disconnected);
    }

    #[test]
    fn test_producer_thread_exits_when_consumer_dropped() {
        let (fs, producer) = bridged_fs();
        drop(fs);
        producer.join().unwrap();
    }

    // ============ Call discipline ============

    /// Capability that stalls reads, so sequential calls overlap the
    /// producer's in-flight work as much as the design permits.
    struct SlowFs(MemoryFs);

    impl crate::fs::FileSystem for SlowFs {
        fn stat<'a>(&'a self, path: &'a str) -> FsFuture<'a, crate::fs::FileStat> {
            self.0.stat(path)
        }
        fn read_directory<'a>(&'a self, path: &'a str) -> FsFuture<'a, Vec<crate::fs::DirEntry>> {
            self.0.read_directory(path)
        }
        fn create_directory<'a>(&'a self, path: &'a str) -> FsFuture<'a, ()> {
            self.0.create_directory(path)
        }
        fn read_file<'a>(&'a self, path: &'a str) -> FsFuture<'a, Vec<u8>> {
            std::thread::sleep(Duration::from_millis(50));
            self.0.read_file(path)
        }
        fn write_file<'a>(&'a self, path: &'a str, contents: &'a [u8]) -> FsFuture<'a, ()> {
            self.0.write_file(path, contents)
        }
        fn delete<'a>(&'a self, path: &'a str, recursive: bool) -> FsFuture<'a, ()> {
            self.0.delete(path, recursive)
        }
        fn rename<'a>(&'a self, from: &'a str, to: &'a str, overwrite: bool) -> FsFuture<'a, ()> {
            self.0.rename(from, to, overwrite)
        }
        fn copy<'a>(&'a self, from: &'a str, to: &'a str, overwrite: bool) -> FsFuture<'a, ()> {
            self.0.copy(from, to, overwrite)
        }
        fn create_watcher<'a>(&'a self, glob: &'a str) -> FsFuture<'a, usize> {
            self.0.create_watcher(glob)
        }
    }

    #[test]
    fn test_delayed_producer_does_not_corrupt_back_to_back_calls() {
        let (mut fs, _producer) = spawn_bridge(SlowFs(MemoryFs::new()), BUFFER_SIZE).unwrap();
        let big = payload(3 * WINDOW + 5);
        fs.write_file("/a", &big).unwrap();
        fs.write_file("/b", b"tiny").unwrap();

        // Each call blocks until its own result is fully consumed, so the
        // delayed first read cannot bleed into the second.
        assert_eq!(fs.read_file("/a").unwrap(), big);
        assert_eq!(fs.read_file("/b").unwrap(), b"tiny");
    }

    #[test]
    fn test_error_message_truncated_to_window() {
        let region = Arc::new(SharedRegion::new(BUFFER_SIZE).unwrap());
        let producer = ContractProducer::new(region.clone(), MemoryFs::new());
        let long_path = "x".repeat(100);
        producer.handle_invocation(FsRequest::ReadFile { path: format!("/{}", long_path) });
        let (tag, payload) = region.wait_published().unwrap();
        assert_eq!(tag, DataTag::Error);
        assert!(payload.len() <= WINDOW);
    }
}
