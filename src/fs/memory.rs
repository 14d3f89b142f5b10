//! In-memory filesystem backend
//!
//! Simple, fast, ephemeral. Serves as the worker-side capability in tests
//! and demos. Paths are normalized to absolute form and stored flat in a
//! node map; watchers are handle-allocated from a slab and receive events
//! whose paths match their glob.

use super::{DirEntry, FileKind, FileStat, FileSystem, FsEvent, FsEventKind, FsFuture, WatcherId};
use futures::future;
use slab::Slab;
use std::collections::HashMap;
use std::io;
use std::sync::{Mutex, PoisonError};

/// A stored file or directory.
#[derive(Clone)]
enum Node {
    File { data: Vec<u8>, mtime: u64 },
    Directory,
}

struct Watcher {
    glob: String,
    events: Vec<FsEvent>,
}

struct State {
    /// All files and directories, keyed by normalized path.
    nodes: HashMap<String, Node>,
    watchers: Slab<Watcher>,
    /// Monotonic stamp for mtimes.
    clock: u64,
}

/// In-memory filesystem.
pub struct MemoryFs {
    state: Mutex<State>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        // Root directory always exists
        nodes.insert("/".to_string(), Node::Directory);
        Self {
            state: Mutex::new(State {
                nodes,
                watchers: Slab::new(),
                clock: 0,
            }),
        }
    }

    /// Normalize a path (ensure leading slash, no trailing slash except root).
    fn normalize_path(path: &str) -> String {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        if path.len() > 1 && path.ends_with('/') {
            path[..path.len() - 1].to_string()
        } else {
            path
        }
    }

    /// Get parent directory of a normalized path.
    fn parent_path(path: &str) -> Option<String> {
        if path == "/" {
            return None;
        }
        let idx = path.rfind('/')?;
        if idx == 0 {
            Some("/".to_string())
        } else {
            Some(path[..idx].to_string())
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Events delivered to a watcher so far.
    pub fn watcher_events(&self, id: WatcherId) -> Vec<FsEvent> {
        let state = self.lock();
        state
            .watchers
            .get(id)
            .map(|w| w.events.clone())
            .unwrap_or_default()
    }
}

impl State {
    fn ensure_parent(&self, path: &str) -> io::Result<()> {
        if let Some(parent) = MemoryFs::parent_path(path) {
            match self.nodes.get(&parent) {
                Some(Node::Directory) => Ok(()),
                Some(_) => Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("not a directory: {}", parent),
                )),
                None => Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("parent directory not found: {}", parent),
                )),
            }
        } else {
            Ok(())
        }
    }

    fn emit(&mut self, kind: FsEventKind, path: &str) {
        for (_, watcher) in self.watchers.iter_mut() {
            if glob_match(&watcher.glob, path) {
                watcher.events.push(FsEvent {
                    kind,
                    path: path.to_string(),
                });
            }
        }
    }

    /// Paths of a subtree rooted at `path`, the root included.
    fn subtree(&self, path: &str) -> Vec<String> {
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{}/", path)
        };
        self.nodes
            .keys()
            .filter(|p| *p == path || p.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn stat_impl(&self, path: &str) -> io::Result<FileStat> {
        match self.nodes.get(path) {
            Some(Node::File { data, mtime }) => Ok(FileStat {
                kind: FileKind::File,
                size: data.len() as u64,
                mtime: *mtime,
            }),
            Some(Node::Directory) => Ok(FileStat {
                kind: FileKind::Directory,
                size: 0,
                mtime: 0,
            }),
            None => Err(not_found(path)),
        }
    }
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no such path: {}", path))
}

/// Minimal glob matching: `*` matches any run of characters (including
/// separators), `?` matches a single character. Enough for watcher
/// patterns like `/src/*.rs`; a real globbing library stays out of scope.
fn glob_match(pattern: &str, path: &str) -> bool {
    fn matches(pat: &[char], text: &[char]) -> bool {
        match pat.split_first() {
            None => text.is_empty(),
            Some(('*', rest)) => {
                (0..=text.len()).any(|skip| matches(rest, &text[skip..]))
            }
            Some(('?', rest)) => match text.split_first() {
                Some((_, tail)) => matches(rest, tail),
                None => false,
            },
            Some((c, rest)) => match text.split_first() {
                Some((t, tail)) => c == t && matches(rest, tail),
                None => false,
            },
        }
    }
    let pat: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = path.chars().collect();
    matches(&pat, &text)
}

impl FileSystem for MemoryFs {
    fn stat<'a>(&'a self, path: &'a str) -> FsFuture<'a, FileStat> {
        let path = Self::normalize_path(path);
        let result = self.lock().stat_impl(&path);
        Box::pin(future::ready(result))
    }

    fn read_directory<'a>(&'a self, path: &'a str) -> FsFuture<'a, Vec<DirEntry>> {
        let path = Self::normalize_path(path);
        let state = self.lock();
        let result = match state.nodes.get(&path) {
            Some(Node::Directory) => {
                let prefix = if path == "/" {
                    "/".to_string()
                } else {
                    format!("{}/", path)
                };
                let mut entries: Vec<DirEntry> = state
                    .nodes
                    .iter()
                    .filter_map(|(p, node)| {
                        let rest = p.strip_prefix(&prefix)?;
                        // Direct children only
                        if rest.is_empty() || rest.contains('/') {
                            return None;
                        }
                        Some(DirEntry {
                            name: rest.to_string(),
                            kind: match node {
                                Node::File { .. } => FileKind::File,
                                Node::Directory => FileKind::Directory,
                            },
                        })
                    })
                    .collect();
                entries.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(entries)
            }
            Some(Node::File { .. }) => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("not a directory: {}", path),
            )),
            None => Err(not_found(&path)),
        };
        drop(state);
        Box::pin(future::ready(result))
    }

    fn create_directory<'a>(&'a self, path: &'a str) -> FsFuture<'a, ()> {
        let path = Self::normalize_path(path);
        let mut state = self.lock();
        let result = if state.nodes.contains_key(&path) {
            Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("already exists: {}", path),
            ))
        } else {
            state.ensure_parent(&path).map(|()| {
                state.nodes.insert(path.clone(), Node::Directory);
                state.emit(FsEventKind::Create, &path);
            })
        };
        drop(state);
        Box::pin(future::ready(result))
    }

    fn read_file<'a>(&'a self, path: &'a str) -> FsFuture<'a, Vec<u8>> {
        let path = Self::normalize_path(path);
        let state = self.lock();
        let result = match state.nodes.get(&path) {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            Some(Node::Directory) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", path),
            )),
            None => Err(not_found(&path)),
        };
        drop(state);
        Box::pin(future::ready(result))
    }

    fn write_file<'a>(&'a self, path: &'a str, contents: &'a [u8]) -> FsFuture<'a, ()> {
        let path = Self::normalize_path(path);
        let mut state = self.lock();
        let result = match state.nodes.get(&path) {
            Some(Node::Directory) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", path),
            )),
            Some(Node::File { .. }) => {
                state.clock += 1;
                let mtime = state.clock;
                state.nodes.insert(
                    path.clone(),
                    Node::File {
                        data: contents.to_vec(),
                        mtime,
                    },
                );
                state.emit(FsEventKind::Change, &path);
                Ok(())
            }
            None => state.ensure_parent(&path).map(|()| {
                state.clock += 1;
                let mtime = state.clock;
                state.nodes.insert(
                    path.clone(),
                    Node::File {
                        data: contents.to_vec(),
                        mtime,
                    },
                );
                state.emit(FsEventKind::Create, &path);
            }),
        };
        drop(state);
        Box::pin(future::ready(result))
    }

    fn delete<'a>(&'a self, path: &'a str, recursive: bool) -> FsFuture<'a, ()> {
        let path = Self::normalize_path(path);
        let mut state = self.lock();
        let result = match state.nodes.get(&path) {
            None => Err(not_found(&path)),
            Some(Node::File { .. }) => {
                state.nodes.remove(&path);
                state.emit(FsEventKind::Delete, &path);
                Ok(())
            }
            Some(Node::Directory) => {
                let subtree = state.subtree(&path);
                if !recursive && subtree.len() > 1 {
                    Err(io::Error::new(
                        io::ErrorKind::DirectoryNotEmpty,
                        format!("directory not empty: {}", path),
                    ))
                } else if path == "/" {
                    Err(io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        "cannot delete root",
                    ))
                } else {
                    for p in subtree {
                        state.nodes.remove(&p);
                        state.emit(FsEventKind::Delete, &p);
                    }
                    Ok(())
                }
            }
        };
        drop(state);
        Box::pin(future::ready(result))
    }

    fn rename<'a>(&'a self, from: &'a str, to: &'a str, overwrite: bool) -> FsFuture<'a, ()> {
        let from = Self::normalize_path(from);
        let to = Self::normalize_path(to);
        let mut state = self.lock();
        let result = (|| {
            if !state.nodes.contains_key(&from) {
                return Err(not_found(&from));
            }
            if state.nodes.contains_key(&to) && !overwrite {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("already exists: {}", to),
                ));
            }
            state.ensure_parent(&to)?;
            for old in state.subtree(&from) {
                let new = format!("{}{}", to, &old[from.len()..]);
                if let Some(node) = state.nodes.remove(&old) {
                    state.nodes.insert(new, node);
                }
            }
            state.emit(FsEventKind::Delete, &from);
            state.emit(FsEventKind::Create, &to);
            Ok(())
        })();
        drop(state);
        Box::pin(future::ready(result))
    }

    fn copy<'a>(&'a self, from: &'a str, to: &'a str, overwrite: bool) -> FsFuture<'a, ()> {
        let from = Self::normalize_path(from);
        let to = Self::normalize_path(to);
        let mut state = self.lock();
        let result = (|| {
            if !state.nodes.contains_key(&from) {
                return Err(not_found(&from));
            }
            if state.nodes.contains_key(&to) && !overwrite {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("already exists: {}", to),
                ));
            }
            state.ensure_parent(&to)?;
            for old in state.subtree(&from) {
                let new = format!("{}{}", to, &old[from.len()..]);
                if let Some(node) = state.nodes.get(&old).cloned() {
                    state.nodes.insert(new, node);
                }
            }
            state.emit(FsEventKind::Create, &to);
            Ok(())
        })();
        drop(state);
        Box::pin(future::ready(result))
    }

    fn create_watcher<'a>(&'a self, glob: &'a str) -> FsFuture<'a, WatcherId> {
        let mut state = self.lock();
        let id = state.watchers.insert(Watcher {
            glob: glob.to_string(),
            events: Vec::new(),
        });
        drop(state);
        Box::pin(future::ready(Ok(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    // ============ Files & Directories ============

    #[test]
    fn test_write_and_read_file() {
        let fs = MemoryFs::new();
        block_on(fs.write_file("/hello.txt", b"hi there")).unwrap();
        let data = block_on(fs.read_file("/hello.txt")).unwrap();
        assert_eq!(data, b"hi there");
    }

    #[test]
    fn test_stat_reports_kind_and_size() {
        let fs = MemoryFs::new();
        block_on(fs.write_file("/a.bin", &[0u8; 12])).unwrap();
        let stat = block_on(fs.stat("/a.bin")).unwrap();
        assert_eq!(stat.kind, FileKind::File);
        assert_eq!(stat.size, 12);

        block_on(fs.create_directory("/dir")).unwrap();
        let stat = block_on(fs.stat("/dir")).unwrap();
        assert_eq!(stat.kind, FileKind::Directory);
    }

    #[test]
    fn test_read_directory_direct_children_sorted() {
        let fs = MemoryFs::new();
        block_on(fs.create_directory("/d")).unwrap();
        block_on(fs.write_file("/d/b.txt", b"")).unwrap();
        block_on(fs.write_file("/d/a.txt", b"")).unwrap();
        block_on(fs.create_directory("/d/sub")).unwrap();
        block_on(fs.write_file("/d/sub/deep.txt", b"")).unwrap();

        let entries = block_on(fs.read_directory("/d")).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
    }

    #[test]
    fn test_write_requires_parent() {
        let fs = MemoryFs::new();
        let err = block_on(fs.write_file("/missing/file.txt", b"x")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_mtime_advances_on_change() {
        let fs = MemoryFs::new();
        block_on(fs.write_file("/f", b"1")).unwrap();
        let first = block_on(fs.stat("/f")).unwrap().mtime;
        block_on(fs.write_file("/f", b"2")).unwrap();
        let second = block_on(fs.stat("/f")).unwrap().mtime;
        assert!(second > first);
    }

    // ============ Delete / Rename / Copy ============

    #[test]
    fn test_delete_nonempty_dir_requires_recursive() {
        let fs = MemoryFs::new();
        block_on(fs.create_directory("/d")).unwrap();
        block_on(fs.write_file("/d/f", b"x")).unwrap();

        let err = block_on(fs.delete("/d", false)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::DirectoryNotEmpty);

        block_on(fs.delete("/d", true)).unwrap();
        assert!(block_on(fs.stat("/d")).is_err());
        assert!(block_on(fs.stat("/d/f")).is_err());
    }

    #[test]
    fn test_rename_moves_subtree() {
        let fs = MemoryFs::new();
        block_on(fs.create_directory("/old")).unwrap();
        block_on(fs.write_file("/old/f", b"data")).unwrap();
        block_on(fs.rename("/old", "/new", false)).unwrap();

        assert!(block_on(fs.stat("/old")).is_err());
        assert_eq!(block_on(fs.read_file("/new/f")).unwrap(), b"data");
    }

    #[test]
    fn test_rename_without_overwrite_refuses_existing() {
        let fs = MemoryFs::new();
        block_on(fs.write_file("/a", b"1")).unwrap();
        block_on(fs.write_file("/b", b"2")).unwrap();

        let err = block_on(fs.rename("/a", "/b", false)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        block_on(fs.rename("/a", "/b", true)).unwrap();
        assert_eq!(block_on(fs.read_file("/b")).unwrap(), b"1");
    }

    #[test]
    fn test_copy_keeps_source() {
        let fs = MemoryFs::new();
        block_on(fs.write_file("/src", b"data")).unwrap();
        block_on(fs.copy("/src", "/dst", false)).unwrap();
        assert_eq!(block_on(fs.read_file("/src")).unwrap(), b"data");
        assert_eq!(block_on(fs.read_file("/dst")).unwrap(), b"data");
    }

    // ============ Watchers ============

    #[test]
    fn test_watcher_receives_matching_events() {
        let fs = MemoryFs::new();
        let id = block_on(fs.create_watcher("/logs/*")).unwrap();
        block_on(fs.create_directory("/logs")).unwrap();
        block_on(fs.write_file("/logs/app.log", b"x")).unwrap();
        block_on(fs.write_file("/other.txt", b"y")).unwrap();
        block_on(fs.write_file("/logs/app.log", b"xy")).unwrap();
        block_on(fs.delete("/logs/app.log", false)).unwrap();

        let events = fs.watcher_events(id);
        assert_eq!(
            events,
            vec![
                FsEvent { kind: FsEventKind::Create, path: "/logs/app.log".into() },
                FsEvent { kind: FsEventKind::Change, path: "/logs/app.log".into() },
                FsEvent { kind: FsEventKind::Delete, path: "/logs/app.log".into() },
            ]
        );
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("/a/*.rs", "/a/main.rs"));
        assert!(glob_match("*", "/anything/at/all"));
        assert!(glob_match("/a/?.rs", "/a/x.rs"));
        assert!(!glob_match("/a/?.rs", "/a/xy.rs"));
        assert!(!glob_match("/a/*.rs", "/a/main.txt"));
    }
}
