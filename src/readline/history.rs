//! Command history ring
//!
//! Bounded history with a browse cursor:
//! - Blank entries and immediate duplicates are not recorded
//! - When full, the oldest entry is evicted
//! - Arrow-key browsing walks the cursor; walking past the newest entry
//!   returns to a fresh line

use std::collections::VecDeque;

pub struct HistoryRing {
    entries: VecDeque<String>,
    size: usize,
    cursor: usize,
}

impl HistoryRing {
    pub fn new(size: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(size),
            size,
            cursor: 0,
        }
    }

    /// Record an entry and rewind the cursor. Whitespace-only input and an
    /// exact repeat of the newest entry are dropped.
    pub fn push(&mut self, entry: &str) {
        if entry.trim().is_empty() {
            self.rewind();
            return;
        }
        if self.entries.back().map(String::as_str) != Some(entry) {
            self.entries.push_back(entry.to_string());
            if self.entries.len() > self.size {
                self.entries.pop_front();
            }
        }
        self.rewind();
    }

    /// Reset browsing to the fresh-line position past the newest entry.
    pub fn rewind(&mut self) {
        self.cursor = self.entries.len();
    }

    /// Step toward older entries. Pressing past the oldest keeps
    /// returning it.
    pub fn previous(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        self.cursor = self.cursor.saturating_sub(1);
        self.entries.get(self.cursor).map(String::as_str)
    }

    /// Step toward newer entries; `None` means past the newest, back on a
    /// fresh line.
    pub fn next(&mut self) -> Option<&str> {
        if self.cursor < self.entries.len() {
            self.cursor += 1;
        }
        self.entries.get(self.cursor).map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
