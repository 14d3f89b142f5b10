//! Line-editing controller
//!
//! Local-echo line editing over a dumb terminal stream:
//! - Cursor movement with multi-row wrap awareness (the terminal itself
//!   never reflows our input; we re-render it)
//! - Bounded command history with arrow-key browsing
//! - Tab completion through pluggable handlers, with shared-fragment
//!   extension and wide candidate listings
//! - Multi-line continuation when Enter lands on incomplete input
//!
//! The controller is a state machine. [`Prompt`] names the states
//! explicitly: `Idle` (keystrokes ignored), `Line` (normal editing), and
//! `Char` (a single-key prompt, possibly suspending a line prompt that is
//! resumed afterwards). Completed reads resolve a oneshot channel, so a
//! caller awaits a line without the editor ever blocking the input path.

pub mod history;
pub mod text;

use crate::term::{Term, TermSize};
use futures::channel::oneshot;
use history::HistoryRing;
use text::{
    byte_of, char_len, closest_left_boundary, closest_right_boundary, count_lines,
    has_trailing_whitespace, is_incomplete_input, last_token, offset_to_col_row, shared_fragment,
    tokenize_lenient,
};

pub struct LineEditorOptions {
    pub history_size: usize,
    /// Above this many candidates, Tab asks before listing them all.
    pub max_autocomplete: usize,
}

impl Default for LineEditorOptions {
    fn default() -> Self {
        Self {
            history_size: 10,
            max_autocomplete: 100,
        }
    }
}

/// Why a pending read did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    Aborted(String),
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aborted(reason) => write!(f, "read aborted: {}", reason),
        }
    }
}

impl std::error::Error for ReadError {}

/// One completion candidate. A `partial` candidate (say, a directory
/// prefix) does not get the trailing space that normally follows a
/// completed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub value: String,
    pub partial: bool,
}

impl Completion {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            partial: false,
        }
    }

    pub fn partial(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            partial: true,
        }
    }
}

/// Called with the index of the token under the cursor and all tokens of
/// the line so far; returns candidates for that token.
pub type AutocompleteHandler = Box<dyn Fn(usize, &[String]) -> Vec<Completion>>;

type ReadSender = oneshot::Sender<Result<String, ReadError>>;

struct LinePrompt {
    prompt: String,
    continuation: String,
    done: ReadSender,
}

struct CharPrompt {
    done: Option<ReadSender>,
    /// Line prompt to restore once the single key arrives.
    resume: Option<LinePrompt>,
    saved_cursor: usize,
    /// Candidate listing to print if the key is `y`.
    pending: Option<Vec<String>>,
}

enum Prompt {
    Idle,
    Line(LinePrompt),
    Char(CharPrompt),
}

pub struct LineEditor<T: Term> {
    term: T,
    size: TermSize,
    history: HistoryRing,
    max_autocomplete: usize,
    handlers: Vec<AutocompleteHandler>,
    prompt: Prompt,
    input: String,
    /// Character offset into `input`, not a byte offset.
    cursor: usize,
}

impl<T: Term> LineEditor<T> {
    pub fn new(term: T, options: LineEditorOptions) -> Self {
        let size = term.size();
        Self {
            term,
            size,
            history: HistoryRing::new(options.history_size),
            max_autocomplete: options.max_autocomplete,
            handlers: Vec::new(),
            prompt: Prompt::Idle,
            input: String::new(),
            cursor: 0,
        }
    }

    pub fn add_autocomplete_handler(&mut self, handler: AutocompleteHandler) {
        self.handlers.push(handler);
    }

    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryRing {
        &mut self.history
    }

    pub fn term_mut(&mut self) -> &mut T {
        &mut self.term
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Begin reading a line. The returned channel resolves when the user
    /// submits (or the read is aborted). Starting a new read drops any
    /// previous unresolved one.
    pub fn read(
        &mut self,
        prompt: &str,
        continuation: &str,
    ) -> oneshot::Receiver<Result<String, ReadError>> {
        let (tx, rx) = oneshot::channel();
        self.term.write(prompt);
        self.prompt = Prompt::Line(LinePrompt {
            prompt: prompt.to_string(),
            continuation: continuation.to_string(),
            done: tx,
        });
        self.input.clear();
        self.cursor = 0;
        rx
    }

    /// Begin reading a single keypress. If a line read is in progress it
    /// is suspended and resumes after the key arrives.
    pub fn read_char(&mut self, prompt: &str) -> oneshot::Receiver<Result<String, ReadError>> {
        let (tx, rx) = oneshot::channel();
        self.term.write(prompt);
        let resume = match std::mem::replace(&mut self.prompt, Prompt::Idle) {
            Prompt::Line(line) => Some(line),
            _ => None,
        };
        self.prompt = Prompt::Char(CharPrompt {
            done: Some(tx),
            resume,
            saved_cursor: self.cursor,
            pending: None,
        });
        rx
    }

    /// Abort whatever read is pending, resolving its channel with
    /// [`ReadError::Aborted`].
    pub fn abort_read(&mut self, reason: &str) {
        let abort = || Err(ReadError::Aborted(reason.to_string()));
        match std::mem::replace(&mut self.prompt, Prompt::Idle) {
            Prompt::Idle => {}
            Prompt::Line(line) => {
                self.term.write("\r\n");
                let _ = line.done.send(abort());
            }
            Prompt::Char(char_prompt) => {
                self.term.write("\r\n");
                if let Some(done) = char_prompt.done {
                    let _ = done.send(abort());
                }
                if let Some(line) = char_prompt.resume {
                    let _ = line.done.send(abort());
                }
            }
        }
    }

    /// Print a message, translating bare newlines to CRLF.
    pub fn print(&mut self, message: &str) {
        let mut out = String::with_capacity(message.len());
        let mut in_break = false;
        for c in message.chars() {
            if c == '\r' || c == '\n' {
                if !in_break {
                    out.push_str("\r\n");
                }
                in_break = true;
            } else {
                out.push(c);
                in_break = false;
            }
        }
        self.term.write(&out);
    }

    pub fn println(&mut self, message: &str) {
        let mut line = message.to_string();
        line.push('\n');
        self.print(&line);
    }

    /// Print items in columns sized to the widest item.
    pub fn print_wide(&mut self, items: &[String], padding: usize) {
        if items.is_empty() {
            self.println("");
            return;
        }
        let width = items.iter().map(|i| char_len(i)).max().unwrap_or(0) + padding;
        let wide_cols = (self.size.cols / width).max(1);
        let wide_rows = items.len().div_ceil(wide_cols);
        let mut i = 0;
        for _ in 0..wide_rows {
            let mut row = String::new();
            for _ in 0..wide_cols {
                if let Some(item) = items.get(i) {
                    row.push_str(item);
                    for _ in char_len(item)..width {
                        row.push(' ');
                    }
                    i += 1;
                }
            }
            self.println(row.trim_end());
        }
    }

    /// Raw terminal input. Long non-escape payloads are treated as a
    /// paste: newlines are normalized to `\r` and each character is
    /// replayed through ordinary key handling, so a pasted multi-line
    /// script behaves as if typed.
    pub fn handle_term_data(&mut self, data: &str) {
        match self.prompt {
            Prompt::Idle => return,
            Prompt::Char(_) => {
                self.finish_char(data);
                return;
            }
            Prompt::Line(_) => {}
        }
        if data.len() > 3 && !data.starts_with('\x1b') {
            let normalized = data.replace("\r\n", "\r").replace('\n', "\r");
            for c in normalized.chars() {
                self.handle_data(&c.to_string());
            }
        } else {
            self.handle_data(data);
        }
    }

    /// React to a terminal resize: re-render the prompt and input under
    /// the new width.
    pub fn handle_term_resize(&mut self, size: TermSize) {
        if matches!(self.prompt, Prompt::Line(_)) {
            self.clear_input();
            self.size = size;
            let input = self.input.clone();
            self.write_input(&input);
        } else {
            self.size = size;
        }
    }

    /// One decoded key or escape sequence.
    pub fn handle_data(&mut self, data: &str) {
        if !matches!(self.prompt, Prompt::Line(_)) {
            return;
        }
        let Some(first) = data.chars().next() else {
            return;
        };

        if first == '\x1b' {
            match &data[1..] {
                "[A" => {
                    // Up arrow
                    if let Some(value) = self.history.previous().map(str::to_string) {
                        let cursor = char_len(&value);
                        self.set_input(&value);
                        self.set_cursor(cursor);
                    }
                }
                "[B" => {
                    // Down arrow
                    let value = self.history.next().map(str::to_string).unwrap_or_default();
                    let cursor = char_len(&value);
                    self.set_input(&value);
                    self.set_cursor(cursor);
                }
                "[D" => self.move_cursor(-1),
                "[C" => self.move_cursor(1),
                "[3~" => self.erase(false),
                "[F" => self.set_cursor(char_len(&self.input)),
                "[H" => self.set_cursor(0),
                "b" => {
                    // Alt+Left
                    let ofs = closest_left_boundary(&self.input, self.cursor);
                    self.set_cursor(ofs);
                }
                "f" => {
                    // Alt+Right
                    let ofs = closest_right_boundary(&self.input, self.cursor);
                    self.set_cursor(ofs);
                }
                "\x7f" => {
                    // Ctrl+Backspace: delete the word left of the cursor
                    let ofs = closest_left_boundary(&self.input, self.cursor);
                    let mut trimmed = self.input[..byte_of(&self.input, ofs)].to_string();
                    trimmed.push_str(&self.input[byte_of(&self.input, self.cursor)..]);
                    self.set_input(&trimmed);
                    self.set_cursor(ofs);
                }
                _ => {}
            }
        } else if (first as u32) < 32 || first == '\x7f' {
            match data {
                "\r" => {
                    if is_incomplete_input(&self.input) {
                        self.insert_at_cursor("\n");
                    } else {
                        self.complete_read();
                    }
                }
                "\x7f" => self.erase(true),
                "\t" => self.handle_tab(),
                "\x03" => self.handle_interrupt(),
                _ => {}
            }
        } else {
            self.insert_at_cursor(data);
        }
    }

    // ------------------------------------------------------------------
    // Display synchronization
    //
    // The model is full redraw: erase every row the prompt currently
    // occupies, print the new state, then walk the cursor back to its
    // logical position. Wrap math lives in [`text`].
    // ------------------------------------------------------------------

    /// Prompt-decorated form of `input`: the prompt prefix, with the
    /// continuation prompt after every embedded newline.
    fn apply_prompts(&self, input: &str) -> String {
        let (prompt, continuation) = match &self.prompt {
            Prompt::Line(p) => (p.prompt.as_str(), p.continuation.as_str()),
            _ => ("", ""),
        };
        let mut out = String::with_capacity(prompt.len() + input.len());
        out.push_str(prompt);
        for c in input.chars() {
            out.push(c);
            if c == '\n' {
                out.push_str(continuation);
            }
        }
        out
    }

    /// Character offset into the prompt-decorated string that corresponds
    /// to `offset` into the raw input.
    fn apply_prompt_offset(&self, input: &str, offset: usize) -> usize {
        char_len(&self.apply_prompts(&input[..byte_of(input, offset)]))
    }

    /// Erase every row the current prompt occupies and leave the terminal
    /// cursor at the start of the first of them.
    fn clear_input(&mut self) {
        let with_prompt = self.apply_prompts(&self.input);
        let all_rows = count_lines(&with_prompt, self.size.cols);
        let cursor_offset = self.apply_prompt_offset(&self.input, self.cursor);
        let (_, row) = offset_to_col_row(&with_prompt, cursor_offset, self.size.cols);

        for _ in 0..all_rows.saturating_sub(row + 1) {
            self.term.write("\x1b[E");
        }
        self.term.write("\r\x1b[K");
        for _ in 1..all_rows {
            self.term.write("\x1b[F\x1b[K");
        }
    }

    /// Print `new_input` with prompts and position the terminal cursor at
    /// the logical cursor. Assumes the old render is already cleared.
    fn write_input(&mut self, new_input: &str) {
        let with_prompt = self.apply_prompts(new_input);
        self.print(&with_prompt);

        let len = char_len(new_input);
        if self.cursor > len {
            self.cursor = len;
        }

        let cursor_offset = self.apply_prompt_offset(new_input, self.cursor);
        let all_rows = count_lines(&with_prompt, self.size.cols);
        let (col, row) = offset_to_col_row(&with_prompt, cursor_offset, self.size.cols);

        self.term.write("\r");
        for _ in 0..all_rows.saturating_sub(row + 1) {
            self.term.write("\x1b[F");
        }
        for _ in 0..col {
            self.term.write("\x1b[C");
        }
        self.input = new_input.to_string();
    }

    fn set_input(&mut self, new_input: &str) {
        self.clear_input();
        self.write_input(new_input);
    }

    /// Move the terminal cursor to `new_cursor` by emitting relative
    /// row/column moves; the input itself is untouched.
    fn set_cursor(&mut self, new_cursor: usize) {
        let new_cursor = new_cursor.min(char_len(&self.input));
        let with_prompt = self.apply_prompts(&self.input);

        let prev_offset = self.apply_prompt_offset(&self.input, self.cursor);
        let new_offset = self.apply_prompt_offset(&self.input, new_cursor);
        let (prev_col, prev_row) = offset_to_col_row(&with_prompt, prev_offset, self.size.cols);
        let (new_col, new_row) = offset_to_col_row(&with_prompt, new_offset, self.size.cols);

        if new_row > prev_row {
            for _ in prev_row..new_row {
                self.term.write("\x1b[B");
            }
        } else {
            for _ in new_row..prev_row {
                self.term.write("\x1b[A");
            }
        }
        if new_col > prev_col {
            for _ in prev_col..new_col {
                self.term.write("\x1b[C");
            }
        } else {
            for _ in new_col..prev_col {
                self.term.write("\x1b[D");
            }
        }
        self.cursor = new_cursor;
    }

    fn move_cursor(&mut self, dir: isize) {
        let len = char_len(&self.input);
        if dir > 0 {
            let step = (dir as usize).min(len - self.cursor);
            self.set_cursor(self.cursor + step);
        } else if dir < 0 {
            let step = dir.unsigned_abs().min(self.cursor);
            self.set_cursor(self.cursor - step);
        }
    }

    fn erase(&mut self, backspace: bool) {
        if backspace {
            if self.cursor == 0 {
                return;
            }
            let at = byte_of(&self.input, self.cursor - 1);
            let after = byte_of(&self.input, self.cursor);
            let mut new_input = self.input[..at].to_string();
            new_input.push_str(&self.input[after..]);
            self.clear_input();
            self.cursor -= 1;
            self.write_input(&new_input);
        } else {
            let at = byte_of(&self.input, self.cursor);
            let after = byte_of(&self.input, self.cursor + 1);
            let mut new_input = self.input[..at].to_string();
            new_input.push_str(&self.input[after..]);
            self.set_input(&new_input);
        }
    }

    fn insert_at_cursor(&mut self, data: &str) {
        let at = byte_of(&self.input, self.cursor);
        let mut new_input = self.input[..at].to_string();
        new_input.push_str(data);
        new_input.push_str(&self.input[at..]);
        self.cursor += char_len(data);
        self.set_input(&new_input);
    }

    // ------------------------------------------------------------------
    // Read lifecycle
    // ------------------------------------------------------------------

    fn complete_read(&mut self) {
        self.history.push(&self.input);
        self.term.write("\r\n");
        if let Prompt::Line(line) = std::mem::replace(&mut self.prompt, Prompt::Idle) {
            let _ = line.done.send(Ok(self.input.clone()));
        }
    }

    /// Ctrl+C: abandon the current input and reprint a fresh prompt. The
    /// pending read stays open.
    fn handle_interrupt(&mut self) {
        self.set_cursor(char_len(&self.input));
        let prompt = match &self.prompt {
            Prompt::Line(p) => p.prompt.clone(),
            _ => String::new(),
        };
        self.term.write("^C\r\n");
        self.term.write(&prompt);
        self.input.clear();
        self.cursor = 0;
        self.history.rewind();
    }

    fn finish_char(&mut self, data: &str) {
        self.term.write("\r\n");
        let Prompt::Char(char_prompt) = std::mem::replace(&mut self.prompt, Prompt::Idle) else {
            return;
        };
        let CharPrompt {
            done,
            resume,
            saved_cursor,
            pending,
        } = char_prompt;
        if let Some(done) = done {
            let _ = done.send(Ok(data.to_string()));
        }
        if matches!(data, "y" | "Y") {
            if let Some(values) = &pending {
                self.print_wide(values, 2);
            }
        }
        if let Some(line) = resume {
            self.prompt = Prompt::Line(line);
            self.cursor = saved_cursor.min(char_len(&self.input));
            let input = self.input.clone();
            self.write_input(&input);
        }
    }

    // ------------------------------------------------------------------
    // Autocompletion
    // ------------------------------------------------------------------

    fn collect_candidates(&self, fragment: &str) -> Vec<Completion> {
        let tokens = tokenize_lenient(fragment);
        let (index, expr) = if fragment.trim().is_empty() {
            (0, String::new())
        } else if has_trailing_whitespace(fragment) {
            (tokens.len(), String::new())
        } else {
            let last = tokens.last().cloned().unwrap_or_default();
            (tokens.len().saturating_sub(1), last)
        };
        let mut candidates = Vec::new();
        for handler in &self.handlers {
            candidates.extend(handler(index, &tokens));
        }
        candidates.retain(|c| c.value.starts_with(&expr));
        candidates.sort_by(|a, b| a.value.cmp(&b.value));
        candidates
    }

    fn handle_tab(&mut self) {
        if self.handlers.is_empty() {
            self.insert_at_cursor("    ");
            return;
        }

        let fragment = self.input[..byte_of(&self.input, self.cursor)].to_string();
        let trailing_space = has_trailing_whitespace(&fragment);
        let candidates = self.collect_candidates(&fragment);

        if candidates.is_empty() {
            if !trailing_space {
                self.insert_at_cursor(" ");
            }
        } else if candidates.len() == 1 {
            let token = last_token(&fragment);
            let candidate = &candidates[0];
            let mut insertion = candidate.value[token.len()..].to_string();
            if !candidate.partial {
                insertion.push(' ');
            }
            self.insert_at_cursor(&insertion);
        } else if candidates.len() <= self.max_autocomplete {
            let values: Vec<String> = candidates.iter().map(|c| c.value.clone()).collect();
            let token = last_token(&fragment);
            if let Some(shared) = shared_fragment(&token, &values) {
                let remainder = shared[token.len()..].to_string();
                if !remainder.is_empty() {
                    self.insert_at_cursor(&remainder);
                }
            }
            // List candidates below the line, then redraw the prompt.
            let saved = self.cursor;
            self.set_cursor(char_len(&self.input));
            self.term.write("\r\n");
            self.print_wide(&values, 2);
            self.cursor = saved.min(char_len(&self.input));
            let input = self.input.clone();
            self.write_input(&input);
        } else {
            let values: Vec<String> = candidates.iter().map(|c| c.value.clone()).collect();
            let saved = self.cursor;
            self.set_cursor(char_len(&self.input));
            self.term.write("\r\n");
            self.term
                .write(&format!("Display all {} possibilities? (y or n)", values.len()));
            if let Prompt::Line(line) = std::mem::replace(&mut self.prompt, Prompt::Idle) {
                self.prompt = Prompt::Char(CharPrompt {
                    done: None,
                    resume: Some(line),
                    saved_cursor: saved,
                    pending: Some(values),
                });
            }
        }
    }
}
