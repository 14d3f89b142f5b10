//! Terminal surface boundary
//!
//! The line editor and shell talk to the terminal widget through the
//! [`Term`] trait only. In the browser the implementation is the xterm.js
//! adapter in [`web`]; natively (and in tests) it is [`CaptureTerm`],
//! which records everything written to it.

#[cfg(target_arch = "wasm32")]
pub mod web;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Last known terminal dimensions, used for wrap math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermSize {
    pub cols: usize,
    pub rows: usize,
}

impl TermSize {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self { cols, rows }
    }
}

/// What the line editor needs from a terminal widget: an output sink and
/// the current dimensions. Input arrives separately, as calls into the
/// editor's `handle_term_data` / `handle_term_resize`.
pub trait Term {
    /// Write raw text (may contain ANSI escape sequences) to the display.
    fn write(&mut self, text: &str);

    /// Current dimensions.
    fn size(&self) -> TermSize;
}

/// A terminal that records its output. Used natively as the test double;
/// cloning yields a handle onto the same underlying transcript.
#[derive(Clone)]
pub struct CaptureTerm {
    out: Rc<RefCell<String>>,
    size: Rc<Cell<TermSize>>,
}

impl CaptureTerm {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            out: Rc::new(RefCell::new(String::new())),
            size: Rc::new(Cell::new(TermSize::new(cols, rows))),
        }
    }

    /// Everything written so far.
    pub fn transcript(&self) -> String {
        self.out.borrow().clone()
    }

    /// Drop the transcript accumulated so far and return it.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.out.borrow_mut())
    }

    /// Change the reported dimensions. The editor must still be told via
    /// `handle_term_resize`, exactly as with a real widget.
    pub fn set_size(&self, cols: usize, rows: usize) {
        self.size.set(TermSize::new(cols, rows));
    }
}

impl Term for CaptureTerm {
    fn write(&mut self, text: &str) {
        self.out.borrow_mut().push_str(text);
    }

    fn size(&self) -> TermSize {
        self.size.get()
    }
}
