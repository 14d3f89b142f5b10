//! websh - an in-browser terminal shell, compiled to WASM
//!
//! Two hard problems live here, and everything else hangs off them:
//! - [`bridge`]: a synchronous facade over an asynchronous filesystem,
//!   built on a fixed-size shared region with wait/notify and chunked
//!   transfer, so shell code reads like plain blocking code
//! - [`readline`]: a local-echo line editor over a dumb terminal stream,
//!   with multi-row wrap, history, and tab completion
//!
//! [`shell`] ties them together into a REPL of named async commands;
//! [`term`] abstracts the terminal (xterm.js in the browser, a capture
//! buffer in tests); [`fs`] is the asynchronous capability the bridge's
//! producer side executes against.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod bridge;
pub mod fs;
pub mod readline;
pub mod shell;
pub mod term;

/// Initialize panic hook for better error messages in browser console
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Console logging helper
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    pub fn log(s: &str);
}

/// Log to browser console (WASM)
#[cfg(target_arch = "wasm32")]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        $crate::log(&format!($($t)*))
    };
}

/// Log to stderr (native)
#[cfg(not(target_arch = "wasm32"))]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        eprintln!($($t)*)
    };
}
