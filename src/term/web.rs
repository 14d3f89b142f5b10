//! xterm.js-backed terminal
//!
//! Direct wasm_bindgen bindings to xterm.js loaded via script tag, plus
//! the wiring that feeds its data and resize events into a
//! [`LineEditor`].

#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use super::{Term, TermSize};
use crate::readline::LineEditor;
use crate::shell::Shell;

// Bindings to the xterm.js globals (loaded via script tag)
#[wasm_bindgen]
extern "C" {
    /// The xterm.js Terminal class (global `Terminal`)
    #[wasm_bindgen(js_name = Terminal)]
    type XTerm;

    #[wasm_bindgen(constructor, js_class = "Terminal")]
    fn new(options: &JsValue) -> XTerm;

    #[wasm_bindgen(method)]
    fn open(this: &XTerm, element: &web_sys::HtmlElement);

    #[wasm_bindgen(method)]
    fn write(this: &XTerm, data: &str);

    #[wasm_bindgen(method)]
    fn focus(this: &XTerm);

    #[wasm_bindgen(method, js_name = loadAddon)]
    fn load_addon(this: &XTerm, addon: &JsValue);

    #[wasm_bindgen(method, js_name = onData)]
    fn on_data(this: &XTerm, callback: &js_sys::Function);

    #[wasm_bindgen(method, js_name = onResize)]
    fn on_resize(this: &XTerm, callback: &js_sys::Function);

    #[wasm_bindgen(method, getter)]
    fn cols(this: &XTerm) -> u32;

    #[wasm_bindgen(method, getter)]
    fn rows(this: &XTerm) -> u32;

    /// The xterm-addon-fit FitAddon class (global `FitAddon`)
    #[wasm_bindgen(js_name = FitAddon)]
    type XTermFitAddon;

    #[wasm_bindgen(constructor, js_class = "FitAddon")]
    fn new_fit() -> XTermFitAddon;

    #[wasm_bindgen(method)]
    fn fit(this: &XTermFitAddon);
}

/// Cloneable handle to one xterm.js instance.
#[derive(Clone)]
pub struct WebTerm {
    term: Rc<XTerm>,
}

impl WebTerm {
    /// Create an xterm.js terminal in a full-viewport container appended
    /// to the document body.
    pub fn open_fullscreen() -> Result<Self, JsValue> {
        let options = js_sys::Object::new();
        js_sys::Reflect::set(&options, &"cursorBlink".into(), &true.into())?;
        js_sys::Reflect::set(&options, &"fontSize".into(), &14.into())?;
        js_sys::Reflect::set(
            &options,
            &"fontFamily".into(),
            &"'JetBrains Mono', 'Fira Code', monospace".into(),
        )?;

        let terminal = XTerm::new(&options.into());

        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;
        let container = document.create_element("div")?;
        container.set_id("terminal");

        let html_container: web_sys::HtmlElement = container.dyn_into()?;
        let style = html_container.style();
        style.set_property("position", "fixed")?;
        style.set_property("top", "0")?;
        style.set_property("left", "0")?;
        style.set_property("width", "100%")?;
        style.set_property("height", "100%")?;

        document
            .body()
            .ok_or("no body")?
            .append_child(&html_container)?;

        terminal.open(&html_container);

        let fit_addon = XTermFitAddon::new_fit();
        terminal.load_addon(&fit_addon);
        fit_addon.fit();
        terminal.focus();

        Ok(Self {
            term: Rc::new(terminal),
        })
    }

    pub fn focus(&self) {
        self.term.focus();
    }
}

impl Term for WebTerm {
    fn write(&mut self, text: &str) {
        self.term.write(text);
    }

    fn size(&self) -> TermSize {
        TermSize {
            cols: self.term.cols() as usize,
            rows: self.term.rows() as usize,
        }
    }
}

/// Route the terminal's data and resize events into the editor. The
/// closures are leaked intentionally: they live as long as the page.
pub fn attach_editor(term: &WebTerm, editor: Rc<RefCell<LineEditor<WebTerm>>>) {
    let data_editor = editor.clone();
    let on_data = Closure::wrap(Box::new(move |data: String| {
        data_editor.borrow_mut().handle_term_data(&data);
    }) as Box<dyn FnMut(String)>);
    term.term.on_data(on_data.as_ref().unchecked_ref());
    on_data.forget();

    let resize_editor = editor;
    let on_resize = Closure::wrap(Box::new(move |size: JsValue| {
        let field = |name: &str| {
            js_sys::Reflect::get(&size, &name.into())
                .ok()
                .and_then(|v| v.as_f64())
        };
        let cols = field("cols").unwrap_or(80.0) as usize;
        let rows = field("rows").unwrap_or(24.0) as usize;
        resize_editor
            .borrow_mut()
            .handle_term_resize(TermSize { cols, rows });
    }) as Box<dyn FnMut(JsValue)>);
    term.term.on_resize(on_resize.as_ref().unchecked_ref());
    on_resize.forget();
}

/// Run the shell's read-eval-print loop on the browser microtask queue.
pub fn spawn_repl(shell: Shell<WebTerm>) {
    wasm_bindgen_futures::spawn_local(async move { shell.repl().await });
}
