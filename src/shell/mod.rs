//! Command shell
//!
//! The dispatcher that ties the line editor to registered commands:
//! - Read-eval-print loop over [`LineEditor::read`]
//! - Named async commands receiving positional args and parsed flags
//! - Command-name and per-command argument autocompletion
//! - A [`Scope`] handed to each command that is revoked when the command
//!   finishes, so stale handles fail loudly instead of scribbling on the
//!   next prompt
//!
//! Shared state lives in an explicit [`ShellContext`] (filesystem handle
//! and environment) rather than anything global.

pub mod commands;
pub mod parser;

pub use parser::{Flags, ParseError};

use crate::bridge::{BridgeError, SyncFs};
use crate::readline::{Completion, LineEditor, LineEditorOptions, ReadError};
use crate::term::{Term, TermSize};
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use std::cell::{Cell, RefCell, RefMut};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellError {
    NotFound(String),
    AlreadyRegistered(String),
    /// A command handle was used after the command finished.
    ScopeDestroyed,
    Aborted(String),
    Parse(ParseError),
    /// A command failed; carries its message.
    Command(String),
}

impl std::fmt::Display for ShellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "command not found: {}", name),
            Self::AlreadyRegistered(name) => write!(f, "command already registered: {}", name),
            Self::ScopeDestroyed => write!(f, "shell scope destroyed"),
            Self::Aborted(reason) => write!(f, "aborted: {}", reason),
            Self::Parse(e) => write!(f, "{}", e),
            Self::Command(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ShellError {}

impl From<ParseError> for ShellError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<BridgeError> for ShellError {
    fn from(e: BridgeError) -> Self {
        Self::Command(e.to_string())
    }
}

/// State shared by every command: the blocking filesystem handle and the
/// environment map.
pub struct ShellContext {
    pub fs: RefCell<SyncFs>,
    pub env: RefCell<HashMap<String, String>>,
}

impl ShellContext {
    pub fn new(fs: SyncFs) -> Self {
        Self {
            fs: RefCell::new(fs),
            env: RefCell::new(HashMap::new()),
        }
    }
}

/// Terminal-facing operations commands are allowed, erased over the
/// concrete terminal type.
pub trait ShellIo {
    fn print(&self, message: &str);
    fn println(&self, message: &str);
    fn print_wide(&self, items: &[String]);
    fn read_line(&self, prompt: &str) -> oneshot::Receiver<Result<String, ReadError>>;
    fn read_char(&self, prompt: &str) -> oneshot::Receiver<Result<String, ReadError>>;
    fn abort_read(&self, reason: &str);
    fn size(&self) -> TermSize;
    fn history(&self) -> Vec<String>;
    fn clear_screen(&self);
}

struct EditorIo<T: Term> {
    editor: Rc<RefCell<LineEditor<T>>>,
}

impl<T: Term> ShellIo for EditorIo<T> {
    fn print(&self, message: &str) {
        self.editor.borrow_mut().print(message);
    }

    fn println(&self, message: &str) {
        self.editor.borrow_mut().println(message);
    }

    fn print_wide(&self, items: &[String]) {
        self.editor.borrow_mut().print_wide(items, 2);
    }

    fn read_line(&self, prompt: &str) -> oneshot::Receiver<Result<String, ReadError>> {
        self.editor.borrow_mut().read(prompt, "> ")
    }

    fn read_char(&self, prompt: &str) -> oneshot::Receiver<Result<String, ReadError>> {
        self.editor.borrow_mut().read_char(prompt)
    }

    fn abort_read(&self, reason: &str) {
        self.editor.borrow_mut().abort_read(reason);
    }

    fn size(&self) -> TermSize {
        self.editor.borrow_mut().term_mut().size()
    }

    fn history(&self) -> Vec<String> {
        self.editor
            .borrow()
            .history()
            .entries()
            .map(str::to_string)
            .collect()
    }

    fn clear_screen(&self) {
        self.editor.borrow_mut().term_mut().write("\x1b[2J\x1b[H");
    }
}

/// Everything a running command may touch. The scope is revoked after the
/// command's future resolves: every method checks liveness first.
#[derive(Clone)]
pub struct Scope {
    io: Rc<dyn ShellIo>,
    context: Rc<ShellContext>,
    command_names: Rc<RefCell<Vec<String>>>,
    alive: Rc<Cell<bool>>,
}

impl Scope {
    fn check(&self) -> Result<(), ShellError> {
        if self.alive.get() {
            Ok(())
        } else {
            Err(ShellError::ScopeDestroyed)
        }
    }

    pub fn print(&self, message: &str) -> Result<(), ShellError> {
        self.check()?;
        self.io.print(message);
        Ok(())
    }

    pub fn println(&self, message: &str) -> Result<(), ShellError> {
        self.check()?;
        self.io.println(message);
        Ok(())
    }

    pub fn print_wide(&self, items: &[String]) -> Result<(), ShellError> {
        self.check()?;
        self.io.print_wide(items);
        Ok(())
    }

    pub async fn read_line(&self, prompt: &str) -> Result<String, ShellError> {
        self.check()?;
        let rx = self.io.read_line(prompt);
        resolve_read(rx.await)
    }

    pub async fn read_char(&self, prompt: &str) -> Result<String, ShellError> {
        self.check()?;
        let rx = self.io.read_char(prompt);
        resolve_read(rx.await)
    }

    pub fn abort_read(&self, reason: &str) -> Result<(), ShellError> {
        self.check()?;
        self.io.abort_read(reason);
        Ok(())
    }

    pub fn size(&self) -> Result<TermSize, ShellError> {
        self.check()?;
        Ok(self.io.size())
    }

    pub fn history(&self) -> Result<Vec<String>, ShellError> {
        self.check()?;
        Ok(self.io.history())
    }

    pub fn clear_screen(&self) -> Result<(), ShellError> {
        self.check()?;
        self.io.clear_screen();
        Ok(())
    }

    /// Blocking filesystem handle. Held only for the duration of one call.
    pub fn fs(&self) -> Result<RefMut<'_, SyncFs>, ShellError> {
        self.check()?;
        Ok(self.context.fs.borrow_mut())
    }

    pub fn env_get(&self, key: &str) -> Result<Option<String>, ShellError> {
        self.check()?;
        Ok(self.context.env.borrow().get(key).cloned())
    }

    pub fn env_set(&self, key: &str, value: &str) -> Result<(), ShellError> {
        self.check()?;
        self.context
            .env
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn env_entries(&self) -> Result<Vec<(String, String)>, ShellError> {
        self.check()?;
        let mut entries: Vec<(String, String)> = self
            .context
            .env
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort();
        Ok(entries)
    }

    pub fn command_names(&self) -> Result<Vec<String>, ShellError> {
        self.check()?;
        Ok(self.command_names.borrow().clone())
    }
}

fn resolve_read(
    received: Result<Result<String, ReadError>, oneshot::Canceled>,
) -> Result<String, ShellError> {
    match received {
        Ok(Ok(line)) => Ok(line),
        Ok(Err(ReadError::Aborted(reason))) => Err(ShellError::Aborted(reason)),
        Err(_) => Err(ShellError::Aborted("read cancelled".to_string())),
    }
}

/// Async command body: scope, positional args, parsed flags.
pub type CommandFn =
    Rc<dyn Fn(Scope, Vec<String>, Flags) -> LocalBoxFuture<'static, Result<(), ShellError>>>;

/// Argument completion for one command: token index (0 = first argument)
/// and the argument tokens so far.
pub type CompleteFn = Rc<dyn Fn(usize, &[String]) -> Vec<Completion>>;

struct CommandEntry {
    run: CommandFn,
    complete: Option<CompleteFn>,
}

pub struct Shell<T: Term> {
    editor: Rc<RefCell<LineEditor<T>>>,
    commands: Rc<RefCell<BTreeMap<String, CommandEntry>>>,
    command_names: Rc<RefCell<Vec<String>>>,
    context: Rc<ShellContext>,
    prompt: String,
}

impl<T: Term + 'static> Shell<T> {
    pub fn new(term: T, fs: SyncFs, options: LineEditorOptions) -> Self {
        let editor = Rc::new(RefCell::new(LineEditor::new(term, options)));
        let commands: Rc<RefCell<BTreeMap<String, CommandEntry>>> =
            Rc::new(RefCell::new(BTreeMap::new()));

        // First-token completion offers command names; later tokens are
        // delegated to the named command's own completer with the command
        // token stripped off.
        let completion_commands = commands.clone();
        editor
            .borrow_mut()
            .add_autocomplete_handler(Box::new(move |index, tokens| {
                let commands = completion_commands.borrow();
                if index == 0 {
                    return commands
                        .keys()
                        .map(|name| Completion::new(name.as_str()))
                        .collect();
                }
                let Some(entry) = tokens.first().and_then(|name| commands.get(name)) else {
                    return Vec::new();
                };
                match &entry.complete {
                    Some(complete) => complete(index - 1, &tokens[1..]),
                    None => Vec::new(),
                }
            }));

        Self {
            editor,
            commands,
            command_names: Rc::new(RefCell::new(Vec::new())),
            context: Rc::new(ShellContext::new(fs)),
            prompt: "$ ".to_string(),
        }
    }

    /// Shared handle to the line editor; the host feeds terminal input
    /// and resize events through it.
    pub fn editor(&self) -> Rc<RefCell<LineEditor<T>>> {
        self.editor.clone()
    }

    pub fn context(&self) -> Rc<ShellContext> {
        self.context.clone()
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    /// Register a command. Re-registering a taken name is an error, not a
    /// silent replacement.
    pub fn command(&self, name: &str, run: CommandFn) -> Result<(), ShellError> {
        self.command_with_complete(name, run, None)
    }

    pub fn command_with_complete(
        &self,
        name: &str,
        run: CommandFn,
        complete: Option<CompleteFn>,
    ) -> Result<(), ShellError> {
        let mut commands = self.commands.borrow_mut();
        if commands.contains_key(name) {
            return Err(ShellError::AlreadyRegistered(name.to_string()));
        }
        commands.insert(name.to_string(), CommandEntry { run, complete });
        self.command_names.replace(commands.keys().cloned().collect());
        Ok(())
    }

    /// Run the read-eval-print loop until a read is aborted. Command
    /// errors are printed and the loop continues.
    pub async fn repl(&self) {
        loop {
            match self.repl_once().await {
                Ok(()) => {}
                Err(ShellError::Aborted(_)) => break,
                Err(e) => {
                    self.editor.borrow_mut().println(&e.to_string());
                }
            }
        }
    }

    /// One pass of the loop: read a line, parse it, dispatch it.
    pub async fn repl_once(&self) -> Result<(), ShellError> {
        let rx = self.editor.borrow_mut().read(&self.prompt, "> ");
        let line = resolve_read(rx.await)?;
        self.run_line(&line).await
    }

    /// Parse and dispatch one line. Blank lines are a no-op.
    pub async fn run_line(&self, line: &str) -> Result<(), ShellError> {
        let words = parser::split_words(line)?;
        let Some((command, rest)) = words.split_first() else {
            return Ok(());
        };
        let (flags, args) = parser::split_flags(rest);
        self.run(command, args, flags).await
    }

    /// Run a registered command under a fresh scope. The scope is revoked
    /// once the command's future resolves.
    pub async fn run(
        &self,
        command: &str,
        args: Vec<String>,
        flags: Flags,
    ) -> Result<(), ShellError> {
        let run = {
            let commands = self.commands.borrow();
            commands
                .get(command)
                .map(|entry| entry.run.clone())
                .ok_or_else(|| ShellError::NotFound(command.to_string()))?
        };

        let alive = Rc::new(Cell::new(true));
        let scope = Scope {
            io: Rc::new(EditorIo {
                editor: self.editor.clone(),
            }),
            context: self.context.clone(),
            command_names: self.command_names.clone(),
            alive: alive.clone(),
        };
        let result = run(scope, args, flags).await;
        alive.set(false);
        result
    }

    /// A scope detached from any running command, for host-driven use.
    pub fn scope(&self) -> Scope {
        Scope {
            io: Rc::new(EditorIo {
                editor: self.editor.clone(),
            }),
            context: self.context.clone(),
            command_names: self.command_names.clone(),
            alive: Rc::new(Cell::new(true)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::spawn_bridge;
    use crate::fs::MemoryFs;
    use crate::term::CaptureTerm;
    use futures::FutureExt;
    use futures::executor::block_on;

    fn shell() -> (Shell<CaptureTerm>, CaptureTerm) {
        let term = CaptureTerm::new(80, 24);
        let (fs, _producer) = spawn_bridge(MemoryFs::new(), 4096).unwrap();
        (
            Shell::new(term.clone(), fs, LineEditorOptions::default()),
            term,
        )
    }

    fn echo_command() -> CommandFn {
        Rc::new(|scope: Scope, args: Vec<String>, _flags: Flags| {
            async move {
                scope.println(&args.join(" "))?;
                Ok(())
            }
            .boxed_local()
        })
    }

    // ============ Registration ============

    #[test]
    fn test_duplicate_registration_rejected() {
        let (shell, _term) = shell();
        shell.command("echo", echo_command()).unwrap();
        assert_eq!(
            shell.command("echo", echo_command()),
            Err(ShellError::AlreadyRegistered("echo".to_string()))
        );
    }

    // ============ Dispatch ============

    #[test]
    fn test_run_line_dispatches() {
        let (shell, term) = shell();
        shell.command("echo", echo_command()).unwrap();
        block_on(shell.run_line("echo hello world")).unwrap();
        assert_eq!(term.transcript(), "hello world\r\n");
    }

    #[test]
    fn test_unknown_command() {
        let (shell, _term) = shell();
        let err = block_on(shell.run_line("nope")).unwrap_err();
        assert_eq!(err, ShellError::NotFound("nope".to_string()));
    }

    #[test]
    fn test_blank_line_is_noop() {
        let (shell, term) = shell();
        block_on(shell.run_line("   ")).unwrap();
        assert_eq!(term.transcript(), "");
    }

    #[test]
    fn test_flags_reach_command() {
        let (shell, term) = shell();
        shell
            .command(
                "probe",
                Rc::new(|scope: Scope, args: Vec<String>, flags: Flags| {
                    async move {
                        scope.println(&format!(
                            "args={:?} r={} depth={}",
                            args,
                            flags.contains_key("r"),
                            flags.get("depth").map(String::as_str).unwrap_or("-")
                        ))?;
                        Ok(())
                    }
                    .boxed_local()
                }),
            )
            .unwrap();
        block_on(shell.run_line("probe -r --depth=2 a b")).unwrap();
        assert_eq!(term.transcript(), "args=[\"a\", \"b\"] r=true depth=2\r\n");
    }

    #[test]
    fn test_parse_error_surfaces() {
        let (shell, _term) = shell();
        let err = block_on(shell.run_line("echo 'oops")).unwrap_err();
        assert_eq!(
            err,
            ShellError::Parse(ParseError::UnterminatedQuote('\''))
        );
    }

    // ============ Scope lifetime ============

    #[test]
    fn test_scope_revoked_after_command() {
        let (shell, _term) = shell();
        let leaked: Rc<RefCell<Option<Scope>>> = Rc::new(RefCell::new(None));
        let stash = leaked.clone();
        shell
            .command(
                "leak",
                Rc::new(move |scope: Scope, _args, _flags| {
                    let stash = stash.clone();
                    async move {
                        stash.replace(Some(scope));
                        Ok(())
                    }
                    .boxed_local()
                }),
            )
            .unwrap();
        block_on(shell.run_line("leak")).unwrap();

        let scope = leaked.borrow().clone().unwrap();
        assert_eq!(scope.println("late"), Err(ShellError::ScopeDestroyed));
        assert_eq!(scope.env_get("x"), Err(ShellError::ScopeDestroyed));
    }

    #[test]
    fn test_scope_error_does_not_skip_revocation() {
        let (shell, _term) = shell();
        shell
            .command(
                "fail",
                Rc::new(|_scope: Scope, _args, _flags| {
                    async move { Err(ShellError::Command("boom".to_string())) }.boxed_local()
                }),
            )
            .unwrap();
        let err = block_on(shell.run_line("fail")).unwrap_err();
        assert_eq!(err, ShellError::Command("boom".to_string()));
    }

    // ============ Environment ============

    #[test]
    fn test_env_shared_across_commands() {
        let (shell, term) = shell();
        shell
            .command(
                "set",
                Rc::new(|scope: Scope, args: Vec<String>, _flags| {
                    async move {
                        scope.env_set(&args[0], &args[1])?;
                        Ok(())
                    }
                    .boxed_local()
                }),
            )
            .unwrap();
        shell
            .command(
                "get",
                Rc::new(|scope: Scope, args: Vec<String>, _flags| {
                    async move {
                        let value = scope.env_get(&args[0])?.unwrap_or_default();
                        scope.println(&value)?;
                        Ok(())
                    }
                    .boxed_local()
                }),
            )
            .unwrap();
        block_on(shell.run_line("set GREETING hi")).unwrap();
        block_on(shell.run_line("get GREETING")).unwrap();
        assert_eq!(term.transcript(), "hi\r\n");
    }

    // ============ Completion wiring ============

    #[test]
    fn test_command_names_offered_at_index_zero() {
        let (shell, term) = shell();
        shell.command("status", echo_command()).unwrap();
        shell.command("stash", echo_command()).unwrap();

        let editor = shell.editor();
        let _rx = editor.borrow_mut().read("$ ", "> ");
        editor.borrow_mut().handle_term_data("s");
        editor.borrow_mut().handle_term_data("\t");
        // Shared fragment "sta" completes, both candidates are listed.
        let transcript = term.transcript();
        assert!(transcript.contains("stash"));
        assert!(transcript.contains("status"));
        assert!(editor.borrow().input().starts_with("sta"));
    }

    #[test]
    fn test_argument_completion_delegates() {
        let (shell, _term) = shell();
        shell
            .command_with_complete(
                "cat",
                echo_command(),
                Some(Rc::new(|index, _tokens| {
                    if index == 0 {
                        vec![Completion::new("notes.txt")]
                    } else {
                        Vec::new()
                    }
                })),
            )
            .unwrap();

        let editor = shell.editor();
        let mut rx = editor.borrow_mut().read("$ ", "> ");
        for c in "cat no".chars() {
            editor.borrow_mut().handle_term_data(&c.to_string());
        }
        editor.borrow_mut().handle_term_data("\t");
        editor.borrow_mut().handle_term_data("\r");
        assert_eq!(
            rx.try_recv().unwrap(),
            Some(Ok("cat notes.txt ".to_string()))
        );
    }
}
