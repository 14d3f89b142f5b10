//! Built-in commands
//!
//! The standard command set wired up by [`install`]: filesystem commands
//! talk to the bridge through the scope's blocking handle, everything
//! else is terminal or shell housekeeping. Filesystem commands get path
//! completion; directories complete as partial candidates so the user can
//! keep descending without retyping.

use super::{CommandFn, CompleteFn, Flags, Scope, Shell, ShellContext, ShellError};
use crate::fs::FileKind;
use crate::readline::Completion;
use crate::term::Term;
use futures::FutureExt;
use std::rc::Rc;

/// Register every builtin on the shell.
pub fn install<T: Term + 'static>(shell: &Shell<T>) -> Result<(), ShellError> {
    let paths = path_complete(shell.context());

    shell.command("help", help())?;
    shell.command("echo", echo())?;
    shell.command("env", env())?;
    shell.command("history", history())?;
    shell.command("clear", clear())?;
    shell.command("watch", watch())?;

    shell.command_with_complete("ls", ls(), Some(paths.clone()))?;
    shell.command_with_complete("cat", cat(), Some(paths.clone()))?;
    shell.command_with_complete("stat", stat(), Some(paths.clone()))?;
    shell.command_with_complete("mkdir", mkdir(), Some(paths.clone()))?;
    shell.command_with_complete("rm", rm(), Some(paths.clone()))?;
    shell.command_with_complete("mv", mv(), Some(paths.clone()))?;
    shell.command_with_complete("cp", cp(), Some(paths.clone()))?;
    shell.command_with_complete("write", write(), Some(paths))?;
    Ok(())
}

/// Complete the token under the cursor as a filesystem path. Directory
/// candidates end in `/` and are partial, so completing one leaves the
/// cursor ready for the next segment.
pub fn path_complete(context: Rc<ShellContext>) -> CompleteFn {
    Rc::new(move |index, tokens| {
        let token = tokens.get(index).cloned().unwrap_or_default();
        let (display_prefix, dir_path) = match token.rfind('/') {
            Some(0) => ("/".to_string(), "/".to_string()),
            Some(i) => (token[..=i].to_string(), token[..i].to_string()),
            None => (String::new(), "/".to_string()),
        };
        let Ok(entries) = context.fs.borrow_mut().read_directory(&dir_path) else {
            return Vec::new();
        };
        entries
            .into_iter()
            .map(|entry| {
                let value = format!("{}{}", display_prefix, entry.name);
                match entry.kind {
                    FileKind::Directory => Completion::partial(format!("{}/", value)),
                    FileKind::File => Completion::new(value),
                }
            })
            .collect()
    })
}

fn usage(text: &str) -> ShellError {
    ShellError::Command(format!("usage: {}", text))
}

fn arg<'a>(args: &'a [String], index: usize, text: &str) -> Result<&'a str, ShellError> {
    args.get(index).map(String::as_str).ok_or_else(|| usage(text))
}

fn help() -> CommandFn {
    Rc::new(|scope: Scope, _args, _flags| {
        async move {
            scope.println("available commands:")?;
            scope.print_wide(&scope.command_names()?)?;
            Ok(())
        }
        .boxed_local()
    })
}

fn echo() -> CommandFn {
    Rc::new(|scope: Scope, args: Vec<String>, _flags| {
        async move {
            scope.println(&args.join(" "))?;
            Ok(())
        }
        .boxed_local()
    })
}

/// `env` lists the environment; `env KEY VALUE` sets a variable.
fn env() -> CommandFn {
    Rc::new(|scope: Scope, args: Vec<String>, _flags| {
        async move {
            match args.as_slice() {
                [] => {
                    for (key, value) in scope.env_entries()? {
                        scope.println(&format!("{}={}", key, value))?;
                    }
                }
                [key, value] => scope.env_set(key, value)?,
                _ => return Err(usage("env [KEY VALUE]")),
            }
            Ok(())
        }
        .boxed_local()
    })
}

fn history() -> CommandFn {
    Rc::new(|scope: Scope, _args, _flags| {
        async move {
            for (i, entry) in scope.history()?.iter().enumerate() {
                scope.println(&format!("{:>4}  {}", i + 1, entry))?;
            }
            Ok(())
        }
        .boxed_local()
    })
}

fn clear() -> CommandFn {
    Rc::new(|scope: Scope, _args, _flags| {
        async move {
            scope.clear_screen()?;
            Ok(())
        }
        .boxed_local()
    })
}

fn ls() -> CommandFn {
    Rc::new(|scope: Scope, args: Vec<String>, _flags| {
        async move {
            let path = args.first().map(String::as_str).unwrap_or("/");
            let entries = scope.fs()?.read_directory(path)?;
            let names: Vec<String> = entries
                .iter()
                .map(|e| match e.kind {
                    FileKind::Directory => format!("{}/", e.name),
                    FileKind::File => e.name.clone(),
                })
                .collect();
            scope.print_wide(&names)?;
            Ok(())
        }
        .boxed_local()
    })
}

fn cat() -> CommandFn {
    Rc::new(|scope: Scope, args: Vec<String>, _flags| {
        async move {
            if args.is_empty() {
                return Err(usage("cat FILE..."));
            }
            for path in &args {
                let data = scope.fs()?.read_file(path)?;
                scope.print(&String::from_utf8_lossy(&data))?;
                if !data.ends_with(b"\n") {
                    scope.println("")?;
                }
            }
            Ok(())
        }
        .boxed_local()
    })
}

fn stat() -> CommandFn {
    Rc::new(|scope: Scope, args: Vec<String>, _flags| {
        async move {
            if args.is_empty() {
                return Err(usage("stat PATH..."));
            }
            for path in &args {
                let stat = scope.fs()?.stat(path)?;
                let kind = match stat.kind {
                    FileKind::File => "file",
                    FileKind::Directory => "directory",
                };
                scope.println(&format!(
                    "{}: {}, {} bytes, mtime {}",
                    path, kind, stat.size, stat.mtime
                ))?;
            }
            Ok(())
        }
        .boxed_local()
    })
}

fn mkdir() -> CommandFn {
    Rc::new(|scope: Scope, args: Vec<String>, _flags| {
        async move {
            if args.is_empty() {
                return Err(usage("mkdir DIR..."));
            }
            for path in &args {
                scope.fs()?.create_directory(path)?;
            }
            Ok(())
        }
        .boxed_local()
    })
}

fn rm() -> CommandFn {
    Rc::new(|scope: Scope, args: Vec<String>, flags: Flags| {
        async move {
            if args.is_empty() {
                return Err(usage("rm [-r] PATH..."));
            }
            let recursive = flags.contains_key("r") || flags.contains_key("recursive");
            for path in &args {
                scope.fs()?.delete(path, recursive)?;
            }
            Ok(())
        }
        .boxed_local()
    })
}

fn mv() -> CommandFn {
    Rc::new(|scope: Scope, args: Vec<String>, flags: Flags| {
        async move {
            let from = arg(&args, 0, "mv [-f] FROM TO")?;
            let to = arg(&args, 1, "mv [-f] FROM TO")?;
            let overwrite = flags.contains_key("f") || flags.contains_key("force");
            scope.fs()?.rename(from, to, overwrite)?;
            Ok(())
        }
        .boxed_local()
    })
}

fn cp() -> CommandFn {
    Rc::new(|scope: Scope, args: Vec<String>, flags: Flags| {
        async move {
            let from = arg(&args, 0, "cp [-f] FROM TO")?;
            let to = arg(&args, 1, "cp [-f] FROM TO")?;
            let overwrite = flags.contains_key("f") || flags.contains_key("force");
            scope.fs()?.copy(from, to, overwrite)?;
            Ok(())
        }
        .boxed_local()
    })
}

/// `write PATH TEXT...` stores the joined text as the file's contents.
fn write() -> CommandFn {
    Rc::new(|scope: Scope, args: Vec<String>, _flags| {
        async move {
            let path = arg(&args, 0, "write PATH TEXT...")?.to_string();
            let contents = args[1..].join(" ");
            scope.fs()?.write_file(&path, contents.as_bytes())?;
            Ok(())
        }
        .boxed_local()
    })
}

fn watch() -> CommandFn {
    Rc::new(|scope: Scope, args: Vec<String>, _flags| {
        async move {
            let glob = arg(&args, 0, "watch GLOB")?;
            let id = scope.fs()?.create_watcher(glob)?;
            scope.println(&format!("watcher {} registered for {}", id, glob))?;
            Ok(())
        }
        .boxed_local()
    })
}
