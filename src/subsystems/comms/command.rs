//! Console command grammar.
//!
//! One line in, one [`Command`] out. Parsing is pure so the grammar can be
//! tested without a terminal.

use crate::subsystems::memory::DocId;

pub const HELP: &str = "\
commands:
  list                      list documents
  view <id>                 show one document
  add <name> | <content>    add a document
  delete <id>               delete a document
  refresh                   load new files from the backend
  save                      write every document to the backend
  chat <text>               talk to the researcher (plain text works too)
  <n>                       send suggested prompt n
  help                      this text
  quit                      save and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    View(DocId),
    Add { name: String, content: String },
    Delete(DocId),
    Refresh,
    Save,
    Chat(String),
    /// 1-based index into the current suggestions.
    Suggestion(usize),
    Help,
    Quit,
    /// Recognised keyword with bad arguments; carries the usage line.
    Invalid(&'static str),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((h, r)) => (h, r.trim()),
        None => (line, ""),
    };

    let cmd = match head.to_ascii_lowercase().as_str() {
        "list" | "ls" if rest.is_empty() => Command::List,
        "view" => parse_id(rest).map_or(Command::Invalid("usage: view <id>"), Command::View),
        "delete" | "rm" => {
            parse_id(rest).map_or(Command::Invalid("usage: delete <id>"), Command::Delete)
        }
        "add" => parse_add(rest).unwrap_or(Command::Invalid("usage: add <name> | <content>")),
        "refresh" if rest.is_empty() => Command::Refresh,
        "save" if rest.is_empty() => Command::Save,
        "help" | "?" if rest.is_empty() => Command::Help,
        "quit" | "exit" if rest.is_empty() => Command::Quit,
        "chat" if rest.is_empty() => Command::Invalid("usage: chat <text>"),
        "chat" => Command::Chat(rest.to_string()),
        _ => match line.parse::<usize>() {
            Ok(n) => Command::Suggestion(n),
            Err(_) => Command::Chat(line.to_string()),
        },
    };
    Some(cmd)
}

fn parse_id(raw: &str) -> Option<DocId> {
    raw.parse().ok()
}

fn parse_add(rest: &str) -> Option<Command> {
    let (name, content) = match rest.split_once('|') {
        Some((n, c)) => (n.trim(), c.trim()),
        None => (rest.trim(), ""),
    };
    if name.is_empty() {
        return None;
    }
    Some(Command::Add { name: name.to_string(), content: content.to_string() })
}
