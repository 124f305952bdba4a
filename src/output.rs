//! Terminal output formatting for the compose CLI.
//!
//! Provides Cargo-style status output with right-aligned coloured verbs,
//! filtered by the requested feedback level, and the JSON formatter used
//! for `--format-json`. All status output goes to stderr.

use std::io::{self, IsTerminal, Write};

use clap::ValueEnum;
use serde_json::Value;

/// ANSI escape codes.
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";

/// Width for right-aligned verb column.
const VERB_WIDTH: usize = 12;

/// Column limit for keeping a JSON array or object on one line.
pub const LINE_WIDTH: usize = 120;

/// How much progress output to print.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum Feedback {
    /// Nothing.
    Silent,
    /// One line per sheet and per written file.
    #[default]
    Concise,
    /// Also one line per sprite and fragment read.
    Verbose,
}

/// Terminal-aware status printer.
///
/// Prints Cargo-style status lines to stderr with optional ANSI colours.
/// Colour is enabled when stderr is a terminal.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    color: bool,
    feedback: Feedback,
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}

impl Printer {
    pub fn new() -> Self {
        Self::with_feedback(Feedback::default())
    }

    pub fn with_feedback(feedback: Feedback) -> Self {
        Self {
            color: io::stderr().is_terminal(),
            feedback,
        }
    }

    pub fn feedback(&self) -> Feedback {
        self.feedback
    }

    /// Print a status line with a green bold verb.
    /// e.g. "   Composing tiles.png (32x32)"
    pub fn status(&self, verb: &str, message: &str) {
        if self.feedback >= Feedback::Concise {
            self.print_line(GREEN, verb, message);
        }
    }

    /// Print a per-file line, shown only in verbose mode.
    pub fn detail(&self, verb: &str, message: &str) {
        if self.feedback >= Feedback::Verbose {
            self.print_line(CYAN, verb, message);
        }
    }

    /// Print a success/completion line with a green bold verb.
    pub fn success(&self, verb: &str, message: &str) {
        if self.feedback >= Feedback::Concise {
            self.print_line(GREEN, verb, message);
        }
    }

    /// Print an error line with a red bold verb.
    pub fn error(&self, verb: &str, message: &str) {
        if self.feedback >= Feedback::Concise {
            self.print_line(RED, verb, message);
        }
    }

    /// Format a string as dim/grey.
    pub fn dim(&self, text: &str) -> String {
        if self.color {
            format!("{DIM}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    /// Format a string as bold.
    pub fn bold(&self, text: &str) -> String {
        if self.color {
            format!("{BOLD}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn print_line(&self, color: &str, verb: &str, message: &str) {
        let mut stderr = io::stderr().lock();
        if self.color {
            let _ = writeln!(
                stderr,
                "{BOLD}{color}{verb:>VERB_WIDTH$}{RESET} {message}"
            );
        } else {
            let _ = writeln!(stderr, "{verb:>VERB_WIDTH$} {message}");
        }
    }
}

/// Pluralize a count: `plural(1, "sheet", "sheets")` → "1 sheet".
pub fn plural(n: usize, singular: &str, pluralized: &str) -> String {
    if n == 1 {
        format!("{} {}", n, singular)
    } else {
        format!("{} {}", n, pluralized)
    }
}

/// Return a relative display path when possible, absolute otherwise.
pub fn display_path(path: &std::path::Path) -> String {
    if let Ok(cwd) = std::env::current_dir() {
        if let Ok(relative) = path.strip_prefix(&cwd) {
            let s = relative.display().to_string();
            if s.is_empty() {
                return ".".to_string();
            }
            return s;
        }
    }
    path.display().to_string()
}

/// Format JSON with 2-space indentation, keeping any array or object on a
/// single line when that line fits in [`LINE_WIDTH`] columns.
///
/// The result always ends with a newline.
pub fn to_formatted_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0, 0);
    out.push('\n');
    out
}

/// `column` is where `value` starts on the current line.
fn write_value(out: &mut String, value: &Value, indent: usize, column: usize) {
    let single = inline(value);
    // Leave room for a trailing comma.
    if !is_container(value) || column + single.len() < LINE_WIDTH {
        out.push_str(&single);
        return;
    }

    let inner = indent + 2;
    match value {
        Value::Array(items) => {
            out.push_str("[\n");
            for (i, item) in items.iter().enumerate() {
                push_indent(out, inner);
                write_value(out, item, inner, inner);
                if i + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            push_indent(out, indent);
            out.push(']');
        }
        Value::Object(map) => {
            out.push_str("{\n");
            for (i, (key, item)) in map.iter().enumerate() {
                push_indent(out, inner);
                let key = Value::String(key.clone()).to_string();
                out.push_str(&key);
                out.push_str(": ");
                write_value(out, item, inner, inner + key.len() + 2);
                if i + 1 < map.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            push_indent(out, indent);
            out.push('}');
        }
        _ => out.push_str(&single),
    }
}

fn inline(value: &Value) -> String {
    match value {
        Value::Array(items) if !items.is_empty() => {
            let parts: Vec<String> = items.iter().map(inline).collect();
            format!("[ {} ]", parts.join(", "))
        }
        Value::Object(map) if !map.is_empty() => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", Value::String(k.clone()), inline(v)))
                .collect();
            format!("{{ {} }}", parts.join(", "))
        }
        other => other.to_string(),
    }
}

fn is_container(value: &Value) -> bool {
    match value {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => false,
    }
}

fn push_indent(out: &mut String, width: usize) {
    out.extend(std::iter::repeat(' ').take(width));
}
