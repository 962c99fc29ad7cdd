//! Interactive REPL.
//!
//! Uses `rustyline` for readline-style editing with persistent history.
//! `/attach <file> [message]` sends a workbook along with an optional question.

use std::path::Path;

use anyhow::Result;
use rustyline::config::Configurer;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tracing::debug;

use reportmind_agent::Orchestrator;
use reportmind_core::bus::queue::MessageBus;

use crate::helpers;

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

/// One parsed line of input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Exit,
    Message(&'a str),
    Attach { file: &'a str, text: &'a str },
}

/// Run the interactive REPL loop.
pub async fn run(
    orchestrator: &Orchestrator,
    bus: &MessageBus,
    conversation: &str,
    raw_dir: &Path,
) -> Result<()> {
    helpers::print_banner();

    let mut editor = create_editor()?;

    loop {
        let line = match editor.readline("You: ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted)
            | Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(&line);

        let inbound = match parse_input(trimmed) {
            Input::Exit => {
                println!("\nGoodbye! 👋");
                break;
            }
            Input::Message(text) => helpers::inbound(conversation, text, None),
            Input::Attach { file, text } => match helpers::prepare_attachment(file, raw_dir) {
                Ok(attachment) => helpers::inbound(conversation, text, Some(attachment)),
                Err(e) => {
                    eprintln!("\n❌ {e:#}\n");
                    continue;
                }
            },
        };

        debug!(conversation, input = trimmed, "processing input");
        helpers::print_thinking();
        orchestrator.handle_turn(&inbound).await;
        helpers::clear_thinking();

        for outbound in bus.drain_outbound().await {
            if let Err(e) = helpers::print_outbound(&outbound) {
                eprintln!("\n❌ {e:#}\n");
            }
        }
        println!();
    }

    save_history(&mut editor);
    Ok(())
}

fn parse_input(input: &str) -> Input<'_> {
    if EXIT_COMMANDS.contains(&input.to_lowercase().as_str()) {
        return Input::Exit;
    }
    match input.strip_prefix("/attach ") {
        Some(rest) => {
            let rest = rest.trim();
            let (file, text) = rest.split_once(' ').unwrap_or((rest, ""));
            Input::Attach {
                file,
                text: text.trim(),
            }
        }
        None => Input::Message(input),
    }
}

/// Create a rustyline editor with history.
fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    let history_path = history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
        debug!("loaded REPL history from {}", history_path.display());
    }

    Ok(editor)
}

/// Save history to disk.
fn save_history(editor: &mut Editor<(), DefaultHistory>) {
    let path = history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(&path) {
        debug!("failed to save history: {e}");
    }
}

/// Path to the history file.
fn history_path() -> std::path::PathBuf {
    reportmind_core::utils::get_data_path()
        .join("history")
        .join("cli_history")
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_commands() {
        assert_eq!(parse_input("exit"), Input::Exit);
        assert_eq!(parse_input("EXIT"), Input::Exit);
        assert_eq!(parse_input(":q"), Input::Exit);
        assert_eq!(parse_input("hello"), Input::Message("hello"));
    }

    #[test]
    fn attach_with_question() {
        assert_eq!(
            parse_input("/attach ~/Book2.xlsx What are the totals?"),
            Input::Attach {
                file: "~/Book2.xlsx",
                text: "What are the totals?"
            }
        );
    }

    #[test]
    fn attach_only() {
        assert_eq!(
            parse_input("/attach Book2.xlsx"),
            Input::Attach {
                file: "Book2.xlsx",
                text: ""
            }
        );
    }

    #[test]
    fn history_path_under_data_dir() {
        let path = history_path();
        assert!(path.to_string_lossy().contains(".reportmind"));
        assert!(path.to_string_lossy().ends_with("cli_history"));
    }
}
