//! Shared CLI helpers — attachment staging and output printing.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use colored::Colorize;

use reportmind_core::bus::types::{InboundMessage, OutboundMessage};
use reportmind_core::types::{AttachmentRef, InboundAttachment};

/// Channel name used for CLI turns.
pub const CLI_CHANNEL: &str = "cli";

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs_next::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Turn `--attach` into an attachment.
///
/// URLs are downloaded by the orchestrator. Local files are copied into
/// `raw_dir`, where ingestion finds them without a download.
pub fn prepare_attachment(arg: &str, raw_dir: &Path) -> Result<InboundAttachment> {
    if arg.starts_with("http://") || arg.starts_with("https://") {
        let name = arg
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .filter(|name| !name.is_empty())
            .with_context(|| format!("cannot derive a file name from {arg}"))?;
        return Ok(InboundAttachment::new(
            name,
            Some(AttachmentRef::Direct(arg.to_string())),
        ));
    }

    let source = expand_tilde(arg);
    if !source.is_file() {
        bail!("attachment not found: {}", source.display());
    }
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("invalid attachment path: {}", source.display()))?;

    std::fs::create_dir_all(raw_dir)
        .with_context(|| format!("failed to create {}", raw_dir.display()))?;
    let target = raw_dir.join(&name);
    if target != source {
        std::fs::copy(&source, &target)
            .with_context(|| format!("failed to copy {} to {}", source.display(), target.display()))?;
    }
    Ok(InboundAttachment::new(name, None))
}

/// Inbound CLI turn.
pub fn inbound(
    conversation: &str,
    text: &str,
    attachment: Option<InboundAttachment>,
) -> InboundMessage {
    let msg = InboundMessage::new(CLI_CHANNEL, conversation, text);
    match attachment {
        Some(attachment) => msg.with_attachment(attachment),
        None => msg,
    }
}

/// Print one outbound message; image attachments are written to the working directory.
pub fn print_outbound(msg: &OutboundMessage) -> Result<()> {
    println!();
    println!("{}", "📊 ReportMind".cyan().bold());
    if msg.content.is_empty() {
        println!("{}", "(no response)".dimmed());
    } else {
        println!("{}", msg.content);
    }
    if let Some(attachment) = &msg.attachment {
        let path = PathBuf::from(&attachment.name);
        std::fs::write(&path, &attachment.data)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("{} {}", "🖼  saved".green(), path.display());
    }
    Ok(())
}

/// Print the banner shown at REPL start.
pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "📊 ReportMind".cyan().bold(), version.dimmed());
    println!(
        "{}",
        "Type a message, \"/attach <file.xlsx> [message]\" to ingest a workbook, or \"exit\" to quit."
            .dimmed()
    );
    println!();
}

/// Print a "thinking" placeholder.
pub fn print_thinking() {
    eprint!("{}", "⠿ thinking...".dimmed());
}

/// Clear the "thinking" placeholder.
pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_tilde_home() {
        let result = expand_tilde("~/Reports/Book2.xlsx");
        assert!(result.ends_with("Reports/Book2.xlsx"));
        assert!(!result.starts_with("~"));
    }

    #[test]
    fn expand_tilde_no_tilde() {
        assert_eq!(expand_tilde("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn url_attachment_keeps_reference() {
        let raw = tempfile::tempdir().unwrap();
        let attachment =
            prepare_attachment("https://files.example.com/x/Book2.xlsx?sig=abc", raw.path()).unwrap();
        assert_eq!(attachment.name, "Book2.xlsx");
        assert_eq!(
            attachment.reference,
            Some(AttachmentRef::Direct(
                "https://files.example.com/x/Book2.xlsx?sig=abc".into()
            ))
        );
    }

    #[test]
    fn local_attachment_is_staged() {
        let src = tempfile::tempdir().unwrap();
        let raw = tempfile::tempdir().unwrap();
        let file = src.path().join("Book2.xlsx");
        std::fs::write(&file, b"xlsx").unwrap();

        let attachment = prepare_attachment(file.to_str().unwrap(), raw.path()).unwrap();
        assert_eq!(attachment.name, "Book2.xlsx");
        assert!(attachment.reference.is_none());
        assert_eq!(std::fs::read(raw.path().join("Book2.xlsx")).unwrap(), b"xlsx");
    }

    #[test]
    fn missing_local_attachment() {
        let raw = tempfile::tempdir().unwrap();
        assert!(prepare_attachment("/nonexistent/Book9.xlsx", raw.path()).is_err());
    }

    #[test]
    fn inbound_with_attachment() {
        let msg = inbound("cli:default", "", Some(InboundAttachment::new("Book2.xlsx", None)));
        assert_eq!(msg.channel, CLI_CHANNEL);
        assert_eq!(msg.dataset_attachment().unwrap().name, "Book2.xlsx");
    }
}
