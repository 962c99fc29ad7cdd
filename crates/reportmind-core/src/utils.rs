//! Utility helpers — path resolution, string manipulation, output sanitization.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

/// Get the ReportMind data directory (e.g. `~/.reportmind/`).
pub fn get_data_path() -> PathBuf {
    home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".reportmind")
}

/// Get the sessions directory (e.g. `~/.reportmind/sessions/`).
pub fn get_sessions_path() -> PathBuf {
    get_data_path().join("sessions")
}

/// Get current ISO 8601 timestamp.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Truncate a string to `max_len` characters, adding "..." if truncated.
/// Unicode-safe.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Sanitize a string for use as a filename.
pub fn safe_filename(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Expand `~` to the home directory in a path string.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        home_dir().unwrap_or_else(|| PathBuf::from(".")).join(rest)
    } else if path == "~" {
        home_dir().unwrap_or_else(|| PathBuf::from("."))
    } else {
        PathBuf::from(path)
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("USERPROFILE").ok().map(PathBuf::from))
}

// ─────────────────────────────────────────────
// Output sanitization
// ─────────────────────────────────────────────

/// Line filters: CJK/Thai script, tool-routing markup, and known spam tokens.
fn rejected_line_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"[\x{4e00}-\x{9fff}\x{0e00}-\x{0e7f}]",
            r"(?i)to=functions\.|commentary|json\s*$",
            r"天天|彩票|快三|赛车",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Drop lines that leak tool-routing markup or unrelated foreign-script spam
/// from model or retrieval output. The remaining lines are joined and trimmed.
pub fn sanitize_text(text: &str) -> String {
    text.lines()
        .filter(|line| !rejected_line_patterns().iter().any(|re| re.is_match(line)))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        let result = truncate_string("hello world, this is a long string", 15);
        assert_eq!(result, "hello world,...");
    }

    #[test]
    fn test_truncate_unicode() {
        assert_eq!(truncate_string("こんにちは世界です", 5), "こん...");
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("teams:19:abc@thread"), "teams_19_abc_thread");
        assert_eq!(safe_filename("my-file_v2.txt"), "my-file_v2.txt");
    }

    #[test]
    fn test_expand_home_tilde() {
        let expanded = expand_home("~/Data/Data raw");
        assert!(!expanded.starts_with("~"));
        assert!(expanded.ends_with("Data/Data raw"));
    }

    #[test]
    fn test_expand_home_absolute() {
        assert_eq!(expand_home("/srv/data"), PathBuf::from("/srv/data"));
    }

    #[test]
    fn test_timestamp_is_valid() {
        chrono::DateTime::parse_from_rfc3339(&timestamp()).unwrap();
    }

    #[test]
    fn test_data_path_ends_with_reportmind() {
        assert!(get_data_path().ends_with(".reportmind"));
    }

    #[test]
    fn test_sanitize_keeps_clean_text() {
        let text = "  Total claims in Q1 were 1,204.\nMotor accounted for 40%.  ";
        assert_eq!(
            sanitize_text(text),
            "Total claims in Q1 were 1,204.\nMotor accounted for 40%."
        );
    }

    #[test]
    fn test_sanitize_drops_foreign_script_lines() {
        let text = "Claims grew 5%.\n天天中彩票\nสวัสดี\nPremiums flat.";
        assert_eq!(sanitize_text(text), "Claims grew 5%.\nPremiums flat.");
    }

    #[test]
    fn test_sanitize_drops_tool_markup() {
        let text = "<|channel|>commentary to=functions.readCSV\nAnswer: 12\ncode json";
        assert_eq!(sanitize_text(text), "Answer: 12");
    }

    #[test]
    fn test_sanitize_everything_removed() {
        assert_eq!(sanitize_text("快三\n赛车"), "");
    }
}
