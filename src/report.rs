//! Analyzer report parsing.
//!
//! Best-effort parser tied to the external tool's exact output format. A
//! defect line is colon-delimited and the number of parts selects the layout:
//!
//! | parts | layout |
//! |-------|--------|
//! | 3 | `file:line:msg` |
//! | 4 | `file:line:col:msg` (numeric third part) or `file:line:code:msg` |
//! | 5 | `file:line:indent:code:msg` |
//!
//! The error type is the content of the *last* parenthesized group on the
//! line. Lines without one, lines without the scanned-file marker, lines with
//! any other part count and lines longer than the length cap are skipped.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::ParsedDefect;

static PAREN_GROUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(.*?\)").unwrap());

#[derive(Debug, Clone)]
pub struct ReportParser {
    marker: String,
    max_line_len: usize,
}

impl ReportParser {
    pub fn new(marker: impl Into<String>, max_line_len: usize) -> Self {
        Self {
            marker: marker.into(),
            max_line_len,
        }
    }

    /// Parse one report line. `None` means "not a defect record".
    pub fn parse_line(&self, line: &str) -> Option<ParsedDefect> {
        let line = line.trim_end_matches(['\r', '\n']);
        if !line.contains(self.marker.as_str()) {
            return None;
        }
        if line.chars().count() > self.max_line_len {
            return None;
        }

        let parts: Vec<&str> = line.split(':').collect();
        let (file, location, code, msg) = match parts.as_slice() {
            [file, lineno, msg] => (*file, lineno.trim().to_string(), "", *msg),
            [file, lineno, third, msg] => {
                let third = third.trim();
                if !third.is_empty() && third.chars().all(|c| c.is_ascii_digit()) {
                    (*file, format!("{}:{}", lineno.trim(), third), "", *msg)
                } else {
                    (*file, lineno.trim().to_string(), third, *msg)
                }
            }
            [file, lineno, indent, code, msg] => (
                *file,
                format!("{}:{}", lineno.trim(), indent.trim()),
                *code,
                *msg,
            ),
            _ => return None,
        };

        let error_type = PAREN_GROUP
            .find_iter(line)
            .last()?
            .as_str()
            .replace(['(', ')'], "");

        Some(ParsedDefect {
            filename: file.trim().to_string(),
            location,
            error_msg: msg.trim().to_string(),
            error_code: code.trim().to_string(),
            error_type: error_type.trim().to_string(),
            content: line.to_string(),
        })
    }

    /// Parse a whole report, keeping only defect lines.
    pub fn parse_report(&self, report: &str) -> Vec<ParsedDefect> {
        let mut defects = Vec::new();
        for line in report.lines() {
            match self.parse_line(line) {
                Some(d) => defects.push(d),
                None if !line.trim().is_empty() => {
                    tracing::debug!(line = %truncate(line, 120), "skipped report line");
                }
                None => {}
            }
        }
        defects
    }
}

impl Default for ReportParser {
    fn default() -> Self {
        Self::new(".py", 512)
    }
}

fn truncate(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}
