//! Header and section detection over preprocessed document text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Lines at or above this length are never headers.
const MAX_HEADER_CHARS: usize = 100;
const MAX_HEADER_WORDS: usize = 6;

/// Capitalised first letter and no lowercase letters after it.
static CAPITALISED_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Z][^a-z]*$").ok());

/// A line detected as a section header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub text: String,
    /// Zero-based line number in the preprocessed text.
    pub line_number: usize,
    /// 1 for top-level headers, 2 otherwise.
    pub level: u8,
}

/// Structural summary of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStructure {
    pub headers: Vec<Header>,
    pub total_lines: usize,
    /// Number of headers at level 1 or 2.
    pub section_count: usize,
}

/// Extracts headers and section counts from text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextStructureAnalyzer;

impl TextStructureAnalyzer {
    pub fn analyze(&self, text: &str) -> DocumentStructure {
        let lines: Vec<&str> = text.split('\n').collect();
        let headers: Vec<Header> = lines
            .iter()
            .enumerate()
            .filter_map(|(line_number, raw)| {
                let line = raw.trim();
                is_header(line).then(|| Header {
                    text: line.to_string(),
                    line_number,
                    level: header_level(line),
                })
            })
            .collect();
        let section_count = headers.iter().filter(|h| h.level <= 2).count();

        DocumentStructure {
            headers,
            total_lines: lines.len(),
            section_count,
        }
    }
}

fn is_header(line: &str) -> bool {
    if line.is_empty() || line.chars().count() >= MAX_HEADER_CHARS {
        return false;
    }
    is_all_uppercase(line)
        || line.ends_with(':')
        || CAPITALISED_LINE
            .as_ref()
            .is_some_and(|re| re.is_match(line))
        || line.split_whitespace().count() <= MAX_HEADER_WORDS
}

/// Uppercase takes precedence, then a trailing colon marks a subsection.
fn header_level(line: &str) -> u8 {
    if is_all_uppercase(line) {
        1
    } else if line.ends_with(':') {
        2
    } else if line.split_whitespace().count() <= 3 {
        1
    } else {
        2
    }
}

/// At least one cased character, and every cased character is uppercase.
fn is_all_uppercase(line: &str) -> bool {
    let mut saw_cased = false;
    for c in line.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            saw_cased = true;
        }
    }
    saw_cased
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(text: &str) -> DocumentStructure {
        TextStructureAnalyzer.analyze(text)
    }

    #[test]
    fn test_detects_uppercase_header() {
        let s = analyze("INTRODUCTION\nThis paragraph explains the overall goals of the project in some detail.");
        assert_eq!(s.headers.len(), 1);
        assert_eq!(s.headers[0].text, "INTRODUCTION");
        assert_eq!(s.headers[0].level, 1);
        assert_eq!(s.headers[0].line_number, 0);
        assert_eq!(s.total_lines, 2);
        assert_eq!(s.section_count, 1);
    }

    #[test]
    fn test_colon_header_is_level_two() {
        let s = analyze("Results:\nThe measured throughput exceeded every target we had set for this quarter.");
        assert_eq!(s.headers[0].text, "Results:");
        assert_eq!(s.headers[0].level, 2);
    }

    #[test]
    fn test_short_lines_are_headers() {
        let s = analyze("Method Overview\nSampling strategy and data collection\nA long body sentence that clearly has more than six words in it.");
        assert_eq!(s.headers.len(), 2);
        assert_eq!(s.headers[0].level, 1);
        assert_eq!(s.headers[1].level, 2);
    }

    #[test]
    fn test_long_line_is_never_header() {
        let line = "A".repeat(120);
        let s = analyze(&line);
        assert!(s.headers.is_empty());
    }

    #[test]
    fn test_blank_lines_skipped() {
        let s = analyze("\n\nSummary\n");
        assert_eq!(s.headers.len(), 1);
        assert_eq!(s.headers[0].line_number, 2);
        assert_eq!(s.total_lines, 4);
    }

    #[test]
    fn test_all_uppercase_requires_cased_char() {
        assert!(is_all_uppercase("PHASE 2"));
        assert!(!is_all_uppercase("2024 - 25"));
        assert!(!is_all_uppercase("Phase 2"));
    }
}
