//! Text normalisation and tokenisation primitives.
//!
//! Sentences and word tokens follow Unicode segmentation rules (UAX #29).
//! Word tokens keep punctuation as separate tokens, so token counts are
//! always at least the whitespace word count of the same text.

use std::collections::HashSet;
use std::sync::LazyLock;
use unicode_segmentation::UnicodeSegmentation;

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
        "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his",
        "himself", "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself",
        "they", "them", "their", "theirs", "themselves", "what", "which", "who", "whom", "this",
        "that", "that'll", "these", "those", "am", "is", "are", "was", "were", "be", "been",
        "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an", "the",
        "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by", "for",
        "with", "about", "against", "between", "into", "through", "during", "before", "after",
        "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over", "under",
        "again", "further", "then", "once", "here", "there", "when", "where", "why", "how",
        "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "no",
        "nor", "not", "only", "own", "same", "so", "than", "too", "very", "s", "t", "can",
        "will", "just", "don", "don't", "should", "should've", "now", "d", "ll", "m", "o", "re",
        "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn", "didn't", "doesn",
        "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn", "isn't", "ma",
        "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't",
        "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn",
        "wouldn't",
    ]
    .into_iter()
    .collect()
});

/// Normalise raw document text.
///
/// Runs of horizontal whitespace collapse to a single space, each line is
/// trimmed, and two or more consecutive blank lines collapse to one (so three
/// or more newlines become exactly two). Line structure is otherwise kept
/// for header detection.
pub fn preprocess(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut previous_blank = false;
    for line in text.lines() {
        let normalized = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() {
            if !previous_blank && !out.is_empty() {
                out.push(String::new());
            }
            previous_blank = true;
        } else {
            out.push(normalized);
            previous_blank = false;
        }
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Collapse every whitespace run, newlines included, into a single space.
pub fn flatten_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into trimmed, whitespace-flattened sentences.
pub fn sentences(text: &str) -> Vec<String> {
    flatten_whitespace(text)
        .unicode_sentences()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Word-level tokens: words, numbers and individual punctuation marks.
pub fn word_tokens(text: &str) -> Vec<&str> {
    text.split_word_bounds()
        .filter(|t| !t.trim().is_empty())
        .collect()
}

/// Number of word-level tokens in `text`.
pub fn token_count(text: &str) -> usize {
    word_tokens(text).len()
}

/// Number of whitespace-separated words in `text`.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word)
}

/// Ends with terminal punctuation (`.`, `!` or `?`).
pub fn ends_sentence(text: &str) -> bool {
    text.trim_end().ends_with(['.', '!', '?'])
}

/// Reduce a lowercase noun to its singular base form.
///
/// Applies the regular English noun inflection rules in order, and leaves
/// words alone when stripping would produce an implausibly short stem or the
/// word is a common non-plural `-s` ending (`-ss`, `-us`, `-is`).
pub fn lemmatize(word: &str) -> String {
    const RULES: &[(&str, &str)] = &[
        ("ches", "ch"),
        ("shes", "sh"),
        ("sses", "ss"),
        ("xes", "x"),
        ("zes", "z"),
        ("ies", "y"),
        ("s", ""),
    ];

    if word.len() <= 3 || word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    for (suffix, replacement) in RULES {
        if let Some(stem) = word.strip_suffix(suffix) {
            if stem.len() < 2 {
                return word.to_string();
            }
            return format!("{stem}{replacement}");
        }
    }
    word.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_collapses_spaces() {
        assert_eq!(preprocess("  hello \t  world  "), "hello world");
    }

    #[test]
    fn test_preprocess_collapses_blank_lines() {
        let text = "Title\n\n\n\n\nBody line one\nBody line two\n\n\n";
        assert_eq!(preprocess(text), "Title\n\nBody line one\nBody line two");
    }

    #[test]
    fn test_preprocess_empty() {
        assert_eq!(preprocess(""), "");
        assert_eq!(preprocess(" \n\n \t\n"), "");
    }

    #[test]
    fn test_sentences_split_on_terminal_punctuation() {
        let s = sentences("First one here. Second one\nwraps a line! Third?");
        assert_eq!(
            s,
            vec!["First one here.", "Second one wraps a line!", "Third?"]
        );
    }

    #[test]
    fn test_word_tokens_separate_punctuation() {
        assert_eq!(word_tokens("Hello, world."), vec!["Hello", ",", "world", "."]);
        assert_eq!(token_count("Hello, world."), 4);
        assert_eq!(word_count("Hello, world."), 2);
    }

    #[test]
    fn test_stopwords() {
        assert!(is_stopword("the"));
        assert!(is_stopword("which"));
        assert!(!is_stopword("learning"));
    }

    #[test]
    fn test_ends_sentence() {
        assert!(ends_sentence("Done."));
        assert!(ends_sentence("Really?  "));
        assert!(!ends_sentence("Heading:"));
    }

    #[test]
    fn test_lemmatize() {
        assert_eq!(lemmatize("networks"), "network");
        assert_eq!(lemmatize("studies"), "study");
        assert_eq!(lemmatize("boxes"), "box");
        assert_eq!(lemmatize("branches"), "branch");
        assert_eq!(lemmatize("analysis"), "analysis");
        assert_eq!(lemmatize("class"), "class");
        assert_eq!(lemmatize("status"), "status");
        assert_eq!(lemmatize("data"), "data");
    }
}
