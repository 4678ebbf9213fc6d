//! Query-complexity based sizing of the context budget.

const QUESTION_WORDS: [&str; 7] = ["what", "how", "why", "when", "where", "who", "which"];

/// Words longer than this count as technical terms.
const TECHNICAL_WORD_CHARS: usize = 6;

const LENGTH_WEIGHT: f64 = 0.3;
const QUESTION_WEIGHT: f64 = 0.4;
const TECHNICAL_WEIGHT: f64 = 0.3;

const COMPLEX_THRESHOLD: f64 = 3.0;
const STANDARD_THRESHOLD: f64 = 1.5;

/// Scales a base token window by a cheap lexical complexity score.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryComplexityEstimator;

impl QueryComplexityEstimator {
    /// `0.3·words + 0.4·question words + 0.3·technical words`.
    pub fn complexity(&self, query: &str) -> f64 {
        let words: Vec<&str> = query.split_whitespace().collect();
        let questions = words
            .iter()
            .filter(|w| QUESTION_WORDS.contains(&w.to_lowercase().as_str()))
            .count();
        let technical = words
            .iter()
            .filter(|w| w.chars().count() > TECHNICAL_WORD_CHARS || w.contains('_'))
            .count();

        LENGTH_WEIGHT * words.len() as f64
            + QUESTION_WEIGHT * questions as f64
            + TECHNICAL_WEIGHT * technical as f64
    }

    /// 1.5× the base window above 3, 1× above 1.5, else 0.8×.
    pub fn estimate_window(&self, query: &str, base_window: usize) -> usize {
        let complexity = self.complexity(query);
        let factor = if complexity > COMPLEX_THRESHOLD {
            1.5
        } else if complexity > STANDARD_THRESHOLD {
            1.0
        } else {
            0.8
        };
        (base_window as f64 * factor) as usize
    }
}
